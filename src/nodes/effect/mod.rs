//! Effect nodes: stream adapters between sources and sinks.

mod mixer;
mod reframe;

pub use mixer::{MixDown, MixUp, MultiMix};
pub use reframe::Reframe;
