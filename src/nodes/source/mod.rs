//! Source nodes: the upstream ends of a chain.
//!
//! Sources never pull anything; their `meta_process` is just their own
//! `process`. A source bound into a fan-in mixer must be self-sufficient the
//! same way.

mod constant;
mod repeater;

pub use constant::ConstSource;
pub use repeater::BufferSource;
