//! Built-in chain nodes.
//!
//! Nodes are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Generate buffers with no upstream:
//! - [`ConstSource`] - buffers filled with a fixed value
//! - [`BufferSource`] - repeats a reference buffer forever
//!
//! ## Effects ([`effect`])
//!
//! Adapt or transform the stream:
//! - [`MixDown`] - fan-in: collect buffers from several self-sufficient inputs
//! - [`MixUp`] - fan-out: hand out independent copies of one stream
//! - [`MultiMix`] - fan-in feeding fan-out
//! - [`Reframe`] - re-chunk arbitrary upstream buffer sizes into a uniform one
//!
//! ## Sinks ([`sink`])
//!
//! Terminate the chain:
//! - [`PeriodSink`] - drives N pull-cycles per invocation, owns the chain
//!   configuration
//! - [`CpalSink`] - output to a system audio device (requires the
//!   `cpal_sink` feature)
//!
//! Envelope nodes live in [`crate::envelope`], instrumentation nodes in
//! [`crate::meta`].

pub mod effect;
pub mod sink;
pub mod source;

pub use effect::{MixDown, MixUp, MultiMix, Reframe};
pub use sink::PeriodSink;
pub use source::{BufferSource, ConstSource};

#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;
