//! Sink nodes: the downstream ends of a chain.
//!
//! A sink owns the chain configuration and drives the pull. Everything a
//! chain produces leaves through its sink - into a device, a file, or just
//! the caller's hands via [`AudioNode::take_buffer`](crate::AudioNode::take_buffer).

mod period_sink;

#[cfg(feature = "cpal_sink")]
mod cpal_sink;

pub use period_sink::PeriodSink;

#[cfg(feature = "cpal_sink")]
pub use cpal_sink::CpalSink;
