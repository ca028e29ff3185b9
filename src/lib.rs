//! kette - a pull-model audio processing chain library.
//!
//! A chain is a line of processing nodes ending in a sink. The sink drives
//! everything: each call to [`AudioNode::meta_process`] on the sink recursively
//! pulls one buffer of audio from its upstream node, which pulls from *its*
//! upstream, and so on back to a source. Buffers are exclusively owned and move
//! downstream; no node ever shares one.
//!
//! ```
//! use kette::nodes::{ConstSource, PeriodSink};
//! use kette::AudioNode;
//!
//! let mut sink = PeriodSink::new(1);
//! sink.bind(Box::new(ConstSource::new(0.25)));
//! sink.meta_info_sync();
//! sink.meta_start();
//! sink.meta_process();
//!
//! let buff = sink.take_buffer().unwrap();
//! assert!(buff.iter_sequential().all(|&s| s == 0.25));
//! ```
//!
//! Envelopes ([`envelope`]) are themselves chain nodes: time-varying control
//! signals rendered sample-accurately against a [`ChainTimer`]. Mixers
//! ([`nodes::MixDown`], [`nodes::MixUp`]) adapt the 1:1 chain shape into
//! fan-in and fan-out. [`meta::LatencyNode`] wraps a pull to measure wall-clock
//! cost against audio time.

pub mod buffer;
pub mod envelope;
pub mod error;
pub mod meta;
pub mod node;
pub mod nodes;
pub mod timing;

#[cfg(feature = "cpal_sink")]
pub mod device;

pub use buffer::{Sample, SampleBuffer};
pub use error::KetteError;
pub use node::{AudioNode, ChainInfo, NodeBase, NodeInfo, NodeState};
pub use timing::{ChainTimer, Nanos};

#[cfg(feature = "cpal_sink")]
pub use device::OutputDevice;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

/// Default buffer size in frames per channel.
pub const DEFAULT_BUFFER_SIZE: usize = 440;

/// Small value substituted for zero in ramp-math divisions.
pub const EPSILON: f64 = 0.000_001;

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
