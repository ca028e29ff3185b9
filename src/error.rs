//! Engine error type.
//!
//! Malformed topology is a precondition violation (a panic), not an error
//! value - see [`AudioNode::meta_process`](crate::AudioNode::meta_process).
//! The variants here cover the paths that genuinely fail at runtime: the
//! hardened mixer underrun and the optional device collaborator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KetteError {
    /// A fan-in mixer was asked for output with nothing queued.
    #[error("mixer output requested with no buffer queued")]
    MixUnderrun,

    /// No audio output device is available.
    #[cfg(feature = "cpal_sink")]
    #[error("no audio output device available")]
    NoDevice,

    /// The audio device rejected stream construction.
    #[cfg(feature = "cpal_sink")]
    #[error("failed to build output stream: {0}")]
    Stream(String),
}
