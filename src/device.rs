//! Audio output device discovery.
//!
//! This module is the hardware collaborator boundary: it knows how to find
//! and describe output devices and how to make a [`CpalSink`] for one. The
//! engine core never touches it - everything here sits behind the
//! `cpal_sink` feature.
//!
//! # Example
//!
//! ```no_run
//! use kette::device::OutputDevice;
//!
//! for device in OutputDevice::list_outputs() {
//!     println!("{} ({} Hz, {} ch)", device.name(), device.sample_rate(), device.channels());
//! }
//!
//! let device = OutputDevice::default_output().expect("no audio device");
//! let sink = device.create_sink().expect("stream setup failed");
//! ```

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::KetteError;
use crate::nodes::CpalSink;

/// A discovered audio output device.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    name: String,
    sample_rate: u32,
    channels: u16,
}

impl OutputDevice {
    /// The system's default output device.
    pub fn default_output() -> Result<Self, KetteError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(KetteError::NoDevice)?;
        let config = device
            .default_output_config()
            .map_err(|err| KetteError::Stream(err.to_string()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        Ok(OutputDevice {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            name,
            device,
            config,
        })
    }

    /// Every available output device. Empty when enumeration fails.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| {
                devices
                    .filter_map(|device| {
                        let config = device.default_output_config().ok()?;
                        let name = device.name().unwrap_or_else(|_| "Unknown".into());
                        Some(OutputDevice {
                            sample_rate: config.sample_rate().0,
                            channels: config.channels(),
                            name,
                            device,
                            config,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Device output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Create a sink node that writes to this device.
    pub fn create_sink(&self) -> Result<CpalSink, KetteError> {
        CpalSink::build(&self.device, &self.config)
    }
}
