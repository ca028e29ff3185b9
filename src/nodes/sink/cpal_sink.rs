//! Hardware audio output sink.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::warn;

use crate::buffer::sample_to_i16;
use crate::error::KetteError;
use crate::node::{AudioNode, ChainInfo, NodeBase};

/// Terminal node writing finished buffers to a system audio device.
///
/// The device stream runs on its own thread; this node squishes each pulled
/// buffer into interleaved samples and feeds them through a lock-free ring
/// buffer that the stream callback drains. If the engine falls behind, the
/// callback pads with silence and flags an underrun; if the engine runs
/// ahead and the ring fills up, excess samples are dropped with a warning.
pub struct CpalSink {
    base: NodeBase,
    producer: Producer<f32>,
    device_channels: usize,
    /// Samples the device has consumed so far.
    samples_consumed: Arc<AtomicUsize>,
    /// Set by the stream callback when it ran out of samples.
    had_underrun: Arc<AtomicBool>,
}

impl CpalSink {
    /// Build a sink for the given device and stream configuration.
    ///
    /// The stream is spawned immediately on a dedicated thread and lives for
    /// the life of the process. Only `f32` and `i16` device formats are
    /// supported.
    pub fn build(
        device: &cpal::Device,
        config: &SupportedStreamConfig,
    ) -> Result<Self, KetteError> {
        let device_channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config = config.config();
        let sample_rate = stream_config.sample_rate.0;

        match sample_format {
            SampleFormat::F32 | SampleFormat::I16 => {}
            other => {
                return Err(KetteError::Stream(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }

        // Ring sized for ~100ms of audio to ride out scheduling jitter.
        let ring_samples = ((sample_rate as f32 * 0.1) as usize) * device_channels;
        let ring_size = ring_samples.next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<f32>::new(ring_size);

        let samples_consumed = Arc::new(AtomicUsize::new(0));
        let had_underrun = Arc::new(AtomicBool::new(false));

        let consumed_clone = Arc::clone(&samples_consumed);
        let underrun_clone = Arc::clone(&had_underrun);
        let device = device.clone();
        std::thread::spawn(move || {
            let stream = build_stream(
                &device,
                sample_format,
                &stream_config,
                consumer,
                consumed_clone,
                underrun_clone,
            )
            .expect("failed to build output stream");

            stream.play().expect("failed to start audio stream");

            // The stream lives as long as this thread does.
            loop {
                std::thread::park();
            }
        });

        // This sink owns the chain configuration, like any terminal node;
        // the device dictates rate and channel count.
        let mut chain = ChainInfo::default();
        chain.sample_rate = f64::from(sample_rate);
        chain.channels = device_channels;

        let mut base = NodeBase::new();
        base.info.sample_rate = chain.sample_rate;
        base.info.channels = chain.channels;
        base.chain = Some(std::rc::Rc::new(std::cell::RefCell::new(chain)));

        Ok(CpalSink {
            base,
            producer,
            device_channels,
            samples_consumed,
            had_underrun,
        })
    }

    /// Live handle to the chain configuration this sink owns.
    pub fn chain_info(&self) -> crate::node::ChainHandle {
        self.base
            .chain
            .clone()
            .expect("device sink always owns a chain configuration")
    }

    /// Samples the device has played so far.
    pub fn samples_consumed(&self) -> usize {
        self.samples_consumed.load(Ordering::Relaxed)
    }

    /// Free space in the ring, in samples.
    pub fn ring_available(&self) -> usize {
        self.producer.slots()
    }

    /// Check and clear the underrun flag.
    pub fn check_underrun(&self) -> bool {
        self.had_underrun.swap(false, Ordering::Relaxed)
    }
}

impl AudioNode for CpalSink {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    /// Squish the pulled buffer into the ring, interleaved. A mono buffer is
    /// duplicated across all device channels.
    fn process(&mut self) {
        let buffer = match self.base.buffer.take() {
            Some(buffer) => buffer,
            None => return,
        };
        let repeats = if buffer.channel_count() == 1 && self.device_channels > 1 {
            self.device_channels
        } else {
            1
        };
        for value in buffer.iter_interleaved() {
            for _ in 0..repeats {
                if self.producer.push(value as f32).is_err() {
                    warn!("device ring full, dropping samples");
                    return;
                }
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    sample_format: SampleFormat,
    stream_config: &cpal::StreamConfig,
    mut consumer: Consumer<f32>,
    samples_consumed: Arc<AtomicUsize>,
    had_underrun: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let err_fn = |err| warn!("audio stream error: {}", err);
    match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            stream_config,
            move |data: &mut [f32], _| {
                for slot in data.iter_mut() {
                    match consumer.pop() {
                        Ok(value) => {
                            *slot = value;
                            samples_consumed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            *slot = 0.0;
                            had_underrun.store(true, Ordering::Relaxed);
                        }
                    }
                }
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            stream_config,
            move |data: &mut [i16], _| {
                for slot in data.iter_mut() {
                    match consumer.pop() {
                        Ok(value) => {
                            *slot = sample_to_i16(f64::from(value));
                            samples_consumed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            *slot = 0;
                            had_underrun.store(true, Ordering::Relaxed);
                        }
                    }
                }
            },
            err_fn,
            None,
        ),
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }
}
