//! Example: send a chain to a real output device.
//!
//! Lists the available output devices, takes the default, and drives a short
//! ADSR-shaped control signal into it. Not much to hear - the point is the
//! wiring: device discovery, sink creation, and the pull loop pacing itself
//! against the device ring.
//!
//! Run with: cargo run --example device_out --features cpal_sink

use std::thread::sleep;
use std::time::Duration;

use kette::device::OutputDevice;
use kette::envelope::AdsrEnvelope;
use kette::{AudioNode, NANOS_PER_SECOND};

fn main() {
    tracing_subscriber::fmt::init();

    for (index, device) in OutputDevice::list_outputs().iter().enumerate() {
        println!(
            "[{}] {} ({} Hz, {} ch)",
            index,
            device.name(),
            device.sample_rate(),
            device.channels()
        );
    }

    let device = OutputDevice::default_output().expect("no audio device found");
    println!("using: {}", device.name());

    let mut sink = device.create_sink().expect("stream setup failed");
    sink.chain_info().borrow_mut().buffer_size = 441;
    sink.bind(Box::new(AdsrEnvelope::new(
        NANOS_PER_SECOND / 20,
        NANOS_PER_SECOND / 4,
        0.3,
        NANOS_PER_SECOND / 10,
    )));
    sink.meta_info_sync();
    sink.meta_start();

    for _ in 0..100 {
        // Keep roughly a buffer's worth of headroom in the ring.
        while sink.ring_available() < 441 {
            sleep(Duration::from_millis(2));
        }
        sink.meta_process();
    }

    if sink.check_underrun() {
        println!("device underran at least once");
    }
    sink.meta_finish();
}
