//! Example: build and drive a chain, watching its latency.
//!
//! An ADSR envelope feeds a latency wrapper feeding a period sink; we pull a
//! few seconds of control signal and print what the instrumentation saw.
//!
//! Run with: cargo run --example chain_demo

use kette::envelope::AdsrEnvelope;
use kette::meta::LatencyNode;
use kette::nodes::PeriodSink;
use kette::{AudioNode, NANOS_PER_SECOND};

fn main() {
    tracing_subscriber::fmt::init();

    let adsr = AdsrEnvelope::new(
        NANOS_PER_SECOND / 10,     // 100ms attack
        NANOS_PER_SECOND / 2,      // decay phase ends at 500ms
        0.6,                       // sustain level
        NANOS_PER_SECOND / 4,      // 250ms release
    );

    let mut sink = PeriodSink::new(4);
    sink.chain_info().borrow_mut().buffer_size = 441;
    sink.bind(Box::new(LatencyNode::new()))
        .bind(Box::new(adsr));
    sink.meta_info_sync();
    sink.meta_start();

    for cycle in 0..25 {
        sink.meta_process();
        let buff = sink.take_buffer().expect("sink retained no buffer");
        if cycle % 5 == 0 {
            println!("cycle {:2}: level {:+.4}", cycle, buff.channel(0)[0]);
        }
    }

    let latency = sink
        .upstream()
        .unwrap()
        .as_any()
        .downcast_ref::<LatencyNode>()
        .unwrap();
    println!(
        "pulls: {}, samples: {}, avg op: {}ns, total latency: {}ns",
        latency.processed(),
        latency.samples(),
        latency.average_time(),
        latency.total_latency(),
    );

    sink.meta_finish();
}
