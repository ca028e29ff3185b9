//! Chain protocol, instrumentation, mixer, and sink tests.

use itertools::izip;

use kette::meta::{Counter, LatencyNode};
use kette::nodes::{BufferSource, ConstSource, MixDown, MixUp, MultiMix, PeriodSink, Reframe};
use kette::{AudioNode, KetteError, NodeState, SampleBuffer};

/// Fluent sink-first construction: `sink.bind(b).bind(a)` yields
/// `a -> b -> sink`, with the chain configuration handle installed in every
/// node along the way.
#[test]
fn fluent_bind() {
    let mut sink = PeriodSink::new(1);
    sink.bind(Box::new(Counter::new()))
        .bind(Box::new(ConstSource::new(0.1)));

    assert_eq!(sink.chain_info().borrow().node_count, 3);

    let counter = sink.upstream().unwrap();
    assert!(counter.as_any().is::<Counter>());
    let source = counter.upstream().unwrap();
    assert!(source.as_any().is::<ConstSource>());
}

#[test]
fn pull_moves_buffers_downstream() {
    let mut sink = PeriodSink::new(1);
    sink.bind(Box::new(ConstSource::new(0.25)));
    sink.meta_info_sync();
    sink.meta_start();

    sink.meta_process();
    let buff = sink.take_buffer().expect("sink retained no buffer");
    assert_eq!(buff.frames(), 440);
    assert!(buff.iter_sequential().all(|&s| s == 0.25));

    // The buffer moved out; the sink no longer has one.
    assert!(sink.take_buffer().is_none());
}

/// Chain-wide configuration is read live from the sink's handle.
#[test]
fn info_sync_propagates() {
    let mut sink = PeriodSink::new(1);
    {
        let info = sink.chain_info();
        let mut info = info.borrow_mut();
        info.sample_rate = 48_000.0;
        info.channels = 2;
        info.buffer_size = 64;
    }
    sink.bind(Box::new(ConstSource::new(0.5)));
    sink.meta_info_sync();
    sink.meta_start();

    sink.meta_process();
    let buff = sink.take_buffer().unwrap();
    assert_eq!(buff.frames(), 64);
    assert_eq!(buff.channel_count(), 2);
    assert_eq!(buff.sample_rate(), 48_000.0);
}

/// Period = 5 pulls the upstream exactly five times per invocation; the
/// counter sees five buffers of the configured size.
#[test]
fn sink_period_drives_upstream() {
    let mut sink = PeriodSink::new(5);
    sink.bind(Box::new(Counter::new()))
        .bind(Box::new(ConstSource::new(0.0)));
    sink.meta_info_sync();
    sink.meta_start();

    sink.meta_process();

    let counter = sink
        .upstream()
        .unwrap()
        .as_any()
        .downcast_ref::<Counter>()
        .unwrap();
    assert_eq!(counter.processed(), 5);
    assert_eq!(counter.samples(), 440 * 5);
}

#[test]
fn counter_resets() {
    let mut counter = Counter::new();
    counter.bind(Box::new(ConstSource::new(0.0)));
    counter.meta_process();
    assert_eq!(counter.processed(), 1);

    counter.reset();
    assert_eq!(counter.processed(), 0);
    assert_eq!(counter.samples(), 0);
}

/// Lifecycle transitions walk the whole chain, and `Finished` is terminal.
#[test]
fn state_machine() {
    let mut sink = PeriodSink::new(1);
    sink.bind(Box::new(ConstSource::new(0.0)));

    assert_eq!(sink.state(), NodeState::Created);

    sink.meta_start();
    assert_eq!(sink.state(), NodeState::Started);
    assert_eq!(sink.upstream().unwrap().state(), NodeState::Started);

    sink.meta_stop();
    assert_eq!(sink.state(), NodeState::Stopped);
    assert_eq!(sink.upstream().unwrap().state(), NodeState::Stopped);

    // Stopping is reversible.
    sink.meta_start();
    assert_eq!(sink.state(), NodeState::Started);

    sink.meta_finish();
    assert_eq!(sink.state(), NodeState::Finished);
    assert_eq!(sink.upstream().unwrap().state(), NodeState::Finished);
    assert_eq!(sink.chain_info().borrow().nodes_finished, 2);

    // Finished is terminal.
    sink.meta_start();
    assert_eq!(sink.state(), NodeState::Finished);
}

#[test]
#[should_panic(expected = "no upstream bound")]
fn pull_without_upstream_panics() {
    let mut counter = Counter::new();
    counter.meta_process();
}

/// Operation time is bounded by wall time, and the accumulators only grow.
#[test]
fn latency_accounting() {
    let mut sink = PeriodSink::new(1);
    sink.bind(Box::new(LatencyNode::new()))
        .bind(Box::new(ConstSource::new(0.5)));
    sink.meta_info_sync();
    sink.meta_start();

    sink.meta_process();
    let first_total = {
        let latency = sink
            .upstream()
            .unwrap()
            .as_any()
            .downcast_ref::<LatencyNode>()
            .unwrap();
        assert_eq!(latency.processed(), 1);
        assert_eq!(latency.samples(), 440);
        assert!(latency.time() < latency.elapsed());
        assert_eq!(latency.time(), latency.total_time());
        latency.total_time()
    };

    sink.meta_process();
    let latency = sink
        .upstream()
        .unwrap()
        .as_any()
        .downcast_ref::<LatencyNode>()
        .unwrap();
    assert_eq!(latency.processed(), 2);
    assert_eq!(latency.samples(), 880);
    assert!(latency.total_time() >= first_total);
    assert!(latency.total_time() >= latency.time());
    assert!(latency.time() < latency.elapsed());
    assert_eq!(latency.average_time(), latency.total_time() / 2);
    assert!(latency.expected() > 0);
}

#[test]
fn latency_reset() {
    let mut latency = LatencyNode::new();
    latency.bind(Box::new(ConstSource::new(0.0)));
    latency.meta_process();
    assert!(latency.total_time() >= 0 && latency.processed() == 1);

    latency.reset();
    assert_eq!(latency.processed(), 0);
    assert_eq!(latency.total_time(), 0);
    assert_eq!(latency.sum_latency(), 0);
    assert_eq!(latency.expected(), 0);
}

/// Fan-in collects, the caller aggregates: two 0.25 sources sum to 0.5.
#[test]
fn mix_down_collects_without_summing() {
    let mut mixer = MixDown::new();
    mixer.bind(Box::new(ConstSource::new(0.25)));
    mixer.bind(Box::new(ConstSource::new(0.25)));
    assert_eq!(mixer.input_count(), 2);

    mixer.meta_start();
    mixer.meta_process();
    assert_eq!(mixer.queued(), 2);

    let first = mixer.take_buffer().unwrap();
    let second = mixer.take_buffer().unwrap();
    assert!(first.iter_sequential().all(|&s| s == 0.25));
    assert!(second.iter_sequential().all(|&s| s == 0.25));

    for (a, b) in izip!(first.iter_sequential(), second.iter_sequential()) {
        assert_eq!(a + b, 0.5);
    }
}

/// Draining past the queue is an explicit underrun, not silence.
#[test]
fn mix_down_underrun() {
    let mut mixer = MixDown::new();
    mixer.bind(Box::new(ConstSource::new(0.25)));
    mixer.meta_process();

    assert!(mixer.take_buffer().is_some());
    assert!(mixer.take_buffer().is_none());
    assert!(matches!(mixer.pop_output(), Err(KetteError::MixUnderrun)));
}

/// Fan-out hands each requester an independent copy.
#[test]
fn mix_up_copies_are_independent() {
    let mut fan = MixUp::new();
    fan.bind(Box::new(ConstSource::new(0.3)));
    fan.meta_process();

    let mut first = fan.take_buffer().unwrap();
    let second = fan.take_buffer().unwrap();
    assert_eq!(fan.copies_handed_out(), 2);
    assert_eq!(first, second);

    // Mutating one copy leaves the others alone.
    first.fill(0.0);
    let third = fan.take_buffer().unwrap();
    assert!(third.iter_sequential().all(|&s| s == 0.3));
}

/// Combined fan-in/fan-out: collect everything, republish the oldest.
#[test]
fn multi_mix_republishes() {
    let mut mix = MultiMix::new();
    mix.bind(Box::new(ConstSource::new(0.1)));
    mix.bind(Box::new(ConstSource::new(0.2)));
    mix.meta_process();

    // Oldest collected buffer (first input) is current; the other waits.
    assert_eq!(mix.queued(), 1);
    let a = mix.take_buffer().unwrap();
    let b = mix.take_buffer().unwrap();
    assert_eq!(a, b);
    assert!(a.iter_sequential().all(|&s| s == 0.1));

    mix.meta_process();
    let c = mix.take_buffer().unwrap();
    assert!(c.iter_sequential().all(|&s| s == 0.2));
}

/// Re-chunking a 10-frame source into 25-frame outputs carries remainders
/// across cycles.
#[test]
fn reframe_rechunks() {
    let pattern: Vec<f64> = (0..10).map(f64::from).collect();
    let mut reframe = Reframe::new();
    reframe.bind(Box::new(BufferSource::new(SampleBuffer::from_channel(
        pattern.clone(),
    ))));
    reframe.base_mut().info.out_buffer = 25;

    reframe.meta_process();
    let buff = reframe.take_buffer().unwrap();
    assert_eq!(buff.frames(), 25);
    let expected: Vec<f64> = pattern
        .iter()
        .cycle()
        .take(25)
        .copied()
        .collect();
    assert_eq!(buff.channel(0), expected.as_slice());

    // Next cycle picks up where the pattern left off.
    reframe.meta_process();
    let buff = reframe.take_buffer().unwrap();
    let expected: Vec<f64> = pattern
        .iter()
        .cycle()
        .skip(25)
        .take(25)
        .copied()
        .collect();
    assert_eq!(buff.channel(0), expected.as_slice());
}

/// Sample counts convert to elapsed time through rate and channel count,
/// and the counter can be repositioned at will.
#[test]
fn chain_timer_conversions() {
    let mut timer = kette::ChainTimer::new();
    timer.set_sample_rate(1000.0);
    assert_eq!(timer.nanos_per_frame(), 1_000_000);

    timer.add_samples(500);
    assert_eq!(timer.time(), 500_000_000);
    assert_eq!(timer.time_for(250), 250_000_000);

    // Two channels: a frame passes every two samples.
    timer.set_channels(2);
    assert_eq!(timer.time(), 250_000_000);

    timer.set_samples(2000);
    assert_eq!(timer.time(), 1_000_000_000);

    timer.inc_sample();
    assert_eq!(timer.samples(), 2001);

    timer.reset();
    assert_eq!(timer.time(), 0);
    assert_eq!(timer.channels(), 1);
}

/// The repeater hands out fresh copies and sizes itself from its reference.
#[test]
fn buffer_source_repeats() {
    let reference = SampleBuffer::from_channels(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    let mut source = BufferSource::new(reference.clone());

    source.meta_process();
    let first = source.take_buffer().unwrap();
    source.meta_process();
    let second = source.take_buffer().unwrap();

    assert_eq!(first, reference);
    assert_eq!(second, reference);
}
