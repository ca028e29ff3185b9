//! Instrumentation nodes: pass-through counting and latency measurement.
//!
//! These nodes transform nothing. [`Counter`] tallies what flows through it;
//! [`LatencyNode`] times each upstream pull against the audio time that pull
//! represents. Both are meant to be spliced into a chain while diagnosing it
//! and removed for production use.

use std::any::Any;
use std::time::Instant;

use crate::node::{AudioNode, NodeBase, NodeState};
use crate::timing::{ChainTimer, Nanos};

/// Counts process invocations and samples observed, passing buffers through
/// untouched.
pub struct Counter {
    base: NodeBase,
    processed: u64,
    samples: u64,
}

impl Counter {
    pub fn new() -> Self {
        Counter {
            base: NodeBase::new(),
            processed: 0,
            samples: 0,
        }
    }

    /// Zero both tallies.
    pub fn reset(&mut self) {
        self.processed = 0;
        self.samples = 0;
    }

    /// Number of times this node has been processed.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Total samples observed across all channels.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl Default for Counter {
    fn default() -> Self {
        Counter::new()
    }
}

impl AudioNode for Counter {
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

    fn process(&mut self) {
        self.processed += 1;
        if let Some(ref buffer) = self.base.buffer {
            self.samples += buffer.total_samples() as u64;
        }
    }
}

/// Wraps the upstream pull in wall-clock timing and compares it to the audio
/// time the pull accounts for.
///
/// An *operation* is one `meta_process` of everything upstream. For each
/// operation this node records its wall-clock duration, the *latency* - the
/// operation time minus the nominal audio duration of the samples pulled -
/// and running totals of both. Negative latency means the chain produces
/// audio faster than real time, which is the healthy case.
pub struct LatencyNode {
    base: NodeBase,
    timer: ChainTimer,
    start: Instant,
    operation_time: Nanos,
    operation_latency: Nanos,
    total_operation_time: Nanos,
    total_operation_latency: Nanos,
    processed: u64,
    samples: u64,
}

impl LatencyNode {
    pub fn new() -> Self {
        LatencyNode {
            base: NodeBase::new(),
            timer: ChainTimer::new(),
            start: Instant::now(),
            operation_time: 0,
            operation_latency: 0,
            total_operation_time: 0,
            total_operation_latency: 0,
            processed: 0,
            samples: 0,
        }
    }

    /// Clear every accumulator and restart the reference clock.
    pub fn reset(&mut self) {
        self.operation_time = 0;
        self.operation_latency = 0;
        self.total_operation_time = 0;
        self.total_operation_latency = 0;
        self.processed = 0;
        self.samples = 0;
        self.timer.reset();
        self.start = Instant::now();
    }

    /// Wall-clock time since this node started (or was last reset). Includes
    /// dead time between pulls; prefer the operation statistics for cost.
    pub fn elapsed(&self) -> Nanos {
        self.start.elapsed().as_nanos() as Nanos
    }

    /// Audio time that should have elapsed for the samples pulled so far.
    pub fn expected(&self) -> Nanos {
        self.timer.time()
    }

    /// Wall-clock duration of the most recent operation.
    pub fn time(&self) -> Nanos {
        self.operation_time
    }

    /// Sum of all operation durations.
    pub fn total_time(&self) -> Nanos {
        self.total_operation_time
    }

    /// Latency of the most recent operation. Negative when the chain runs
    /// ahead of real time.
    pub fn latency(&self) -> Nanos {
        self.operation_latency
    }

    /// Total operation time compared against the expected audio time.
    pub fn total_latency(&self) -> Nanos {
        self.total_operation_time - self.timer.time()
    }

    /// Sum of every per-operation latency.
    pub fn sum_latency(&self) -> Nanos {
        self.total_operation_latency
    }

    /// Mean operation duration. Zero before the first pull.
    pub fn average_time(&self) -> Nanos {
        if self.processed == 0 {
            return 0;
        }
        self.total_operation_time / self.processed as Nanos
    }

    /// Mean per-operation latency. Zero before the first pull.
    pub fn average_latency(&self) -> Nanos {
        if self.processed == 0 {
            return 0;
        }
        self.total_operation_latency / self.processed as Nanos
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl Default for LatencyNode {
    fn default() -> Self {
        LatencyNode::new()
    }
}

impl AudioNode for LatencyNode {
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

    /// Starting (re)arms the reference clock.
    fn start(&mut self) {
        self.start = Instant::now();
        if self.base.state != NodeState::Finished {
            self.base.state = NodeState::Started;
        }
    }

    /// Pull upstream under a stopwatch, then account the samples claimed.
    fn meta_process(&mut self) {
        let (operation, buffer) = {
            let upstream = self
                .base
                .upstream
                .as_mut()
                .expect("meta_process on a node with no upstream bound");
            let begin = Instant::now();
            upstream.meta_process();
            let operation = begin.elapsed().as_nanos() as Nanos;
            (operation, upstream.take_buffer())
        };

        let claimed = buffer.as_ref().map_or(0, |b| b.total_samples());
        if let Some(ref buffer) = buffer {
            self.timer.set_sample_rate(buffer.sample_rate());
            self.timer.set_channels(buffer.channel_count());
        }
        self.timer.add_samples(claimed as i64);
        self.base.buffer = buffer;

        self.processed += 1;
        self.samples += claimed as u64;

        self.operation_time = operation;
        self.total_operation_time += operation;
        self.operation_latency = operation - self.timer.time_for(claimed as i64);
        self.total_operation_latency += self.operation_latency;

        self.process();
    }
}
