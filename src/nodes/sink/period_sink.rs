//! The standard chain driver.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::node::{AudioNode, ChainHandle, ChainInfo, NodeBase};

/// Terminal node driving a chain in periods.
///
/// A *period* is one pull-cycle. Some output backends consume several small
/// chunks per wakeup rather than one large one; setting the period makes one
/// `meta_process` call here perform that many consecutive pull-cycles. Each
/// cycle re-fetches a buffer from upstream; only the most recent is retained
/// for [`take_buffer`](AudioNode::take_buffer).
///
/// The sink owns the canonical [`ChainInfo`]. Configure it through
/// [`chain_info`](Self::chain_info) before syncing and starting the chain:
///
/// ```
/// use kette::nodes::{ConstSource, PeriodSink};
/// use kette::AudioNode;
///
/// let mut sink = PeriodSink::new(2);
/// sink.chain_info().borrow_mut().buffer_size = 64;
/// sink.bind(Box::new(ConstSource::new(0.5)));
/// sink.meta_info_sync();
/// sink.meta_start();
/// sink.meta_process();
/// assert_eq!(sink.take_buffer().unwrap().frames(), 64);
/// ```
pub struct PeriodSink {
    base: NodeBase,
    period: usize,
}

impl PeriodSink {
    pub fn new(period: usize) -> Self {
        let mut base = NodeBase::new();
        base.chain = Some(Rc::new(RefCell::new(ChainInfo::default())));
        PeriodSink { base, period }
    }

    /// Live handle to the chain-wide configuration this sink owns.
    pub fn chain_info(&self) -> ChainHandle {
        self.base
            .chain
            .clone()
            .expect("period sink always owns a chain configuration")
    }

    /// Pull-cycles per `meta_process` invocation.
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn set_period(&mut self, period: usize) {
        self.period = period;
    }
}

impl AudioNode for PeriodSink {
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

    fn meta_start(&mut self) {
        if let Some(chain) = self.base.chain.clone() {
            debug!(nodes = chain.borrow().node_count, "starting chain");
        }
        if let Some(upstream) = self.base.upstream.as_mut() {
            upstream.meta_start();
        }
        self.start();
    }

    /// Run `period` consecutive pull-cycles.
    fn meta_process(&mut self) {
        for _ in 0..self.period {
            let buffer = {
                let upstream = self
                    .base
                    .upstream
                    .as_mut()
                    .expect("meta_process on a sink with no upstream bound");
                upstream.meta_process();
                upstream.take_buffer()
            };
            #[cfg(feature = "warn_on_empty")]
            if buffer.as_ref().map_or(true, |b| b.is_empty()) {
                tracing::warn!("sink pulled an empty buffer");
            }
            self.base.buffer = buffer;
            self.process();
        }
    }
}
