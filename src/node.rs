//! The chain node protocol: linking, lifecycle, and the recursive pull.
//!
//! Every processing node implements [`AudioNode`]. Nodes form a chain through
//! single-ownership edges: each node owns its upstream neighbor, so the sink
//! owns the whole chain and dropping it drops everything. [`AudioNode::bind`]
//! installs an upstream and returns it again, which makes fluent construction
//! work through reborrowing:
//!
//! ```
//! use kette::nodes::{ConstSource, PeriodSink};
//! use kette::meta::Counter;
//! use kette::AudioNode;
//!
//! let mut sink = PeriodSink::new(1);
//! sink.bind(Box::new(Counter::new()))
//!     .bind(Box::new(ConstSource::new(0.1)));
//! ```
//!
//! Data flows by demand only: [`AudioNode::meta_process`] first pulls the
//! upstream node, takes ownership of the buffer it produced, and then runs
//! this node's own [`process`](AudioNode::process) over it. Chain-wide
//! configuration lives in one shared [`ChainInfo`] owned by the sink; binding
//! installs a handle to it in every node, so configuration reads are always
//! live rather than link-time snapshots.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::buffer::SampleBuffer;
use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE};

/// Lifecycle state shared by every node.
///
/// `Created -> Started <-> Stopped`, and `Finishing -> Finished` once a node
/// is asked to wind down. `Finished` is terminal: no further transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Created,
    Started,
    Stopped,
    Finishing,
    Finished,
}

/// Configuration shared by every node in one chain.
///
/// Describes how audio leaves the chain: `buffer_size` is the frame count a
/// buffer has when it reaches the sink. The sink owns the canonical value;
/// nodes hold a live handle and read it during [`AudioNode::info_sync`].
#[derive(Clone, Copy, Debug)]
pub struct ChainInfo {
    /// Sample rate of audio data in Hz.
    pub sample_rate: f64,
    /// Frames per buffer entering the sink.
    pub buffer_size: usize,
    /// Number of audio channels.
    pub channels: usize,
    /// Number of nodes linked into the chain.
    pub node_count: usize,
    /// Number of nodes that have reported done.
    pub nodes_finished: usize,
}

impl Default for ChainInfo {
    fn default() -> Self {
        ChainInfo {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            channels: 1,
            node_count: 1,
            nodes_finished: 0,
        }
    }
}

/// Shared handle to a chain's configuration.
pub type ChainHandle = Rc<RefCell<ChainInfo>>;

/// Per-node configuration, resolved from [`ChainInfo`] at sync time.
///
/// `in_buffer` and `out_buffer` are the frame counts this node expects to
/// consume and produce per cycle. Shape-changing nodes set them apart; most
/// nodes leave them mirroring the chain's buffer size.
#[derive(Clone, Copy, Debug)]
pub struct NodeInfo {
    pub sample_rate: f64,
    pub in_buffer: usize,
    pub out_buffer: usize,
    pub channels: usize,
}

impl NodeInfo {
    /// Mirror the chain-wide configuration into this node's view.
    pub fn sync_from(&mut self, chain: &ChainInfo) {
        self.sample_rate = chain.sample_rate;
        self.in_buffer = chain.buffer_size;
        self.out_buffer = chain.buffer_size;
        self.channels = chain.channels;
    }
}

impl Default for NodeInfo {
    fn default() -> Self {
        NodeInfo {
            sample_rate: DEFAULT_SAMPLE_RATE,
            in_buffer: DEFAULT_BUFFER_SIZE,
            out_buffer: DEFAULT_BUFFER_SIZE,
            channels: 1,
        }
    }
}

/// State every node carries: configuration, lifecycle, the owned upstream
/// edge, and the parking spot for the buffer currently being worked on.
pub struct NodeBase {
    pub info: NodeInfo,
    pub chain: Option<ChainHandle>,
    pub state: NodeState,
    pub upstream: Option<Box<dyn AudioNode>>,
    pub buffer: Option<SampleBuffer>,
}

impl NodeBase {
    pub fn new() -> Self {
        NodeBase {
            info: NodeInfo::default(),
            chain: None,
            state: NodeState::Created,
            upstream: None,
            buffer: None,
        }
    }

    /// Mirror the shared chain configuration into the local [`NodeInfo`].
    /// Returns false when this node has not been linked to a chain yet.
    pub fn sync_info_from_chain(&mut self) -> bool {
        let snapshot = match self.chain {
            Some(ref chain) => *chain.borrow(),
            None => return false,
        };
        self.info.sync_from(&snapshot);
        true
    }
}

impl Default for NodeBase {
    fn default() -> Self {
        NodeBase::new()
    }
}

/// The capability interface every chain node implements.
///
/// Implementors provide [`base`](Self::base)/[`base_mut`](Self::base_mut)
/// accessors to their [`NodeBase`] and override [`process`](Self::process);
/// the provided methods implement the shared linking, pull, and lifecycle
/// protocol. Sources (no upstream) return 0 from
/// [`num_inputs`](Self::num_inputs); advanced nodes (mixers, sinks,
/// instrumentation) override the `meta_*` methods themselves.
pub trait AudioNode {
    /// Shared node state.
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Concrete-type escape hatch: lets callers holding an erased node
    /// downcast to read node-specific state (a
    /// [`Counter`](crate::meta::Counter)'s tallies, say) after the node has
    /// been linked away. Implementations return `self`.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Number of upstream inputs this node pulls from. 0 marks a source.
    fn num_inputs(&self) -> usize {
        1
    }

    /// Transform (or generate) this node's working buffer.
    ///
    /// Called by [`meta_process`](Self::meta_process) after the upstream
    /// buffer has been claimed into `base().buffer`. Value-preserving
    /// transforms mutate it in place; shape-changing transforms replace it
    /// with a freshly created buffer.
    fn process(&mut self) {}

    /// One pull cycle: recursively process the upstream node, take ownership
    /// of its output buffer, then run [`process`](Self::process).
    ///
    /// # Panics
    ///
    /// Pulling a non-source node with no upstream bound is a precondition
    /// violation and panics. Validate chain completeness before starting;
    /// there is no recoverable error path for broken topology.
    fn meta_process(&mut self) {
        if self.num_inputs() == 0 {
            self.process();
            return;
        }
        let buffer = {
            let upstream = self
                .base_mut()
                .upstream
                .as_mut()
                .expect("meta_process on a node with no upstream bound");
            upstream.meta_process();
            upstream.take_buffer()
        };
        self.base_mut().buffer = buffer;
        self.process();
    }

    /// Install `upstream` as this node's input and hand it a live handle to
    /// the chain configuration. Returns the installed node so chains can be
    /// built fluently, sink-first: `sink.bind(b).bind(a)` yields `a -> b ->
    /// sink`.
    fn bind(&mut self, mut upstream: Box<dyn AudioNode>) -> &mut dyn AudioNode {
        if let Some(chain) = self.base().chain.clone() {
            upstream.propagate_chain(&chain);
        }
        self.base_mut().upstream.insert(upstream).as_mut()
    }

    /// Adopt a chain configuration handle, recursively, counting each node
    /// into the chain. Called by [`bind`](Self::bind); overridden by fan-in
    /// nodes that hold more than one input.
    fn propagate_chain(&mut self, chain: &ChainHandle) {
        chain.borrow_mut().node_count += 1;
        self.base_mut().chain = Some(Rc::clone(chain));
        if let Some(upstream) = self.base_mut().upstream.as_mut() {
            upstream.propagate_chain(chain);
        }
    }

    /// Relinquish ownership of this node's buffer to the caller. The buffer
    /// must not be accessed through this node afterward.
    fn take_buffer(&mut self) -> Option<SampleBuffer> {
        self.base_mut().buffer.take()
    }

    /// Take ownership of a buffer handed in.
    fn set_buffer(&mut self, buffer: SampleBuffer) {
        self.base_mut().buffer = Some(buffer);
    }

    /// Allocate an output buffer sized from this node's configuration.
    fn create_buffer(&self, channels: usize) -> SampleBuffer {
        let info = &self.base().info;
        SampleBuffer::with_rate(info.out_buffer, channels, info.sample_rate)
    }

    /// Allocate a buffer with an explicit frame count.
    fn create_buffer_sized(&self, frames: usize, channels: usize) -> SampleBuffer {
        SampleBuffer::with_rate(frames, channels, self.base().info.sample_rate)
    }

    /// Resolve this node's configuration. The default mirrors the shared
    /// chain configuration; nodes with special sizing override this.
    fn info_sync(&mut self) {
        self.base_mut().sync_info_from_chain();
    }

    /// Sync this node, then every node upstream of it.
    fn meta_info_sync(&mut self) {
        self.info_sync();
        if let Some(upstream) = self.base_mut().upstream.as_mut() {
            upstream.meta_info_sync();
        }
    }

    /// Start the upstream chain, then this node.
    fn meta_start(&mut self) {
        if let Some(upstream) = self.base_mut().upstream.as_mut() {
            upstream.meta_start();
        }
        self.start();
    }

    /// Stop the upstream chain, then this node.
    fn meta_stop(&mut self) {
        if let Some(upstream) = self.base_mut().upstream.as_mut() {
            upstream.meta_stop();
        }
        self.stop();
    }

    /// Ask the upstream chain to finish, then this node.
    fn meta_finish(&mut self) {
        if let Some(upstream) = self.base_mut().upstream.as_mut() {
            upstream.meta_finish();
        }
        self.finish();
    }

    /// Transition to `Started`. No effect once finished.
    fn start(&mut self) {
        let base = self.base_mut();
        if base.state != NodeState::Finished {
            base.state = NodeState::Started;
        }
    }

    /// Transition to `Stopped`. Reversible with [`start`](Self::start).
    /// No effect once finished.
    fn stop(&mut self) {
        let base = self.base_mut();
        if base.state != NodeState::Finished {
            base.state = NodeState::Stopped;
        }
    }

    /// Request this node to wind down: transition to `Finishing` and invoke
    /// [`done`](Self::done). Nodes that need a tail (e.g. a release ramp)
    /// override this and call `done` later themselves.
    fn finish(&mut self) {
        self.base_mut().state = NodeState::Finishing;
        self.done();
    }

    /// Terminal transition. Reports completion to the chain so a driver can
    /// tell when every node has wound down.
    fn done(&mut self) {
        self.base_mut().state = NodeState::Finished;
        if let Some(chain) = self.base().chain.clone() {
            let mut info = chain.borrow_mut();
            info.nodes_finished += 1;
            debug!(
                finished = info.nodes_finished,
                total = info.node_count,
                "node finished"
            );
        }
    }

    fn state(&self) -> NodeState {
        self.base().state
    }

    /// Immutable view of the upstream node, if bound.
    fn upstream(&self) -> Option<&dyn AudioNode> {
        self.base().upstream.as_deref()
    }

    fn upstream_mut(&mut self) -> Option<&mut (dyn AudioNode + 'static)> {
        self.base_mut().upstream.as_deref_mut()
    }
}
