//! Mixer nodes: fan-in and fan-out adapters over the 1:1 chain shape.
//!
//! "Mixing" here is about buffer routing, not summing. [`MixDown`] collects
//! the output of several inputs without combining them - if the caller wants
//! the buffers added together, the caller adds them. [`MixUp`] is the dual:
//! one stream republished as independent copies so several consumers can
//! take "the same" buffer without fighting over ownership.

use std::any::Any;
use std::collections::VecDeque;

use tracing::warn;

use crate::buffer::SampleBuffer;
use crate::error::KetteError;
use crate::node::{AudioNode, ChainHandle, NodeBase};

/// Fan-in: n inputs collected into one output stream of buffers.
///
/// ```text
/// node --+
///        |
/// node --+--> MixDown --> ...
///        |
/// node --+
/// ```
///
/// Inputs are bound with [`bind`](AudioNode::bind), which accepts any number
/// of nodes here. Each cycle invokes every input's `process` directly -
/// bypassing the input's own pull, so inputs must be self-sufficient (sources
/// or sub-chains that manage themselves) - and queues the resulting buffers
/// in input order. Each [`take_buffer`](AudioNode::take_buffer) pops one
/// queued buffer.
///
/// Buffers from different inputs are *not* summed; aggregation is the
/// caller's responsibility.
pub struct MixDown {
    base: NodeBase,
    inputs: Vec<Box<dyn AudioNode>>,
    queue: VecDeque<SampleBuffer>,
}

impl MixDown {
    pub fn new() -> Self {
        MixDown {
            base: NodeBase::new(),
            inputs: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Number of inputs bound to this mixer.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Buffers collected and not yet taken.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Pop one collected buffer, failing loudly on underrun instead of
    /// yielding silence.
    pub fn pop_output(&mut self) -> Result<SampleBuffer, KetteError> {
        self.queue.pop_front().ok_or(KetteError::MixUnderrun)
    }
}

impl Default for MixDown {
    fn default() -> Self {
        MixDown::new()
    }
}

impl AudioNode for MixDown {
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

    fn num_inputs(&self) -> usize {
        // Accept any number of inputs.
        usize::MAX
    }

    /// Add another input to the collection.
    fn bind(&mut self, mut upstream: Box<dyn AudioNode>) -> &mut dyn AudioNode {
        if let Some(chain) = self.base.chain.clone() {
            upstream.propagate_chain(&chain);
        }
        self.inputs.push(upstream);
        let end = self.inputs.len() - 1;
        self.inputs[end].as_mut()
    }

    fn propagate_chain(&mut self, chain: &ChainHandle) {
        chain.borrow_mut().node_count += 1;
        self.base.chain = Some(chain.clone());
        for input in &mut self.inputs {
            input.propagate_chain(chain);
        }
    }

    /// Sample every input directly and queue the buffers in input order.
    fn meta_process(&mut self) {
        for input in &mut self.inputs {
            input.process();
            match input.take_buffer() {
                Some(buffer) => self.queue.push_back(buffer),
                None => warn!("mix-down input produced no buffer"),
            }
        }
        self.process();
    }

    /// Pop one queued buffer. Reports underrun instead of synthesizing
    /// silence.
    fn take_buffer(&mut self) -> Option<SampleBuffer> {
        let buffer = self.queue.pop_front();
        if buffer.is_none() {
            warn!("mix-down output requested with no buffer queued");
        }
        buffer
    }

    fn meta_start(&mut self) {
        for input in &mut self.inputs {
            input.meta_start();
        }
        self.start();
    }

    fn meta_stop(&mut self) {
        for input in &mut self.inputs {
            input.meta_stop();
        }
        self.stop();
    }

    fn meta_finish(&mut self) {
        for input in &mut self.inputs {
            input.meta_finish();
        }
        self.finish();
    }

    fn meta_info_sync(&mut self) {
        self.info_sync();
        for input in &mut self.inputs {
            input.meta_info_sync();
        }
    }
}

/// Fan-out: one input republished to n consumers.
///
/// ```text
///               +--> node
///               |
/// ... --> MixUp +--> node
///               |
///               +--> node
/// ```
///
/// Pulls its single upstream normally, retains the result, and hands every
/// caller of [`take_buffer`](AudioNode::take_buffer) an independent copy.
/// Consumers can mutate their copies freely without interfering with each
/// other. The copy per request is the cost of that isolation.
pub struct MixUp {
    base: NodeBase,
    copies: u64,
}

impl MixUp {
    pub fn new() -> Self {
        MixUp {
            base: NodeBase::new(),
            copies: 0,
        }
    }

    /// Copies handed out since construction.
    pub fn copies_handed_out(&self) -> u64 {
        self.copies
    }
}

impl Default for MixUp {
    fn default() -> Self {
        MixUp::new()
    }
}

impl AudioNode for MixUp {
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

    /// Copy the retained buffer for the caller, keeping the original.
    fn take_buffer(&mut self) -> Option<SampleBuffer> {
        let copy = self.base.buffer.clone();
        if copy.is_some() {
            self.copies += 1;
        } else {
            warn!("mix-up output requested before any pull");
        }
        copy
    }
}

/// Combined fan-in/fan-out: n inputs collected, republished to n consumers.
///
/// ```text
/// node --+           +--> node
///        |           |
/// node --+--> this --+--> node
///        |           |
/// node --+           +--> node
/// ```
///
/// Each cycle collects every input's buffer (as [`MixDown`] does), promotes
/// the oldest queued buffer to the current publication, and hands out
/// independent copies of it (as [`MixUp`] does).
pub struct MultiMix {
    base: NodeBase,
    inputs: Vec<Box<dyn AudioNode>>,
    queue: VecDeque<SampleBuffer>,
    current: Option<SampleBuffer>,
    copies: u64,
}

impl MultiMix {
    pub fn new() -> Self {
        MultiMix {
            base: NodeBase::new(),
            inputs: Vec::new(),
            queue: VecDeque::new(),
            current: None,
            copies: 0,
        }
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn copies_handed_out(&self) -> u64 {
        self.copies
    }
}

impl Default for MultiMix {
    fn default() -> Self {
        MultiMix::new()
    }
}

impl AudioNode for MultiMix {
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

    fn num_inputs(&self) -> usize {
        usize::MAX
    }

    fn bind(&mut self, mut upstream: Box<dyn AudioNode>) -> &mut dyn AudioNode {
        if let Some(chain) = self.base.chain.clone() {
            upstream.propagate_chain(&chain);
        }
        self.inputs.push(upstream);
        let end = self.inputs.len() - 1;
        self.inputs[end].as_mut()
    }

    fn propagate_chain(&mut self, chain: &ChainHandle) {
        chain.borrow_mut().node_count += 1;
        self.base.chain = Some(chain.clone());
        for input in &mut self.inputs {
            input.propagate_chain(chain);
        }
    }

    fn meta_process(&mut self) {
        for input in &mut self.inputs {
            input.process();
            match input.take_buffer() {
                Some(buffer) => self.queue.push_back(buffer),
                None => warn!("multi-mix input produced no buffer"),
            }
        }
        match self.queue.pop_front() {
            Some(buffer) => self.current = Some(buffer),
            None => warn!("multi-mix cycle with no buffer collected"),
        }
        self.process();
    }

    fn take_buffer(&mut self) -> Option<SampleBuffer> {
        let copy = self.current.clone();
        if copy.is_some() {
            self.copies += 1;
        } else {
            warn!("multi-mix output requested with no buffer published");
        }
        copy
    }

    fn meta_start(&mut self) {
        for input in &mut self.inputs {
            input.meta_start();
        }
        self.start();
    }

    fn meta_stop(&mut self) {
        for input in &mut self.inputs {
            input.meta_stop();
        }
        self.stop();
    }

    fn meta_finish(&mut self) {
        for input in &mut self.inputs {
            input.meta_finish();
        }
        self.finish();
    }

    fn meta_info_sync(&mut self) {
        self.info_sync();
        for input in &mut self.inputs {
            input.meta_info_sync();
        }
    }
}
