//! Buffer-repeating source.

use std::any::Any;

use crate::buffer::SampleBuffer;
use crate::node::{AudioNode, NodeBase};

/// Repeats one reference buffer forever.
///
/// Every cycle hands a fresh copy of the reference downstream, so consumers
/// are free to mutate or drop what they receive. Setting the reference also
/// sets this node's output size to match it.
pub struct BufferSource {
    base: NodeBase,
    reference: SampleBuffer,
}

impl BufferSource {
    pub fn new(reference: SampleBuffer) -> Self {
        let mut source = BufferSource {
            base: NodeBase::new(),
            reference: SampleBuffer::new(0, 1),
        };
        source.set_reference(reference);
        source
    }

    /// Replace the buffer being repeated.
    pub fn set_reference(&mut self, reference: SampleBuffer) {
        self.base.info.out_buffer = reference.frames();
        self.base.info.channels = reference.channel_count();
        self.reference = reference;
    }

    pub fn reference(&self) -> &SampleBuffer {
        &self.reference
    }
}

impl AudioNode for BufferSource {
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
        0
    }

    /// Keep the reference-derived sizing; ignore the chain's buffer size.
    fn info_sync(&mut self) {
        let frames = self.reference.frames();
        let channels = self.reference.channel_count();
        self.base.sync_info_from_chain();
        self.base.info.out_buffer = frames;
        self.base.info.channels = channels;
    }

    fn process(&mut self) {
        self.base.buffer = Some(self.reference.clone());
    }
}
