//! Constant-value source.

use std::any::Any;

use crate::buffer::Sample;
use crate::node::{AudioNode, NodeBase};

/// Generates buffers filled with one fixed value.
///
/// Useful as a DC offset, a test signal, or a stand-in for a real source
/// while wiring a chain up.
pub struct ConstSource {
    base: NodeBase,
    value: Sample,
}

impl ConstSource {
    pub fn new(value: Sample) -> Self {
        ConstSource {
            base: NodeBase::new(),
            value,
        }
    }

    pub fn set_value(&mut self, value: Sample) {
        self.value = value;
    }

    pub fn value(&self) -> Sample {
        self.value
    }
}

impl AudioNode for ConstSource {
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

    fn process(&mut self) {
        let channels = self.base.info.channels;
        let mut out = self.create_buffer(channels);
        out.fill(self.value);
        self.base.buffer = Some(out);
    }
}
