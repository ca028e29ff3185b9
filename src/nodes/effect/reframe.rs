//! Buffer-size normalization.

use std::any::Any;

use crate::node::{AudioNode, NodeBase};

/// Re-chunks arbitrary upstream buffer sizes into this node's configured
/// output length.
///
/// If the upstream produces 20-frame buffers and this node is configured for
/// 10, every upstream buffer is split across two outputs. If the upstream
/// produces 10 and this node wants 20, the upstream is pulled twice per
/// cycle. The remainder of a partially consumed buffer carries over to the
/// next cycle.
///
/// The upstream may be pulled several times per cycle - make sure nothing
/// upstream is confused by that.
pub struct Reframe {
    base: NodeBase,
    /// Partially consumed upstream buffer, if any.
    pending: Option<crate::buffer::SampleBuffer>,
    /// Frames of `pending` already copied out.
    position: usize,
}

impl Reframe {
    pub fn new() -> Self {
        Reframe {
            base: NodeBase::new(),
            pending: None,
            position: 0,
        }
    }
}

impl Default for Reframe {
    fn default() -> Self {
        Reframe::new()
    }
}

impl AudioNode for Reframe {
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

    /// `process` pulls the upstream itself, as often as it needs to.
    fn meta_process(&mut self) {
        self.process();
    }

    fn process(&mut self) {
        let frames = self.base.info.out_buffer;
        let channels = self.base.info.channels;
        let mut out = self.create_buffer_sized(frames, channels);
        let mut filled = 0;

        while filled < frames {
            let exhausted = self
                .pending
                .as_ref()
                .map_or(true, |buffer| self.position >= buffer.frames() || buffer.is_empty());
            if exhausted {
                let buffer = {
                    let upstream = self
                        .base
                        .upstream
                        .as_mut()
                        .expect("meta_process on a node with no upstream bound");
                    upstream.meta_process();
                    upstream.take_buffer()
                };
                self.pending = Some(buffer.expect("reframe upstream produced no buffer"));
                self.position = 0;
                continue;
            }

            let pending = self.pending.as_ref().unwrap();
            let take = (pending.frames() - self.position).min(frames - filled);
            for channel in 0..channels.min(pending.channel_count()) {
                out.channel_mut(channel)[filled..filled + take]
                    .copy_from_slice(&pending.channel(channel)[self.position..self.position + take]);
            }
            self.position += take;
            filled += take;
        }

        self.base.buffer = Some(out);
    }
}
