//! Envelopes: time-varying control signals as chain nodes.
//!
//! An envelope describes how a value changes over a half-open time interval
//! `[start_time, stop_time)`. Envelopes are sources - they can be linked and
//! pulled like any other node - but they are meant to modulate parameters of
//! other nodes, not to generate audible audio themselves.
//!
//! [`Envelope`] covers the primitive shapes (constant hold, step, linear
//! ramp, exponential ramp). [`ChainEnvelope`] composes an ordered sequence of
//! envelopes into one gapless timeline, synthesizing constant-hold fillers
//! for any dead time between neighbors. [`AdsrEnvelope`] builds the classic
//! attack/decay/sustain contour on top of that, with a release ramp appended
//! when the node is asked to finish.

use std::any::Any;

use tracing::debug;

use crate::buffer::Sample;
use crate::node::{AudioNode, NodeBase, NodeState};
use crate::timing::{ChainTimer, Nanos};
use crate::EPSILON;

/// How an [`Envelope`] moves from its start value to its stop value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Hold the start value for the whole interval.
    Constant,
    /// Start value until the stop time's sample offset, then the stop value
    /// for the remainder of the requested span. No ramp.
    Step,
    /// Linear interpolation between the boundary values.
    Linear,
    /// `start * (stop / start)^(elapsed / duration)`.
    Exponential,
}

/// A primitive envelope: an interval, boundary values, and a [`Shape`].
///
/// `stop_time` of `None` marks an open-ended envelope: it renders forever and
/// a [`ChainEnvelope`] will not advance past it on its own. An envelope can
/// alternatively be given a relative [`lasting`](Self::lasting) duration; the
/// absolute interval is then resolved from its timer position when started.
pub struct Envelope {
    base: NodeBase,
    timer: ChainTimer,
    shape: Shape,
    start_time: Nanos,
    stop_time: Option<Nanos>,
    start_value: f64,
    stop_value: f64,
    duration: Option<Nanos>,
}

impl Envelope {
    fn with_shape(shape: Shape, start_value: f64, stop_value: f64) -> Self {
        Envelope {
            base: NodeBase::new(),
            timer: ChainTimer::new(),
            shape,
            start_time: 0,
            stop_time: Some(0),
            start_value,
            stop_value,
            duration: None,
        }
    }

    /// An envelope holding `value` for its whole interval.
    pub fn constant(value: f64) -> Self {
        Envelope::with_shape(Shape::Constant, value, value)
    }

    /// An envelope that jumps from `from` to `to` at its stop time.
    pub fn step(from: f64, to: f64) -> Self {
        Envelope::with_shape(Shape::Step, from, to)
    }

    /// An envelope ramping linearly from `from` to `to` over its interval.
    pub fn linear(from: f64, to: f64) -> Self {
        Envelope::with_shape(Shape::Linear, from, to)
    }

    /// An envelope ramping exponentially from `from` to `to`.
    pub fn exponential(from: f64, to: f64) -> Self {
        Envelope::with_shape(Shape::Exponential, from, to)
    }

    /// Pin the absolute interval. `None` for `stop` leaves it open-ended.
    pub fn spanning(mut self, start: Nanos, stop: Option<Nanos>) -> Self {
        self.start_time = start;
        self.stop_time = stop;
        self
    }

    /// Defer the interval: resolve it from the timer position at start time.
    pub fn lasting(mut self, duration: Nanos) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn start_time(&self) -> Nanos {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<Nanos> {
        self.stop_time
    }

    pub fn start_value(&self) -> f64 {
        self.start_value
    }

    pub fn stop_value(&self) -> f64 {
        self.stop_value
    }

    pub fn set_start_time(&mut self, start: Nanos) {
        self.start_time = start;
    }

    pub fn set_stop_time(&mut self, stop: Option<Nanos>) {
        self.stop_time = stop;
    }

    pub fn set_start_value(&mut self, value: f64) {
        self.start_value = value;
    }

    pub fn set_stop_value(&mut self, value: f64) {
        self.stop_value = value;
    }

    pub fn timer(&self) -> &ChainTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut ChainTimer {
        &mut self.timer
    }

    /// Interval length. Open-ended envelopes report zero.
    pub fn time_diff(&self) -> Nanos {
        self.stop_time.unwrap_or(self.start_time) - self.start_time
    }

    /// Stop value minus start value.
    pub fn val_diff(&self) -> f64 {
        self.stop_value - self.start_value
    }

    /// Stop value over start value, with a zero start value replaced by
    /// [`EPSILON`] so ramp math never divides by zero.
    pub fn val_divide(&self) -> f64 {
        let denominator = if self.start_value != 0.0 {
            self.start_value
        } else {
            EPSILON
        };
        self.stop_value / denominator
    }

    /// Samples left before this envelope's stop time at the current timer
    /// position. `None` for open-ended envelopes.
    pub fn remaining_samples(&self) -> Option<i64> {
        self.stop_time
            .map(|stop| (stop - self.timer.time()) / self.timer.nanos_per_frame())
    }

    /// Current time, advancing the sample counter afterward.
    fn time_now_inc(&mut self) -> Nanos {
        let now = self.timer.time();
        self.timer.inc_sample();
        now
    }

    /// Render `out.len()` samples of this envelope, advancing its timer.
    pub(crate) fn render_into(&mut self, out: &mut [Sample]) {
        match self.shape {
            Shape::Constant => {
                for slot in out.iter_mut() {
                    *slot = self.start_value;
                }
                self.timer.add_samples(out.len() as i64);
            }
            Shape::Step => {
                let remaining = self.remaining_samples().unwrap_or(0).max(0) as usize;
                let initial = remaining.min(out.len());
                for slot in &mut out[..initial] {
                    *slot = self.start_value;
                }
                for slot in &mut out[initial..] {
                    *slot = self.stop_value;
                }
                self.timer.add_samples(out.len() as i64);
            }
            Shape::Linear => {
                let diff = self.time_diff().max(1) as f64;
                for index in 0..out.len() {
                    let elapsed = (self.time_now_inc() - self.start_time) as f64;
                    out[index] = self.start_value + self.val_diff() * (elapsed / diff);
                }
            }
            Shape::Exponential => {
                let diff = self.time_diff().max(1) as f64;
                let ratio = self.val_divide();
                for index in 0..out.len() {
                    let elapsed = (self.time_now_inc() - self.start_time) as f64;
                    out[index] = self.start_value * ratio.powf(elapsed / diff);
                }
            }
        }
    }

    /// Resolve a deferred duration into an absolute interval.
    fn resolve_duration(&mut self) {
        if let Some(duration) = self.duration {
            let now = self.timer.time();
            self.start_time = now;
            self.stop_time = Some(now + duration);
        }
    }
}

impl AudioNode for Envelope {
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

    fn info_sync(&mut self) {
        self.base.sync_info_from_chain();
        self.timer.set_sample_rate(self.base.info.sample_rate);
    }

    fn start(&mut self) {
        self.resolve_duration();
        if self.base.state != NodeState::Finished {
            self.base.state = NodeState::Started;
        }
    }

    fn process(&mut self) {
        let mut out = self.create_buffer(1);
        self.render_into(out.channel_mut(0));
        self.base.buffer = Some(out);
    }
}

/// One entry in a [`ChainEnvelope`]: a child envelope, flagged when it was
/// synthesized by the gap-filling pass rather than added by the caller.
struct Segment {
    env: Envelope,
    filler: bool,
}

/// An envelope composed of an ordered sequence of child envelopes.
///
/// All children are driven off one shared timer. The composed timeline is
/// gapless: whenever two neighbors leave dead time between them, a
/// constant-hold filler is synthesized in between, inheriting the earlier
/// envelope's stop state. A trailing open-ended filler covers everything
/// past the last child, so the chain can always render.
///
/// Appending a child after an open-ended one closes the open interval at the
/// new child's start time. The `optimized` cursor records how far gap-filling
/// has progressed, so each append re-examines only the newly affected
/// boundary.
pub struct ChainEnvelope {
    base: NodeBase,
    timer: ChainTimer,
    segments: Vec<Segment>,
    /// Index of the child currently rendering. `None` until started.
    index: Option<usize>,
    /// First adjacent pair not yet verified gapless.
    optimized: usize,
    /// Value held before the first child begins.
    start_value: f64,
}

impl ChainEnvelope {
    pub fn new() -> Self {
        ChainEnvelope {
            base: NodeBase::new(),
            timer: ChainTimer::new(),
            segments: Vec::new(),
            index: None,
            optimized: 0,
            start_value: 0.0,
        }
    }

    /// Value rendered before the first child's start time.
    pub fn set_start_value(&mut self, value: f64) {
        self.start_value = value;
    }

    /// Append a child envelope. Children render in the order they are added;
    /// the gap-filling pass runs immediately on the new boundary.
    pub fn add_envelope(&mut self, env: Envelope) {
        // A trailing open-ended filler from the previous optimize pass is
        // superseded by the new child.
        let trailing_filler = self
            .segments
            .last()
            .map_or(false, |segment| segment.filler && segment.env.stop_time().is_none());
        if trailing_filler {
            self.segments.pop();
            self.optimized = self.optimized.min(self.segments.len().saturating_sub(1));
        }
        // Close an open-ended child at the newcomer's start.
        if let Some(last) = self.segments.last_mut() {
            if last.env.stop_time().is_none() {
                last.env.set_stop_time(Some(env.start_time()));
            }
        }
        self.segments.push(Segment { env, filler: false });
        self.optimize();
    }

    /// Number of children, synthesized fillers included.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The child currently rendering.
    pub fn current(&self) -> Option<&Envelope> {
        self.index.map(|index| &self.segments[index].env)
    }

    pub fn timer(&self) -> &ChainTimer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut ChainTimer {
        &mut self.timer
    }

    /// Fill every gap in the composed timeline.
    ///
    /// For each adjacent pair past the cursor: if the earlier child's stop
    /// time already reaches the later child's start time the pair is
    /// contiguous; otherwise a constant-hold filler is spliced between them,
    /// inheriting the earlier child's stop state and stopping at the later
    /// child's start. Finishes by guaranteeing an open-ended tail segment.
    pub fn optimize(&mut self) {
        if self.optimized == 0 && !self.segments.is_empty() {
            let first = &self.segments[0];
            if !first.filler && first.env.start_time() > 0 {
                self.insert_filler(0);
            }
        }
        while self.optimized + 1 < self.segments.len() {
            let next_start = self.segments[self.optimized + 1].env.start_time();
            let contiguous = match self.segments[self.optimized].env.stop_time() {
                Some(stop) => stop >= next_start,
                None => true,
            };
            if contiguous {
                self.optimized += 1;
                continue;
            }
            self.insert_filler(self.optimized + 1);
            self.optimized += 1;
        }
        let needs_tail = self
            .segments
            .last()
            .map_or(true, |segment| segment.env.stop_time().is_some());
        if needs_tail {
            self.insert_filler(self.segments.len());
        }
    }

    /// Synthesize a constant-hold filler at `index`, inheriting the previous
    /// child's stop state (or this chain's own start value at time zero) and
    /// stopping where the next child starts (open-ended at the tail).
    fn insert_filler(&mut self, index: usize) {
        let (value, start) = if index == 0 {
            (self.start_value, 0)
        } else {
            let previous = &self.segments[index - 1].env;
            (
                previous.stop_value(),
                previous.stop_time().unwrap_or(previous.start_time()),
            )
        };
        let stop = if index >= self.segments.len() {
            None
        } else {
            Some(self.segments[index].env.start_time())
        };
        debug!(index, value, start, ?stop, "synthesizing filler envelope");
        self.segments.insert(
            index,
            Segment {
                env: Envelope::constant(value).spanning(start, stop),
                filler: true,
            },
        );
    }

    /// Move to the next child, handing it the shared timer position.
    fn advance(&mut self) {
        let next = self.index.map_or(0, |index| index + 1);
        self.segments[next].env.timer = self.timer.clone();
        self.index = Some(next);
    }
}

impl Default for ChainEnvelope {
    fn default() -> Self {
        ChainEnvelope::new()
    }
}

impl AudioNode for ChainEnvelope {
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

    fn info_sync(&mut self) {
        self.base.sync_info_from_chain();
        self.timer.set_sample_rate(self.base.info.sample_rate);
    }

    fn start(&mut self) {
        self.optimize();
        if self.index.is_none() {
            self.advance();
        }
        if self.base.state != NodeState::Finished {
            self.base.state = NodeState::Started;
        }
    }

    /// Render one output buffer, splitting the request across children.
    ///
    /// Each child renders at most the samples remaining before its stop time;
    /// the request is clamped to that remainder, rendered at the correct
    /// offset of the shared output buffer, and the shared timer advances by
    /// the rendered count. When a child's interval elapses the chain moves to
    /// the next child for whatever remains of the request.
    fn process(&mut self) {
        let frames = self.base.info.out_buffer;
        let mut out = self.create_buffer_sized(frames, 1);
        let mut processed = 0;
        while processed < frames {
            let index = self
                .index
                .expect("chain envelope must be started before processing");
            let rest = frames - processed;
            let segment = &mut self.segments[index];
            let count = match segment.env.remaining_samples() {
                Some(remaining) => rest.min(remaining.max(0) as usize),
                None => rest,
            };
            if count == 0 {
                // Less than one frame left before this child's stop time.
                self.advance();
                continue;
            }
            segment
                .env
                .render_into(&mut out.channel_mut(0)[processed..processed + count]);
            processed += count;
            self.timer.add_samples(count as i64);
            let elapsed = match segment.env.stop_time() {
                Some(stop) => self.timer.time() >= stop,
                None => false,
            };
            if elapsed {
                self.advance();
            }
        }
        self.base.buffer = Some(out);
    }
}

/// Attack / decay / sustain envelope, with a release ramp on finish.
///
/// Three children are generated when the node starts: a linear attack ramp
/// from 0 to 1 over `[0, attack)`, a linear decay ramp from 1 down to the
/// sustain value over `[attack, decay)`, and an open-ended constant hold at
/// the sustain value. `decay` is the absolute end of the decay phase, not a
/// phase length. Asking the node to finish appends a linear ramp from the
/// sustain value to 0 lasting `release`, and the node reports done once that
/// ramp has elapsed.
pub struct AdsrEnvelope {
    inner: ChainEnvelope,
    attack: Nanos,
    decay: Nanos,
    sustain: f64,
    release: Nanos,
    release_end: Option<Nanos>,
    configured: bool,
}

impl AdsrEnvelope {
    pub fn new(attack: Nanos, decay: Nanos, sustain: f64, release: Nanos) -> Self {
        AdsrEnvelope {
            inner: ChainEnvelope::new(),
            attack,
            decay,
            sustain,
            release,
            release_end: None,
            configured: false,
        }
    }

    pub fn attack(&self) -> Nanos {
        self.attack
    }

    pub fn decay(&self) -> Nanos {
        self.decay
    }

    pub fn sustain(&self) -> f64 {
        self.sustain
    }

    pub fn release(&self) -> Nanos {
        self.release
    }

    pub fn timer(&self) -> &ChainTimer {
        self.inner.timer()
    }

    pub fn timer_mut(&mut self) -> &mut ChainTimer {
        self.inner.timer_mut()
    }
}

impl AudioNode for AdsrEnvelope {
    fn base(&self) -> &NodeBase {
        self.inner.base()
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        self.inner.base_mut()
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

    fn info_sync(&mut self) {
        self.inner.info_sync();
    }

    fn start(&mut self) {
        if !self.configured {
            self.inner
                .add_envelope(Envelope::linear(0.0, 1.0).spanning(0, Some(self.attack)));
            self.inner.add_envelope(
                Envelope::linear(1.0, self.sustain).spanning(self.attack, Some(self.decay)),
            );
            self.inner
                .add_envelope(Envelope::constant(self.sustain).spanning(self.decay, None));
            self.configured = true;
        }
        self.inner.start();
    }

    fn process(&mut self) {
        self.inner.process();
        if let Some(end) = self.release_end {
            if self.inner.timer().time() >= end && self.state() == NodeState::Finishing {
                self.done();
            }
        }
    }

    /// Ramp down instead of stopping outright: append the release ramp and
    /// stay in `Finishing` until it has fully elapsed.
    fn finish(&mut self) {
        let now = self.inner.timer().time();
        let end = now + self.release;
        self.inner
            .add_envelope(Envelope::linear(self.sustain, 0.0).spanning(now, Some(end)));
        self.release_end = Some(end);
        self.base_mut().state = NodeState::Finishing;
    }
}
