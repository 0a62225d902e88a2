//! Audio Primitives
//!
//! The building blocks every voice is wired from: oscillators, envelopes,
//! delay lines, followers, arithmetic units and ramps. Each has typed inputs
//! and a single output, and clamps its own inputs.

use crate::port::{clamp_or_min, unit_clamp, AudioUnit, PortSpec, PortValues, SignalKind};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Shortest time any envelope stage or ramp may take, in seconds
pub const MIN_TIME: f64 = 0.0005;

/// Longest time any envelope stage may take, in seconds
pub const MAX_TIME: f64 = 60.0;

/// Time for a held envelope to follow a full-scale sustain change
pub const SUSTAIN_SLEW_TIME: f64 = 0.02;

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// Band-unlimited oscillator with frequency and amplitude inputs
///
/// Frequency is clamped to 0..Nyquist; negative frequencies stall the phase.
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl Oscillator {
    pub const FREQUENCY: usize = 0;
    pub const AMPLITUDE: usize = 1;

    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            sample_rate,
            spec: PortSpec::new(SignalKind::Audio)
                .input("frequency", SignalKind::Control, 440.0)
                .input("amplitude", SignalKind::Control, 1.0),
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }
}

impl AudioUnit for Oscillator {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let freq = clamp_or_min(inputs.get(Self::FREQUENCY), 0.0, self.sample_rate * 0.5);
        let amplitude = inputs.get(Self::AMPLITUDE);

        let value = match self.waveform {
            Waveform::Sine => (self.phase * TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
        };

        self.phase = (self.phase + freq / self.sample_rate).fract();
        value * amplitude
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "oscillator"
    }
}

/// Envelope stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear ADSR envelope
///
/// Stage times are inputs in seconds. With `one_shot` high the envelope runs
/// attack and decay, then releases on its own without waiting for gate-off.
pub struct Envelope {
    stage: EnvelopeStage,
    level: f64,
    release_step: f64,
    last_gate: bool,
    sample_rate: f64,
    spec: PortSpec,
}

impl Envelope {
    pub const GATE: usize = 0;
    pub const ATTACK: usize = 1;
    pub const DECAY: usize = 2;
    pub const SUSTAIN: usize = 3;
    pub const RELEASE: usize = 4;
    pub const ONE_SHOT: usize = 5;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            release_step: 0.0,
            last_gate: false,
            sample_rate,
            spec: PortSpec::new(SignalKind::Control)
                .input("gate", SignalKind::Gate, 0.0)
                .input("attack", SignalKind::Control, 0.005)
                .input("decay", SignalKind::Control, 0.05)
                .input("sustain", SignalKind::Control, 0.8)
                .input("release", SignalKind::Control, 0.1)
                .input("one_shot", SignalKind::Gate, 0.0),
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    fn enter_release(&mut self, release: f64) {
        self.stage = EnvelopeStage::Release;
        self.release_step = self.level / (release * self.sample_rate);
    }
}

impl AudioUnit for Envelope {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let gate = SignalKind::Gate.is_high(inputs.get(Self::GATE));
        let attack = clamp_or_min(inputs.get(Self::ATTACK), MIN_TIME, MAX_TIME);
        let decay = clamp_or_min(inputs.get(Self::DECAY), MIN_TIME, MAX_TIME);
        let sustain = unit_clamp(inputs.get(Self::SUSTAIN));
        let release = clamp_or_min(inputs.get(Self::RELEASE), MIN_TIME, MAX_TIME);
        let one_shot = SignalKind::Gate.is_high(inputs.get(Self::ONE_SHOT));

        if gate && !self.last_gate {
            self.stage = EnvelopeStage::Attack;
        } else if !gate && self.last_gate && !one_shot && self.stage != EnvelopeStage::Idle {
            self.enter_release(release);
        }
        self.last_gate = gate;

        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                self.level += 1.0 / (attack * self.sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                // A sustain raised above the current level is reached by the
                // sustain slew, never by a jump
                if self.level > sustain {
                    let step = (1.0 - sustain) / (decay * self.sample_rate);
                    self.level = (self.level - step).max(sustain);
                }
                if self.level <= sustain {
                    if one_shot {
                        self.enter_release(release);
                    } else {
                        self.stage = EnvelopeStage::Sustain;
                    }
                }
            }
            EnvelopeStage::Sustain => {
                let max_step = 1.0 / (SUSTAIN_SLEW_TIME * self.sample_rate);
                self.level += (sustain - self.level).clamp(-max_step, max_step);
                if one_shot {
                    self.enter_release(release);
                }
            }
            EnvelopeStage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }

        self.level
    }

    fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_step = 0.0;
        self.last_gate = false;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "envelope"
    }
}

/// Fractional delay line with linear interpolation
///
/// The buffer is sized from `max_secs` at construction; the delay input is
/// clamped to one sample .. `max_secs`.
pub struct DelayLine {
    buffer: Vec<f64>,
    write_pos: usize,
    max_secs: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl DelayLine {
    pub const IN: usize = 0;
    pub const DELAY: usize = 1;

    pub fn new(max_secs: f64, sample_rate: f64) -> Self {
        let max_secs = clamp_or_min(max_secs, MIN_TIME, MAX_TIME);
        Self {
            buffer: vec![0.0; Self::capacity(max_secs, sample_rate)],
            write_pos: 0,
            max_secs,
            sample_rate,
            spec: PortSpec::new(SignalKind::Audio)
                .input("in", SignalKind::Audio, 0.0)
                .input("delay", SignalKind::Control, 0.25),
        }
    }

    fn capacity(max_secs: f64, sample_rate: f64) -> usize {
        (max_secs * sample_rate).ceil() as usize + 2
    }

    pub fn max_secs(&self) -> f64 {
        self.max_secs
    }
}

impl AudioUnit for DelayLine {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let len = self.buffer.len();
        let max_delay = (len - 2) as f64;
        let delay = clamp_or_min(inputs.get(Self::DELAY) * self.sample_rate, 1.0, max_delay);

        self.buffer[self.write_pos] = inputs.get(Self::IN);

        let mut read = self.write_pos as f64 - delay;
        if read < 0.0 {
            read += len as f64;
        }
        let i0 = read.floor() as usize % len;
        let i1 = (i0 + 1) % len;
        let frac = read - read.floor();
        let out = self.buffer[i0] + (self.buffer[i1] - self.buffer[i0]) * frac;

        self.write_pos = (self.write_pos + 1) % len;
        out
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.buffer = vec![0.0; Self::capacity(self.max_secs, sample_rate)];
        self.write_pos = 0;
    }

    fn type_id(&self) -> &'static str {
        "delay_line"
    }
}

/// Peak follower with exponential decay
///
/// The output jumps to any louder input and otherwise halves every
/// `half_life` seconds.
pub struct PeakFollower {
    peak: f64,
    half_life: f64,
    coefficient: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl PeakFollower {
    pub const IN: usize = 0;
    pub const HALF_LIFE: usize = 1;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            peak: 0.0,
            half_life: 0.0,
            coefficient: 0.0,
            sample_rate,
            spec: PortSpec::new(SignalKind::Control)
                .input("in", SignalKind::Audio, 0.0)
                .input("half_life", SignalKind::Control, 0.15),
        }
    }

    fn update_coefficient(&mut self, half_life: f64) {
        self.half_life = half_life;
        self.coefficient = libm::pow(0.5, 1.0 / (half_life * self.sample_rate));
    }
}

impl AudioUnit for PeakFollower {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let half_life = clamp_or_min(inputs.get(Self::HALF_LIFE), MIN_TIME, MAX_TIME);
        if half_life != self.half_life {
            self.update_coefficient(half_life);
        }
        let magnitude = inputs.get(Self::IN).abs();
        let decayed = self.peak * self.coefficient;
        self.peak = if magnitude > decayed { magnitude } else { decayed };
        self.peak
    }

    fn reset(&mut self) {
        self.peak = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        // Force recomputation on the next tick
        self.half_life = 0.0;
    }

    fn type_id(&self) -> &'static str {
        "peak_follower"
    }
}

/// Peak limiter with instant attack and exponential release
///
/// The output magnitude never exceeds `threshold`.
pub struct Limiter {
    envelope: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl Limiter {
    pub const IN: usize = 0;
    pub const THRESHOLD: usize = 1;
    pub const RELEASE: usize = 2;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            envelope: 0.0,
            sample_rate,
            spec: PortSpec::new(SignalKind::Audio)
                .input("in", SignalKind::Audio, 0.0)
                .input("threshold", SignalKind::Control, 0.95)
                .input("release", SignalKind::Control, 0.1),
        }
    }
}

impl AudioUnit for Limiter {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let input = inputs.get(Self::IN);
        let threshold = clamp_or_min(inputs.get(Self::THRESHOLD), 0.001, 1.0);
        let release = clamp_or_min(inputs.get(Self::RELEASE), MIN_TIME, MAX_TIME);

        let coefficient = libm::exp(-1.0 / (release * self.sample_rate));
        self.envelope = input.abs().max(self.envelope * coefficient);

        if self.envelope > threshold {
            input * threshold / self.envelope
        } else {
            input
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "limiter"
    }
}

/// `a * b`
pub struct Multiply {
    spec: PortSpec,
}

impl Multiply {
    pub const A: usize = 0;
    pub const B: usize = 1;

    pub fn new() -> Self {
        Self {
            spec: PortSpec::new(SignalKind::Audio)
                .input("a", SignalKind::Audio, 1.0)
                .input("b", SignalKind::Audio, 1.0),
        }
    }
}

impl Default for Multiply {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for Multiply {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        inputs.get(Self::A) * inputs.get(Self::B)
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "multiply"
    }
}

/// `a + b`
pub struct Add {
    spec: PortSpec,
}

impl Add {
    pub const A: usize = 0;
    pub const B: usize = 1;

    pub fn new() -> Self {
        Self {
            spec: PortSpec::new(SignalKind::Audio)
                .input("a", SignalKind::Audio, 0.0)
                .input("b", SignalKind::Audio, 0.0),
        }
    }
}

impl Default for Add {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for Add {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        inputs.get(Self::A) + inputs.get(Self::B)
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "add"
    }
}

/// `a * b + c`
pub struct MultiplyAdd {
    spec: PortSpec,
}

impl MultiplyAdd {
    pub const A: usize = 0;
    pub const B: usize = 1;
    pub const C: usize = 2;

    pub fn new() -> Self {
        Self {
            spec: PortSpec::new(SignalKind::Audio)
                .input("a", SignalKind::Audio, 0.0)
                .input("b", SignalKind::Audio, 1.0)
                .input("c", SignalKind::Audio, 0.0),
        }
    }
}

impl Default for MultiplyAdd {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for MultiplyAdd {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        inputs.get(Self::A) * inputs.get(Self::B) + inputs.get(Self::C)
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "multiply_add"
    }
}

/// `min(a, b)`
pub struct Minimum {
    spec: PortSpec,
}

impl Minimum {
    pub const A: usize = 0;
    pub const B: usize = 1;

    pub fn new() -> Self {
        Self {
            spec: PortSpec::new(SignalKind::Audio)
                .input("a", SignalKind::Audio, 0.0)
                .input("b", SignalKind::Audio, 0.0),
        }
    }
}

impl Default for Minimum {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for Minimum {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        inputs.get(Self::A).min(inputs.get(Self::B))
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "minimum"
    }
}

/// `max(a, b)`
pub struct Maximum {
    spec: PortSpec,
}

impl Maximum {
    pub const A: usize = 0;
    pub const B: usize = 1;

    pub fn new() -> Self {
        Self {
            spec: PortSpec::new(SignalKind::Audio)
                .input("a", SignalKind::Audio, 0.0)
                .input("b", SignalKind::Audio, 0.0),
        }
    }
}

impl Default for Maximum {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for Maximum {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        inputs.get(Self::A).max(inputs.get(Self::B))
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "maximum"
    }
}

/// Copies its input; used as a fan-out point for a settable input
pub struct PassThrough {
    spec: PortSpec,
}

impl PassThrough {
    pub const IN: usize = 0;

    pub fn new() -> Self {
        Self {
            spec: PortSpec::new(SignalKind::Audio).input("in", SignalKind::Audio, 0.0),
        }
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioUnit for PassThrough {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        inputs.get(Self::IN)
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "pass_through"
    }
}

/// Linear ramp toward its input
///
/// Whenever the input changes, the output travels in a straight line from
/// where it is now to the new value over `time` seconds.
pub struct LinearRamp {
    initial: f64,
    current: f64,
    target: f64,
    step: f64,
    remaining: u64,
    sample_rate: f64,
    spec: PortSpec,
}

impl LinearRamp {
    pub const IN: usize = 0;
    pub const TIME: usize = 1;

    pub fn new(initial: f64, time: f64, sample_rate: f64) -> Self {
        Self {
            initial,
            current: initial,
            target: initial,
            step: 0.0,
            remaining: 0,
            sample_rate,
            spec: PortSpec::new(SignalKind::Control)
                .input("in", SignalKind::Control, initial)
                .input("time", SignalKind::Control, time),
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }
}

impl AudioUnit for LinearRamp {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let target = inputs.get(Self::IN);
        if !target.is_nan() && target != self.target {
            let time = clamp_or_min(inputs.get(Self::TIME), 0.0, MAX_TIME);
            let samples = (time * self.sample_rate).round().max(1.0);
            self.target = target;
            self.step = (target - self.current) / samples;
            self.remaining = samples as u64;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.current = self.target;
            } else {
                self.current += self.step;
            }
        }
        self.current
    }

    fn reset(&mut self) {
        self.current = self.initial;
        self.target = self.initial;
        self.step = 0.0;
        self.remaining = 0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "linear_ramp"
    }
}

/// Maximum number of breakpoints an automation player holds
pub const MAX_AUTOMATION_POINTS: usize = 64;

/// A breakpoint: reach `value` after `duration` seconds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub value: f64,
    pub duration: f64,
}

impl AutomationPoint {
    pub fn new(value: f64, duration: f64) -> Self {
        Self { value, duration }
    }
}

/// Breakpoint automation player
///
/// Plays a fixed-capacity list of breakpoints with linear interpolation.
/// Playback (re)starts whenever the `start` input changes to a positive value;
/// `rate` scales playback speed.
pub struct AutomationPlayer {
    points: [AutomationPoint; MAX_AUTOMATION_POINTS],
    len: usize,
    looping: bool,
    playing: bool,
    index: usize,
    elapsed: f64,
    from: f64,
    value: f64,
    last_start: f64,
    sample_rate: f64,
    spec: PortSpec,
}

impl AutomationPlayer {
    pub const START: usize = 0;
    pub const RATE: usize = 1;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            points: [AutomationPoint::default(); MAX_AUTOMATION_POINTS],
            len: 0,
            looping: false,
            playing: false,
            index: 0,
            elapsed: 0.0,
            from: 0.0,
            value: 0.0,
            last_start: 0.0,
            sample_rate,
            spec: PortSpec::new(SignalKind::Control)
                .input("start", SignalKind::Gate, 0.0)
                .input("rate", SignalKind::Control, 1.0),
        }
    }

    /// Replace the breakpoint list; extra points beyond capacity are dropped
    pub fn load(&mut self, points: &[AutomationPoint], looping: bool) -> usize {
        self.len = points.len().min(MAX_AUTOMATION_POINTS);
        self.points[..self.len].copy_from_slice(&points[..self.len]);
        self.looping = looping;
        self.playing = false;
        self.len
    }

    pub fn start(&mut self) {
        self.index = 0;
        self.elapsed = 0.0;
        self.from = self.value;
        self.playing = self.len > 0;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AudioUnit for AutomationPlayer {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let start = inputs.get(Self::START);
        if start > 0.0 && start != self.last_start {
            self.start();
        }
        self.last_start = start;

        if self.playing {
            let rate = clamp_or_min(inputs.get(Self::RATE), 0.0, 16.0);
            let point = self.points[self.index];
            let total = (point.duration * self.sample_rate).max(1.0);

            self.elapsed += rate;
            let t = (self.elapsed / total).min(1.0);
            self.value = self.from + (point.value - self.from) * t;

            if self.elapsed >= total {
                self.value = point.value;
                self.from = point.value;
                self.elapsed = 0.0;
                self.index += 1;
                if self.index >= self.len {
                    self.index = 0;
                    self.playing = self.looping;
                }
            }
        }

        self.value
    }

    fn reset(&mut self) {
        self.playing = false;
        self.index = 0;
        self.elapsed = 0.0;
        self.from = 0.0;
        self.value = 0.0;
        self.last_start = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "automation_player"
    }
}

/// Sums a fixed number of channels
pub struct Mixer {
    channels: usize,
    spec: PortSpec,
}

impl Mixer {
    pub fn new(channels: usize) -> Self {
        let spec = (0..channels).fold(PortSpec::new(SignalKind::Audio), |spec, i| {
            spec.input(format!("ch{}", i), SignalKind::Audio, 0.0)
        });
        Self { channels, spec }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl AudioUnit for Mixer {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        (0..self.channels).map(|i| inputs.get(i)).sum()
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "mixer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(unit: &dyn AudioUnit) -> PortValues {
        PortValues::from_spec(unit.port_spec())
    }

    #[test]
    fn test_oscillator_frequency() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 48000.0);
        let mut inputs = frame(&osc);
        inputs.set(Oscillator::FREQUENCY, 480.0);

        let samples: Vec<f64> = (0..1000).map(|_| osc.tick(&inputs)).collect();
        let wraps = samples.windows(2).filter(|w| w[1] < w[0]).count();

        // 480 Hz over 1000 samples at 48 kHz is 10 periods
        assert!((9..=10).contains(&wraps));
    }

    #[test]
    fn test_oscillator_clamps_negative_frequency() {
        let mut osc = Oscillator::new(Waveform::Sine, 48000.0);
        let mut inputs = frame(&osc);
        inputs.set(Oscillator::FREQUENCY, -300.0);
        for _ in 0..100 {
            osc.tick(&inputs);
        }
        assert_eq!(osc.phase(), 0.0);
    }

    #[test]
    fn test_oscillator_waveform_shapes() {
        let mut tri = Oscillator::new(Waveform::Triangle, 48000.0);
        let mut sqr = Oscillator::new(Waveform::Square, 48000.0);
        let inputs = frame(&tri);

        assert_relative_eq!(tri.tick(&inputs), -1.0);
        assert_relative_eq!(sqr.tick(&inputs), 1.0);
    }

    #[test]
    fn test_envelope_full_cycle() {
        let mut env = Envelope::new(1000.0);
        let mut inputs = frame(&env);
        inputs.set(Envelope::ATTACK, 0.01);
        inputs.set(Envelope::DECAY, 0.01);
        inputs.set(Envelope::SUSTAIN, 0.5);
        inputs.set(Envelope::RELEASE, 0.01);
        inputs.set(Envelope::GATE, 1.0);

        for _ in 0..10 {
            env.tick(&inputs);
        }
        assert_relative_eq!(env.level(), 1.0);

        for _ in 0..20 {
            env.tick(&inputs);
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert_relative_eq!(env.level(), 0.5);

        inputs.set(Envelope::GATE, 0.0);
        for _ in 0..11 {
            env.tick(&inputs);
        }
        assert_eq!(env.stage(), EnvelopeStage::Idle);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn test_envelope_one_shot_releases_while_gate_held() {
        let mut env = Envelope::new(1000.0);
        let mut inputs = frame(&env);
        inputs.set(Envelope::ATTACK, 0.005);
        inputs.set(Envelope::DECAY, 0.005);
        inputs.set(Envelope::SUSTAIN, 0.5);
        inputs.set(Envelope::RELEASE, 0.005);
        inputs.set(Envelope::ONE_SHOT, 1.0);
        inputs.set(Envelope::GATE, 1.0);

        for _ in 0..40 {
            env.tick(&inputs);
        }
        assert_eq!(env.stage(), EnvelopeStage::Idle);
    }

    #[test]
    fn test_envelope_retrigger_from_current_level() {
        let mut env = Envelope::new(1000.0);
        let mut inputs = frame(&env);
        inputs.set(Envelope::ATTACK, 0.1);
        inputs.set(Envelope::GATE, 1.0);
        for _ in 0..50 {
            env.tick(&inputs);
        }
        let mid = env.level();

        inputs.set(Envelope::GATE, 0.0);
        env.tick(&inputs);
        inputs.set(Envelope::GATE, 1.0);
        let next = env.tick(&inputs);

        assert_eq!(env.stage(), EnvelopeStage::Attack);
        assert!(next > mid * 0.9, "no jump to zero on retrigger");
    }

    #[test]
    fn test_envelope_sustain_change_is_slewed() {
        let sample_rate = 1000.0;
        let mut env = Envelope::new(sample_rate);
        let mut inputs = frame(&env);
        inputs.set(Envelope::ATTACK, 0.005);
        inputs.set(Envelope::DECAY, 0.005);
        inputs.set(Envelope::SUSTAIN, 0.8);
        inputs.set(Envelope::GATE, 1.0);
        for _ in 0..50 {
            env.tick(&inputs);
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        let bound = 1.0 / (SUSTAIN_SLEW_TIME * sample_rate) + 1e-12;
        for sustain in [1.0, 0.2, 0.9] {
            inputs.set(Envelope::SUSTAIN, sustain);
            let mut last = env.level();
            for _ in 0..40 {
                let level = env.tick(&inputs);
                assert!((level - last).abs() <= bound);
                last = level;
            }
            assert_relative_eq!(env.level(), sustain, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_envelope_decay_never_jumps_up_to_sustain() {
        let mut env = Envelope::new(1000.0);
        let mut inputs = frame(&env);
        inputs.set(Envelope::ATTACK, 0.001);
        inputs.set(Envelope::DECAY, 1.0);
        inputs.set(Envelope::SUSTAIN, 0.0);
        inputs.set(Envelope::GATE, 1.0);
        for _ in 0..500 {
            env.tick(&inputs);
        }
        assert_eq!(env.stage(), EnvelopeStage::Decay);
        let before = env.level();

        inputs.set(Envelope::SUSTAIN, 1.0);
        let after = env.tick(&inputs);
        assert!((after - before).abs() <= 1.0 / (SUSTAIN_SLEW_TIME * 1000.0) + 1e-12);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_delay_line_integer_delay() {
        let mut delay = DelayLine::new(0.5, 1000.0);
        let mut inputs = frame(&delay);
        inputs.set(DelayLine::DELAY, 0.25);

        inputs.set(DelayLine::IN, 1.0);
        let mut out = vec![delay.tick(&inputs)];
        inputs.set(DelayLine::IN, 0.0);
        for _ in 0..300 {
            out.push(delay.tick(&inputs));
        }

        assert_relative_eq!(out[250], 1.0);
        assert_eq!(out.iter().filter(|&&v| v != 0.0).count(), 1);
    }

    #[test]
    fn test_delay_line_clamps_delay() {
        let mut delay = DelayLine::new(0.01, 1000.0);
        let mut inputs = frame(&delay);
        inputs.set(DelayLine::DELAY, 100.0);
        inputs.set(DelayLine::IN, 1.0);
        for _ in 0..100 {
            let out = delay.tick(&inputs);
            assert!(out.is_finite());
        }
    }

    #[test]
    fn test_peak_follower_half_life() {
        let mut follower = PeakFollower::new(1000.0);
        let mut inputs = frame(&follower);
        inputs.set(PeakFollower::HALF_LIFE, 0.1);

        inputs.set(PeakFollower::IN, -1.0);
        assert_relative_eq!(follower.tick(&inputs), 1.0);

        inputs.set(PeakFollower::IN, 0.0);
        let mut out = 0.0;
        for _ in 0..100 {
            out = follower.tick(&inputs);
        }
        assert_relative_eq!(out, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_limiter_caps_output() {
        let mut limiter = Limiter::new(48000.0);
        let mut inputs = frame(&limiter);
        inputs.set(Limiter::THRESHOLD, 0.5);
        for i in 0..1000 {
            inputs.set(Limiter::IN, 3.0 * (i as f64 * 0.1).sin());
            assert!(limiter.tick(&inputs).abs() <= 0.5 + 1e-12);
        }
    }

    #[test]
    fn test_arithmetic_units() {
        let mut mul = Multiply::new();
        let mut add = Add::new();
        let mut mad = MultiplyAdd::new();
        let mut min = Minimum::new();
        let mut max = Maximum::new();
        let mut pass = PassThrough::new();

        let mut two = PortValues::new(2);
        two.set(0, 3.0);
        two.set(1, -2.0);
        assert_eq!(mul.tick(&two), -6.0);
        assert_eq!(add.tick(&two), 1.0);
        assert_eq!(min.tick(&two), -2.0);
        assert_eq!(max.tick(&two), 3.0);
        assert_eq!(pass.tick(&two), 3.0);

        let mut three = PortValues::new(3);
        three.set(0, 3.0);
        three.set(1, -2.0);
        three.set(2, 10.0);
        assert_eq!(mad.tick(&three), 4.0);
    }

    #[test]
    fn test_linear_ramp_reaches_target() {
        let mut ramp = LinearRamp::new(0.0, 0.01, 1000.0);
        let mut inputs = frame(&ramp);
        inputs.set(LinearRamp::IN, 1.0);

        let out: Vec<f64> = (0..12).map(|_| ramp.tick(&inputs)).collect();
        assert_relative_eq!(out[0], 0.1, epsilon = 1e-12);
        assert_eq!(out[9], 1.0);
        assert_eq!(out[11], 1.0);
        assert!(!ramp.is_ramping());
    }

    #[test]
    fn test_linear_ramp_continuity_bound() {
        let sr = 48000.0;
        let time = 0.05;
        let mut ramp = LinearRamp::new(0.0, time, sr);
        let mut inputs = frame(&ramp);
        let targets = [1.0, 0.2, 0.9, 0.0, 0.55, 1.0, 0.3];
        let bound = 1.0 / (time * sr) + 1e-12;

        let mut last = ramp.current();
        for (i, &target) in targets.iter().cycle().take(40).enumerate() {
            inputs.set(LinearRamp::IN, target);
            for _ in 0..(150 + i * 37) {
                let v = ramp.tick(&inputs);
                assert!((v - last).abs() <= bound);
                last = v;
            }
        }
    }

    #[test]
    fn test_linear_ramp_retarget_mid_flight() {
        let mut ramp = LinearRamp::new(0.0, 0.01, 1000.0);
        let mut inputs = frame(&ramp);
        inputs.set(LinearRamp::IN, 1.0);
        for _ in 0..5 {
            ramp.tick(&inputs);
        }
        let mid = ramp.current();
        inputs.set(LinearRamp::IN, 0.0);
        let next = ramp.tick(&inputs);
        assert_relative_eq!(next, mid - mid / 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_automation_player_plays_and_stops() {
        let mut player = AutomationPlayer::new(1000.0);
        let mut inputs = frame(&player);
        player.load(
            &[AutomationPoint::new(1.0, 0.01), AutomationPoint::new(0.0, 0.01)],
            false,
        );

        inputs.set(AutomationPlayer::START, 1.0);
        let out: Vec<f64> = (0..30).map(|_| player.tick(&inputs)).collect();

        assert_relative_eq!(out[4], 0.5, epsilon = 1e-12);
        assert_relative_eq!(out[9], 1.0);
        assert_relative_eq!(out[19], 0.0);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_automation_player_loops_and_restarts() {
        let mut player = AutomationPlayer::new(1000.0);
        let mut inputs = frame(&player);
        player.load(&[AutomationPoint::new(2.0, 0.005)], true);

        inputs.set(AutomationPlayer::START, 1.0);
        for _ in 0..20 {
            player.tick(&inputs);
        }
        assert!(player.is_playing());

        player.stop();
        inputs.set(AutomationPlayer::START, 2.0);
        player.tick(&inputs);
        assert!(player.is_playing());
    }

    #[test]
    fn test_automation_player_truncates() {
        let mut player = AutomationPlayer::new(1000.0);
        let points = vec![AutomationPoint::new(1.0, 0.1); MAX_AUTOMATION_POINTS + 10];
        assert_eq!(player.load(&points, false), MAX_AUTOMATION_POINTS);
    }

    #[test]
    fn test_mixer_sums() {
        let mut mixer = Mixer::new(3);
        let mut inputs = frame(&mixer);
        inputs.set(0, 0.5);
        inputs.set(1, 0.25);
        inputs.set(2, -1.0);
        assert_relative_eq!(mixer.tick(&inputs), -0.25);
        assert_eq!(mixer.port_spec().input_by_name("ch2").map(|p| p.id), Some(2));
    }
}
