//! Single-voice wiring
//!
//! A [`DspVoice`] is a fixed sub-graph registered once with the
//! [`AudioEngine`]. Signal flow, in order:
//!
//! ```text
//! frequency ─ × slot multiplier ─ + pitch CV ─ + vibrato ─ + bend ─ + coupling ─ + FM
//!                                                                                 │
//!                      ┌──────────────────────────────────────────────────────────┤
//!                  triangle ·(1-s) + square ·s          alternate engine (note)   │
//!                      └──────── × (1-blend) ──── + ──── × blend ─────────────────┘
//!                                                 │
//!                           × (envelope + hold ramp) × wobble ramp × volume ramp ─ out
//!                                                                                   │
//!                                                                      peak follower
//! ```
//!
//! The follower output is the voice's level for visualization and the
//! coupling signal offered to a partner voice.

use crate::config::EngineConfig;
use crate::engines::SynthEngine;
use crate::error::GraphError;
use crate::graph::{AudioEngine, InputRef, UnitId};
use crate::port::unit_clamp;
use crate::units::{
    Add, Envelope, LinearRamp, Multiply, MultiplyAdd, Oscillator, PassThrough, PeakFollower,
    Waveform,
};

/// FM depth 1.0 deviates the frequency by this many Hz per unit of signal
pub const FM_SCALE_HZ: f64 = 200.0;

/// Limits of the wobble multiplier
pub const WOBBLE_MIN: f64 = 0.7;
pub const WOBBLE_MAX: f64 = 1.3;

/// ADSR times derived from an envelope-speed setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTimes {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

/// Map envelope speed (0 = percussive, 1 = drone) to ADSR with a quadratic ease
pub fn envelope_times(speed: f64) -> EnvelopeTimes {
    let eased = unit_clamp(speed).powi(2);
    EnvelopeTimes {
        attack: 0.005 + eased * (3.0 - 0.005),
        decay: 0.05 + eased * (3.0 - 0.05),
        sustain: 0.8 + eased * 0.2,
        release: 0.1 + eased * (4.0 - 0.1),
    }
}

/// Hold level rescaled by envelope speed: 0.5x at the fast end, 2x at the slow end
pub fn scaled_hold(raw: f64, speed: f64) -> f64 {
    let scale = 0.5 + unit_clamp(speed) * 1.5;
    (unit_clamp(raw) * scale).min(1.0)
}

/// One monophonic voice
pub struct DspVoice {
    index: usize,
    pitch_multiplier: f64,

    frequency: UnitId,
    direct: UnitId,
    vibrato: UnitId,
    bend: UnitId,
    coupling: UnitId,
    fm: UnitId,

    triangle: UnitId,
    square: UnitId,
    sharpness_ramp: UnitId,

    engine: UnitId,
    blend: UnitId,

    gate: UnitId,
    envelope: UnitId,
    hold: UnitId,
    wobble: UnitId,
    volume: UnitId,
    output: UnitId,
    follower: UnitId,

    volume_ramp_secs: f64,
    envelope_speed: f64,
    raw_hold: f64,
    sharpness: f64,
}

impl DspVoice {
    /// Register the voice's units and wire them
    pub fn new(
        graph: &mut AudioEngine,
        index: usize,
        pitch_multiplier: f64,
        config: &EngineConfig,
    ) -> Result<Self, GraphError> {
        let name = |part: &str| format!("voice{}.{}", index, part);

        // Frequency chain
        let frequency = graph.create_pass_through(&name("frequency"));
        let pitch_scaler = graph.create_multiply(&name("pitch_scaler"));
        let direct = graph.create_multiply_add(&name("direct"));
        let vibrato = graph.create_multiply_add(&name("vibrato"));
        let bend = graph.create_multiply_add(&name("bend"));
        let coupling = graph.create_multiply_add(&name("coupling"));
        let fm = graph.create_multiply_add(&name("fm"));

        graph.set(frequency.input(PassThrough::IN), 220.0)?;
        graph.set(pitch_scaler.input(Multiply::A), 0.0)?;
        graph.connect(frequency, pitch_scaler.input(Multiply::A))?;
        graph.set(pitch_scaler.input(Multiply::B), pitch_multiplier)?;

        let mut previous = pitch_scaler;
        for stage in [direct, vibrato, bend, coupling, fm] {
            graph.set(stage.input(MultiplyAdd::A), 0.0)?;
            graph.set(stage.input(MultiplyAdd::B), 0.0)?;
            graph.set(stage.input(MultiplyAdd::C), 0.0)?;
            graph.connect(previous, stage.input(MultiplyAdd::C))?;
            previous = stage;
        }

        // Dual oscillator crossfade
        let triangle = graph.create_oscillator(&name("triangle"), Waveform::Triangle);
        let square = graph.create_oscillator(&name("square"), Waveform::Square);
        let triangle_gain = graph.create_multiply(&name("triangle_gain"));
        let square_gain = graph.create_multiply(&name("square_gain"));
        let osc_mix = graph.create_add(&name("osc_mix"));

        for (osc, gain) in [(triangle, triangle_gain), (square, square_gain)] {
            graph.set(osc.input(Oscillator::FREQUENCY), 0.0)?;
            graph.connect(fm, osc.input(Oscillator::FREQUENCY))?;
            graph.set(gain.input(Multiply::A), 0.0)?;
            graph.connect(osc, gain.input(Multiply::A))?;
            graph.set(gain.input(Multiply::B), 0.0)?;
        }

        // Ramped crossfade: square gets s, triangle gets 1 - s
        let sharpness =
            graph.create_linear_ramp(&name("sharpness"), 0.0, config.sharpness_ramp_secs);
        let triangle_level = graph.create_multiply_add(&name("triangle_level"));
        graph.set(triangle_level.input(MultiplyAdd::A), 0.0)?;
        graph.connect(sharpness, triangle_level.input(MultiplyAdd::A))?;
        graph.set(triangle_level.input(MultiplyAdd::B), -1.0)?;
        graph.set(triangle_level.input(MultiplyAdd::C), 1.0)?;
        graph.connect(triangle_level, triangle_gain.input(Multiply::B))?;
        graph.connect(sharpness, square_gain.input(Multiply::B))?;
        graph.connect(triangle_gain, osc_mix.input(Add::A))?;
        graph.connect(square_gain, osc_mix.input(Add::B))?;

        // Alternate engine blended against the oscillator path
        let engine = graph.create_synth_engine(&name("engine"));
        let blend = graph.create_linear_ramp(&name("blend"), 0.0, config.engine_crossfade_secs);
        let osc_path_gain = graph.create_multiply_add(&name("osc_path_gain"));
        let osc_path = graph.create_multiply(&name("osc_path"));
        let source = graph.create_multiply_add(&name("source"));

        graph.set(osc_path_gain.input(MultiplyAdd::A), 0.0)?;
        graph.connect(blend, osc_path_gain.input(MultiplyAdd::A))?;
        graph.set(osc_path_gain.input(MultiplyAdd::B), -1.0)?;
        graph.set(osc_path_gain.input(MultiplyAdd::C), 1.0)?;

        graph.set(osc_path.input(Multiply::A), 0.0)?;
        graph.set(osc_path.input(Multiply::B), 0.0)?;
        graph.connect(osc_mix, osc_path.input(Multiply::A))?;
        graph.connect(osc_path_gain, osc_path.input(Multiply::B))?;

        graph.set(source.input(MultiplyAdd::B), 0.0)?;
        graph.connect(engine, source.input(MultiplyAdd::A))?;
        graph.connect(blend, source.input(MultiplyAdd::B))?;
        graph.connect(osc_path, source.input(MultiplyAdd::C))?;

        // Gate fans out to the envelope and the engine trigger
        let gate = graph.create_pass_through(&name("gate"));
        let envelope = graph.create_envelope(&name("envelope"));
        graph.connect(gate, envelope.input(Envelope::GATE))?;
        graph.connect(gate, engine.input(SynthEngine::TRIGGER))?;

        // VCA: source × (envelope + hold)
        let hold = graph.create_linear_ramp(&name("hold"), 0.0, config.hold_ramp_secs);
        let env_hold = graph.create_add(&name("env_hold"));
        let vca = graph.create_multiply(&name("vca"));
        graph.connect(envelope, env_hold.input(Add::A))?;
        graph.connect(hold, env_hold.input(Add::B))?;
        graph.set(vca.input(Multiply::A), 0.0)?;
        graph.set(vca.input(Multiply::B), 0.0)?;
        graph.connect(source, vca.input(Multiply::A))?;
        graph.connect(env_hold, vca.input(Multiply::B))?;

        // Wobble then volume
        let wobble = graph.create_linear_ramp(&name("wobble"), 1.0, config.wobble_ramp_secs);
        let wobble_gain = graph.create_multiply(&name("wobble_gain"));
        graph.set(wobble_gain.input(Multiply::A), 0.0)?;
        graph.set(wobble_gain.input(Multiply::B), 0.0)?;
        graph.connect(vca, wobble_gain.input(Multiply::A))?;
        graph.connect(wobble, wobble_gain.input(Multiply::B))?;

        let volume = graph.create_linear_ramp(&name("volume"), 0.0, config.volume_ramp_secs);
        let output = graph.create_multiply(&name("output"));
        graph.set(output.input(Multiply::A), 0.0)?;
        graph.set(output.input(Multiply::B), 0.0)?;
        graph.connect(wobble_gain, output.input(Multiply::A))?;
        graph.connect(volume, output.input(Multiply::B))?;

        let follower = graph.create_peak_follower(&name("follower"));
        graph.connect(output, follower.input(PeakFollower::IN))?;
        graph.set(
            follower.input(PeakFollower::HALF_LIFE),
            config.follower_half_life_secs,
        )?;

        let mut voice = Self {
            index,
            pitch_multiplier,
            frequency,
            direct,
            vibrato,
            bend,
            coupling,
            fm,
            triangle,
            square,
            sharpness_ramp: sharpness,
            engine,
            blend,
            gate,
            envelope,
            hold,
            wobble,
            volume,
            output,
            follower,
            volume_ramp_secs: config.volume_ramp_secs,
            envelope_speed: 0.0,
            raw_hold: 0.0,
            sharpness: 0.0,
        };
        voice.set_sharpness(graph, 0.0)?;
        voice.set_envelope_speed(graph, 0.0)?;
        Ok(voice)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pitch_multiplier(&self) -> f64 {
        self.pitch_multiplier
    }

    /// Base frequency (before the slot multiplier and modulation)
    pub fn frequency_input(&self) -> InputRef {
        self.frequency.input(PassThrough::IN)
    }

    /// Sequencer pitch CV, scaled by [`set_pitch_cv_depth`](Self::set_pitch_cv_depth)
    pub fn pitch_cv_input(&self) -> InputRef {
        self.direct.input(MultiplyAdd::A)
    }

    pub fn vibrato_input(&self) -> InputRef {
        self.vibrato.input(MultiplyAdd::A)
    }

    pub fn bend_input(&self) -> InputRef {
        self.bend.input(MultiplyAdd::A)
    }

    pub fn coupling_input(&self) -> InputRef {
        self.coupling.input(MultiplyAdd::A)
    }

    /// Modulation input driven by the duo's mod source
    pub fn mod_input(&self) -> InputRef {
        self.fm.input(MultiplyAdd::A)
    }

    pub fn gate_input(&self) -> InputRef {
        self.gate.input(PassThrough::IN)
    }

    /// Final output, after the volume stage
    pub fn output(&self) -> UnitId {
        self.output
    }

    /// Envelope follower on the output
    pub fn follower(&self) -> UnitId {
        self.follower
    }

    pub fn envelope(&self) -> UnitId {
        self.envelope
    }

    pub fn engine(&self) -> UnitId {
        self.engine
    }

    /// Oscillator frequency unit; its output is the fully modulated frequency
    pub fn final_frequency(&self) -> UnitId {
        self.fm
    }

    pub fn oscillators(&self) -> (UnitId, UnitId) {
        (self.triangle, self.square)
    }

    pub fn envelope_speed(&self) -> f64 {
        self.envelope_speed
    }

    pub fn raw_hold(&self) -> f64 {
        self.raw_hold
    }

    pub fn sharpness(&self) -> f64 {
        self.sharpness
    }

    pub fn set_frequency(&self, graph: &mut AudioEngine, freq: f64) -> Result<(), GraphError> {
        graph.set(self.frequency_input(), freq)
    }

    pub fn set_pitch_cv_depth(&self, graph: &mut AudioEngine, depth: f64) -> Result<(), GraphError> {
        graph.set(self.direct.input(MultiplyAdd::B), depth)
    }

    pub fn set_vibrato_depth(&self, graph: &mut AudioEngine, depth: f64) -> Result<(), GraphError> {
        graph.set(self.vibrato.input(MultiplyAdd::B), depth)
    }

    /// Bend amount in -1..1; scaled by the bend depth in Hz
    pub fn set_bend(&self, graph: &mut AudioEngine, amount: f64) -> Result<(), GraphError> {
        graph.set(self.bend_input(), amount.clamp(-1.0, 1.0))
    }

    pub fn set_bend_depth(&self, graph: &mut AudioEngine, depth: f64) -> Result<(), GraphError> {
        graph.set(self.bend.input(MultiplyAdd::B), depth)
    }

    pub fn set_coupling_depth(&self, graph: &mut AudioEngine, depth: f64) -> Result<(), GraphError> {
        graph.set(self.coupling.input(MultiplyAdd::B), depth)
    }

    /// FM depth 0..1, scaled to Hz of deviation
    pub fn set_fm_depth(&self, graph: &mut AudioEngine, depth: f64) -> Result<(), GraphError> {
        graph.set(self.fm.input(MultiplyAdd::B), unit_clamp(depth) * FM_SCALE_HZ)
    }

    /// Triangle (0) to square (1) crossfade; doubles as engine timbre
    pub fn set_sharpness(&mut self, graph: &mut AudioEngine, sharpness: f64) -> Result<(), GraphError> {
        let s = unit_clamp(sharpness);
        self.sharpness = s;
        graph.set(self.sharpness_ramp.input(LinearRamp::IN), s)?;
        graph.set(self.engine.input(SynthEngine::TIMBRE), s)
    }

    pub fn set_envelope_speed(&mut self, graph: &mut AudioEngine, speed: f64) -> Result<(), GraphError> {
        self.envelope_speed = unit_clamp(speed);
        let times = envelope_times(self.envelope_speed);
        graph.set(self.envelope.input(Envelope::ATTACK), times.attack)?;
        graph.set(self.envelope.input(Envelope::DECAY), times.decay)?;
        graph.set(self.envelope.input(Envelope::SUSTAIN), times.sustain)?;
        graph.set(self.envelope.input(Envelope::RELEASE), times.release)?;
        self.apply_scaled_hold(graph)
    }

    /// Raw hold level 0..1; written through the hold ramp after scaling
    pub fn set_hold(&mut self, graph: &mut AudioEngine, level: f64) -> Result<(), GraphError> {
        self.raw_hold = unit_clamp(level);
        self.apply_scaled_hold(graph)
    }

    fn apply_scaled_hold(&self, graph: &mut AudioEngine) -> Result<(), GraphError> {
        graph.set(
            self.hold.input(LinearRamp::IN),
            scaled_hold(self.raw_hold, self.envelope_speed),
        )
    }

    pub fn set_wobble(&self, graph: &mut AudioEngine, multiplier: f64) -> Result<(), GraphError> {
        let multiplier = if multiplier.is_nan() {
            1.0
        } else {
            multiplier.clamp(WOBBLE_MIN, WOBBLE_MAX)
        };
        graph.set(self.wobble.input(LinearRamp::IN), multiplier)
    }

    /// Volume 0..1 over the default volume ramp
    pub fn set_volume(&self, graph: &mut AudioEngine, volume: f64) -> Result<(), GraphError> {
        self.fade_volume(graph, volume, self.volume_ramp_secs)
    }

    /// Volume 0..1 over an explicit ramp time
    pub fn fade_volume(
        &self,
        graph: &mut AudioEngine,
        volume: f64,
        duration: f64,
    ) -> Result<(), GraphError> {
        let duration = if duration.is_nan() { 0.0 } else { duration.max(0.0) };
        graph.set(self.volume.input(LinearRamp::TIME), duration)?;
        graph.set(self.volume.input(LinearRamp::IN), unit_clamp(volume))
    }

    pub fn set_gate(&self, graph: &mut AudioEngine, active: bool) -> Result<(), GraphError> {
        graph.set(self.gate_input(), if active { 1.0 } else { 0.0 })
    }

    /// One-shot envelopes release on their own; gated ones wait for gate-off
    pub fn set_one_shot(&self, graph: &mut AudioEngine, one_shot: bool) -> Result<(), GraphError> {
        graph.set(
            self.envelope.input(Envelope::ONE_SHOT),
            if one_shot { 1.0 } else { 0.0 },
        )
    }

    /// Crossfade between the oscillator path (false) and the engine (true)
    pub fn set_engine_active(&self, graph: &mut AudioEngine, active: bool) -> Result<(), GraphError> {
        graph.set(
            self.blend.input(LinearRamp::IN),
            if active { 1.0 } else { 0.0 },
        )
    }

    pub fn set_engine_note(&self, graph: &mut AudioEngine, note: f64) -> Result<(), GraphError> {
        graph.set(self.engine.input(SynthEngine::NOTE), note)
    }

    pub fn set_engine_morph(&self, graph: &mut AudioEngine, morph: f64) -> Result<(), GraphError> {
        graph.set(self.engine.input(SynthEngine::MORPH), unit_clamp(morph))
    }

    pub fn set_engine_harmonics(&self, graph: &mut AudioEngine, harmonics: f64) -> Result<(), GraphError> {
        graph.set(self.engine.input(SynthEngine::HARMONICS), unit_clamp(harmonics))
    }

    /// Follower output clamped to 0..1
    pub fn level(&self, graph: &AudioEngine) -> Result<f64, GraphError> {
        Ok(unit_clamp(graph.output_value(self.follower)?))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{EnvelopeStage, SUSTAIN_SLEW_TIME};
    use approx::assert_relative_eq;

    fn voice() -> (AudioEngine, DspVoice) {
        let config = EngineConfig::with_sample_rate(1000.0);
        let mut graph = AudioEngine::new(config.sample_rate);
        let voice = DspVoice::new(&mut graph, 0, 1.0, &config).unwrap();
        (graph, voice)
    }

    #[test]
    fn test_envelope_times_endpoints() {
        let fast = envelope_times(0.0);
        assert_relative_eq!(fast.attack, 0.005);
        assert_relative_eq!(fast.decay, 0.05);
        assert_relative_eq!(fast.sustain, 0.8);
        assert_relative_eq!(fast.release, 0.1);

        let slow = envelope_times(1.0);
        assert_relative_eq!(slow.attack, 3.0);
        assert_relative_eq!(slow.decay, 3.0);
        assert_relative_eq!(slow.sustain, 1.0);
        assert_relative_eq!(slow.release, 4.0);
    }

    #[test]
    fn test_envelope_times_monotonic() {
        let mut last = envelope_times(0.0);
        for i in 1..=100 {
            let t = envelope_times(i as f64 / 100.0);
            assert!(t.attack >= last.attack);
            assert!(t.decay >= last.decay);
            assert!(t.sustain >= last.sustain);
            assert!(t.release >= last.release);
            last = t;
        }
    }

    #[test]
    fn test_scaled_hold() {
        assert_relative_eq!(scaled_hold(1.0, 0.0), 0.5);
        assert_relative_eq!(scaled_hold(1.0, 1.0), 1.0);
        assert_relative_eq!(scaled_hold(0.5, 1.0), 1.0);
        for i in 0..=10 {
            for j in 0..=10 {
                let h = scaled_hold(i as f64 / 10.0, j as f64 / 10.0);
                assert!((0.0..=1.0).contains(&h));
            }
        }
    }

    #[test]
    fn test_frequency_chain_order() {
        let (mut graph, voice) = voice();
        voice.set_frequency(&mut graph, 200.0).unwrap();
        voice.set_bend_depth(&mut graph, 10.0).unwrap();
        voice.set_bend(&mut graph, 1.0).unwrap();
        graph.set(voice.coupling_input(), 0.5).unwrap();
        voice.set_coupling_depth(&mut graph, 4.0).unwrap();

        graph.tick();
        assert_relative_eq!(graph.output_value(voice.final_frequency()).unwrap(), 212.0);
    }

    #[test]
    fn test_fm_scaling() {
        let (mut graph, voice) = voice();
        voice.set_frequency(&mut graph, 100.0).unwrap();
        voice.set_fm_depth(&mut graph, 0.5).unwrap();
        graph.set(voice.mod_input(), -1.0).unwrap();

        graph.tick();
        assert_relative_eq!(graph.output_value(voice.final_frequency()).unwrap(), 0.0);
    }

    #[test]
    fn test_pitch_multiplier_scales_frequency() {
        let config = EngineConfig::with_sample_rate(1000.0);
        let mut graph = AudioEngine::new(config.sample_rate);
        let voice = DspVoice::new(&mut graph, 0, 0.5, &config).unwrap();
        voice.set_frequency(&mut graph, 220.0).unwrap();

        graph.tick();
        assert_relative_eq!(graph.output_value(voice.final_frequency()).unwrap(), 110.0);
        assert_eq!(graph.input_value(voice.frequency_input()).unwrap(), 220.0);
    }

    #[test]
    fn test_gate_drives_envelope() {
        let (mut graph, voice) = voice();
        voice.set_gate(&mut graph, true).unwrap();
        for _ in 0..3 {
            graph.tick();
        }
        let stage = graph.unit::<Envelope>(voice.envelope()).unwrap().stage();
        assert_eq!(stage, EnvelopeStage::Attack);
    }

    #[test]
    fn test_silent_without_gate_or_volume() {
        let (mut graph, voice) = voice();
        voice.set_gate(&mut graph, true).unwrap();
        for _ in 0..200 {
            graph.tick();
            assert_eq!(graph.output_value(voice.output()).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_voice_produces_sound() {
        let (mut graph, voice) = voice();
        voice.set_volume(&mut graph, 1.0).unwrap();
        voice.set_gate(&mut graph, true).unwrap();

        let mut peak: f64 = 0.0;
        for _ in 0..500 {
            graph.tick();
            peak = peak.max(graph.output_value(voice.output()).unwrap().abs());
        }
        assert!(peak > 0.5);
        assert!(voice.level(&graph).unwrap() > 0.0);
    }

    #[test]
    fn test_hold_sustains_without_gate() {
        let (mut graph, mut voice) = voice();
        voice.set_volume(&mut graph, 1.0).unwrap();
        voice.set_envelope_speed(&mut graph, 1.0).unwrap();
        voice.set_hold(&mut graph, 0.5).unwrap();

        let mut peak: f64 = 0.0;
        for _ in 0..500 {
            graph.tick();
            peak = peak.max(graph.output_value(voice.output()).unwrap().abs());
        }
        assert!(peak > 0.9);
    }

    #[test]
    fn test_wobble_clamped() {
        let (mut graph, voice) = voice();
        voice.set_wobble(&mut graph, 5.0).unwrap();
        for _ in 0..100 {
            graph.tick();
        }
        let wobble = graph.unit::<LinearRamp>(voice.wobble).unwrap().current();
        assert_relative_eq!(wobble, WOBBLE_MAX);
    }

    #[test]
    fn test_fade_volume_overrides_ramp_time() {
        let (mut graph, voice) = voice();
        voice.fade_volume(&mut graph, 1.0, 0.1).unwrap();
        for _ in 0..50 {
            graph.tick();
        }
        let volume = graph.unit::<LinearRamp>(voice.volume).unwrap().current();
        assert_relative_eq!(volume, 0.5, epsilon = 1e-9);

        voice.set_volume(&mut graph, 0.0).unwrap();
        assert_eq!(
            graph.input_value(voice.volume.input(LinearRamp::TIME)).unwrap(),
            0.05
        );
    }

    #[test]
    fn test_volume_ramp_is_continuous() {
        let (mut graph, voice) = voice();
        let bound = 1.0 / (0.05 * 1000.0) + 1e-12;
        let targets = [1.0, 0.0, 0.7, 0.3, 1.0];
        let mut last = 0.0;
        for target in targets {
            voice.set_volume(&mut graph, target).unwrap();
            for _ in 0..30 {
                graph.tick();
                let v = graph.unit::<LinearRamp>(voice.volume).unwrap().current();
                assert!((v - last).abs() <= bound);
                last = v;
            }
        }
    }

    #[test]
    fn test_envelope_speed_change_while_held_is_slewed() {
        let (mut graph, mut voice) = voice();
        voice.set_envelope_speed(&mut graph, 0.0).unwrap();
        voice.set_gate(&mut graph, true).unwrap();
        for _ in 0..200 {
            graph.tick();
        }
        let envelope = voice.envelope();
        let held = graph.unit::<Envelope>(envelope).unwrap();
        assert_eq!(held.stage(), EnvelopeStage::Sustain);
        assert_relative_eq!(held.level(), 0.8, epsilon = 1e-9);

        let bound = 1.0 / (SUSTAIN_SLEW_TIME * 1000.0) + 1e-12;
        let mut last = held.level();
        for speed in [1.0, 0.0, 1.0] {
            voice.set_envelope_speed(&mut graph, speed).unwrap();
            for _ in 0..30 {
                graph.tick();
                let level = graph.unit::<Envelope>(envelope).unwrap().level();
                assert!((level - last).abs() <= bound);
                last = level;
            }
            let target = envelope_times(speed).sustain;
            assert_relative_eq!(last, target, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sharpness_crossfade_is_ramped() {
        let (mut graph, mut voice) = voice();
        voice.set_sharpness(&mut graph, 1.0).unwrap();
        let bound = 1.0 / (0.01 * 1000.0) + 1e-12;
        let mut last = 0.0;
        for _ in 0..5 {
            graph.tick();
            let s = graph.unit::<LinearRamp>(voice.sharpness_ramp).unwrap().current();
            assert!((s - last).abs() <= bound);
            last = s;
        }
        assert_relative_eq!(last, 0.5, epsilon = 1e-9);
        assert_eq!(voice.sharpness(), 1.0);

        for _ in 0..10 {
            graph.tick();
        }
        let s = graph.unit::<LinearRamp>(voice.sharpness_ramp).unwrap().current();
        assert_eq!(s, 1.0);
    }

    #[test]
    fn test_engine_blend_switches_source() {
        let (mut graph, voice) = voice();
        graph
            .unit_mut::<SynthEngine>(voice.engine())
            .unwrap()
            .set_kind(Some(crate::engines::EngineKind::Fm));
        voice.set_engine_active(&mut graph, true).unwrap();
        for _ in 0..20 {
            graph.tick();
        }
        let blend = graph.unit::<LinearRamp>(voice.blend).unwrap().current();
        assert_eq!(blend, 1.0);
    }
}
