//! Alternate Synthesis Engines
//!
//! A pair of voices can swap its dual-oscillator source for one of several
//! macro-oscillator engines. Every engine is driven by the same four
//! controls: note, timbre, morph and harmonics.

use crate::analog::saturation;
use crate::port::{clamp_or_min, unit_clamp, AudioUnit, PortSpec, PortValues, SignalKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Number of selectable engines; ordinals run 1..=ENGINE_COUNT
pub const ENGINE_COUNT: usize = 4;

/// Engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Detuned saw pair morphing into a variable-width pulse
    VirtualAnalog,
    /// Folded triangle with asymmetric saturation
    Waveshaping,
    /// Two-operator FM with feedback
    Fm,
    /// Filtered noise
    Noise,
}

impl EngineKind {
    pub const ALL: [EngineKind; ENGINE_COUNT] = [
        EngineKind::VirtualAnalog,
        EngineKind::Waveshaping,
        EngineKind::Fm,
        EngineKind::Noise,
    ];

    /// Look up an engine by 1-based ordinal; 0 means "no engine"
    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        ordinal
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }

    pub fn ordinal(self) -> usize {
        match self {
            EngineKind::VirtualAnalog => 1,
            EngineKind::Waveshaping => 2,
            EngineKind::Fm => 3,
            EngineKind::Noise => 4,
        }
    }
}

/// MIDI note for a frequency, as pushed to an engine's note input
pub fn note_for_frequency(freq: f64) -> f64 {
    69.0 + 12.0 * libm::log2(freq / 440.0)
}

pub fn frequency_for_note(note: f64) -> f64 {
    440.0 * libm::pow(2.0, (note - 69.0) / 12.0)
}

/// Macro oscillator with switchable engine
///
/// Outputs silence while no engine is selected.
pub struct SynthEngine {
    kind: Option<EngineKind>,
    phase: f64,
    phase_b: f64,
    mod_phase: f64,
    feedback: f64,
    lowpass: f64,
    rng: StdRng,
    last_trigger: bool,
    sample_rate: f64,
    spec: PortSpec,
}

impl SynthEngine {
    pub const NOTE: usize = 0;
    pub const TIMBRE: usize = 1;
    pub const MORPH: usize = 2;
    pub const HARMONICS: usize = 3;
    pub const TRIGGER: usize = 4;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            kind: None,
            phase: 0.0,
            phase_b: 0.0,
            mod_phase: 0.0,
            feedback: 0.0,
            lowpass: 0.0,
            rng: StdRng::seed_from_u64(0x5eed),
            last_trigger: false,
            sample_rate,
            spec: PortSpec::new(SignalKind::Audio)
                .input("note", SignalKind::Control, 60.0)
                .input("timbre", SignalKind::Control, 0.5)
                .input("morph", SignalKind::Control, 0.5)
                .input("harmonics", SignalKind::Control, 0.5)
                .input("trigger", SignalKind::Gate, 0.0),
        }
    }

    pub fn kind(&self) -> Option<EngineKind> {
        self.kind
    }

    pub fn set_kind(&mut self, kind: Option<EngineKind>) {
        if kind != self.kind {
            self.kind = kind;
            self.reset_phases();
        }
    }

    fn reset_phases(&mut self) {
        self.phase = 0.0;
        self.phase_b = 0.0;
        self.mod_phase = 0.0;
        self.feedback = 0.0;
    }

    fn virtual_analog(&mut self, inc: f64, timbre: f64, morph: f64, harmonics: f64) -> f64 {
        // Up to half a semitone of detune on the second saw
        let detune = libm::pow(2.0, harmonics * 0.5 / 12.0);
        self.phase_b = (self.phase_b + inc * detune).fract();

        let saws = (2.0 * self.phase - 1.0 + 2.0 * self.phase_b - 1.0) * 0.5;
        let width = 0.5 + 0.45 * (timbre - 0.5) * 2.0;
        let pulse = if self.phase < width { 1.0 } else { -1.0 };
        saws + (pulse - saws) * morph
    }

    fn waveshaping(&mut self, timbre: f64, morph: f64, harmonics: f64) -> f64 {
        let triangle = 1.0 - 4.0 * (self.phase - 0.5).abs();
        let folded = saturation::fold(triangle * (1.0 + timbre * 4.0), 1.0);
        let bias = (morph - 0.5) * 0.8;
        let shaped = saturation::tanh_sat(folded + bias, 1.0 + harmonics * 3.0);
        shaped - saturation::tanh_sat(bias, 1.0 + harmonics * 3.0)
    }

    fn fm(&mut self, inc: f64, timbre: f64, morph: f64, harmonics: f64) -> f64 {
        // Ratios quantized to half steps: 0.5, 1.0 .. 4.5
        let ratio = 0.5 + (harmonics * 8.0).floor() * 0.5;
        self.mod_phase = (self.mod_phase + inc * ratio).fract();

        let modulator = (self.mod_phase * TAU + self.feedback * morph * 2.0).sin();
        self.feedback = modulator;
        (self.phase * TAU + modulator * timbre * 4.0).sin()
    }

    fn noise(&mut self, freq: f64, timbre: f64, morph: f64) -> f64 {
        let white: f64 = self.rng.gen_range(-1.0..1.0);
        let cutoff = (freq * (1.0 + timbre * 15.0)).min(self.sample_rate * 0.45);
        let coefficient = 1.0 - libm::exp(-TAU * cutoff / self.sample_rate);
        self.lowpass += (white - self.lowpass) * coefficient;
        self.lowpass + (white - self.lowpass) * morph
    }
}

impl AudioUnit for SynthEngine {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let kind = match self.kind {
            Some(kind) => kind,
            None => return 0.0,
        };

        let note = clamp_or_min(inputs.get(Self::NOTE), 0.0, 135.0);
        let timbre = unit_clamp(inputs.get(Self::TIMBRE));
        let morph = unit_clamp(inputs.get(Self::MORPH));
        let harmonics = unit_clamp(inputs.get(Self::HARMONICS));
        let trigger = SignalKind::Gate.is_high(inputs.get(Self::TRIGGER));

        if trigger && !self.last_trigger && kind != EngineKind::Noise {
            self.reset_phases();
        }
        self.last_trigger = trigger;

        let freq = frequency_for_note(note).min(self.sample_rate * 0.5);
        let inc = freq / self.sample_rate;

        let out = match kind {
            EngineKind::VirtualAnalog => self.virtual_analog(inc, timbre, morph, harmonics),
            EngineKind::Waveshaping => self.waveshaping(timbre, morph, harmonics),
            EngineKind::Fm => self.fm(inc, timbre, morph, harmonics),
            EngineKind::Noise => self.noise(freq, timbre, morph),
        };

        self.phase = (self.phase + inc).fract();
        out
    }

    fn reset(&mut self) {
        self.reset_phases();
        self.lowpass = 0.0;
        self.last_trigger = false;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "synth_engine"
    }
}
