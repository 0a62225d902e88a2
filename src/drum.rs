//! Drum Voices
//!
//! Small synthesized percussion: a pitch-swept kick, a noisy snare and a
//! high-passed hi-hat. Each shares the same percussive envelope: a 1 ms
//! linear attack and an exponential decay reaching -60 dB after `decay`.

use crate::port::{unit_clamp, AudioUnit, PortSpec, PortValues, SignalKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

const ATTACK_TIME: f64 = 0.001;

/// ln(1000), the number of time constants to fall 60 dB
const DECAY_TAUS: f64 = 6.9;

/// Drum model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrumKind {
    Kick,
    Snare,
    HiHat,
}

impl DrumKind {
    /// Decay time range (seconds) mapped from the 0..1 decay control
    fn decay_range(self) -> (f64, f64) {
        match self {
            DrumKind::Kick => (0.1, 1.6),
            DrumKind::Snare => (0.05, 0.55),
            DrumKind::HiHat => (0.02, 0.42),
        }
    }
}

/// Triggered percussion voice
///
/// Fires whenever `trigger` changes to a new positive value, so a control
/// surface can retrigger by writing an incrementing counter.
pub struct DrumVoice {
    kind: DrumKind,
    level: f64,
    in_attack: bool,
    pitch_env: f64,
    phase: f64,
    noise_lp: f64,
    last_trigger: f64,
    rng: StdRng,
    sample_rate: f64,
    spec: PortSpec,
}

impl DrumVoice {
    pub const TRIGGER: usize = 0;
    pub const TUNE: usize = 1;
    pub const DECAY: usize = 2;
    pub const TONE: usize = 3;
    pub const LEVEL: usize = 4;

    pub fn new(kind: DrumKind, sample_rate: f64) -> Self {
        Self {
            kind,
            level: 0.0,
            in_attack: false,
            pitch_env: 0.0,
            phase: 0.0,
            noise_lp: 0.0,
            last_trigger: 0.0,
            rng: StdRng::seed_from_u64(kind as u64 + 1),
            sample_rate,
            spec: PortSpec::new(SignalKind::Audio)
                .input("trigger", SignalKind::Gate, 0.0)
                .input("tune", SignalKind::Control, 0.5)
                .input("decay", SignalKind::Control, 0.5)
                .input("tone", SignalKind::Control, 0.5)
                .input("level", SignalKind::Control, 0.8),
        }
    }

    pub fn kind(&self) -> DrumKind {
        self.kind
    }

    /// Current amplitude envelope level
    pub fn envelope(&self) -> f64 {
        self.level
    }

    fn advance_envelope(&mut self, decay: f64) {
        if self.in_attack {
            self.level += 1.0 / (ATTACK_TIME * self.sample_rate);
            if self.level >= 1.0 {
                self.level = 1.0;
                self.in_attack = false;
            }
        } else if self.level > 0.00001 {
            let tau = decay / DECAY_TAUS;
            self.level *= libm::exp(-1.0 / (tau * self.sample_rate));
        } else {
            self.level = 0.0;
        }
    }

    fn oscillator(&mut self, tune: f64, tone: f64) -> f64 {
        let white: f64 = self.rng.gen_range(-1.0..1.0);
        match self.kind {
            DrumKind::Kick => {
                self.pitch_env *= libm::exp(-1.0 / (0.03 * (1.0 + tone) * self.sample_rate));
                let base = 40.0 + tune * 80.0;
                let freq = base * (1.0 + 3.0 * self.pitch_env);
                self.phase = (self.phase + freq / self.sample_rate).fract();
                (self.phase * TAU).sin()
            }
            DrumKind::Snare => {
                let freq = 150.0 + tune * 150.0;
                self.phase = (self.phase + freq / self.sample_rate).fract();
                let body = (self.phase * TAU).sin();
                body + (white - body) * (0.3 + tone * 0.7)
            }
            DrumKind::HiHat => {
                let cutoff = 4000.0 + tone * 8000.0;
                let cutoff = cutoff.min(self.sample_rate * 0.45);
                let coefficient = 1.0 - libm::exp(-TAU * cutoff / self.sample_rate);
                self.noise_lp += (white - self.noise_lp) * coefficient;
                // High-pass: what the low-pass removed
                white - self.noise_lp
            }
        }
    }
}

impl AudioUnit for DrumVoice {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let trigger = inputs.get(Self::TRIGGER);
        if trigger > 0.0 && trigger != self.last_trigger {
            self.in_attack = true;
            self.pitch_env = 1.0;
            if self.kind != DrumKind::HiHat {
                self.phase = 0.0;
            }
        }
        self.last_trigger = trigger;

        let tune = unit_clamp(inputs.get(Self::TUNE));
        let tone = unit_clamp(inputs.get(Self::TONE));
        let (min_decay, max_decay) = self.kind.decay_range();
        let decay = min_decay + unit_clamp(inputs.get(Self::DECAY)) * (max_decay - min_decay);

        self.advance_envelope(decay);
        let osc = self.oscillator(tune, tone);
        osc * self.level * unit_clamp(inputs.get(Self::LEVEL))
    }

    fn reset(&mut self) {
        self.level = 0.0;
        self.in_attack = false;
        self.pitch_env = 0.0;
        self.phase = 0.0;
        self.noise_lp = 0.0;
        self.last_trigger = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn type_id(&self) -> &'static str {
        "drum_voice"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_until_triggered() {
        let mut drum = DrumVoice::new(DrumKind::Kick, 48000.0);
        let inputs = PortValues::from_spec(drum.port_spec());
        for _ in 0..256 {
            assert_eq!(drum.tick(&inputs), 0.0);
        }
    }

    #[test]
    fn test_trigger_attack_then_decay() {
        let mut drum = DrumVoice::new(DrumKind::Snare, 48000.0);
        let mut inputs = PortValues::from_spec(drum.port_spec());
        inputs.set(DrumVoice::TRIGGER, 1.0);

        for _ in 0..48 {
            drum.tick(&inputs);
        }
        assert!(drum.envelope() > 0.99);

        // Holding the same value does not retrigger
        for _ in 0..48000 {
            drum.tick(&inputs);
        }
        assert!(drum.envelope() < 0.001);
    }

    #[test]
    fn test_counter_retriggers() {
        let mut drum = DrumVoice::new(DrumKind::HiHat, 48000.0);
        let mut inputs = PortValues::from_spec(drum.port_spec());
        inputs.set(DrumVoice::TRIGGER, 1.0);
        for _ in 0..48000 {
            drum.tick(&inputs);
        }
        assert_eq!(drum.envelope(), 0.0);

        inputs.set(DrumVoice::TRIGGER, 2.0);
        drum.tick(&inputs);
        assert!(drum.envelope() > 0.0);
    }

    #[test]
    fn test_all_kinds_bounded() {
        for kind in [DrumKind::Kick, DrumKind::Snare, DrumKind::HiHat] {
            let mut drum = DrumVoice::new(kind, 48000.0);
            let mut inputs = PortValues::from_spec(drum.port_spec());
            inputs.set(DrumVoice::TRIGGER, 1.0);
            inputs.set(DrumVoice::LEVEL, 1.0);
            for _ in 0..4800 {
                let v = drum.tick(&inputs);
                assert!(v.is_finite() && v.abs() <= 2.0);
            }
        }
    }
}
