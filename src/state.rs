//! Parameter state
//!
//! The flat record of every cached control value. The voice manager owns one
//! as its single source of truth; snapshots of it are what presets persist.

use crate::engines::ENGINE_COUNT;
use crate::error::{ConfigError, ControlError, IndexKind};
use crate::io::SEQUENCER_LANES;
use serde::{Deserialize, Serialize};

pub const VOICE_COUNT: usize = 12;
pub const PAIR_COUNT: usize = 6;
pub const QUAD_COUNT: usize = 3;
pub const DRUM_COUNT: usize = 3;
pub const DELAY_LINES: usize = 2;

/// What modulates a duo's oscillators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModSource {
    #[default]
    Off,
    Lfo,
    VoiceFm,
    Flux,
}

impl ModSource {
    pub const ALL: [ModSource; 4] = [
        ModSource::Off,
        ModSource::Lfo,
        ModSource::VoiceFm,
        ModSource::Flux,
    ];

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// Every control value the voice manager caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamState {
    pub voice_tune: [f64; VOICE_COUNT],
    pub voice_fm_depth: [f64; VOICE_COUNT],
    pub voice_envelope_speed: [f64; VOICE_COUNT],

    pub pair_sharpness: [f64; PAIR_COUNT],
    pub duo_mod_source: [ModSource; PAIR_COUNT],
    /// Engine ordinal per pair; 0 is the dual-oscillator path
    pub pair_engine: [usize; PAIR_COUNT],
    pub pair_harmonics: [f64; PAIR_COUNT],
    pub pair_morph: [f64; PAIR_COUNT],

    pub quad_pitch: [f64; QUAD_COUNT],
    pub quad_hold: [f64; QUAD_COUNT],
    pub quad_volume: [f64; QUAD_COUNT],
    /// Sequencer lane 1..=3 driving pitch CV; 0 for none
    pub quad_pitch_source: [usize; QUAD_COUNT],
    pub quad_trigger_source: [usize; QUAD_COUNT],
    pub quad_envelope_one_shot: [bool; QUAD_COUNT],

    pub fm_structure_cross_quad: bool,
    pub total_feedback: f64,
    pub voice_coupling: f64,
    pub vibrato: f64,
    pub bend: f64,
    pub lfo_rate: f64,

    pub drum_tune: [f64; DRUM_COUNT],
    pub drum_decay: [f64; DRUM_COUNT],
    pub drum_tone: [f64; DRUM_COUNT],
    pub drum_level: [f64; DRUM_COUNT],

    pub delay_time: [f64; DELAY_LINES],
    pub delay_feedback: f64,
    pub delay_mix: f64,
    pub delay_mod_depth: f64,

    pub crossmod_algorithm: f64,
    pub crossmod_timbre: f64,
    pub crossmod_drive_carrier: f64,
    pub crossmod_drive_modulator: f64,
    pub crossmod_level: f64,
}

impl Default for ParamState {
    fn default() -> Self {
        Self {
            voice_tune: [0.5; VOICE_COUNT],
            voice_fm_depth: [0.0; VOICE_COUNT],
            voice_envelope_speed: [0.0; VOICE_COUNT],
            pair_sharpness: [0.0; PAIR_COUNT],
            duo_mod_source: [ModSource::Off; PAIR_COUNT],
            pair_engine: [0; PAIR_COUNT],
            pair_harmonics: [0.5; PAIR_COUNT],
            pair_morph: [0.5; PAIR_COUNT],
            quad_pitch: [0.5; QUAD_COUNT],
            quad_hold: [0.0; QUAD_COUNT],
            quad_volume: [0.7; QUAD_COUNT],
            quad_pitch_source: [0; QUAD_COUNT],
            quad_trigger_source: [0; QUAD_COUNT],
            quad_envelope_one_shot: [false; QUAD_COUNT],
            fm_structure_cross_quad: false,
            total_feedback: 0.0,
            voice_coupling: 0.0,
            vibrato: 0.0,
            bend: 0.0,
            lfo_rate: 0.3,
            drum_tune: [0.5; DRUM_COUNT],
            drum_decay: [0.5; DRUM_COUNT],
            drum_tone: [0.5; DRUM_COUNT],
            drum_level: [0.8; DRUM_COUNT],
            delay_time: [0.15, 0.2],
            delay_feedback: 0.3,
            delay_mix: 0.0,
            delay_mod_depth: 0.0,
            crossmod_algorithm: 0.0,
            crossmod_timbre: 0.5,
            crossmod_drive_carrier: 0.0,
            crossmod_drive_modulator: 0.0,
            crossmod_level: 0.0,
        }
    }
}

impl ParamState {
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let state: Self = serde_json::from_str(json)?;
        state.validate().map_err(ConfigError::Snapshot)?;
        Ok(state)
    }

    /// Check the ordinal fields a setter would reject
    ///
    /// Continuous values are clamped on apply, so only engine and sequencer
    /// lane ordinals can make a snapshot unusable.
    pub fn validate(&self) -> Result<(), ControlError> {
        for &engine in &self.pair_engine {
            ControlError::check(IndexKind::Engine, engine, ENGINE_COUNT + 1)?;
        }
        for &source in self.quad_pitch_source.iter().chain(&self.quad_trigger_source) {
            ControlError::check(IndexKind::Source, source, SEQUENCER_LANES + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_source_ordinals() {
        for source in ModSource::ALL {
            assert_eq!(ModSource::from_ordinal(source.ordinal()), Some(source));
        }
        assert_eq!(ModSource::from_ordinal(4), None);
        assert_eq!(ModSource::VoiceFm.ordinal(), 2);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let state = ParamState::from_json(r#"{ "vibrato": 0.25, "duo_mod_source": ["Lfo", "Off", "VoiceFm", "Off", "Flux", "Off"] }"#)
            .unwrap();
        assert_eq!(state.vibrato, 0.25);
        assert_eq!(state.duo_mod_source[2], ModSource::VoiceFm);
        assert_eq!(state.voice_tune, [0.5; VOICE_COUNT]);
    }

    #[test]
    fn test_snapshot_survives_json() {
        let mut state = ParamState::default();
        state.voice_tune[3] = 0.125;
        state.quad_pitch_source[1] = 2;
        state.fm_structure_cross_quad = true;

        let json = state.to_json().unwrap();
        assert_eq!(ParamState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_validate_accepts_highest_ordinals() {
        let mut state = ParamState::default();
        state.pair_engine = [ENGINE_COUNT; PAIR_COUNT];
        state.quad_pitch_source = [SEQUENCER_LANES; QUAD_COUNT];
        state.quad_trigger_source = [SEQUENCER_LANES; QUAD_COUNT];
        assert_eq!(state.validate(), Ok(()));
    }

    #[test]
    fn test_out_of_range_snapshot_rejected() {
        let err = ParamState::from_json(r#"{ "pair_engine": [0, 0, 9, 0, 0, 0] }"#).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Snapshot(ControlError::OutOfRange {
                kind: IndexKind::Engine,
                index: 9,
                len: ENGINE_COUNT + 1
            })
        );

        let err = ParamState::from_json(r#"{ "quad_trigger_source": [0, 4, 0] }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Snapshot(ControlError::OutOfRange {
                kind: IndexKind::Source,
                index: 4,
                ..
            })
        ));
    }
}
