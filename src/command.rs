//! Control/audio thread split
//!
//! [`SynthHandle`] lives on the control thread: it validates each
//! [`Command`], mirrors it into its own [`ParamState`] and pushes it onto a
//! bounded lock-free ring. [`Synth`] lives on the audio thread: it drains the
//! ring at each block boundary, renders, then publishes [`Meters`]. All
//! logging happens on the control side.

use crate::config::EngineConfig;
use crate::engines::ENGINE_COUNT;
use crate::error::{ConfigError, ControlError, IndexKind};
use crate::io::{AtomicF64, SequencerSources, SEQUENCER_LANES};
use crate::manager::DspVoiceManager;
use crate::port::unit_clamp;
use crate::state::{
    ModSource, ParamState, DELAY_LINES, DRUM_COUNT, PAIR_COUNT, QUAD_COUNT, VOICE_COUNT,
};
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One control-surface call, sent from the control thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    VoiceTune { voice: usize, value: f64 },
    VoiceFmDepth { voice: usize, value: f64 },
    VoiceEnvelopeSpeed { voice: usize, value: f64 },
    VoiceGate { voice: usize, active: bool },
    VoiceWobble { voice: usize, multiplier: f64 },

    PairSharpness { pair: usize, value: f64 },
    PairHarmonics { pair: usize, value: f64 },
    PairMorph { pair: usize, value: f64 },
    PairEngine { pair: usize, engine: usize },
    DuoModSource { duo: usize, source: ModSource },
    FmStructure { cross_quad: bool },

    QuadPitch { quad: usize, value: f64 },
    QuadHold { quad: usize, value: f64 },
    QuadVolume { quad: usize, value: f64 },
    FadeQuadVolume { quad: usize, value: f64, duration: f64 },
    QuadGate { quad: usize, active: bool },
    QuadPitchSource { quad: usize, source: usize },
    QuadTriggerSource { quad: usize, source: usize },
    QuadEnvelopeOneShot { quad: usize, one_shot: bool },

    TotalFeedback(f64),
    VoiceCoupling(f64),
    Vibrato(f64),
    Bend(f64),
    LfoRate(f64),
    StartAutomation,
    StopAutomation,

    TriggerDrum { drum: usize },
    DrumTune { drum: usize, value: f64 },
    DrumDecay { drum: usize, value: f64 },
    DrumTone { drum: usize, value: f64 },
    DrumLevel { drum: usize, value: f64 },

    DelayTime { line: usize, value: f64 },
    DelayFeedback(f64),
    DelayMix(f64),
    DelayModDepth(f64),

    CrossmodAlgorithm(f64),
    CrossmodTimbre(f64),
    CrossmodDriveCarrier(f64),
    CrossmodDriveModulator(f64),
    CrossmodLevel(f64),
}

impl Command {
    /// Check every index the command carries
    pub fn validate(&self) -> Result<(), ControlError> {
        use Command::*;
        let check = ControlError::check;
        match *self {
            VoiceTune { voice, .. }
            | VoiceFmDepth { voice, .. }
            | VoiceEnvelopeSpeed { voice, .. }
            | VoiceGate { voice, .. }
            | VoiceWobble { voice, .. } => check(IndexKind::Voice, voice, VOICE_COUNT)?,

            PairSharpness { pair, .. } | PairHarmonics { pair, .. } | PairMorph { pair, .. } => {
                check(IndexKind::Pair, pair, PAIR_COUNT)?
            }
            PairEngine { pair, engine } => {
                check(IndexKind::Pair, pair, PAIR_COUNT)?;
                check(IndexKind::Engine, engine, ENGINE_COUNT + 1)?
            }
            DuoModSource { duo, .. } => check(IndexKind::Pair, duo, PAIR_COUNT)?,

            QuadPitch { quad, .. }
            | QuadHold { quad, .. }
            | QuadVolume { quad, .. }
            | FadeQuadVolume { quad, .. }
            | QuadGate { quad, .. }
            | QuadEnvelopeOneShot { quad, .. } => check(IndexKind::Quad, quad, QUAD_COUNT)?,
            QuadPitchSource { quad, source } | QuadTriggerSource { quad, source } => {
                check(IndexKind::Quad, quad, QUAD_COUNT)?;
                check(IndexKind::Source, source, SEQUENCER_LANES + 1)?
            }

            TriggerDrum { drum }
            | DrumTune { drum, .. }
            | DrumDecay { drum, .. }
            | DrumTone { drum, .. }
            | DrumLevel { drum, .. } => check(IndexKind::Drum, drum, DRUM_COUNT)?,

            DelayTime { line, .. } => check(IndexKind::DelayLine, line, DELAY_LINES)?,

            _ => 0,
        };
        Ok(())
    }

    /// Execute against the manager
    pub fn apply(self, manager: &mut DspVoiceManager) -> Result<(), ControlError> {
        use Command::*;
        match self {
            VoiceTune { voice, value } => manager.set_voice_tune(voice, value),
            VoiceFmDepth { voice, value } => manager.set_voice_fm_depth(voice, value),
            VoiceEnvelopeSpeed { voice, value } => manager.set_voice_envelope_speed(voice, value),
            VoiceGate { voice, active } => manager.set_voice_gate(voice, active),
            VoiceWobble { voice, multiplier } => manager.set_voice_wobble(voice, multiplier),

            PairSharpness { pair, value } => manager.set_pair_sharpness(pair, value),
            PairHarmonics { pair, value } => manager.set_pair_harmonics(pair, value),
            PairMorph { pair, value } => manager.set_pair_morph(pair, value),
            PairEngine { pair, engine } => manager.set_pair_engine(pair, engine),
            DuoModSource { duo, source } => manager.set_duo_mod_source(duo, source),
            FmStructure { cross_quad } => manager.set_fm_structure(cross_quad),

            QuadPitch { quad, value } => manager.set_quad_pitch(quad, value),
            QuadHold { quad, value } => manager.set_quad_hold(quad, value),
            QuadVolume { quad, value } => manager.set_quad_volume(quad, value),
            FadeQuadVolume {
                quad,
                value,
                duration,
            } => manager.fade_quad_volume(quad, value, duration),
            QuadGate { quad, active } => manager.set_quad_gate(quad, active),
            QuadPitchSource { quad, source } => manager.set_quad_pitch_source(quad, source),
            QuadTriggerSource { quad, source } => manager.set_quad_trigger_source(quad, source),
            QuadEnvelopeOneShot { quad, one_shot } => {
                manager.set_quad_envelope_one_shot(quad, one_shot)
            }

            TotalFeedback(v) => manager.set_total_feedback(v),
            VoiceCoupling(v) => manager.set_voice_coupling(v),
            Vibrato(v) => manager.set_vibrato(v),
            Bend(v) => manager.set_bend(v),
            LfoRate(v) => manager.set_lfo_rate(v),
            StartAutomation => manager.start_automation(),
            StopAutomation => manager.stop_automation(),

            TriggerDrum { drum } => manager.trigger_drum(drum),
            DrumTune { drum, value } => manager.set_drum_tune(drum, value),
            DrumDecay { drum, value } => manager.set_drum_decay(drum, value),
            DrumTone { drum, value } => manager.set_drum_tone(drum, value),
            DrumLevel { drum, value } => manager.set_drum_level(drum, value),

            DelayTime { line, value } => manager.set_delay_time(line, value),
            DelayFeedback(v) => manager.set_delay_feedback(v),
            DelayMix(v) => manager.set_delay_mix(v),
            DelayModDepth(v) => manager.set_delay_mod_depth(v),

            CrossmodAlgorithm(v) => manager.set_crossmod_algorithm(v),
            CrossmodTimbre(v) => manager.set_crossmod_timbre(v),
            CrossmodDriveCarrier(v) => manager.set_crossmod_drive_carrier(v),
            CrossmodDriveModulator(v) => manager.set_crossmod_drive_modulator(v),
            CrossmodLevel(v) => manager.set_crossmod_level(v),
        }
    }

    /// Whether applying the command rewires the graph
    pub fn rewires_graph(&self) -> bool {
        matches!(
            self,
            Command::PairEngine { .. }
                | Command::DuoModSource { .. }
                | Command::FmStructure { .. }
                | Command::QuadPitchSource { .. }
                | Command::QuadTriggerSource { .. }
        )
    }

    /// Mirror the command's effect on cached values
    ///
    /// Gates, triggers and transport commands carry no cached state.
    /// Indices must already be validated.
    pub fn record(&self, state: &mut ParamState) {
        use Command::*;
        match *self {
            VoiceTune { voice, value } => state.voice_tune[voice] = unit_clamp(value),
            VoiceFmDepth { voice, value } => state.voice_fm_depth[voice] = unit_clamp(value),
            VoiceEnvelopeSpeed { voice, value } => {
                state.voice_envelope_speed[voice] = unit_clamp(value)
            }
            PairSharpness { pair, value } => state.pair_sharpness[pair] = unit_clamp(value),
            PairHarmonics { pair, value } => state.pair_harmonics[pair] = unit_clamp(value),
            PairMorph { pair, value } => state.pair_morph[pair] = unit_clamp(value),
            PairEngine { pair, engine } => state.pair_engine[pair] = engine,
            DuoModSource { duo, source } => state.duo_mod_source[duo] = source,
            FmStructure { cross_quad } => state.fm_structure_cross_quad = cross_quad,
            QuadPitch { quad, value } => state.quad_pitch[quad] = unit_clamp(value),
            QuadHold { quad, value } => state.quad_hold[quad] = unit_clamp(value),
            QuadVolume { quad, value } | FadeQuadVolume { quad, value, .. } => {
                state.quad_volume[quad] = unit_clamp(value)
            }
            QuadPitchSource { quad, source } => state.quad_pitch_source[quad] = source,
            QuadTriggerSource { quad, source } => state.quad_trigger_source[quad] = source,
            QuadEnvelopeOneShot { quad, one_shot } => {
                state.quad_envelope_one_shot[quad] = one_shot
            }
            TotalFeedback(v) => state.total_feedback = unit_clamp(v),
            VoiceCoupling(v) => state.voice_coupling = unit_clamp(v),
            Vibrato(v) => state.vibrato = unit_clamp(v),
            Bend(v) => state.bend = if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) },
            LfoRate(v) => state.lfo_rate = unit_clamp(v),
            DrumTune { drum, value } => state.drum_tune[drum] = unit_clamp(value),
            DrumDecay { drum, value } => state.drum_decay[drum] = unit_clamp(value),
            DrumTone { drum, value } => state.drum_tone[drum] = unit_clamp(value),
            DrumLevel { drum, value } => state.drum_level[drum] = unit_clamp(value),
            DelayTime { line, value } => state.delay_time[line] = unit_clamp(value),
            DelayFeedback(v) => state.delay_feedback = unit_clamp(v),
            DelayMix(v) => state.delay_mix = unit_clamp(v),
            DelayModDepth(v) => state.delay_mod_depth = unit_clamp(v),
            CrossmodAlgorithm(v) => state.crossmod_algorithm = unit_clamp(v),
            CrossmodTimbre(v) => state.crossmod_timbre = unit_clamp(v),
            CrossmodDriveCarrier(v) => state.crossmod_drive_carrier = unit_clamp(v),
            CrossmodDriveModulator(v) => state.crossmod_drive_modulator = unit_clamp(v),
            CrossmodLevel(v) => state.crossmod_level = unit_clamp(v),
            VoiceGate { .. }
            | VoiceWobble { .. }
            | QuadGate { .. }
            | StartAutomation
            | StopAutomation
            | TriggerDrum { .. } => {}
        }
    }
}

/// Values published by the audio thread after each block
#[derive(Debug)]
pub struct Meters {
    levels: [AtomicF64; VOICE_COUNT],
    dropped: AtomicU64,
    blocks: AtomicU64,
}

impl Default for Meters {
    fn default() -> Self {
        Self {
            levels: std::array::from_fn(|_| AtomicF64::new(0.0)),
            dropped: AtomicU64::new(0),
            blocks: AtomicU64::new(0),
        }
    }
}

impl Meters {
    /// Voice level 0..1 as of the last rendered block; out-of-range reads 0
    pub fn voice_level(&self, voice: usize) -> f64 {
        self.levels.get(voice).map_or(0.0, AtomicF64::get)
    }

    /// Commands lost to a full queue or rejected by the audio thread
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }
}

/// Audio-thread half
pub struct Synth {
    manager: DspVoiceManager,
    commands: Consumer<Command>,
    meters: Arc<Meters>,
    block_size: usize,
}

impl Synth {
    /// Build the engine and its control handle
    pub fn new(config: &EngineConfig) -> Result<(Synth, SynthHandle), ConfigError> {
        config.validate()?;
        let sequencer = SequencerSources::new();
        let manager = DspVoiceManager::new(config, sequencer.clone())?;
        let (producer, consumer) = RingBuffer::<Command>::new(config.command_capacity);
        let meters = Arc::new(Meters::default());

        let handle = SynthHandle {
            commands: producer,
            state: manager.state().clone(),
            meters: Arc::clone(&meters),
            sequencer,
        };
        let synth = Synth {
            manager,
            commands: consumer,
            meters,
            block_size: config.block_size,
        };
        Ok((synth, handle))
    }

    /// Render the common length of `left` and `right`
    ///
    /// Work is split into chunks of at most `block_size` frames. Pending
    /// commands are applied before each chunk and meters are published after
    /// it, so each chunk counts as one block. The extra tail of a longer
    /// buffer is zeroed. Nothing on this path allocates, locks or logs.
    pub fn render(&mut self, left: &mut [f64], right: &mut [f64]) {
        let frames = left.len().min(right.len());
        let (left, left_tail) = left.split_at_mut(frames);
        let (right, right_tail) = right.split_at_mut(frames);
        left_tail.fill(0.0);
        right_tail.fill(0.0);

        let chunks = left
            .chunks_mut(self.block_size)
            .zip(right.chunks_mut(self.block_size));
        for (l, r) in chunks {
            self.apply_pending();
            self.manager.process_block(l, r);
            self.publish_meters();
        }
    }

    fn apply_pending(&mut self) {
        while let Ok(command) = self.commands.pop() {
            if command.apply(&mut self.manager).is_err() {
                self.meters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn publish_meters(&self) {
        for (voice, meter) in self.meters.levels.iter().enumerate() {
            meter.set(self.manager.voice_level(voice).unwrap_or(0.0));
        }
        self.meters.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn manager(&self) -> &DspVoiceManager {
        &self.manager
    }

    /// Direct access for setup work that does not fit a [`Command`], such
    /// as loading automation
    pub fn manager_mut(&mut self) -> &mut DspVoiceManager {
        &mut self.manager
    }

    pub fn meters(&self) -> &Arc<Meters> {
        &self.meters
    }
}

/// Control-thread half
pub struct SynthHandle {
    commands: Producer<Command>,
    state: ParamState,
    meters: Arc<Meters>,
    sequencer: SequencerSources,
}

impl SynthHandle {
    /// Validate and enqueue; never blocks
    pub fn send(&mut self, command: Command) -> Result<(), ControlError> {
        if let Err(e) = command.validate() {
            log::warn!("rejected {:?}: {}", command, e);
            return Err(e);
        }
        if self.commands.push(command).is_err() {
            self.meters.dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!("command queue full, dropped {:?}", command);
            return Err(ControlError::QueueFull);
        }
        if command.rewires_graph() {
            log::debug!("queued {:?}", command);
        }
        command.record(&mut self.state);
        Ok(())
    }

    /// Cached values as of the last accepted command
    pub fn state(&self) -> &ParamState {
        &self.state
    }

    pub fn meters(&self) -> &Arc<Meters> {
        &self.meters
    }

    /// Sequencer cells read directly by the audio graph
    pub fn sequencer(&self) -> &SequencerSources {
        &self.sequencer
    }

    /// Free slots in the command queue
    pub fn capacity_left(&self) -> usize {
        self.commands.slots()
    }
}
