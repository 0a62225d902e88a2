//! Voice Manager
//!
//! Assembles twelve [`DspVoice`]s into six duos and three quads, owns the
//! global modulation sources, the peripheral units and the output chain, and
//! exposes the flat control surface.
//!
//! Every setter validates its indices, updates the cached [`ParamState`] and
//! then pushes the value into the graph. Cached values are the source of
//! truth: re-applying one reproduces exactly the wiring the first call
//! produced.

use crate::config::EngineConfig;
use crate::crossmod::CrossModulator;
use crate::drum::{DrumKind, DrumVoice};
use crate::engines::{note_for_frequency, EngineKind, SynthEngine, ENGINE_COUNT};
use crate::error::{ControlError, GraphError, IndexKind};
use crate::graph::{AudioEngine, UnitId};
use crate::io::{SequencerSources, SEQUENCER_LANES};
use crate::port::unit_clamp;
use crate::state::{
    ModSource, ParamState, DELAY_LINES, DRUM_COUNT, PAIR_COUNT, QUAD_COUNT, VOICE_COUNT,
};
use crate::units::{
    Add, AutomationPlayer, AutomationPoint, DelayLine, Limiter, Maximum, Minimum, Multiply,
    MultiplyAdd, Oscillator, PeakFollower, Waveform,
};
use crate::voice::DspVoice;
use std::sync::Arc;

/// Fixed pitch multiplier of the voices in each quad
pub const QUAD_PITCH_MULTIPLIERS: [f64; QUAD_COUNT] = [0.5, 1.0, 2.0];

pub const VIBRATO_RATE_HZ: f64 = 5.5;

/// Vibrato 1.0 deviates by this fraction of the voice frequency
pub const VIBRATO_DEPTH: f64 = 0.03;

/// LFO rate added per unit of detected feedback at full total feedback
pub const FEEDBACK_LFO_HZ: f64 = 10.0;

/// Coupling 1.0 deviates by this fraction of the voice frequency per unit of partner level
pub const COUPLING_DEPTH: f64 = 0.5;

/// Delay time modulation at full depth, in seconds
pub const DELAY_MOD_SECS: f64 = 0.02;

const MIN_DELAY_SECS: f64 = 0.001;
const MAX_DELAY_FEEDBACK: f64 = 0.95;

/// Voice frequency from tune and quad pitch
///
/// Tune spans 55 Hz to 880 Hz; quad pitch 0.5 is unity with one octave
/// either way.
pub fn voice_frequency(tune: f64, quad_pitch: f64) -> f64 {
    let base = 55.0 * libm::pow(2.0, unit_clamp(tune) * 4.0);
    base * libm::pow(2.0, (unit_clamp(quad_pitch) - 0.5) * 2.0)
}

/// Bend depth as a fraction of frequency: a full bend is two semitones up
pub fn bend_ratio() -> f64 {
    libm::pow(2.0, 2.0 / 12.0) - 1.0
}

/// LFO knob 0..1 to 0.01..30 Hz
pub fn lfo_frequency(knob: f64) -> f64 {
    0.01 * libm::pow(3000.0, unit_clamp(knob))
}

/// Voices that frequency-modulate duo `duo`'s first and second voice
///
/// Within-pair routing has the two voices modulate each other. Cross-quad
/// routing feeds duo 0 from voices 6 and 7 and duo 2 from voices 2 and 3;
/// every other duo stays within its pair.
pub fn fm_sources(duo: usize, cross_quad: bool) -> (usize, usize) {
    match (cross_quad, duo) {
        (true, 0) => (6, 7),
        (true, 2) => (2, 3),
        _ => (2 * duo + 1, 2 * duo),
    }
}

/// The two voices of a pair
pub fn pair_voices(pair: usize) -> [usize; 2] {
    [2 * pair, 2 * pair + 1]
}

/// The four voices of a quad
pub fn quad_voices(quad: usize) -> std::ops::Range<usize> {
    4 * quad..4 * quad + 4
}

struct PingPong {
    lines: [UnitId; DELAY_LINES],
    times: [UnitId; DELAY_LINES],
    feedback_in: UnitId,
    feedback_cross: UnitId,
    dry: UnitId,
    wet: [UnitId; DELAY_LINES],
}

/// Twelve voices plus everything around them
pub struct DspVoiceManager {
    graph: AudioEngine,
    voices: Vec<DspVoice>,
    state: ParamState,
    config: EngineConfig,
    sequencer: SequencerSources,

    feedback_gain: UnitId,
    automation: UnitId,
    lfo: UnitId,
    flux: UnitId,
    sequencer_pitch: [UnitId; SEQUENCER_LANES],
    sequencer_gate: [UnitId; SEQUENCER_LANES],

    crossmod: UnitId,
    crossmod_level: UnitId,
    drums: [UnitId; DRUM_COUNT],
    drum_triggers: [f64; DRUM_COUNT],
    automation_starts: f64,
    delay: PingPong,
}

impl DspVoiceManager {
    /// Build the full graph and apply default parameters
    pub fn new(config: &EngineConfig, sequencer: SequencerSources) -> Result<Self, ControlError> {
        let mut graph = AudioEngine::new(config.sample_rate);

        // Registered first so that feedback loops through the master bus
        // break at the detector
        let feedback_detector = graph.create_peak_follower("feedback.detector");
        let feedback_gain = graph.create_multiply_add("feedback.gain");
        let automation = graph.create_automation_player("automation");
        let lfo_rate = graph.create_add("lfo.rate");
        let lfo = graph.create_oscillator("lfo", Waveform::Sine);

        graph.set(feedback_gain.input(MultiplyAdd::A), 0.0)?;
        graph.connect(feedback_detector, feedback_gain.input(MultiplyAdd::A))?;
        graph.set(feedback_gain.input(MultiplyAdd::B), 0.0)?;
        graph.connect(feedback_gain, lfo_rate.input(Add::A))?;
        graph.connect(automation, lfo_rate.input(Add::B))?;
        graph.set(lfo.input(Oscillator::FREQUENCY), 0.0)?;
        graph.connect(lfo_rate, lfo.input(Oscillator::FREQUENCY))?;

        let vibrato_lfo = graph.create_oscillator("vibrato.lfo", Waveform::Sine);
        graph.set(vibrato_lfo.input(Oscillator::FREQUENCY), VIBRATO_RATE_HZ)?;

        let flux = graph.create_external("flux", Arc::clone(&sequencer.flux));
        let mut sequencer_pitch = [UnitId::default(); SEQUENCER_LANES];
        let mut sequencer_gate = [UnitId::default(); SEQUENCER_LANES];
        for lane in 0..SEQUENCER_LANES {
            sequencer_pitch[lane] = graph.create_external(
                &format!("sequencer.pitch{}", lane + 1),
                Arc::clone(&sequencer.pitch[lane]),
            );
            sequencer_gate[lane] = graph.create_external_gate(
                &format!("sequencer.gate{}", lane + 1),
                Arc::clone(&sequencer.gate[lane]),
            );
        }

        let voices = (0..VOICE_COUNT)
            .map(|i| DspVoice::new(&mut graph, i, QUAD_PITCH_MULTIPLIERS[i / 4], config))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, voice) in voices.iter().enumerate() {
            graph.connect(vibrato_lfo, voice.vibrato_input())?;
            graph.connect(voices[i ^ 1].follower(), voice.coupling_input())?;
        }

        // Quad buses
        let mut quad_mix = [UnitId::default(); QUAD_COUNT];
        for (q, bus) in quad_mix.iter_mut().enumerate() {
            *bus = graph.create_mixer(&format!("quad{}.mix", q), 4);
            for (ch, v) in quad_voices(q).enumerate() {
                graph.connect(voices[v].output(), bus.input(ch))?;
            }
        }

        let crossmod = graph.create_cross_modulator("crossmod");
        graph.connect(quad_mix[0], crossmod.input(CrossModulator::CARRIER))?;
        graph.connect(quad_mix[1], crossmod.input(CrossModulator::MODULATOR))?;
        let crossmod_level = graph.create_multiply("crossmod.level");
        graph.set(crossmod_level.input(Multiply::A), 0.0)?;
        graph.connect(crossmod, crossmod_level.input(Multiply::A))?;

        let drums = [
            graph.create_drum("drum.kick", DrumKind::Kick),
            graph.create_drum("drum.snare", DrumKind::Snare),
            graph.create_drum("drum.hihat", DrumKind::HiHat),
        ];

        let master = graph.create_mixer("master", QUAD_COUNT + DRUM_COUNT + 1);
        let buses = quad_mix.iter().chain(drums.iter()).chain([&crossmod_level]);
        for (ch, &bus) in buses.enumerate() {
            graph.connect(bus, master.input(ch))?;
        }

        graph.connect(master, feedback_detector.input(PeakFollower::IN))?;
        graph.set(
            feedback_detector.input(PeakFollower::HALF_LIFE),
            config.follower_half_life_secs,
        )?;

        let delay = Self::build_delay(&mut graph, config, master, lfo)?;

        let limiters = [
            graph.create_limiter("limiter.left"),
            graph.create_limiter("limiter.right"),
        ];
        for (limiter, &wet) in limiters.iter().zip(delay.wet.iter()) {
            graph.connect(wet, limiter.input(Limiter::IN))?;
        }
        graph.set_output(limiters[0], limiters[1])?;

        let mut manager = Self {
            graph,
            voices,
            state: ParamState::default(),
            config: config.clone(),
            sequencer,
            feedback_gain,
            automation,
            lfo,
            flux,
            sequencer_pitch,
            sequencer_gate,
            crossmod,
            crossmod_level,
            drums,
            drum_triggers: [0.0; DRUM_COUNT],
            automation_starts: 0.0,
            delay,
        };
        manager.apply_state(&ParamState::default())?;

        log::info!(
            "voice manager ready: {} voices, {} units, {} Hz",
            VOICE_COUNT,
            manager.graph.unit_count(),
            config.sample_rate
        );
        Ok(manager)
    }

    fn build_delay(
        graph: &mut AudioEngine,
        config: &EngineConfig,
        input: UnitId,
        lfo: UnitId,
    ) -> Result<PingPong, GraphError> {
        let mut lines = [UnitId::default(); DELAY_LINES];
        let mut times = [UnitId::default(); DELAY_LINES];
        for line in 0..DELAY_LINES {
            let name = |part: &str| format!("delay{}.{}", line, part);
            lines[line] = graph.create_delay_line(&name("line"), config.max_delay_secs);

            // time = clamp(base + lfo * depth, MIN_DELAY_SECS, max)
            times[line] = graph.create_multiply_add(&name("time"));
            let ceiling = graph.create_minimum(&name("ceiling"));
            let floor = graph.create_maximum(&name("floor"));
            graph.set(times[line].input(MultiplyAdd::A), 0.0)?;
            graph.connect(lfo, times[line].input(MultiplyAdd::A))?;
            graph.set(times[line].input(MultiplyAdd::B), 0.0)?;
            graph.connect(times[line], ceiling.input(Minimum::A))?;
            graph.set(ceiling.input(Minimum::B), config.max_delay_secs)?;
            graph.connect(ceiling, floor.input(Maximum::A))?;
            graph.set(floor.input(Maximum::B), MIN_DELAY_SECS)?;
            graph.set(lines[line].input(DelayLine::DELAY), 0.0)?;
            graph.connect(floor, lines[line].input(DelayLine::DELAY))?;
        }

        // Ping-pong: input and right echoes feed the left line, left echoes
        // feed the right line
        let feedback_in = graph.create_multiply_add("delay.feedback_in");
        let feedback_cross = graph.create_multiply("delay.feedback_cross");
        graph.connect(lines[1], feedback_in.input(MultiplyAdd::A))?;
        graph.connect(input, feedback_in.input(MultiplyAdd::C))?;
        graph.connect(feedback_in, lines[0].input(DelayLine::IN))?;
        graph.set(feedback_cross.input(Multiply::A), 0.0)?;
        graph.connect(lines[0], feedback_cross.input(Multiply::A))?;
        graph.connect(feedback_cross, lines[1].input(DelayLine::IN))?;

        let dry = graph.create_multiply("delay.dry");
        graph.set(dry.input(Multiply::A), 0.0)?;
        graph.connect(input, dry.input(Multiply::A))?;

        let mut wet = [UnitId::default(); DELAY_LINES];
        for (line, out) in wet.iter_mut().enumerate() {
            *out = graph.create_multiply_add(&format!("delay{}.out", line));
            graph.connect(lines[line], out.input(MultiplyAdd::A))?;
            graph.connect(dry, out.input(MultiplyAdd::C))?;
        }

        Ok(PingPong {
            lines,
            times,
            feedback_in,
            feedback_cross,
            dry,
            wet,
        })
    }

    fn voice_index(index: usize) -> Result<usize, ControlError> {
        ControlError::check(IndexKind::Voice, index, VOICE_COUNT)
    }

    fn pair_index(index: usize) -> Result<usize, ControlError> {
        ControlError::check(IndexKind::Pair, index, PAIR_COUNT)
    }

    fn quad_index(index: usize) -> Result<usize, ControlError> {
        ControlError::check(IndexKind::Quad, index, QUAD_COUNT)
    }

    fn drum_index(index: usize) -> Result<usize, ControlError> {
        ControlError::check(IndexKind::Drum, index, DRUM_COUNT)
    }

    pub fn graph(&self) -> &AudioEngine {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut AudioEngine {
        &mut self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sequencer(&self) -> &SequencerSources {
        &self.sequencer
    }

    pub fn voice(&self, index: usize) -> Result<&DspVoice, ControlError> {
        Ok(&self.voices[Self::voice_index(index)?])
    }

    /// Snapshot of every cached value
    pub fn state(&self) -> &ParamState {
        &self.state
    }

    /// Replay every setter from a snapshot
    pub fn apply_state(&mut self, state: &ParamState) -> Result<(), ControlError> {
        state.validate()?;
        self.set_fm_structure(state.fm_structure_cross_quad)?;
        self.set_total_feedback(state.total_feedback)?;
        self.set_voice_coupling(state.voice_coupling)?;
        self.set_vibrato(state.vibrato)?;
        self.set_bend(state.bend)?;
        self.set_lfo_rate(state.lfo_rate)?;

        for q in 0..QUAD_COUNT {
            self.set_quad_pitch(q, state.quad_pitch[q])?;
            self.set_quad_hold(q, state.quad_hold[q])?;
            self.set_quad_volume(q, state.quad_volume[q])?;
            self.set_quad_pitch_source(q, state.quad_pitch_source[q])?;
            self.set_quad_trigger_source(q, state.quad_trigger_source[q])?;
            self.set_quad_envelope_one_shot(q, state.quad_envelope_one_shot[q])?;
        }

        for p in 0..PAIR_COUNT {
            self.set_pair_sharpness(p, state.pair_sharpness[p])?;
            self.set_pair_harmonics(p, state.pair_harmonics[p])?;
            self.set_pair_morph(p, state.pair_morph[p])?;
            self.set_pair_engine(p, state.pair_engine[p])?;
            self.set_duo_mod_source(p, state.duo_mod_source[p])?;
        }

        for v in 0..VOICE_COUNT {
            self.set_voice_tune(v, state.voice_tune[v])?;
            self.set_voice_fm_depth(v, state.voice_fm_depth[v])?;
            self.set_voice_envelope_speed(v, state.voice_envelope_speed[v])?;
        }

        for d in 0..DRUM_COUNT {
            self.set_drum_tune(d, state.drum_tune[d])?;
            self.set_drum_decay(d, state.drum_decay[d])?;
            self.set_drum_tone(d, state.drum_tone[d])?;
            self.set_drum_level(d, state.drum_level[d])?;
        }

        for line in 0..DELAY_LINES {
            self.set_delay_time(line, state.delay_time[line])?;
        }
        self.set_delay_feedback(state.delay_feedback)?;
        self.set_delay_mix(state.delay_mix)?;
        self.set_delay_mod_depth(state.delay_mod_depth)?;

        self.set_crossmod_algorithm(state.crossmod_algorithm)?;
        self.set_crossmod_timbre(state.crossmod_timbre)?;
        self.set_crossmod_drive_carrier(state.crossmod_drive_carrier)?;
        self.set_crossmod_drive_modulator(state.crossmod_drive_modulator)?;
        self.set_crossmod_level(state.crossmod_level)?;
        Ok(())
    }

    /// Push frequency and every frequency-relative depth to a voice
    fn update_voice_frequency(&mut self, index: usize) -> Result<(), GraphError> {
        let quad = index / 4;
        let freq = voice_frequency(self.state.voice_tune[index], self.state.quad_pitch[quad]);
        let voice = &self.voices[index];
        let graph = &mut self.graph;

        voice.set_frequency(graph, freq)?;
        voice.set_bend_depth(graph, freq * bend_ratio())?;
        voice.set_vibrato_depth(graph, self.state.vibrato * VIBRATO_DEPTH * freq)?;
        voice.set_coupling_depth(graph, self.state.voice_coupling * COUPLING_DEPTH * freq)?;

        let cv_depth = if self.state.quad_pitch_source[quad] > 0 {
            freq
        } else {
            0.0
        };
        voice.set_pitch_cv_depth(graph, cv_depth)?;

        if self.state.pair_engine[index / 2] != 0 {
            voice.set_engine_note(graph, note_for_frequency(freq))?;
        }
        Ok(())
    }

    pub fn set_voice_tune(&mut self, index: usize, tune: f64) -> Result<(), ControlError> {
        let index = Self::voice_index(index)?;
        self.state.voice_tune[index] = unit_clamp(tune);
        self.update_voice_frequency(index)?;
        Ok(())
    }

    pub fn voice_tune(&self, index: usize) -> Result<f64, ControlError> {
        Ok(self.state.voice_tune[Self::voice_index(index)?])
    }

    pub fn set_voice_fm_depth(&mut self, index: usize, depth: f64) -> Result<(), ControlError> {
        let index = Self::voice_index(index)?;
        self.state.voice_fm_depth[index] = unit_clamp(depth);
        self.voices[index].set_fm_depth(&mut self.graph, depth)?;
        Ok(())
    }

    pub fn voice_fm_depth(&self, index: usize) -> Result<f64, ControlError> {
        Ok(self.state.voice_fm_depth[Self::voice_index(index)?])
    }

    pub fn set_voice_envelope_speed(&mut self, index: usize, speed: f64) -> Result<(), ControlError> {
        let index = Self::voice_index(index)?;
        self.state.voice_envelope_speed[index] = unit_clamp(speed);
        self.voices[index].set_envelope_speed(&mut self.graph, speed)?;
        Ok(())
    }

    pub fn voice_envelope_speed(&self, index: usize) -> Result<f64, ControlError> {
        Ok(self.state.voice_envelope_speed[Self::voice_index(index)?])
    }

    pub fn set_voice_gate(&mut self, index: usize, active: bool) -> Result<(), ControlError> {
        let index = Self::voice_index(index)?;
        self.voices[index].set_gate(&mut self.graph, active)?;
        Ok(())
    }

    /// Transient gain multiplier 0.7..1.3 driven by gestures
    pub fn set_voice_wobble(&mut self, index: usize, multiplier: f64) -> Result<(), ControlError> {
        let index = Self::voice_index(index)?;
        self.voices[index].set_wobble(&mut self.graph, multiplier)?;
        Ok(())
    }

    pub fn set_pair_sharpness(&mut self, pair: usize, sharpness: f64) -> Result<(), ControlError> {
        let pair = Self::pair_index(pair)?;
        self.state.pair_sharpness[pair] = unit_clamp(sharpness);
        for v in pair_voices(pair) {
            self.voices[v].set_sharpness(&mut self.graph, sharpness)?;
        }
        Ok(())
    }

    pub fn pair_sharpness(&self, pair: usize) -> Result<f64, ControlError> {
        Ok(self.state.pair_sharpness[Self::pair_index(pair)?])
    }

    /// Rewire a duo's modulation inputs
    ///
    /// Both voices' mod inputs are cleared before the new source is
    /// connected, so at most one source ever drives each.
    pub fn set_duo_mod_source(&mut self, duo: usize, source: ModSource) -> Result<(), ControlError> {
        let duo = Self::pair_index(duo)?;
        self.state.duo_mod_source[duo] = source;

        let [a, b] = pair_voices(duo);
        let inputs = [self.voices[a].mod_input(), self.voices[b].mod_input()];
        for input in inputs {
            self.graph.disconnect_all(input)?;
        }

        let sources = match source {
            ModSource::Off => None,
            ModSource::Lfo => Some((self.lfo, self.lfo)),
            ModSource::Flux => Some((self.flux, self.flux)),
            ModSource::VoiceFm => {
                let (sa, sb) = fm_sources(duo, self.state.fm_structure_cross_quad);
                Some((self.voices[sa].output(), self.voices[sb].output()))
            }
        };
        if let Some((sa, sb)) = sources {
            self.graph.connect(sa, inputs[0])?;
            self.graph.connect(sb, inputs[1])?;
        }
        Ok(())
    }

    pub fn duo_mod_source(&self, duo: usize) -> Result<ModSource, ControlError> {
        Ok(self.state.duo_mod_source[Self::pair_index(duo)?])
    }

    /// Select cross-quad or within-pair FM routing
    ///
    /// Re-applies every duo currently on voice FM.
    pub fn set_fm_structure(&mut self, cross_quad: bool) -> Result<(), ControlError> {
        self.state.fm_structure_cross_quad = cross_quad;
        for duo in 0..PAIR_COUNT {
            if self.state.duo_mod_source[duo] == ModSource::VoiceFm {
                self.set_duo_mod_source(duo, ModSource::VoiceFm)?;
            }
        }
        Ok(())
    }

    pub fn fm_structure_cross_quad(&self) -> bool {
        self.state.fm_structure_cross_quad
    }

    /// Select the alternate engine for a pair by ordinal; 0 reverts to the oscillators
    ///
    /// A deselected engine keeps running behind the closed crossfade so the
    /// fade out stays smooth.
    pub fn set_pair_engine(&mut self, pair: usize, ordinal: usize) -> Result<(), ControlError> {
        let pair = Self::pair_index(pair)?;
        ControlError::check(IndexKind::Engine, ordinal, ENGINE_COUNT + 1)?;
        self.state.pair_engine[pair] = ordinal;

        let kind = EngineKind::from_ordinal(ordinal);
        for v in pair_voices(pair) {
            if kind.is_some() {
                self.graph
                    .unit_mut::<SynthEngine>(self.voices[v].engine())?
                    .set_kind(kind);
            }
            self.voices[v].set_engine_active(&mut self.graph, kind.is_some())?;

            // No silent gap: note and timbre are live before the crossfade opens
            self.update_voice_frequency(v)?;
            let sharpness = self.state.pair_sharpness[pair];
            self.voices[v].set_sharpness(&mut self.graph, sharpness)?;
        }
        Ok(())
    }

    pub fn pair_engine(&self, pair: usize) -> Result<usize, ControlError> {
        Ok(self.state.pair_engine[Self::pair_index(pair)?])
    }

    pub fn set_pair_harmonics(&mut self, pair: usize, harmonics: f64) -> Result<(), ControlError> {
        let pair = Self::pair_index(pair)?;
        self.state.pair_harmonics[pair] = unit_clamp(harmonics);
        for v in pair_voices(pair) {
            self.voices[v].set_engine_harmonics(&mut self.graph, harmonics)?;
        }
        Ok(())
    }

    pub fn set_pair_morph(&mut self, pair: usize, morph: f64) -> Result<(), ControlError> {
        let pair = Self::pair_index(pair)?;
        self.state.pair_morph[pair] = unit_clamp(morph);
        for v in pair_voices(pair) {
            self.voices[v].set_engine_morph(&mut self.graph, morph)?;
        }
        Ok(())
    }

    pub fn set_quad_pitch(&mut self, quad: usize, pitch: f64) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        self.state.quad_pitch[quad] = unit_clamp(pitch);
        for v in quad_voices(quad) {
            self.update_voice_frequency(v)?;
        }
        Ok(())
    }

    pub fn quad_pitch(&self, quad: usize) -> Result<f64, ControlError> {
        Ok(self.state.quad_pitch[Self::quad_index(quad)?])
    }

    pub fn set_quad_hold(&mut self, quad: usize, hold: f64) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        self.state.quad_hold[quad] = unit_clamp(hold);
        for v in quad_voices(quad) {
            self.voices[v].set_hold(&mut self.graph, hold)?;
        }
        Ok(())
    }

    pub fn quad_hold(&self, quad: usize) -> Result<f64, ControlError> {
        Ok(self.state.quad_hold[Self::quad_index(quad)?])
    }

    pub fn set_quad_volume(&mut self, quad: usize, volume: f64) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        self.state.quad_volume[quad] = unit_clamp(volume);
        for v in quad_voices(quad) {
            self.voices[v].set_volume(&mut self.graph, volume)?;
        }
        Ok(())
    }

    /// Volume change over an explicit duration, for programmatic transitions
    pub fn fade_quad_volume(
        &mut self,
        quad: usize,
        volume: f64,
        duration: f64,
    ) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        self.state.quad_volume[quad] = unit_clamp(volume);
        for v in quad_voices(quad) {
            self.voices[v].fade_volume(&mut self.graph, volume, duration)?;
        }
        Ok(())
    }

    pub fn quad_volume(&self, quad: usize) -> Result<f64, ControlError> {
        Ok(self.state.quad_volume[Self::quad_index(quad)?])
    }

    /// Drive a quad's pitch CV from sequencer lane `source` (1..=3), or 0 for none
    pub fn set_quad_pitch_source(&mut self, quad: usize, source: usize) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        ControlError::check(IndexKind::Source, source, SEQUENCER_LANES + 1)?;
        self.state.quad_pitch_source[quad] = source;

        for v in quad_voices(quad) {
            let input = self.voices[v].pitch_cv_input();
            self.graph.disconnect_all(input)?;
            if source > 0 {
                self.graph.connect(self.sequencer_pitch[source - 1], input)?;
            }
            self.update_voice_frequency(v)?;
        }
        Ok(())
    }

    pub fn quad_pitch_source(&self, quad: usize) -> Result<usize, ControlError> {
        Ok(self.state.quad_pitch_source[Self::quad_index(quad)?])
    }

    /// Drive a quad's gates from sequencer lane `source` (1..=3), or 0 for none
    pub fn set_quad_trigger_source(&mut self, quad: usize, source: usize) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        ControlError::check(IndexKind::Source, source, SEQUENCER_LANES + 1)?;
        self.state.quad_trigger_source[quad] = source;

        for v in quad_voices(quad) {
            let input = self.voices[v].gate_input();
            self.graph.disconnect_all(input)?;
            if source > 0 {
                self.graph.connect(self.sequencer_gate[source - 1], input)?;
            }
        }
        Ok(())
    }

    pub fn quad_trigger_source(&self, quad: usize) -> Result<usize, ControlError> {
        Ok(self.state.quad_trigger_source[Self::quad_index(quad)?])
    }

    /// One-shot envelopes release after decay; gated ones hold until gate-off
    pub fn set_quad_envelope_one_shot(&mut self, quad: usize, one_shot: bool) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        self.state.quad_envelope_one_shot[quad] = one_shot;
        for v in quad_voices(quad) {
            self.voices[v].set_one_shot(&mut self.graph, one_shot)?;
        }
        Ok(())
    }

    pub fn quad_envelope_one_shot(&self, quad: usize) -> Result<bool, ControlError> {
        Ok(self.state.quad_envelope_one_shot[Self::quad_index(quad)?])
    }

    pub fn set_quad_gate(&mut self, quad: usize, active: bool) -> Result<(), ControlError> {
        let quad = Self::quad_index(quad)?;
        for v in quad_voices(quad) {
            self.voices[v].set_gate(&mut self.graph, active)?;
        }
        Ok(())
    }

    /// How strongly detected output level speeds up the LFO
    pub fn set_total_feedback(&mut self, amount: f64) -> Result<(), ControlError> {
        let amount = unit_clamp(amount);
        self.state.total_feedback = amount;
        self.graph
            .set(self.feedback_gain.input(MultiplyAdd::B), amount * FEEDBACK_LFO_HZ)?;
        Ok(())
    }

    pub fn total_feedback(&self) -> f64 {
        self.state.total_feedback
    }

    pub fn set_voice_coupling(&mut self, amount: f64) -> Result<(), ControlError> {
        self.state.voice_coupling = unit_clamp(amount);
        for v in 0..VOICE_COUNT {
            self.update_voice_frequency(v)?;
        }
        Ok(())
    }

    pub fn voice_coupling(&self) -> f64 {
        self.state.voice_coupling
    }

    pub fn set_vibrato(&mut self, amount: f64) -> Result<(), ControlError> {
        self.state.vibrato = unit_clamp(amount);
        for v in 0..VOICE_COUNT {
            self.update_voice_frequency(v)?;
        }
        Ok(())
    }

    pub fn vibrato(&self) -> f64 {
        self.state.vibrato
    }

    /// Pitch bend -1..1 applied to every voice
    pub fn set_bend(&mut self, amount: f64) -> Result<(), ControlError> {
        let amount = if amount.is_nan() {
            0.0
        } else {
            amount.clamp(-1.0, 1.0)
        };
        self.state.bend = amount;
        for voice in &self.voices {
            voice.set_bend(&mut self.graph, amount)?;
        }
        Ok(())
    }

    pub fn bend(&self) -> f64 {
        self.state.bend
    }

    pub fn set_lfo_rate(&mut self, knob: f64) -> Result<(), ControlError> {
        self.state.lfo_rate = unit_clamp(knob);
        self.graph.set(
            self.feedback_gain.input(MultiplyAdd::C),
            lfo_frequency(self.state.lfo_rate),
        )?;
        Ok(())
    }

    pub fn lfo_rate(&self) -> f64 {
        self.state.lfo_rate
    }

    /// Current LFO output
    pub fn lfo_value(&self) -> Result<f64, ControlError> {
        Ok(self.graph.output_value(self.lfo)?)
    }

    /// Replace the automation lane; it offsets the LFO rate in Hz
    pub fn load_automation(&mut self, points: &[AutomationPoint], looping: bool) -> Result<usize, ControlError> {
        Ok(self
            .graph
            .unit_mut::<AutomationPlayer>(self.automation)?
            .load(points, looping))
    }

    pub fn start_automation(&mut self) -> Result<(), ControlError> {
        self.automation_starts += 1.0;
        self.graph.set(
            self.automation.input(AutomationPlayer::START),
            self.automation_starts,
        )?;
        Ok(())
    }

    pub fn stop_automation(&mut self) -> Result<(), ControlError> {
        self.graph.unit_mut::<AutomationPlayer>(self.automation)?.stop();
        Ok(())
    }

    pub fn trigger_drum(&mut self, drum: usize) -> Result<(), ControlError> {
        let drum = Self::drum_index(drum)?;
        self.drum_triggers[drum] += 1.0;
        self.graph.set(
            self.drums[drum].input(DrumVoice::TRIGGER),
            self.drum_triggers[drum],
        )?;
        Ok(())
    }

    pub fn set_drum_tune(&mut self, drum: usize, tune: f64) -> Result<(), ControlError> {
        let drum = Self::drum_index(drum)?;
        self.state.drum_tune[drum] = unit_clamp(tune);
        self.graph
            .set(self.drums[drum].input(DrumVoice::TUNE), self.state.drum_tune[drum])?;
        Ok(())
    }

    pub fn set_drum_decay(&mut self, drum: usize, decay: f64) -> Result<(), ControlError> {
        let drum = Self::drum_index(drum)?;
        self.state.drum_decay[drum] = unit_clamp(decay);
        self.graph
            .set(self.drums[drum].input(DrumVoice::DECAY), self.state.drum_decay[drum])?;
        Ok(())
    }

    pub fn set_drum_tone(&mut self, drum: usize, tone: f64) -> Result<(), ControlError> {
        let drum = Self::drum_index(drum)?;
        self.state.drum_tone[drum] = unit_clamp(tone);
        self.graph
            .set(self.drums[drum].input(DrumVoice::TONE), self.state.drum_tone[drum])?;
        Ok(())
    }

    pub fn set_drum_level(&mut self, drum: usize, level: f64) -> Result<(), ControlError> {
        let drum = Self::drum_index(drum)?;
        self.state.drum_level[drum] = unit_clamp(level);
        self.graph
            .set(self.drums[drum].input(DrumVoice::LEVEL), self.state.drum_level[drum])?;
        Ok(())
    }

    /// Delay time of one line as a fraction of the configured maximum
    pub fn set_delay_time(&mut self, line: usize, time: f64) -> Result<(), ControlError> {
        let line = ControlError::check(IndexKind::DelayLine, line, DELAY_LINES)?;
        self.state.delay_time[line] = unit_clamp(time);
        self.graph.set(
            self.delay.times[line].input(MultiplyAdd::C),
            self.state.delay_time[line] * self.config.max_delay_secs,
        )?;
        Ok(())
    }

    pub fn set_delay_feedback(&mut self, feedback: f64) -> Result<(), ControlError> {
        self.state.delay_feedback = unit_clamp(feedback);
        let gain = self.state.delay_feedback * MAX_DELAY_FEEDBACK;
        self.graph
            .set(self.delay.feedback_in.input(MultiplyAdd::B), gain)?;
        self.graph
            .set(self.delay.feedback_cross.input(Multiply::B), gain)?;
        Ok(())
    }

    /// Wet/dry balance: 0 is dry only, 1 is echoes only
    pub fn set_delay_mix(&mut self, mix: f64) -> Result<(), ControlError> {
        let mix = unit_clamp(mix);
        self.state.delay_mix = mix;
        self.graph.set(self.delay.dry.input(Multiply::B), 1.0 - mix)?;
        for wet in self.delay.wet {
            self.graph.set(wet.input(MultiplyAdd::B), mix)?;
        }
        Ok(())
    }

    /// LFO modulation of both delay times
    pub fn set_delay_mod_depth(&mut self, depth: f64) -> Result<(), ControlError> {
        self.state.delay_mod_depth = unit_clamp(depth);
        for time in self.delay.times {
            self.graph.set(
                time.input(MultiplyAdd::B),
                self.state.delay_mod_depth * DELAY_MOD_SECS,
            )?;
        }
        Ok(())
    }

    /// Delay line units, for inspection
    pub fn delay_lines(&self) -> [UnitId; DELAY_LINES] {
        self.delay.lines
    }

    pub fn set_crossmod_algorithm(&mut self, algorithm: f64) -> Result<(), ControlError> {
        self.state.crossmod_algorithm = unit_clamp(algorithm);
        self.graph.set(
            self.crossmod.input(CrossModulator::ALGORITHM),
            self.state.crossmod_algorithm,
        )?;
        Ok(())
    }

    pub fn set_crossmod_timbre(&mut self, timbre: f64) -> Result<(), ControlError> {
        self.state.crossmod_timbre = unit_clamp(timbre);
        self.graph.set(
            self.crossmod.input(CrossModulator::TIMBRE),
            self.state.crossmod_timbre,
        )?;
        Ok(())
    }

    pub fn set_crossmod_drive_carrier(&mut self, drive: f64) -> Result<(), ControlError> {
        self.state.crossmod_drive_carrier = unit_clamp(drive);
        self.graph.set(
            self.crossmod.input(CrossModulator::DRIVE_CARRIER),
            self.state.crossmod_drive_carrier,
        )?;
        Ok(())
    }

    pub fn set_crossmod_drive_modulator(&mut self, drive: f64) -> Result<(), ControlError> {
        self.state.crossmod_drive_modulator = unit_clamp(drive);
        self.graph.set(
            self.crossmod.input(CrossModulator::DRIVE_MODULATOR),
            self.state.crossmod_drive_modulator,
        )?;
        Ok(())
    }

    /// Level of the cross-modulator in the master mix
    pub fn set_crossmod_level(&mut self, level: f64) -> Result<(), ControlError> {
        self.state.crossmod_level = unit_clamp(level);
        self.graph.set(
            self.crossmod_level.input(Multiply::B),
            self.state.crossmod_level,
        )?;
        Ok(())
    }

    /// Per-voice level 0..1 for visualization
    pub fn voice_level(&self, index: usize) -> Result<f64, ControlError> {
        Ok(self.voices[Self::voice_index(index)?].level(&self.graph)?)
    }

    /// Cached base frequency of a voice, before its slot multiplier
    pub fn voice_frequency(&self, index: usize) -> Result<f64, ControlError> {
        let index = Self::voice_index(index)?;
        Ok(self.graph.input_value(self.voices[index].frequency_input())?)
    }

    pub fn tick(&mut self) -> (f64, f64) {
        self.graph.tick()
    }

    pub fn process_block(&mut self, left: &mut [f64], right: &mut [f64]) {
        self.graph.process_block(left, right);
    }
}
