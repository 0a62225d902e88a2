//! # Quadvoice: Twelve-Voice Real-Time Synthesis Engine
//!
//! `quadvoice` builds a fixed audio graph of twelve monophonic voices grouped
//! into six duos and three quads, plus a global LFO, three drum voices, a
//! Warps-style cross-modulator and a stereo ping-pong delay.
//!
//! ## Architecture
//!
//! The library is organized in three layers:
//!
//! - **Layer 1: Units** - Single-output audio primitives behind the [`AudioUnit`] trait
//! - **Layer 2: Graph Host** - [`AudioEngine`] owns units and cables and renders samples
//! - **Layer 3: Voices** - [`DspVoice`] wiring and the [`DspVoiceManager`] control surface
//!
//! [`Synth`] and [`SynthHandle`] split the manager across the audio and
//! control threads with a lock-free command queue.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quadvoice::prelude::*;
//!
//! let config = EngineConfig::with_sample_rate(48000.0);
//! let (mut synth, mut handle) = Synth::new(&config).unwrap();
//!
//! handle.send(Command::QuadVolume { quad: 1, value: 0.8 }).unwrap();
//! handle.send(Command::DuoModSource { duo: 2, source: ModSource::VoiceFm }).unwrap();
//! handle.send(Command::QuadGate { quad: 1, active: true }).unwrap();
//!
//! let mut left = vec![0.0; config.block_size];
//! let mut right = vec![0.0; config.block_size];
//! synth.render(&mut left, &mut right);
//! ```

pub mod analog;
pub mod command;
pub mod config;
pub mod crossmod;
pub mod drum;
pub mod engines;
pub mod error;
pub mod graph;
pub mod io;
pub mod manager;
pub mod port;
pub mod state;
pub mod units;
pub mod voice;

/// Prelude module for convenient imports
pub mod prelude {
    // Layer 1: Units
    pub use crate::port::{AudioUnit, PortDef, PortId, PortSpec, PortValues, SignalKind};
    pub use crate::units::{
        Add, AutomationPlayer, AutomationPoint, DelayLine, Envelope, EnvelopeStage, Limiter,
        LinearRamp, Maximum, Minimum, Mixer, Multiply, MultiplyAdd, Oscillator, PassThrough,
        PeakFollower, Waveform,
    };

    // Peripherals
    pub use crate::crossmod::CrossModulator;
    pub use crate::drum::{DrumKind, DrumVoice};
    pub use crate::engines::{EngineKind, SynthEngine};

    // Layer 2: Graph Host
    pub use crate::graph::{AudioEngine, InputRef, Primitive, UnitId};

    // Layer 3: Voices
    pub use crate::manager::DspVoiceManager;
    pub use crate::state::{ModSource, ParamState};
    pub use crate::voice::DspVoice;

    // Threading and external I/O
    pub use crate::command::{Command, Meters, Synth, SynthHandle};
    pub use crate::io::{AtomicF64, ExternalInput, SequencerSources};

    pub use crate::config::EngineConfig;
    pub use crate::error::{ConfigError, ControlError, GraphError, IndexKind};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
