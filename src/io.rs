//! External I/O Integration
//!
//! Bridges values written by other threads (sequencer lanes, flux CV) into
//! the audio graph without locks.

use crate::error::{ControlError, IndexKind};
use crate::port::{AudioUnit, PortSpec, PortValues, SignalKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic f64 for lock-free communication between threads
///
/// Uses AtomicU64 internally since there's no native AtomicF64.
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self, ordering: Ordering) -> f64 {
        f64::from_bits(self.0.load(ordering))
    }

    pub fn store(&self, value: f64, ordering: Ordering) {
        self.0.store(value.to_bits(), ordering);
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Reads an atomic value set by another thread
///
/// Has no inputs; its output is whatever the writer last stored.
pub struct ExternalInput {
    value: Arc<AtomicF64>,
    spec: PortSpec,
}

impl ExternalInput {
    pub fn new(value: Arc<AtomicF64>, kind: SignalKind) -> Self {
        Self {
            value,
            spec: PortSpec::new(kind),
        }
    }

    /// Pitch or modulation CV
    pub fn cv(value: Arc<AtomicF64>) -> Self {
        Self::new(value, SignalKind::Control)
    }

    /// Sequencer gate lane, high above zero
    pub fn gate(value: Arc<AtomicF64>) -> Self {
        Self::new(value, SignalKind::Gate)
    }
}

impl AudioUnit for ExternalInput {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, _inputs: &PortValues) -> f64 {
        self.value.get()
    }

    fn reset(&mut self) {}

    fn set_sample_rate(&mut self, _: f64) {}

    fn type_id(&self) -> &'static str {
        "external_input"
    }
}

/// Number of sequencer lanes for each of pitch and gate
pub const SEQUENCER_LANES: usize = 3;

/// CV cells written by an external sequencer
///
/// Cloning shares the cells, so one clone can live on the sequencer thread
/// while the graph reads the other through [`ExternalInput`] units.
#[derive(Debug, Clone, Default)]
pub struct SequencerSources {
    pub pitch: [Arc<AtomicF64>; SEQUENCER_LANES],
    pub gate: [Arc<AtomicF64>; SEQUENCER_LANES],
    pub flux: Arc<AtomicF64>,
}

impl SequencerSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a pitch lane; 1.0 raises a voice by one base frequency
    pub fn set_pitch(&self, lane: usize, value: f64) -> Result<(), ControlError> {
        let lane = ControlError::check(IndexKind::Source, lane, SEQUENCER_LANES)?;
        self.pitch[lane].set(value);
        Ok(())
    }

    pub fn set_gate(&self, lane: usize, active: bool) -> Result<(), ControlError> {
        let lane = ControlError::check(IndexKind::Source, lane, SEQUENCER_LANES)?;
        self.gate[lane].set(if active { 1.0 } else { 0.0 });
        Ok(())
    }

    pub fn set_flux(&self, value: f64) {
        self.flux.set(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f64() {
        let a = AtomicF64::new(1.0);
        assert_eq!(a.get(), 1.0);
        a.set(-2.5);
        assert_eq!(a.get(), -2.5);
        a.store(99.0, Ordering::SeqCst);
        assert_eq!(a.load(Ordering::SeqCst), 99.0);
    }

    #[test]
    fn test_external_input_reads_shared_value() {
        let cell = Arc::new(AtomicF64::new(0.0));
        let mut input = ExternalInput::cv(Arc::clone(&cell));
        let frame = PortValues::new(0);

        assert_eq!(input.tick(&frame), 0.0);
        cell.set(0.75);
        assert_eq!(input.tick(&frame), 0.75);
        assert!(input.port_spec().is_empty());
    }

    #[test]
    fn test_sequencer_sources_share_cells() {
        let writer = SequencerSources::new();
        let reader = writer.clone();

        writer.set_pitch(2, 0.5).unwrap();
        writer.set_gate(0, true).unwrap();
        writer.set_flux(0.25);

        assert_eq!(reader.pitch[2].get(), 0.5);
        assert_eq!(reader.gate[0].get(), 1.0);
        assert_eq!(reader.flux.get(), 0.25);
    }

    #[test]
    fn test_sequencer_lane_out_of_range() {
        let sources = SequencerSources::new();
        assert_eq!(
            sources.set_pitch(3, 1.0),
            Err(ControlError::OutOfRange {
                kind: IndexKind::Source,
                index: 3,
                len: SEQUENCER_LANES
            })
        );
    }
}
