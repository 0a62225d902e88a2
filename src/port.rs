//! Signal Conventions and Port System
//!
//! Every primitive in the graph declares its inputs through a [`PortSpec`] and
//! produces exactly one output sample per tick. Inputs are dense: port ids run
//! from zero, so a frame of input values is a plain slice indexed by id.

use serde::{Deserialize, Serialize};

/// Index of an input port within a unit
pub type PortId = usize;

/// Semantic signal classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Audio-rate signal, nominally ±1.0
    Audio,

    /// Control value updated at control rate (frequency, time, depth)
    Control,

    /// Boolean-as-float, on when the value is above zero
    Gate,
}

impl SignalKind {
    /// Whether a value of this kind counts as "on"
    pub fn is_high(&self, value: f64) -> bool {
        match self {
            SignalKind::Gate => value > 0.0,
            _ => value != 0.0,
        }
    }
}

/// Definition of a single input port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDef {
    pub id: PortId,

    /// Human-readable name (e.g. "frequency", "gate")
    pub name: String,

    pub kind: SignalKind,

    /// Scalar value the input holds before anything sets it
    pub default: f64,
}

impl PortDef {
    pub fn new(id: PortId, name: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            default: 0.0,
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = default;
        self
    }
}

/// Input ports of a unit plus the kind of its single output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub output: SignalKind,
}

impl PortSpec {
    pub fn new(output: SignalKind) -> Self {
        Self {
            inputs: Vec::new(),
            output,
        }
    }

    /// Append an input; its id is its position
    pub fn input(mut self, name: impl Into<String>, kind: SignalKind, default: f64) -> Self {
        let id = self.inputs.len();
        self.inputs
            .push(PortDef::new(id, name, kind).with_default(default));
        self
    }

    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn input_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.inputs.get(id)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// One frame of resolved input values
///
/// Sized once when the unit is registered and reused every tick.
#[derive(Debug, Clone, Default)]
pub struct PortValues {
    values: Vec<f64>,
}

impl PortValues {
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn from_spec(spec: &PortSpec) -> Self {
        Self {
            values: spec.inputs.iter().map(|p| p.default).collect(),
        }
    }

    /// Value of an input; missing ports read as zero
    #[inline]
    pub fn get(&self, id: PortId) -> f64 {
        self.values.get(id).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn set(&mut self, id: PortId, value: f64) {
        if let Some(slot) = self.values.get_mut(id) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

/// A primitive with typed inputs and exactly one output
///
/// Implementations must be allocation-free in [`AudioUnit::tick`] and clamp
/// out-of-range inputs themselves.
pub trait AudioUnit: Send {
    /// Input port declarations
    fn port_spec(&self) -> &PortSpec;

    /// Compute one output sample
    fn tick(&mut self, inputs: &PortValues) -> f64;

    /// Return to the power-on state
    fn reset(&mut self);

    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Stable type name used in diagnostics
    fn type_id(&self) -> &'static str;
}

/// Clamp a normalized control value to 0..1, mapping NaN to 0
#[inline]
pub fn unit_clamp(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamp to `min..=max`, mapping NaN to `min`
#[inline]
pub fn clamp_or_min(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder_assigns_dense_ids() {
        let spec = PortSpec::new(SignalKind::Audio)
            .input("a", SignalKind::Audio, 0.0)
            .input("b", SignalKind::Control, 1.0);

        assert_eq!(spec.len(), 2);
        assert_eq!(spec.input_by_name("b").map(|p| p.id), Some(1));
        assert_eq!(spec.input_by_id(0).map(|p| p.name.as_str()), Some("a"));
        assert!(spec.input_by_name("missing").is_none());
    }

    #[test]
    fn test_port_values_from_spec_defaults() {
        let spec = PortSpec::new(SignalKind::Audio)
            .input("a", SignalKind::Audio, 0.25)
            .input("b", SignalKind::Control, 4.0);
        let mut values = PortValues::from_spec(&spec);
        assert_eq!(values.get(0), 0.25);
        assert_eq!(values.get(1), 4.0);
        assert_eq!(values.get(7), 0.0);

        values.set(1, 2.0);
        assert_eq!(values.get(1), 2.0);
    }

    #[test]
    fn test_gate_threshold() {
        assert!(SignalKind::Gate.is_high(0.01));
        assert!(!SignalKind::Gate.is_high(0.0));
        assert!(!SignalKind::Gate.is_high(-1.0));
    }

    #[test]
    fn test_unit_clamp() {
        assert_eq!(unit_clamp(f64::NAN), 0.0);
        assert_eq!(unit_clamp(-0.5), 0.0);
        assert_eq!(unit_clamp(1.5), 1.0);
        assert_eq!(clamp_or_min(f64::NAN, 0.01, 2.0), 0.01);
    }
}
