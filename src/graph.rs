//! Audio Engine
//!
//! Owns every unit in an arena, resolves inputs each sample and runs units
//! in dependency order. An input holds a scalar value plus at most one
//! source; its effective value is the sum of the two. Connecting an input
//! that already has a source replaces it, so signals can never stack.
//!
//! Rewiring only touches slot handles. The execution order is recomputed
//! lazily on the next tick, using scratch buffers reserved when units are
//! registered, so neither path allocates once the graph is built.

use crate::crossmod::CrossModulator;
use crate::drum::{DrumKind, DrumVoice};
use crate::engines::SynthEngine;
use crate::error::GraphError;
use crate::io::{AtomicF64, ExternalInput};
use crate::port::{AudioUnit, PortId, PortSpec, PortValues};
use crate::units::{
    Add, AutomationPlayer, DelayLine, Envelope, LinearRamp, Limiter, Maximum, Minimum, Mixer,
    Multiply, MultiplyAdd, Oscillator, PassThrough, PeakFollower, Waveform,
};
use slotmap::SlotMap;
use std::sync::Arc;

slotmap::new_key_type! {
    /// Handle to a unit registered with an [`AudioEngine`]
    pub struct UnitId;
}

impl UnitId {
    /// Reference one of this unit's inputs
    pub fn input(self, port: PortId) -> InputRef {
        InputRef { unit: self, port }
    }
}

/// A specific input port on a specific unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub unit: UnitId,
    pub port: PortId,
}

/// Implemented by every concrete unit type held in a [`Primitive`]
pub trait PrimitiveKind: Sized {
    const NAME: &'static str;

    fn downcast(primitive: &Primitive) -> Option<&Self>;

    fn downcast_mut(primitive: &mut Primitive) -> Option<&mut Self>;
}

macro_rules! primitives {
    ($($variant:ident($ty:ty) => $name:literal),* $(,)?) => {
        /// Closed set of units the engine can host
        ///
        /// Dispatch is a `match`, resolved without a vtable in the sample loop.
        pub enum Primitive {
            $($variant($ty),)*
        }

        impl AudioUnit for Primitive {
            fn port_spec(&self) -> &PortSpec {
                match self {
                    $(Primitive::$variant(u) => u.port_spec(),)*
                }
            }

            #[inline]
            fn tick(&mut self, inputs: &PortValues) -> f64 {
                match self {
                    $(Primitive::$variant(u) => u.tick(inputs),)*
                }
            }

            fn reset(&mut self) {
                match self {
                    $(Primitive::$variant(u) => u.reset(),)*
                }
            }

            fn set_sample_rate(&mut self, sample_rate: f64) {
                match self {
                    $(Primitive::$variant(u) => u.set_sample_rate(sample_rate),)*
                }
            }

            fn type_id(&self) -> &'static str {
                match self {
                    $(Primitive::$variant(_) => $name,)*
                }
            }
        }

        $(
            impl From<$ty> for Primitive {
                fn from(unit: $ty) -> Self {
                    Primitive::$variant(unit)
                }
            }

            impl PrimitiveKind for $ty {
                const NAME: &'static str = $name;

                fn downcast(primitive: &Primitive) -> Option<&Self> {
                    match primitive {
                        Primitive::$variant(u) => Some(u),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }

                fn downcast_mut(primitive: &mut Primitive) -> Option<&mut Self> {
                    match primitive {
                        Primitive::$variant(u) => Some(u),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )*
    };
}

primitives! {
    Oscillator(Oscillator) => "oscillator",
    Envelope(Envelope) => "envelope",
    DelayLine(DelayLine) => "delay_line",
    PeakFollower(PeakFollower) => "peak_follower",
    Limiter(Limiter) => "limiter",
    Multiply(Multiply) => "multiply",
    Add(Add) => "add",
    MultiplyAdd(MultiplyAdd) => "multiply_add",
    Minimum(Minimum) => "minimum",
    Maximum(Maximum) => "maximum",
    PassThrough(PassThrough) => "pass_through",
    LinearRamp(LinearRamp) => "linear_ramp",
    AutomationPlayer(AutomationPlayer) => "automation_player",
    Mixer(Mixer) => "mixer",
    External(ExternalInput) => "external_input",
    SynthEngine(SynthEngine) => "synth_engine",
    CrossModulator(CrossModulator) => "cross_modulator",
    Drum(DrumVoice) => "drum_voice",
}

/// Upstream end of a connection
#[derive(Debug, Clone, Copy)]
struct Source {
    unit: UnitId,
    position: usize,
}

#[derive(Debug, Clone, Copy)]
struct InputSlot {
    value: f64,
    source: Option<Source>,
}

struct Node {
    unit: Primitive,
    name: String,
    /// Registration order; also the index into the output buffer
    position: usize,
    inputs: Vec<InputSlot>,
    frame: PortValues,
}

/// Graph host: unit arena, connections and the per-sample run loop
pub struct AudioEngine {
    nodes: SlotMap<UnitId, Node>,
    registration: Vec<UnitId>,
    outputs: Vec<f64>,

    // Execution state
    execution_order: Vec<usize>,
    order_dirty: bool,
    connections: usize,

    // Sort scratch, reserved at registration
    in_degree: Vec<usize>,
    edge_start: Vec<usize>,
    edge_cursor: Vec<usize>,
    edges: Vec<usize>,
    ready: Vec<usize>,
    placed: Vec<bool>,

    output_left: Option<UnitId>,
    output_right: Option<UnitId>,
    sample_rate: f64,
}

impl AudioEngine {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            registration: Vec::new(),
            outputs: Vec::new(),
            execution_order: Vec::new(),
            order_dirty: false,
            connections: 0,
            in_degree: Vec::new(),
            edge_start: vec![0],
            edge_cursor: Vec::new(),
            edges: Vec::new(),
            ready: Vec::new(),
            placed: Vec::new(),
            output_left: None,
            output_right: None,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Register a unit and return its handle
    pub fn add(&mut self, name: impl Into<String>, unit: impl Into<Primitive>) -> UnitId {
        let mut unit = unit.into();
        unit.set_sample_rate(self.sample_rate);

        let spec = unit.port_spec();
        let inputs: Vec<InputSlot> = spec
            .inputs
            .iter()
            .map(|p| InputSlot {
                value: p.default,
                source: None,
            })
            .collect();
        let frame = PortValues::from_spec(spec);
        let position = self.registration.len();

        self.edges.reserve(inputs.len());
        let id = self.nodes.insert(Node {
            unit,
            name: name.into(),
            position,
            inputs,
            frame,
        });

        self.registration.push(id);
        self.outputs.push(0.0);
        self.execution_order.reserve(1);
        self.in_degree.push(0);
        self.edge_start.push(0);
        self.edge_cursor.push(0);
        self.ready.reserve(1);
        self.placed.push(false);
        self.order_dirty = true;
        id
    }

    pub fn create_oscillator(&mut self, name: &str, waveform: Waveform) -> UnitId {
        self.add(name, Oscillator::new(waveform, self.sample_rate))
    }

    pub fn create_envelope(&mut self, name: &str) -> UnitId {
        self.add(name, Envelope::new(self.sample_rate))
    }

    pub fn create_delay_line(&mut self, name: &str, max_secs: f64) -> UnitId {
        self.add(name, DelayLine::new(max_secs, self.sample_rate))
    }

    pub fn create_peak_follower(&mut self, name: &str) -> UnitId {
        self.add(name, PeakFollower::new(self.sample_rate))
    }

    pub fn create_limiter(&mut self, name: &str) -> UnitId {
        self.add(name, Limiter::new(self.sample_rate))
    }

    pub fn create_multiply(&mut self, name: &str) -> UnitId {
        self.add(name, Multiply::new())
    }

    pub fn create_add(&mut self, name: &str) -> UnitId {
        self.add(name, Add::new())
    }

    pub fn create_multiply_add(&mut self, name: &str) -> UnitId {
        self.add(name, MultiplyAdd::new())
    }

    pub fn create_minimum(&mut self, name: &str) -> UnitId {
        self.add(name, Minimum::new())
    }

    pub fn create_maximum(&mut self, name: &str) -> UnitId {
        self.add(name, Maximum::new())
    }

    pub fn create_pass_through(&mut self, name: &str) -> UnitId {
        self.add(name, PassThrough::new())
    }

    pub fn create_linear_ramp(&mut self, name: &str, initial: f64, time: f64) -> UnitId {
        self.add(name, LinearRamp::new(initial, time, self.sample_rate))
    }

    pub fn create_automation_player(&mut self, name: &str) -> UnitId {
        self.add(name, AutomationPlayer::new(self.sample_rate))
    }

    pub fn create_mixer(&mut self, name: &str, channels: usize) -> UnitId {
        self.add(name, Mixer::new(channels))
    }

    pub fn create_external(&mut self, name: &str, cell: Arc<AtomicF64>) -> UnitId {
        self.add(name, ExternalInput::cv(cell))
    }

    pub fn create_external_gate(&mut self, name: &str, cell: Arc<AtomicF64>) -> UnitId {
        self.add(name, ExternalInput::gate(cell))
    }

    pub fn create_synth_engine(&mut self, name: &str) -> UnitId {
        self.add(name, SynthEngine::new(self.sample_rate))
    }

    pub fn create_cross_modulator(&mut self, name: &str) -> UnitId {
        self.add(name, CrossModulator::new(self.sample_rate))
    }

    pub fn create_drum(&mut self, name: &str, kind: DrumKind) -> UnitId {
        self.add(name, DrumVoice::new(kind, self.sample_rate))
    }

    fn slot(&self, input: InputRef) -> Result<&InputSlot, GraphError> {
        let node = self.nodes.get(input.unit).ok_or(GraphError::InvalidUnit)?;
        node.inputs.get(input.port).ok_or(GraphError::InvalidPort {
            unit: node.unit.type_id(),
            port: input.port,
        })
    }

    fn slot_mut(&mut self, input: InputRef) -> Result<&mut InputSlot, GraphError> {
        let node = self.nodes.get_mut(input.unit).ok_or(GraphError::InvalidUnit)?;
        let unit = node.unit.type_id();
        node.inputs.get_mut(input.port).ok_or(GraphError::InvalidPort {
            unit,
            port: input.port,
        })
    }

    /// Point `input` at `source`, or clear it with `None`
    ///
    /// Any previous source is dropped first. The scalar value is untouched.
    pub fn rewire(&mut self, input: InputRef, source: Option<UnitId>) -> Result<(), GraphError> {
        let source = match source {
            Some(unit) => {
                let node = self.nodes.get(unit).ok_or(GraphError::InvalidUnit)?;
                Some(Source {
                    unit,
                    position: node.position,
                })
            }
            None => None,
        };

        let slot = self.slot_mut(input)?;
        let previous = slot.source.map(|s| s.unit);
        slot.source = source;

        let next = source.map(|s| s.unit);
        if previous != next {
            match (previous.is_some(), next.is_some()) {
                (false, true) => self.connections += 1,
                (true, false) => self.connections -= 1,
                _ => {}
            }
            self.order_dirty = true;
        }
        Ok(())
    }

    /// Connect the output of `from` to `to`, replacing any existing source
    pub fn connect(&mut self, from: UnitId, to: InputRef) -> Result<(), GraphError> {
        self.rewire(to, Some(from))
    }

    /// Remove the source of `input`; idempotent, keeps the scalar value
    pub fn disconnect_all(&mut self, input: InputRef) -> Result<(), GraphError> {
        self.rewire(input, None)
    }

    /// Immediate, non-ramped assignment of an input's scalar value
    pub fn set(&mut self, input: InputRef, value: f64) -> Result<(), GraphError> {
        self.slot_mut(input)?.value = value;
        Ok(())
    }

    /// Scalar value of an input (without any connected source)
    pub fn input_value(&self, input: InputRef) -> Result<f64, GraphError> {
        Ok(self.slot(input)?.value)
    }

    pub fn source_of(&self, input: InputRef) -> Result<Option<UnitId>, GraphError> {
        Ok(self.slot(input)?.source.map(|s| s.unit))
    }

    /// Total number of connected inputs in the graph
    pub fn connection_count(&self) -> usize {
        self.connections
    }

    /// Most recent output sample of a unit
    pub fn output_value(&self, unit: UnitId) -> Result<f64, GraphError> {
        let node = self.nodes.get(unit).ok_or(GraphError::InvalidUnit)?;
        Ok(self.outputs[node.position])
    }

    /// Typed access to a unit
    pub fn unit<T: PrimitiveKind>(&self, id: UnitId) -> Result<&T, GraphError> {
        let node = self.nodes.get(id).ok_or(GraphError::InvalidUnit)?;
        T::downcast(&node.unit).ok_or(GraphError::WrongPrimitive {
            expected: T::NAME,
            found: node.unit.type_id(),
        })
    }

    pub fn unit_mut<T: PrimitiveKind>(&mut self, id: UnitId) -> Result<&mut T, GraphError> {
        let node = self.nodes.get_mut(id).ok_or(GraphError::InvalidUnit)?;
        let found = node.unit.type_id();
        T::downcast_mut(&mut node.unit).ok_or(GraphError::WrongPrimitive {
            expected: T::NAME,
            found,
        })
    }

    pub fn name(&self, id: UnitId) -> Option<&str> {
        self.nodes.get(id).map(|n| n.name.as_str())
    }

    pub fn unit_count(&self) -> usize {
        self.nodes.len()
    }

    /// Units in registration order: handle, name and type
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &str, &'static str)> + '_ {
        self.registration.iter().filter_map(move |&id| {
            self.nodes
                .get(id)
                .map(|n| (id, n.name.as_str(), n.unit.type_id()))
        })
    }

    /// Designate the units whose outputs form the stereo output
    pub fn set_output(&mut self, left: UnitId, right: UnitId) -> Result<(), GraphError> {
        if !self.nodes.contains_key(left) || !self.nodes.contains_key(right) {
            return Err(GraphError::InvalidUnit);
        }
        self.output_left = Some(left);
        self.output_right = Some(right);
        Ok(())
    }

    /// Execution order as unit handles; recomputes it if stale
    pub fn execution_order(&mut self) -> Vec<UnitId> {
        self.ensure_order();
        self.execution_order
            .iter()
            .map(|&p| self.registration[p])
            .collect()
    }

    fn ensure_order(&mut self) {
        if self.order_dirty {
            self.sort();
            self.order_dirty = false;
        }
    }

    /// Kahn's algorithm over the current edges
    ///
    /// When only cyclic units remain, the earliest-registered one is forced
    /// next; its inputs from later units then read the previous sample.
    fn sort(&mut self) {
        let n = self.registration.len();

        self.in_degree.iter_mut().for_each(|d| *d = 0);
        self.edge_start.iter_mut().for_each(|s| *s = 0);

        for &id in &self.registration {
            if let Some(node) = self.nodes.get(id) {
                for source in node.inputs.iter().filter_map(|s| s.source) {
                    self.edge_start[source.position + 1] += 1;
                    self.in_degree[node.position] += 1;
                }
            }
        }
        for p in 0..n {
            self.edge_start[p + 1] += self.edge_start[p];
        }

        self.edges.clear();
        self.edges.resize(self.edge_start[n], 0);
        self.edge_cursor.copy_from_slice(&self.edge_start[..n]);
        for &id in &self.registration {
            if let Some(node) = self.nodes.get(id) {
                for source in node.inputs.iter().filter_map(|s| s.source) {
                    let cursor = &mut self.edge_cursor[source.position];
                    self.edges[*cursor] = node.position;
                    *cursor += 1;
                }
            }
        }

        self.execution_order.clear();
        self.ready.clear();
        self.placed.iter_mut().for_each(|p| *p = false);
        for p in 0..n {
            if self.in_degree[p] == 0 {
                self.placed[p] = true;
                self.ready.push(p);
            }
        }

        let mut head = 0;
        let mut next_forced = 0;
        while self.execution_order.len() < n {
            if head == self.ready.len() {
                while self.placed[next_forced] {
                    next_forced += 1;
                }
                self.placed[next_forced] = true;
                self.ready.push(next_forced);
            }

            let p = self.ready[head];
            head += 1;
            self.execution_order.push(p);

            for e in self.edge_start[p]..self.edge_start[p + 1] {
                let target = self.edges[e];
                if !self.placed[target] {
                    self.in_degree[target] -= 1;
                    if self.in_degree[target] == 0 {
                        self.placed[target] = true;
                        self.ready.push(target);
                    }
                }
            }
        }
    }

    /// Process a single sample, returning stereo output
    pub fn tick(&mut self) -> (f64, f64) {
        self.ensure_order();

        let Self {
            nodes,
            registration,
            outputs,
            execution_order,
            ..
        } = self;

        for &position in execution_order.iter() {
            let Some(node) = nodes.get_mut(registration[position]) else {
                continue;
            };
            let Node {
                unit,
                inputs,
                frame,
                ..
            } = node;
            for (i, slot) in inputs.iter().enumerate() {
                let modulation = slot.source.map_or(0.0, |s| outputs[s.position]);
                frame.set(i, slot.value + modulation);
            }
            outputs[position] = unit.tick(frame);
        }

        self.read_output()
    }

    fn read_output(&self) -> (f64, f64) {
        let read = |id: Option<UnitId>| {
            id.and_then(|id| self.nodes.get(id))
                .map_or(0.0, |n| self.outputs[n.position])
        };
        (read(self.output_left), read(self.output_right))
    }

    /// Render a block into two equally sized buffers
    pub fn process_block(&mut self, left: &mut [f64], right: &mut [f64]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (a, b) = self.tick();
            *l = a;
            *r = b;
        }
    }

    /// Reset all units and clear the output buffer
    pub fn reset(&mut self) {
        for (_, node) in self.nodes.iter_mut() {
            node.unit.reset();
        }
        self.outputs.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Change the sample rate of every unit; not for use while rendering
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        for (_, node) in self.nodes.iter_mut() {
            node.unit.set_sample_rate(sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_effective_input_is_scalar_plus_source() {
        let mut engine = AudioEngine::new(48000.0);
        let a = engine.create_pass_through("a");
        let b = engine.create_pass_through("b");
        engine.set(a.input(PassThrough::IN), 0.25).unwrap();
        engine.set(b.input(PassThrough::IN), 1.0).unwrap();
        engine.connect(a, b.input(PassThrough::IN)).unwrap();

        engine.tick();
        assert_relative_eq!(engine.output_value(b).unwrap(), 1.25);
    }

    #[test]
    fn test_connect_replaces_source() {
        let mut engine = AudioEngine::new(48000.0);
        let a = engine.create_pass_through("a");
        let b = engine.create_pass_through("b");
        let sink = engine.create_pass_through("sink");
        engine.set(a.input(PassThrough::IN), 1.0).unwrap();
        engine.set(b.input(PassThrough::IN), 2.0).unwrap();
        engine.set(sink.input(PassThrough::IN), 0.0).unwrap();

        engine.connect(a, sink.input(PassThrough::IN)).unwrap();
        engine.connect(b, sink.input(PassThrough::IN)).unwrap();

        assert_eq!(engine.connection_count(), 1);
        assert_eq!(engine.source_of(sink.input(PassThrough::IN)).unwrap(), Some(b));
        engine.tick();
        assert_eq!(engine.output_value(sink).unwrap(), 2.0);
    }

    #[test]
    fn test_fan_out() {
        let mut engine = AudioEngine::new(48000.0);
        let src = engine.create_pass_through("src");
        let x = engine.create_multiply("x");
        let y = engine.create_multiply("y");
        engine.set(src.input(PassThrough::IN), 3.0).unwrap();
        engine.set(x.input(Multiply::A), 0.0).unwrap();
        engine.set(y.input(Multiply::B), 0.0).unwrap();
        engine.connect(src, x.input(Multiply::A)).unwrap();
        engine.connect(src, y.input(Multiply::B)).unwrap();

        engine.tick();
        assert_eq!(engine.output_value(x).unwrap(), 3.0);
        assert_eq!(engine.output_value(y).unwrap(), 3.0);
        assert_eq!(engine.connection_count(), 2);
    }

    #[test]
    fn test_disconnect_all_keeps_scalar_and_is_idempotent() {
        let mut engine = AudioEngine::new(48000.0);
        let src = engine.create_pass_through("src");
        let sink = engine.create_pass_through("sink");
        engine.set(src.input(PassThrough::IN), 5.0).unwrap();
        engine.set(sink.input(PassThrough::IN), 0.5).unwrap();
        engine.connect(src, sink.input(PassThrough::IN)).unwrap();

        engine.disconnect_all(sink.input(PassThrough::IN)).unwrap();
        engine.disconnect_all(sink.input(PassThrough::IN)).unwrap();

        assert_eq!(engine.connection_count(), 0);
        assert_eq!(engine.input_value(sink.input(PassThrough::IN)).unwrap(), 0.5);
        engine.tick();
        assert_eq!(engine.output_value(sink).unwrap(), 0.5);
    }

    #[test]
    fn test_order_independent_of_registration() {
        let mut engine = AudioEngine::new(48000.0);
        // Registered downstream-first
        let sink = engine.create_pass_through("sink");
        let src = engine.create_pass_through("src");
        engine.set(sink.input(PassThrough::IN), 0.0).unwrap();
        engine.set(src.input(PassThrough::IN), 7.0).unwrap();
        engine.connect(src, sink.input(PassThrough::IN)).unwrap();

        engine.tick();
        assert_eq!(engine.output_value(sink).unwrap(), 7.0);
        assert_eq!(engine.execution_order(), vec![src, sink]);
    }

    #[test]
    fn test_feedback_cycle_reads_previous_sample() {
        let mut engine = AudioEngine::new(48000.0);
        // acc = 1 + acc (previous sample): counts up one per tick
        let acc = engine.create_add("acc");
        engine.set(acc.input(Add::A), 1.0).unwrap();
        engine.connect(acc, acc.input(Add::B)).unwrap();

        for expected in 1..=4 {
            engine.tick();
            assert_eq!(engine.output_value(acc).unwrap(), expected as f64);
        }
    }

    #[test]
    fn test_two_unit_cycle_runs() {
        let mut engine = AudioEngine::new(48000.0);
        let a = engine.create_multiply("a");
        let b = engine.create_pass_through("b");
        engine.set(a.input(Multiply::A), 0.5).unwrap();
        engine.set(a.input(Multiply::B), 0.0).unwrap();
        engine.set(b.input(PassThrough::IN), 1.0).unwrap();
        engine.connect(b, a.input(Multiply::B)).unwrap();
        engine.connect(a, b.input(PassThrough::IN)).unwrap();

        for _ in 0..10 {
            let _ = engine.tick();
        }
        assert_eq!(engine.execution_order().len(), 2);
        assert!(engine.output_value(b).unwrap().is_finite());
    }

    #[test]
    fn test_invalid_port_and_wrong_primitive() {
        let mut engine = AudioEngine::new(48000.0);
        let add = engine.create_add("add");

        assert_eq!(
            engine.set(add.input(9), 1.0),
            Err(GraphError::InvalidPort {
                unit: "add",
                port: 9
            })
        );
        assert_eq!(
            engine.unit::<Envelope>(add).err(),
            Some(GraphError::WrongPrimitive {
                expected: "envelope",
                found: "add"
            })
        );
        assert!(engine.unit::<Add>(add).is_ok());
    }

    #[test]
    fn test_stereo_output_and_block() {
        let mut engine = AudioEngine::new(48000.0);
        let l = engine.create_pass_through("l");
        let r = engine.create_pass_through("r");
        engine.set(l.input(PassThrough::IN), 0.25).unwrap();
        engine.set(r.input(PassThrough::IN), -0.25).unwrap();
        engine.set_output(l, r).unwrap();

        let mut left = [0.0; 16];
        let mut right = [0.0; 16];
        engine.process_block(&mut left, &mut right);
        assert!(left.iter().all(|&v| v == 0.25));
        assert!(right.iter().all(|&v| v == -0.25));
    }

    #[test]
    fn test_units_enumerates_in_registration_order() {
        let mut engine = AudioEngine::new(48000.0);
        engine.create_envelope("env");
        engine.create_oscillator("osc", Waveform::Sine);
        let names: Vec<_> = engine.units().map(|(_, name, ty)| (name, ty)).collect();
        assert_eq!(names, vec![("env", "envelope"), ("osc", "oscillator")]);
    }
}
