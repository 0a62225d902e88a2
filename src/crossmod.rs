//! Cross-Modulator
//!
//! Two-input modulator modelled on a Warps-style module. A continuous
//! algorithm control sweeps through eight cross-modulation modes; past the
//! last mode it blends into a single-band vocoder. All controls are smoothed
//! per sample.

use crate::analog::{saturation, Smoother};
use crate::port::{unit_clamp, AudioUnit, PortSpec, PortValues, SignalKind};

/// Smoothing time constant for the algorithm control
pub const ALGORITHM_SMOOTHING: f64 = 0.02;

/// Smoothing time constant for timbre and drives
pub const TIMBRE_SMOOTHING: f64 = 0.05;

const MODE_COUNT: usize = 8;

/// Algorithm value at which the last mode is fully reached
const MODE_SPAN: f64 = 0.725;

/// Blend of the vocoder path for a given algorithm position
pub fn vocoder_amount(algorithm: f64) -> f64 {
    ((algorithm - 0.7) * 20.0 + 0.5).clamp(0.0, 1.0)
}

/// Continuous mode position 0..7 for a given algorithm position
pub fn mode_position(algorithm: f64) -> f64 {
    (algorithm / MODE_SPAN).min(1.0) * (MODE_COUNT - 1) as f64
}

fn modulate(mode: usize, carrier: f64, modulator: f64, timbre: f64) -> f64 {
    match mode {
        // Crossfade
        0 => carrier + (modulator - carrier) * timbre,
        // Fold
        1 => saturation::fold((carrier + modulator) * (1.0 + timbre * 3.0), 1.0),
        // Diode ring
        2 => {
            let ring = saturation::diode(carrier + modulator) - saturation::diode(carrier - modulator);
            saturation::soft_clip(ring * (1.0 + timbre), 1.0)
        }
        // Digital ring
        3 => carrier * modulator * (1.0 + timbre),
        // XOR of 16-bit words
        4 => {
            let a = (carrier.clamp(-1.0, 1.0) * 32767.0) as i16;
            let b = (modulator.clamp(-1.0, 1.0) * 32767.0) as i16;
            let xor = f64::from(a ^ b) / 32768.0;
            carrier + (xor - carrier) * (0.5 + timbre * 0.5)
        }
        // Comparator
        5 => {
            let louder = if carrier.abs() > modulator.abs() {
                carrier
            } else {
                modulator
            };
            louder + (carrier.min(modulator) - louder) * timbre
        }
        // Chebyshev
        6 => {
            let x = (carrier * modulator).clamp(-1.0, 1.0);
            let order = 1.0 + (timbre * 7.0).floor();
            libm::cos(order * libm::acos(x))
        }
        // Wrap
        _ => {
            let sum = (carrier + modulator) * (1.0 + timbre * 3.0);
            (sum + 1.0).rem_euclid(2.0) - 1.0
        }
    }
}

/// Warps-style cross-modulator unit
pub struct CrossModulator {
    algorithm: Smoother,
    timbre: Smoother,
    drive_carrier: Smoother,
    drive_modulator: Smoother,
    envelope: f64,
    envelope_coefficient: f64,
    spec: PortSpec,
}

impl CrossModulator {
    pub const CARRIER: usize = 0;
    pub const MODULATOR: usize = 1;
    pub const ALGORITHM: usize = 2;
    pub const TIMBRE: usize = 3;
    pub const DRIVE_CARRIER: usize = 4;
    pub const DRIVE_MODULATOR: usize = 5;

    pub fn new(sample_rate: f64) -> Self {
        Self {
            algorithm: Smoother::new(0.0, ALGORITHM_SMOOTHING, sample_rate),
            timbre: Smoother::new(0.5, TIMBRE_SMOOTHING, sample_rate),
            drive_carrier: Smoother::new(0.0, TIMBRE_SMOOTHING, sample_rate),
            drive_modulator: Smoother::new(0.0, TIMBRE_SMOOTHING, sample_rate),
            envelope: 0.0,
            envelope_coefficient: Self::envelope_coefficient(sample_rate),
            spec: PortSpec::new(SignalKind::Audio)
                .input("carrier", SignalKind::Audio, 0.0)
                .input("modulator", SignalKind::Audio, 0.0)
                .input("algorithm", SignalKind::Control, 0.0)
                .input("timbre", SignalKind::Control, 0.5)
                .input("drive_carrier", SignalKind::Control, 0.0)
                .input("drive_modulator", SignalKind::Control, 0.0),
        }
    }

    fn envelope_coefficient(sample_rate: f64) -> f64 {
        1.0 - libm::exp(-1.0 / (0.01 * sample_rate))
    }

    /// Current smoothed algorithm position
    pub fn algorithm(&self) -> f64 {
        self.algorithm.value()
    }
}

impl AudioUnit for CrossModulator {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues) -> f64 {
        let algorithm = self.algorithm.next(unit_clamp(inputs.get(Self::ALGORITHM)));
        let timbre = self.timbre.next(unit_clamp(inputs.get(Self::TIMBRE)));
        let drive_c = self.drive_carrier.next(unit_clamp(inputs.get(Self::DRIVE_CARRIER)));
        let drive_m = self.drive_modulator.next(unit_clamp(inputs.get(Self::DRIVE_MODULATOR)));

        let carrier = saturation::tanh_sat(inputs.get(Self::CARRIER), 1.0 + drive_c * 4.0);
        let modulator = saturation::tanh_sat(inputs.get(Self::MODULATOR), 1.0 + drive_m * 4.0);

        let position = mode_position(algorithm);
        let lower = (position.floor() as usize).min(MODE_COUNT - 1);
        let upper = (lower + 1).min(MODE_COUNT - 1);
        let frac = position - lower as f64;

        let a = modulate(lower, carrier, modulator, timbre);
        let b = modulate(upper, carrier, modulator, timbre);
        let xmod = a + (b - a) * frac;

        self.envelope += (modulator.abs() - self.envelope) * self.envelope_coefficient;
        let vocoded = carrier * self.envelope * 2.0;

        let amount = vocoder_amount(algorithm);
        xmod + (vocoded - xmod) * amount
    }

    fn reset(&mut self) {
        self.algorithm.snap(0.0);
        self.timbre.snap(0.5);
        self.drive_carrier.snap(0.0);
        self.drive_modulator.snap(0.0);
        self.envelope = 0.0;
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.algorithm.set_sample_rate(sample_rate);
        self.timbre.set_sample_rate(sample_rate);
        self.drive_carrier.set_sample_rate(sample_rate);
        self.drive_modulator.set_sample_rate(sample_rate);
        self.envelope_coefficient = Self::envelope_coefficient(sample_rate);
    }

    fn type_id(&self) -> &'static str {
        "cross_modulator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_vocoder_amount() {
        assert_eq!(vocoder_amount(0.0), 0.0);
        assert_eq!(vocoder_amount(0.675), 0.0);
        assert_relative_eq!(vocoder_amount(0.7), 0.5);
        assert_eq!(vocoder_amount(0.725), 1.0);
        assert_eq!(vocoder_amount(1.0), 1.0);
    }

    #[test]
    fn test_mode_position_covers_all_modes() {
        assert_eq!(mode_position(0.0), 0.0);
        assert_eq!(mode_position(MODE_SPAN), 7.0);
        assert_eq!(mode_position(1.0), 7.0);
    }

    #[test]
    fn test_algorithm_change_is_smoothed() {
        let mut xmod = CrossModulator::new(1000.0);
        let mut inputs = PortValues::from_spec(xmod.port_spec());
        inputs.set(CrossModulator::ALGORITHM, 1.0);

        xmod.tick(&inputs);
        let first = xmod.algorithm();
        assert!(first > 0.0 && first < 0.1);

        for _ in 0..200 {
            xmod.tick(&inputs);
        }
        assert!(xmod.algorithm() > 0.99);
    }

    #[test]
    fn test_crossfade_at_zero_algorithm() {
        let mut xmod = CrossModulator::new(48000.0);
        let mut inputs = PortValues::from_spec(xmod.port_spec());
        inputs.set(CrossModulator::TIMBRE, 0.0);
        inputs.set(CrossModulator::CARRIER, 0.5);
        inputs.set(CrossModulator::MODULATOR, -0.5);

        // Let the timbre smoother settle at zero
        let mut out = 0.0;
        for _ in 0..48000 {
            out = xmod.tick(&inputs);
        }
        assert_relative_eq!(out, saturation::tanh_sat(0.5, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_sweep_is_finite() {
        let mut xmod = CrossModulator::new(48000.0);
        let mut inputs = PortValues::from_spec(xmod.port_spec());
        for i in 0..48000 {
            let t = i as f64 / 48000.0;
            inputs.set(CrossModulator::ALGORITHM, t);
            inputs.set(CrossModulator::CARRIER, (t * 2200.0).sin());
            inputs.set(CrossModulator::MODULATOR, (t * 1300.0).sin());
            assert!(xmod.tick(&inputs).is_finite());
        }
    }
}
