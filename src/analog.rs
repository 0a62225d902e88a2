//! Analog Modeling Primitives
//!
//! Waveshaping functions and parameter smoothing shared by the peripheral
//! units.

/// Saturation and folding functions
pub mod saturation {
    /// Hyperbolic tangent saturation normalized so that ±1 maps to ±1
    ///
    /// Higher drive values increase harmonic content.
    pub fn tanh_sat(x: f64, drive: f64) -> f64 {
        let denominator = drive.tanh().max(0.001);
        (x * drive).tanh() / denominator
    }

    /// Soft clipping with adjustable knee
    ///
    /// Signals below threshold pass through unchanged;
    /// signals above are compressed.
    pub fn soft_clip(x: f64, threshold: f64) -> f64 {
        if x.abs() < threshold {
            x
        } else {
            let sign = x.signum();
            let excess = x.abs() - threshold;
            sign * (threshold + excess / (1.0 + excess))
        }
    }

    /// Wavefolder
    ///
    /// Reflects the signal back inside ±threshold.
    pub fn fold(x: f64, threshold: f64) -> f64 {
        let mut y = x;
        let max_iterations = 10;
        let mut iterations = 0;

        while y.abs() > threshold && iterations < max_iterations {
            if y > threshold {
                y = 2.0 * threshold - y;
            } else if y < -threshold {
                y = -2.0 * threshold - y;
            }
            iterations += 1;
        }
        y
    }

    /// Diode ring response: only the part of |x| above the knee conducts
    pub fn diode(x: f64) -> f64 {
        let magnitude = x.abs();
        if magnitude < 0.2 {
            0.0
        } else {
            x.signum() * (magnitude - 0.2) / 0.8
        }
    }
}

/// One-pole exponential parameter smoother
///
/// Reaches ~63% of a step after `time_constant` seconds.
#[derive(Debug, Clone)]
pub struct Smoother {
    value: f64,
    coefficient: f64,
    time_constant: f64,
}

impl Smoother {
    pub fn new(initial: f64, time_constant: f64, sample_rate: f64) -> Self {
        let mut smoother = Self {
            value: initial,
            coefficient: 1.0,
            time_constant,
        };
        smoother.set_sample_rate(sample_rate);
        smoother
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.coefficient = 1.0 - libm::exp(-1.0 / (self.time_constant * sample_rate));
    }

    #[inline]
    pub fn next(&mut self, target: f64) -> f64 {
        self.value += (target - self.value) * self.coefficient;
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Jump straight to `value`
    pub fn snap(&mut self, value: f64) {
        self.value = value;
    }
}

#[cfg(test)]
mod tests {
    use super::saturation::*;
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tanh_sat_unity_at_full_scale() {
        assert_relative_eq!(tanh_sat(1.0, 3.0), 1.0, epsilon = 1e-12);
        assert!(tanh_sat(10.0, 3.0) < 1.01);
    }

    #[test]
    fn test_soft_clip() {
        assert_eq!(soft_clip(0.3, 0.5), 0.3);
        assert!(soft_clip(5.0, 0.5) < 1.5);
        assert!(soft_clip(-5.0, 0.5) > -1.5);
    }

    #[test]
    fn test_fold_stays_in_range() {
        for i in -100..100 {
            let x = i as f64 * 0.05;
            assert!(fold(x, 1.0).abs() <= 1.0 + 1e-12);
        }
        assert_relative_eq!(fold(1.5, 1.0), 0.5);
    }

    #[test]
    fn test_diode_dead_zone() {
        assert_eq!(diode(0.1), 0.0);
        assert_relative_eq!(diode(1.0), 1.0);
        assert_relative_eq!(diode(-1.0), -1.0);
    }

    #[test]
    fn test_smoother_time_constant() {
        let mut smoother = Smoother::new(0.0, 0.01, 1000.0);
        let mut out = 0.0;
        for _ in 0..10 {
            out = smoother.next(1.0);
        }
        assert_relative_eq!(out, 1.0 - (-1.0f64).exp(), epsilon = 1e-9);
    }
}
