//! Engine configuration
//!
//! Every field has a default, so a config file only needs to name what it
//! changes.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Construction-time settings for the voice manager and its graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,

    /// Samples rendered per call on the audio thread
    pub block_size: usize,

    /// Capacity of the control-to-audio command queue
    pub command_capacity: usize,

    pub volume_ramp_secs: f64,
    pub hold_ramp_secs: f64,
    pub wobble_ramp_secs: f64,

    /// Triangle/square crossfade when sharpness changes
    pub sharpness_ramp_secs: f64,

    /// Crossfade between oscillator path and alternate engine
    pub engine_crossfade_secs: f64,

    pub follower_half_life_secs: f64,

    /// Longest delay the ping-pong delay lines can hold
    pub max_delay_secs: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 256,
            command_capacity: 1024,
            volume_ramp_secs: 0.05,
            hold_ramp_secs: 0.02,
            wobble_ramp_secs: 0.01,
            sharpness_ramp_secs: 0.01,
            engine_crossfade_secs: 0.01,
            follower_half_life_secs: 0.15,
            max_delay_secs: 2.0,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        log::info!(
            "loaded engine config: {} Hz, block {}",
            config.sample_rate,
            config.block_size
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be positive and finite",
            });
        }
        if self.block_size == 0 {
            return Err(ConfigError::Invalid {
                field: "block_size",
                reason: "must be non-zero",
            });
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "command_capacity",
                reason: "must be non-zero",
            });
        }

        let ramps = [
            ("volume_ramp_secs", self.volume_ramp_secs),
            ("hold_ramp_secs", self.hold_ramp_secs),
            ("wobble_ramp_secs", self.wobble_ramp_secs),
            ("sharpness_ramp_secs", self.sharpness_ramp_secs),
            ("engine_crossfade_secs", self.engine_crossfade_secs),
        ];
        for (field, value) in ramps {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be non-negative and finite",
                });
            }
        }

        if !(self.follower_half_life_secs.is_finite() && self.follower_half_life_secs > 0.0) {
            return Err(ConfigError::Invalid {
                field: "follower_half_life_secs",
                reason: "must be positive and finite",
            });
        }
        if !(self.max_delay_secs.is_finite() && self.max_delay_secs > 0.0) {
            return Err(ConfigError::Invalid {
                field: "max_delay_secs",
                reason: "must be positive and finite",
            });
        }
        Ok(())
    }
}
