//! Error types
//!
//! Graph handle failures, control-surface index failures and config failures
//! each get their own enum.

use crate::port::PortId;
use std::fmt;
use thiserror::Error;

/// Errors raised by [`AudioEngine`](crate::graph::AudioEngine) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("invalid unit handle")]
    InvalidUnit,

    #[error("unit `{unit}` has no input port {port}")]
    InvalidPort { unit: &'static str, port: PortId },

    #[error("expected a `{expected}` unit, found `{found}`")]
    WrongPrimitive {
        expected: &'static str,
        found: &'static str,
    },
}

/// Which index space a control call addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Voice,
    Pair,
    Quad,
    Source,
    Engine,
    Drum,
    DelayLine,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::Voice => "voice",
            IndexKind::Pair => "pair",
            IndexKind::Quad => "quad",
            IndexKind::Source => "source",
            IndexKind::Engine => "engine",
            IndexKind::Drum => "drum",
            IndexKind::DelayLine => "delay line",
        };
        f.write_str(name)
    }
}

/// Errors raised on the control surface
///
/// These are always produced on the control thread, before a value is
/// admitted to the audio graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("{kind} index {index} out of range (0..{len})")]
    OutOfRange {
        kind: IndexKind,
        index: usize,
        len: usize,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("command queue is full")]
    QueueFull,
}

impl ControlError {
    /// Validate `index` against `len`, returning it unchanged when in range
    pub fn check(kind: IndexKind, index: usize, len: usize) -> Result<usize, ControlError> {
        if index < len {
            Ok(index)
        } else {
            Err(ControlError::OutOfRange { kind, index, len })
        }
    }
}

/// Errors raised while loading an [`EngineConfig`](crate::config::EngineConfig)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("failed to build engine: {0}")]
    Build(#[from] ControlError),

    #[error("invalid snapshot: {0}")]
    Snapshot(ControlError),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_in_range() {
        assert_eq!(ControlError::check(IndexKind::Voice, 11, 12), Ok(11));
    }

    #[test]
    fn test_check_out_of_range() {
        let err = ControlError::check(IndexKind::Quad, 3, 3).unwrap_err();
        assert_eq!(
            err,
            ControlError::OutOfRange {
                kind: IndexKind::Quad,
                index: 3,
                len: 3
            }
        );
        assert_eq!(err.to_string(), "quad index 3 out of range (0..3)");
    }

    #[test]
    fn test_graph_error_converts() {
        let err: ControlError = GraphError::InvalidUnit.into();
        assert_eq!(err.to_string(), "invalid unit handle");
    }
}
