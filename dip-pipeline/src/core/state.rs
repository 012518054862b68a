//! Processor and pipeline state enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime state of a single processor.
///
/// States carry a weight; the state of a group of processors (a stage) is
/// the member state with the highest weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorState {
    /// The processor is in an invalid state and needs to be reset.
    Error,
    /// The processor implementation is currently unavailable.
    Unavailable,
    /// The processor has required but unconnected input ports.
    Unconnected,
    /// Connected inputs are not ready yet (or parameters are not satisfied).
    Waiting,
    /// Connected outputs have not been served yet.
    Processing,
    /// All connected outputs have been served.
    Ready,
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::Waiting
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Unconnected => write!(f, "unconnected"),
            Self::Waiting => write!(f, "waiting"),
            Self::Processing => write!(f, "processing"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

impl ProcessorState {
    /// All states, from heaviest to lightest.
    pub const ALL: [Self; 6] = [
        Self::Error,
        Self::Unavailable,
        Self::Unconnected,
        Self::Waiting,
        Self::Processing,
        Self::Ready,
    ];

    /// Returns the weight of the state.
    #[must_use]
    pub const fn weight(self) -> u32 {
        match self {
            Self::Error => 32,
            Self::Unavailable => 16,
            Self::Unconnected => 8,
            Self::Waiting => 4,
            Self::Processing => 2,
            Self::Ready => 1,
        }
    }

    /// Returns the state with the given weight, or `Unavailable` if no
    /// state has that weight.
    #[must_use]
    pub fn from_weight(weight: u32) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.weight() == weight)
            .unwrap_or(Self::Unavailable)
    }

    /// Returns true for `Error`, `Unavailable` and `Unconnected`.
    #[must_use]
    pub const fn is_error_class(self) -> bool {
        matches!(self, Self::Error | Self::Unavailable | Self::Unconnected)
    }
}

/// Aggregate state of a whole pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No state has been computed yet.
    None,
    /// At least one processor is in an error-class state.
    Error,
    /// Processors are waiting for user input and none can auto-process.
    Waiting,
    /// At least one processor can process on its own.
    Processing,
    /// Nothing left to do.
    Ready,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Error => write!(f, "error"),
            Self::Waiting => write!(f, "waiting"),
            Self::Processing => write!(f, "processing"),
            Self::Ready => write!(f, "ready"),
        }
    }
}
