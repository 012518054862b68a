//! Error types for pipeline graph operations.
//!
//! Staging failures are data, not faults: [`PipelineStages`](crate::pipeline::PipelineStages)
//! carries a completeness flag, and [`StagingIncomplete`] only appears when a
//! caller explicitly asks for a `Result`.

use crate::core::ProcessorId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A processor with this id is already part of the pipeline.
    #[error("Processor {0} already exists in the pipeline")]
    DuplicateProcessor(ProcessorId),

    /// No processor with this id is part of the pipeline.
    #[error("Unknown processor: {0}")]
    UnknownProcessor(ProcessorId),

    /// A connection could not be made.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// The dependency graph could not be staged completely.
    #[error("{0}")]
    StagingIncomplete(#[from] StagingIncomplete),

    /// Every processor id is taken.
    #[error("No processor ids left")]
    IdsExhausted,

    /// The pipeline is being (or has been) released.
    #[error("Pipeline has been released")]
    Released,

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about an error for user-facing diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "DIP-STAGE-INCOMPLETE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON value for event payloads and UI consumers.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Errors raised while wiring ports together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The processor has no port with this key.
    #[error("Processor {processor} has no {direction} port '{port}'")]
    UnknownPort {
        /// The processor id.
        processor: ProcessorId,
        /// The requested port key.
        port: String,
        /// "input" or "output".
        direction: &'static str,
    },

    /// The processor implementation is missing, so its ports cannot be wired.
    #[error("Processor {processor} is unavailable")]
    ProcessorUnavailable {
        /// The processor id.
        processor: ProcessorId,
    },

    /// The output and input ports carry different data types.
    #[error("Type mismatch: output provides '{output}', input expects '{input}'")]
    TypeMismatch {
        /// Data type of the output port.
        output: String,
        /// Data type of the input port.
        input: String,
    },
}

impl ConnectionError {
    /// Creates an unknown input port error.
    #[must_use]
    pub fn unknown_input(processor: ProcessorId, port: impl Into<String>) -> Self {
        Self::UnknownPort {
            processor,
            port: port.into(),
            direction: "input",
        }
    }

    /// Creates an unknown output port error.
    #[must_use]
    pub fn unknown_output(processor: ProcessorId, port: impl Into<String>) -> Self {
        Self::UnknownPort {
            processor,
            port: port.into(),
            direction: "output",
        }
    }

    /// Returns UI diagnostics for the rejected connection.
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        let mut info = ErrorInfo::new(codes::CONNECTION_REJECTED, self.to_string());
        if let Some(hint) = ErrorSuggestions::get(codes::CONNECTION_REJECTED) {
            info = info.with_fix_hint(hint);
        }
        info
    }
}

/// Raised when the stage builder could not place every processor.
///
/// Either the graph has a cycle, or some connected input points at an
/// output that never becomes ready (e.g. its processor is unavailable).
#[derive(Debug, Clone, Error)]
#[error(
    "Failed to build stages: {} processor(s) have unsatisfiable dependencies ({})",
    stuck.len(),
    format_ids(stuck)
)]
pub struct StagingIncomplete {
    /// Processors that could not be placed in any stage.
    pub stuck: Vec<ProcessorId>,
    /// Number of stages that were built before progress stopped.
    pub staged: usize,
    /// Diagnostics for the UI.
    pub error_info: ErrorInfo,
}

impl StagingIncomplete {
    /// Creates a new staging error.
    #[must_use]
    pub fn new(stuck: Vec<ProcessorId>, staged: usize) -> Self {
        let info = ErrorInfo::new(
            codes::STAGE_INCOMPLETE,
            format!("Processors {} can never become ready", format_ids(&stuck)),
        )
        .with_fix_hint("Check the wiring for cycles or inputs connected to unavailable processors.")
        .with_context_entry("staged", staged.to_string());

        Self {
            stuck,
            staged,
            error_info: info,
        }
    }
}

fn format_ids(ids: &[ProcessorId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error codes used in [`ErrorInfo`].
pub mod codes {
    /// Staging stopped before every processor was placed.
    pub const STAGE_INCOMPLETE: &str = "DIP-STAGE-INCOMPLETE";
    /// A connection was rejected.
    pub const CONNECTION_REJECTED: &str = "DIP-CONNECTION-REJECTED";
}

/// Provides default suggestions for error codes.
pub struct ErrorSuggestions;

impl ErrorSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            codes::STAGE_INCOMPLETE => Some(
                "Remove one of the connections forming a cycle, or replace \
                 processors whose implementation is unavailable.",
            ),
            codes::CONNECTION_REJECTED => Some(
                "Connect ports with identical data types, and only between available processors.",
            ),
            _ => None,
        }
    }
}
