//! Pipeline layout strategies.
//!
//! The main axis of a layout arranges the stages; the secondary axis orders
//! the processors within a stage. Only the secondary axis matters here: it
//! is the comparator handed to the stage builder.

use crate::graph::ProcessorNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// How a pipeline is laid out, and thus how processors are ordered within a
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStrategy {
    /// Stages from left to right; in-stage order by vertical position.
    #[default]
    #[serde(alias = "LEFTRIGHT")]
    LeftRight,
    /// Stages from top to bottom; in-stage order by horizontal position.
    #[serde(alias = "TOPDOWN")]
    TopDown,
}

impl LayoutStrategy {
    /// Looks up a strategy by name, falling back to the default for
    /// unknown names. Case, `_` and `-` are ignored.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match normalize_name(name).as_str() {
            "TOPDOWN" => Self::TopDown,
            "LEFTRIGHT" => Self::LeftRight,
            _ => Self::default(),
        }
    }

    /// Compares two processors along the secondary axis.
    #[must_use]
    pub fn compare(self, a: &ProcessorNode, b: &ProcessorNode) -> Ordering {
        match self {
            Self::LeftRight => a.position().y.total_cmp(&b.position().y),
            Self::TopDown => a.position().x.total_cmp(&b.position().x),
        }
    }

    /// Returns the comparator as a closure, for
    /// [`PipelineStages::build`](super::PipelineStages::build).
    pub fn comparator(self) -> impl Fn(&ProcessorNode, &ProcessorNode) -> Ordering {
        move |a, b| self.compare(a, b)
    }
}

impl fmt::Display for LayoutStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftRight => write!(f, "LEFTRIGHT"),
            Self::TopDown => write!(f, "TOPDOWN"),
        }
    }
}

/// Upper-cases and strips separators, so `left_right`, `left-right` and
/// `LEFTRIGHT` all match.
pub(crate) fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
