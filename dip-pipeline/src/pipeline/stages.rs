//! Stage building.
//!
//! The processors of a pipeline fall naturally into consecutive stages: every
//! processor's connected inputs are served by processors of earlier stages, so
//! all processors of a stage can run once the preceding stages are done.

use crate::core::{ProcessorId, ProcessorState};
use crate::errors::StagingIncomplete;
use crate::graph::{InputPort, PortMap, ProcessorNode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// A group of processors whose dependencies are served by earlier stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    number: u32,
    processors: Vec<ProcessorId>,
}

impl Stage {
    pub(crate) const fn new(number: u32, processors: Vec<ProcessorId>) -> Self {
        Self { number, processors }
    }

    /// Returns the stage number (starts with 1, unlike its index).
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Returns the members in intra-stage order.
    #[must_use]
    pub fn processors(&self) -> &[ProcessorId] {
        &self.processors
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true if the stage has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Returns true if the processor is a member of this stage.
    #[must_use]
    pub fn contains(&self, id: ProcessorId) -> bool {
        self.processors.contains(&id)
    }

    /// Returns a display title, e.g. "Stage 2".
    #[must_use]
    pub fn title(&self) -> String {
        format!("Stage {}", self.number)
    }

    /// Returns the implied state of the stage: the member state with the
    /// highest weight, i.e. that of the least processed member.
    ///
    /// Members for which `state_of` returns `None` are ignored. A stage
    /// without known states is `Unavailable`.
    pub fn state<F>(&self, state_of: F) -> ProcessorState
    where
        F: Fn(ProcessorId) -> Option<ProcessorState>,
    {
        let max = self
            .processors
            .iter()
            .filter_map(|id| state_of(*id))
            .map(ProcessorState::weight)
            .max()
            .unwrap_or(0);
        ProcessorState::from_weight(max)
    }
}

/// The ordered stages of one pipeline snapshot.
///
/// If the dependency graph has a cycle, or a connected input can never be
/// served, the stages are incomplete: `is_complete()` is false and `stuck()`
/// lists the processors that could not be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStages {
    stages: Vec<Stage>,
    complete: bool,
    stuck: Vec<ProcessorId>,
}

impl PipelineStages {
    /// Builds the stages of a set of processors.
    ///
    /// `outputs` maps output handles to their owners (see
    /// [`build_output_port_map`](crate::graph::build_output_port_map)).
    /// `compare` orders the members of each stage; it is applied with a stable
    /// sort, so equal members keep their pipeline order.
    pub fn build<F>(nodes: &[ProcessorNode], outputs: &PortMap, mut compare: F) -> Self
    where
        F: FnMut(&ProcessorNode, &ProcessorNode) -> Ordering,
    {
        let mut ready: HashSet<ProcessorId> = HashSet::with_capacity(nodes.len());
        let mut todo: Vec<&ProcessorNode> = nodes.iter().collect();
        let mut stages = Vec::new();
        let mut number = 1;

        while !todo.is_empty() {
            let (mut members, rest): (Vec<&ProcessorNode>, Vec<&ProcessorNode>) = todo
                .into_iter()
                .partition(|node| is_ready(node, outputs, &ready));

            if members.is_empty() {
                let stuck: Vec<ProcessorId> = rest.iter().map(|node| node.id()).collect();
                warn!(
                    staged = stages.len(),
                    stuck = ?stuck,
                    "Failed to build stages, invalid pipeline"
                );
                return Self {
                    stages,
                    complete: false,
                    stuck,
                };
            }

            ready.extend(members.iter().map(|node| node.id()));
            members.sort_by(|a, b| compare(*a, *b));
            stages.push(Stage::new(
                number,
                members.iter().map(|node| node.id()).collect(),
            ));
            number += 1;
            todo = rest;
        }

        debug!(stages = stages.len(), processors = nodes.len(), "Built pipeline stages");
        Self {
            stages,
            complete: true,
            stuck: Vec::new(),
        }
    }

    /// Stages of a pipeline without processors.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            stages: Vec::new(),
            complete: true,
            stuck: Vec::new(),
        }
    }

    /// Returns true if every processor was placed in a stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the processors that could not be placed.
    #[must_use]
    pub fn stuck(&self) -> &[ProcessorId] {
        &self.stuck
    }

    /// Returns the stages.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if there are no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns a stage by index (not by number).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Returns a stage by its number.
    #[must_use]
    pub fn by_number(&self, number: u32) -> Option<&Stage> {
        let index = usize::try_from(number.checked_sub(1)?).ok()?;
        self.stages.get(index)
    }

    /// Iterates over the stages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Stage> {
        self.stages.iter()
    }

    /// Returns the number of the stage a processor was placed in.
    #[must_use]
    pub fn stage_of(&self, id: ProcessorId) -> Option<u32> {
        self.stages
            .iter()
            .find(|stage| stage.contains(id))
            .map(Stage::number)
    }

    /// Returns the number of processors placed in some stage.
    #[must_use]
    pub fn placed(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }

    /// Converts into the stage list, or an error if staging was incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`StagingIncomplete`] if some processors could not be placed.
    pub fn into_result(self) -> Result<Vec<Stage>, StagingIncomplete> {
        if self.complete {
            Ok(self.stages)
        } else {
            Err(StagingIncomplete::new(self.stuck, self.stages.len()))
        }
    }
}

impl Default for PipelineStages {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a PipelineStages {
    type Item = &'a Stage;
    type IntoIter = std::slice::Iter<'a, Stage>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.iter()
    }
}

impl fmt::Display for PipelineStages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PipelineStages{{")?;
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "stage {}: [", stage.number)?;
            if stage.is_empty() {
                write!(f, "-")?;
            } else {
                write!(f, "{}", join_ids(&stage.processors))?;
            }
            write!(f, "]")?;
        }
        if !self.complete {
            write!(f, "; stuck: [{}]", join_ids(&self.stuck))?;
        }
        write!(f, "}}")
    }
}

fn join_ids(ids: &[ProcessorId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A processor is ready once every connected input reads from a processor
/// placed in an earlier stage. Unavailable processors are not checked.
fn is_ready(node: &ProcessorNode, outputs: &PortMap, ready: &HashSet<ProcessorId>) -> bool {
    if !node.is_available() {
        return true;
    }
    node.ports()
        .inputs()
        .values()
        .filter_map(InputPort::connection)
        .all(|output| {
            outputs
                .get(&output)
                .is_some_and(|source| ready.contains(&source.processor))
        })
}
