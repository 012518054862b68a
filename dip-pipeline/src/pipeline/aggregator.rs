//! Pipeline state aggregation.
//!
//! Every processor is classified into at most one of three buckets. The
//! pipeline state follows from which buckets are non-empty, in priority
//! order: error, then waiting, then auto-processable, else ready.

use crate::core::{PipelineState, ProcessorId, ProcessorState};
use std::collections::HashSet;
use tracing::debug;

/// Classification of a single processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// `Error`, `Unavailable` or `Unconnected`.
    Error,
    /// `Processing`, but needs user input before it can run.
    Waiting,
    /// `Processing`, and able to run on its own.
    AutoProcessable,
}

/// Classifies a processor state. `Ready` and `Waiting` fall in no bucket.
#[must_use]
pub const fn classify(state: ProcessorState, can_auto_process: bool) -> Option<Bucket> {
    match state {
        ProcessorState::Error | ProcessorState::Unavailable | ProcessorState::Unconnected => {
            Some(Bucket::Error)
        }
        ProcessorState::Processing if can_auto_process => Some(Bucket::AutoProcessable),
        ProcessorState::Processing => Some(Bucket::Waiting),
        ProcessorState::Waiting | ProcessorState::Ready => None,
    }
}

/// Derives the pipeline state from per-processor states.
///
/// Not thread-safe: updates from worker threads must be marshaled to the
/// owning thread first (see [`StateUpdateReceiver`](super::StateUpdateReceiver)).
#[derive(Debug, Clone, Default)]
pub struct PipelineStateAggregator {
    error: HashSet<ProcessorId>,
    waiting: HashSet<ProcessorId>,
    auto_processable: HashSet<ProcessorId>,
    state: PipelineState,
}

impl PipelineStateAggregator {
    /// Creates an aggregator in state `None`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current pipeline state.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Returns the bucket a processor is currently in.
    #[must_use]
    pub fn bucket_of(&self, id: ProcessorId) -> Option<Bucket> {
        if self.error.contains(&id) {
            Some(Bucket::Error)
        } else if self.waiting.contains(&id) {
            Some(Bucket::Waiting)
        } else if self.auto_processable.contains(&id) {
            Some(Bucket::AutoProcessable)
        } else {
            None
        }
    }

    /// Records a processor's new state and recomputes the pipeline state.
    pub fn update(
        &mut self,
        id: ProcessorId,
        state: ProcessorState,
        can_auto_process: bool,
    ) -> PipelineState {
        self.take(id);
        match classify(state, can_auto_process) {
            Some(Bucket::Error) => {
                self.error.insert(id);
            }
            Some(Bucket::Waiting) => {
                self.waiting.insert(id);
            }
            Some(Bucket::AutoProcessable) => {
                self.auto_processable.insert(id);
            }
            None => {}
        }
        self.recompute()
    }

    /// Forgets a processor (e.g. after removal) and recomputes.
    pub fn remove(&mut self, id: ProcessorId) -> PipelineState {
        self.take(id);
        self.recompute()
    }

    /// Forgets all processors and resets the state to `None`.
    pub fn clear(&mut self) {
        self.error.clear();
        self.waiting.clear();
        self.auto_processable.clear();
        self.state = PipelineState::None;
    }

    fn take(&mut self, id: ProcessorId) {
        self.error.remove(&id);
        self.waiting.remove(&id);
        self.auto_processable.remove(&id);
    }

    fn recompute(&mut self) -> PipelineState {
        let state = if !self.error.is_empty() {
            PipelineState::Error
        } else if !self.waiting.is_empty() && self.auto_processable.is_empty() {
            PipelineState::Waiting
        } else if !self.auto_processable.is_empty() {
            PipelineState::Processing
        } else {
            PipelineState::Ready
        };

        if state != self.state {
            debug!(from = %self.state, to = %state, "Pipeline state changed");
        }
        self.state = state;
        state
    }
}
