//! A pipeline shared between threads.

use super::pipeline::Pipeline;
use super::stages::PipelineStages;
use crate::core::PipelineState;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle to a pipeline behind a mutex.
///
/// All access goes through closures so that locks are never held across
/// caller code that might block.
#[derive(Debug, Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<Pipeline>>,
}

impl SharedPipeline {
    /// Wraps a pipeline.
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Runs `f` with shared access.
    pub fn with<R>(&self, f: impl FnOnce(&Pipeline) -> R) -> R {
        f(&*self.inner.lock())
    }

    /// Runs `f` with exclusive access.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> R {
        f(&mut *self.inner.lock())
    }

    /// Returns a copy of the current stages, rebuilding them if dirty.
    pub fn stages_snapshot(&self) -> PipelineStages {
        self.with_mut(|pipeline| pipeline.stages().clone())
    }

    /// Returns the aggregate pipeline state.
    pub fn pipeline_state(&self) -> PipelineState {
        self.with(Pipeline::pipeline_state)
    }

    /// Subscribes to pipeline state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.with(Pipeline::subscribe_state)
    }
}

impl From<Pipeline> for SharedPipeline {
    fn from(pipeline: Pipeline) -> Self {
        Self::new(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProcessorId, ProcessorState};
    use crate::graph::ProcessorNode;
    use std::thread;

    #[test]
    fn test_shared_across_threads() {
        let shared = SharedPipeline::new(Pipeline::new(1, "p"));

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    shared.with_mut(|pipeline| {
                        pipeline
                            .add_processor(ProcessorNode::new(ProcessorId(i), format!("p{i}")))
                            .unwrap();
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.with(Pipeline::len), 4);
        let stages = shared.stages_snapshot();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages.placed(), 4);
    }

    #[test]
    fn test_state_through_handle() {
        let shared: SharedPipeline = Pipeline::new(1, "p").into();
        let rx = shared.subscribe_state();

        shared.with_mut(|pipeline| {
            pipeline
                .add_processor(ProcessorNode::new(ProcessorId(0), "p"))
                .unwrap();
            pipeline.set_processor_state(ProcessorId(0), ProcessorState::Error);
        });

        assert_eq!(shared.pipeline_state(), PipelineState::Error);
        assert_eq!(*rx.borrow(), PipelineState::Error);
    }
}
