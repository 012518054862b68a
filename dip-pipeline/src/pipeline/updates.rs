//! Marshaling processor state updates from worker threads.
//!
//! Processors run on worker threads but the aggregator is owned by the
//! pipeline. Workers send [`StateUpdate`]s through a channel and the owning
//! thread applies them with [`StateUpdateReceiver::drain_into`] or by
//! awaiting [`StateUpdateReceiver::recv`].

use super::pipeline::Pipeline;
use crate::core::{ProcessorId, ProcessorState};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

/// A processor state change reported by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// The processor.
    pub processor: ProcessorId,
    /// Its new state.
    pub state: ProcessorState,
}

/// Sending half, cloneable and usable from any thread.
#[derive(Debug, Clone)]
pub struct StateUpdateSender {
    tx: mpsc::UnboundedSender<StateUpdate>,
}

impl StateUpdateSender {
    /// Queues an update. Returns false if the receiver is gone.
    pub fn send(&self, processor: ProcessorId, state: ProcessorState) -> bool {
        self.tx.send(StateUpdate { processor, state }).is_ok()
    }
}

/// Receiving half, owned by the thread that owns the pipeline.
#[derive(Debug)]
pub struct StateUpdateReceiver {
    rx: mpsc::UnboundedReceiver<StateUpdate>,
}

impl StateUpdateReceiver {
    /// Waits for the next update. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<StateUpdate> {
        self.rx.recv().await
    }

    /// Applies every queued update to `pipeline` without blocking.
    /// Returns the number of updates consumed.
    pub fn drain_into(&mut self, pipeline: &mut Pipeline) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.rx.try_recv() {
            trace!(processor = %update.processor, state = %update.state, "Applying state update");
            pipeline.set_processor_state(update.processor, update.state);
            applied += 1;
        }
        applied
    }
}

/// Creates a connected sender/receiver pair.
#[must_use]
pub fn state_update_channel() -> (StateUpdateSender, StateUpdateReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StateUpdateSender { tx }, StateUpdateReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineState;
    use crate::graph::ProcessorNode;

    fn pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new(1, "p");
        pipeline.add_processor(ProcessorNode::new(ProcessorId(0), "a")).unwrap();
        pipeline.add_processor(ProcessorNode::new(ProcessorId(1), "b")).unwrap();
        pipeline
    }

    #[test]
    fn test_drain_from_worker_threads() {
        let mut pipeline = pipeline();
        let (tx, mut rx) = state_update_channel();

        let workers: Vec<_> = [ProcessorId(0), ProcessorId(1)]
            .into_iter()
            .map(|id| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    assert!(tx.send(id, ProcessorState::Processing));
                    assert!(tx.send(id, ProcessorState::Ready));
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(rx.drain_into(&mut pipeline), 4);
        assert_eq!(rx.drain_into(&mut pipeline), 0);
        assert_eq!(pipeline.pipeline_state(), PipelineState::Ready);
        assert_eq!(
            pipeline.processor(ProcessorId(1)).unwrap().state(),
            ProcessorState::Ready
        );
    }

    #[tokio::test]
    async fn test_recv() {
        let (tx, mut rx) = state_update_channel();
        tx.send(ProcessorId(3), ProcessorState::Error);
        drop(tx);

        assert_eq!(
            rx.recv().await,
            Some(StateUpdate {
                processor: ProcessorId(3),
                state: ProcessorState::Error
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_updates_after_release_are_ignored() {
        let mut pipeline = pipeline();
        let (tx, mut rx) = state_update_channel();
        pipeline.release();

        tx.send(ProcessorId(0), ProcessorState::Error);
        assert_eq!(rx.drain_into(&mut pipeline), 1);
        assert_eq!(pipeline.pipeline_state(), PipelineState::None);
    }

    #[test]
    fn test_send_without_receiver() {
        let (tx, rx) = state_update_channel();
        drop(rx);
        assert!(!tx.send(ProcessorId(0), ProcessorState::Ready));
    }
}
