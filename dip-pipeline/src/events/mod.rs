//! Event emission for front-ends and logs.

mod sink;

pub use sink::{EventSink, NoOpEventSink, RecordedEvent, RecordingEventSink};

/// Event type names.
pub mod names {
    /// Stages were rebuilt after a structural change.
    pub const STAGES_REBUILT: &str = "pipeline.stages_rebuilt";
    /// The aggregate pipeline state changed.
    pub const STATE_CHANGED: &str = "pipeline.state_changed";
    /// The pipeline was released.
    pub const RELEASED: &str = "pipeline.released";
    /// A processor was removed.
    pub const PROCESSOR_REMOVED: &str = "processor.removed";
}
