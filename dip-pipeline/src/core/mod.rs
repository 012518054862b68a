//! Core identity and state types shared by the graph model and the pipeline.

mod ids;
mod state;

pub use ids::{PortHandle, ProcessorId};
pub use state::{PipelineState, ProcessorState};
