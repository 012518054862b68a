//! # dip-pipeline
//!
//! The UI-independent core of DIVA-DIP image-processing pipelines.
//!
//! A pipeline is a graph of processors wired output port to input port.
//! This crate provides:
//!
//! - **Graph model**: processors, typed ports and port ownership maps
//! - **Stage building**: grouping processors into dependency layers, with an
//!   explicit completeness flag for cycles and unsatisfiable inputs
//! - **State aggregation**: deriving one pipeline state from per-processor
//!   states
//! - **Layout and version policies**: the pipeline-level settings the stages
//!   depend on
//!
//! ## Quick Start
//!
//! ```rust
//! use dip_pipeline::prelude::*;
//!
//! let mut pipeline = Pipeline::new(1, "binarization");
//! pipeline.add_processor(
//!     ProcessorNode::new(ProcessorId(0), "load").with_output("image", "image/gray"),
//! )?;
//! pipeline.add_processor(
//!     ProcessorNode::new(ProcessorId(1), "otsu")
//!         .with_input("image", "image/gray", true)
//!         .with_output("binary", "image/binary"),
//! )?;
//! pipeline.connect(ProcessorId(0), "image", ProcessorId(1), "image")?;
//!
//! let stages = pipeline.stages();
//! assert!(stages.is_complete());
//! assert_eq!(stages.stage_of(ProcessorId(1)), Some(2));
//! # Ok::<(), PipelineError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{LoggingConfig, PipelineSettings};
    pub use crate::core::{PipelineState, PortHandle, ProcessorId, ProcessorState};
    pub use crate::errors::{ConnectionError, ErrorInfo, PipelineError, StagingIncomplete};
    pub use crate::events::{EventSink, NoOpEventSink, RecordingEventSink};
    pub use crate::graph::{AutoProcess, DataType, LayoutPosition, PortSet, ProcessorNode};
    pub use crate::observability::init_logging;
    pub use crate::pipeline::{
        state_update_channel, LayoutStrategy, Pipeline, PipelineStages, PipelineStateAggregator,
        SharedPipeline, Stage, StateUpdateReceiver, StateUpdateSender, VersionPolicy,
    };
}
