//! Pipelines, their stages and aggregate state.
//!
//! This module provides:
//! - The [`Pipeline`] model with connection management
//! - Stage building (layer-at-a-time topological grouping)
//! - Layout strategies and version policies
//! - Pipeline state aggregation
//! - Thread-safe sharing and state update marshaling

mod aggregator;
mod layout;
#[allow(clippy::module_inception)]
mod pipeline;
mod shared;
mod stages;
mod updates;
mod version_policy;


pub use aggregator::{classify, Bucket, PipelineStateAggregator};
pub use layout::LayoutStrategy;
pub use pipeline::Pipeline;
pub use shared::SharedPipeline;
pub use stages::{PipelineStages, Stage};
pub use updates::{state_update_channel, StateUpdate, StateUpdateReceiver, StateUpdateSender};
pub use version_policy::VersionPolicy;
