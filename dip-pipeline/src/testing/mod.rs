//! Testing utilities for pipelines.
//!
//! This module provides:
//! - Fixture processors and a pipeline builder
//! - Mock auto-process capabilities

mod fixtures;
mod mocks;

pub use fixtures::{filter, merge, source, TestPipeline, IMAGE};
pub use mocks::StaticAutoProcess;
