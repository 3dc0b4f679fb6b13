//! autopipe Core - staged pipeline engine
//!
//! Drives a task through a fixed sequence of stages:
//! - Requirements, design, coding, testing, deployment
//! - Bounded retry with capped exponential backoff per stage
//! - Per-attempt timeouts raced against the task executor
//! - Pause, resume and cancel observed at stage boundaries
//! - Artifacts accumulated across stages and summarised in reports
//!
//! # Example
//!
//! ```rust,ignore
//! use autopipe_core::{PipelineConfig, PipelineEngine};
//! use std::sync::Arc;
//!
//! # async fn example(executor: Arc<dyn autopipe_core::TaskExecutor>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PipelineEngine::new(executor);
//!
//! let pipeline = engine.create(PipelineConfig::new("build a login form"))?;
//! let finished = engine.execute(pipeline.id()).await?;
//!
//! println!("{}% complete", finished.progress());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod runner;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use autopipe_artifact::{ArtifactSet, Stage, StageArtifacts};
pub use config::{CompletionSettings, EngineConfig, PipelineDefaults, RetrySettings};
pub use engine::PipelineEngine;
pub use error::{ConfigError, ExecutorError, PipelineError, StageError};
pub use executor::{CompletionRequest, CompletionResponse, TaskExecutor};
pub use report::{PipelineReport, ReportSummary, StageReport};
pub use retry::{RetryController, RetryPolicy};
pub use runner::{StageOutput, StageRunner};
pub use store::{InMemoryStore, PipelineRecord, PipelineStore};
pub use types::{Pipeline, PipelineConfig, PipelineId, PipelineStatus, StageResult};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with autopipe Core
    pub use crate::{
        CompletionRequest, CompletionResponse, EngineConfig, ExecutorError, Pipeline,
        PipelineConfig, PipelineEngine, PipelineError, PipelineId, PipelineReport,
        PipelineStatus, Stage, TaskExecutor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
