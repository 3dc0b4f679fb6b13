//! Error types for autopipe core
//!
//! Provides error handling for:
//! - Caller-contract violations (unknown pipeline, wrong status)
//! - Stage failures after retries are exhausted
//! - Task executor and timeout failures inside a stage attempt
//! - Configuration loading

use crate::types::{PipelineId, PipelineStatus};
use autopipe_artifact::Stage;
use std::time::Duration;

/// Main pipeline engine error type
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No pipeline with this id
    #[error("pipeline {0} not found")]
    NotFound(PipelineId),

    /// `execute` called while the pipeline is already running
    #[error("pipeline {0} is already running")]
    AlreadyRunning(PipelineId),

    /// `pause` called on a pipeline that is not running
    #[error("pipeline {0} is not running")]
    NotRunning(PipelineId),

    /// `resume` called on a pipeline that is not paused
    #[error("pipeline {0} is not paused")]
    NotPaused(PipelineId),

    /// Pipeline already reached `Completed` or `Failed`
    #[error("pipeline {id} is {status} and can no longer change")]
    Terminal { id: PipelineId, status: PipelineStatus },

    /// A stage failed after exhausting its retries
    #[error("stage {stage} failed after {retries} retries: {message}")]
    StageFailed {
        stage: Stage,
        retries: u32,
        message: String,
    },

    /// Pipeline was cancelled while a stage was in flight
    #[error("pipeline {0} was cancelled")]
    Cancelled(PipelineId),

    /// Pipeline configuration rejected at creation
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    /// Check if error is a caller-contract violation
    ///
    /// These are reported immediately and never retried.
    #[inline]
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::AlreadyRunning(_)
                | Self::NotRunning(_)
                | Self::NotPaused(_)
                | Self::Terminal { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Check if error reports a stage that exhausted its retries
    #[inline]
    #[must_use]
    pub fn is_stage_failure(&self) -> bool {
        matches!(self, Self::StageFailed { .. })
    }
}

/// Failure of a single stage attempt
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Executor did not answer within the stage timeout
    #[error("stage {stage} timed out after {}ms", after.as_millis())]
    Timeout { stage: Stage, after: Duration },

    /// Executor returned an error
    #[error("stage {stage} executor error: {source}")]
    Executor {
        stage: Stage,
        #[source]
        source: ExecutorError,
    },
}

impl StageError {
    /// Stage the attempt belonged to
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Timeout { stage, .. } | Self::Executor { stage, .. } => *stage,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors raised by a task executor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// Request never reached the provider or the connection dropped
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider answered with an error status
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// Provider answered but the body was unusable
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Any other executor failure
    #[error("{0}")]
    Other(String),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config values are out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_classified() {
        let id = PipelineId::new();
        assert!(PipelineError::NotFound(id).is_caller_error());
        assert!(PipelineError::NotPaused(id).is_caller_error());
        assert!(PipelineError::Terminal {
            id,
            status: PipelineStatus::Completed
        }
        .is_caller_error());
        assert!(!PipelineError::Cancelled(id).is_caller_error());
    }

    #[test]
    fn stage_failure_message_names_stage_and_retries() {
        let err = PipelineError::StageFailed {
            stage: Stage::Coding,
            retries: 3,
            message: "provider returned 503: overloaded".to_string(),
        };
        assert!(err.is_stage_failure());
        assert!(!err.is_caller_error());
        let msg = err.to_string();
        assert!(msg.contains("coding"));
        assert!(msg.contains("3 retries"));
        assert!(msg.contains("overloaded"));
    }

    #[test]
    fn not_running_is_actionable() {
        let id = PipelineId::new();
        let msg = PipelineError::NotRunning(id).to_string();
        assert!(msg.contains("is not running"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn stage_error_display() {
        let err = StageError::Timeout {
            stage: Stage::Design,
            after: Duration::from_millis(50),
        };
        assert!(err.is_timeout());
        assert_eq!(err.stage(), Stage::Design);
        assert_eq!(err.to_string(), "stage design timed out after 50ms");

        let err = StageError::Executor {
            stage: Stage::Testing,
            source: ExecutorError::Provider {
                status: 429,
                message: "rate limited".to_string(),
            },
        };
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("429"));
    }
}
