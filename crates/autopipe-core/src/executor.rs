//! Task execution client interface
//!
//! The engine never generates text itself. It hands a [`CompletionRequest`]
//! to an injected [`TaskExecutor`] and works with whatever text comes back.

use crate::error::ExecutorError;
use serde::{Deserialize, Serialize};

/// Request sent to a task executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Generated text returned by a task executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
}

impl CompletionResponse {
    #[inline]
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Remote or local completion service
///
/// Any error is treated by the engine as a retryable stage failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Generate text for a request
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, ExecutorError>;
}
