//! Stage runner
//!
//! Executes one attempt of one stage: builds prompts, calls the task
//! executor under a timeout, and decodes artifacts from the response.

use crate::config::CompletionSettings;
use crate::error::StageError;
use crate::executor::{CompletionRequest, TaskExecutor};
use crate::prompt;
use crate::types::PipelineConfig;
use autopipe_artifact::{ArtifactSet, Stage, StageArtifacts};
use std::sync::Arc;

/// Output of a successful stage attempt
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput {
    /// Raw executor text
    pub content: String,
    /// Decoded artifacts; `None` if the text held no usable JSON object
    pub artifacts: Option<StageArtifacts>,
}

/// Runs single stage attempts against a task executor
#[derive(Clone)]
pub struct StageRunner {
    executor: Arc<dyn TaskExecutor>,
    completion: CompletionSettings,
}

impl std::fmt::Debug for StageRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRunner")
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

impl StageRunner {
    /// Create new stage runner
    #[inline]
    #[must_use]
    pub fn new(executor: Arc<dyn TaskExecutor>, completion: CompletionSettings) -> Self {
        Self {
            executor,
            completion,
        }
    }

    /// Completion request for a stage
    #[must_use]
    pub fn request(
        &self,
        stage: Stage,
        config: &PipelineConfig,
        artifacts: &ArtifactSet,
    ) -> CompletionRequest {
        let prompts = prompt::build(stage, config, artifacts);
        CompletionRequest {
            system_prompt: prompts.system,
            user_prompt: prompts.user,
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
        }
    }

    /// Run one attempt of `stage`
    ///
    /// The executor call is raced against `config.stage_timeout`. When the
    /// timer wins, the executor future is dropped; any work it already
    /// handed off elsewhere may keep running, but its result is discarded.
    ///
    /// # Errors
    /// - `StageError::Timeout` if the executor does not answer in time
    /// - `StageError::Executor` if the executor fails
    pub async fn run(
        &self,
        stage: Stage,
        config: &PipelineConfig,
        artifacts: &ArtifactSet,
    ) -> Result<StageOutput, StageError> {
        let request = self.request(stage, config, artifacts);
        tracing::debug!(
            %stage,
            system_len = request.system_prompt.len(),
            user_len = request.user_prompt.len(),
            "Dispatching stage request"
        );

        let response = tokio::time::timeout(config.stage_timeout, self.executor.complete(request))
            .await
            .map_err(|_| StageError::Timeout {
                stage,
                after: config.stage_timeout,
            })?
            .map_err(|source| StageError::Executor { stage, source })?;

        let artifacts = match StageArtifacts::parse(stage, &response.content) {
            Ok(artifacts) => Some(artifacts),
            Err(e) => {
                tracing::debug!(%stage, "No artifacts decoded: {}", e);
                None
            }
        };

        Ok(StageOutput {
            content: response.content,
            artifacts,
        })
    }
}
