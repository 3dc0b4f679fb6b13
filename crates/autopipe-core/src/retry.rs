//! Retry policy and retry controller
//!
//! Wraps the [`StageRunner`] with bounded retry and capped exponential
//! backoff, collapsing the attempt sequence into one [`StageResult`].

use crate::runner::StageRunner;
use crate::types::{PipelineConfig, StageResult};
use autopipe_artifact::{ArtifactSet, Stage};
use std::time::Duration;
use tokio::time::Instant;

/// Bounded retry with capped exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Create new retry policy
    #[inline]
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no retries
    #[inline]
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Whether another attempt may follow failed attempt `attempt` (0-based)
    #[inline]
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Delay after failed attempt `attempt`: `min(base * 2^attempt, max)`
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    /// 3 retries, 1s base delay, 10s cap
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }
}

/// Runs a stage to completion under a retry policy
#[derive(Debug, Clone)]
pub struct RetryController {
    runner: StageRunner,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryController {
    /// Create new retry controller with the given backoff shape
    #[inline]
    #[must_use]
    pub fn new(runner: StageRunner, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            runner,
            base_delay,
            max_delay,
        }
    }

    /// Policy for a pipeline's configuration
    ///
    /// `auto_retry = false` yields a single attempt.
    #[inline]
    #[must_use]
    pub fn policy_for(&self, config: &PipelineConfig) -> RetryPolicy {
        RetryPolicy::new(config.retry_budget(), self.base_delay, self.max_delay)
    }

    /// Run `stage` until it succeeds or the retry budget is spent
    ///
    /// Never fails: exhaustion is reported as an unsuccessful result
    /// carrying the last error message.
    pub async fn run(
        &self,
        stage: Stage,
        config: &PipelineConfig,
        artifacts: &ArtifactSet,
    ) -> StageResult {
        let policy = self.policy_for(config);
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            match self.runner.run(stage, config, artifacts).await {
                Ok(output) => {
                    return StageResult {
                        stage,
                        success: true,
                        output: output.content,
                        artifacts: output.artifacts,
                        error: None,
                        duration: started.elapsed(),
                        retry_count: attempt,
                    };
                }
                Err(e) if policy.should_retry(attempt) => {
                    let delay = policy.delay(attempt);
                    tracing::warn!(
                        %stage,
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Stage attempt failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(%stage, attempts = attempt + 1, "Stage retries exhausted: {}", e);
                    return StageResult {
                        stage,
                        success: false,
                        output: String::new(),
                        artifacts: None,
                        error: Some(e.to_string()),
                        duration: started.elapsed(),
                        retry_count: attempt,
                    };
                }
            }
        }
    }
}
