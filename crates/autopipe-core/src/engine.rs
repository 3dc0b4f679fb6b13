//! Pipeline engine
//!
//! The state machine that owns every pipeline record:
//! - Creates pipelines and walks them through the fixed stage sequence
//! - Observes pause and cancel requests at stage boundaries
//! - Resumes paused pipelines from the first incomplete stage
//! - Produces reports on demand
//!
//! Only one `execute` call drives a given pipeline at a time. The record's
//! `driver_active` flag is set and cleared inside the same store update
//! that changes the status, so pause/resume races cannot start a second driver.
//! A driver whose future is dropped mid-stage gives up its claim and leaves
//! the pipeline paused.

use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::executor::TaskExecutor;
use crate::report::PipelineReport;
use crate::retry::RetryController;
use crate::runner::StageRunner;
use crate::store::{InMemoryStore, PipelineRecord, PipelineStore};
use crate::types::{Pipeline, PipelineConfig, PipelineId, PipelineStatus, StageResult};
use autopipe_artifact::{ArtifactSet, Stage};
use std::sync::Arc;
use std::time::Duration;

/// How a caller is trying to start the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Execute,
    Resume,
}

/// Decision taken at a stage boundary
enum Boundary {
    Halt,
    Skip,
    Run {
        config: PipelineConfig,
        artifacts: ArtifactSet,
    },
}

/// Claim on a pipeline's driver slot
///
/// Dropped without [`release`](Self::release) only when the driving future is
/// dropped mid-stage; the slot is then freed and a running pipeline is
/// parked as paused so it can be resumed.
struct DriverClaim<'a, S: PipelineStore> {
    store: &'a S,
    id: PipelineId,
    released: bool,
}

impl<'a, S: PipelineStore> DriverClaim<'a, S> {
    fn new(store: &'a S, id: PipelineId) -> Self {
        Self {
            store,
            id,
            released: false,
        }
    }

    /// `drive` returned; every exit path already cleared `driver_active`
    fn release(mut self) {
        self.released = true;
    }
}

impl<S: PipelineStore> Drop for DriverClaim<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let parked = self.store.update(self.id, |rec| {
            rec.driver_active = false;
            if rec.pipeline.status() == PipelineStatus::Running {
                rec.pipeline.set_status(PipelineStatus::Paused);
            }
            Ok(rec.pipeline.status())
        });
        if let Ok(status) = parked {
            tracing::warn!(pipeline_id = %self.id, %status, "Driver dropped mid-stage");
        }
    }
}

/// Staged pipeline engine
///
/// Records are reachable only through the engine's operations; there is no
/// handle to the backing store.
///
/// ```compile_fail
/// # fn check(engine: autopipe_core::PipelineEngine) {
/// let _ = engine.store();
/// # }
/// ```
pub struct PipelineEngine<S: PipelineStore = InMemoryStore> {
    store: Arc<S>,
    controller: RetryController,
    config: EngineConfig,
}

impl<S: PipelineStore> Clone for PipelineEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            controller: self.controller.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: PipelineStore> std::fmt::Debug for PipelineEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PipelineEngine<InMemoryStore> {
    /// Create engine with default configuration and an in-memory store
    #[inline]
    #[must_use]
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self::with_config(executor, EngineConfig::default())
    }

    /// Create engine with an in-memory store
    #[inline]
    #[must_use]
    pub fn with_config(executor: Arc<dyn TaskExecutor>, config: EngineConfig) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), executor, config)
    }
}

impl<S: PipelineStore> PipelineEngine<S> {
    /// Create engine over a caller-provided store
    #[must_use]
    pub fn with_store(store: Arc<S>, executor: Arc<dyn TaskExecutor>, config: EngineConfig) -> Self {
        let runner = StageRunner::new(executor, config.completion);
        let controller = RetryController::new(
            runner,
            Duration::from_millis(config.retry.base_delay_ms),
            Duration::from_millis(config.retry.max_delay_ms),
        );
        Self {
            store,
            controller,
            config,
        }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    /// Pipeline config seeded from this engine's defaults
    #[inline]
    #[must_use]
    pub fn pipeline_config(&self, task: impl Into<String>) -> PipelineConfig {
        PipelineConfig::from_defaults(task, &self.config)
    }

    /// Create a pending pipeline
    ///
    /// # Errors
    /// Returns `PipelineError::InvalidConfig` for a blank task or zero timeout.
    pub fn create(&self, config: PipelineConfig) -> Result<Pipeline, PipelineError> {
        if config.task.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "task description must not be empty".to_string(),
            ));
        }
        if config.stage_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "stage timeout must be positive".to_string(),
            ));
        }

        let pipeline = Pipeline::new(PipelineId::new());
        tracing::info!(pipeline_id = %pipeline.id(), "Created pipeline: {}", config.task);
        self.store
            .put(PipelineRecord::new(pipeline.clone(), config));
        Ok(pipeline)
    }

    /// Run the pipeline's remaining stages
    ///
    /// Returns the final snapshot: `Completed`, or `Paused` if a pause was
    /// observed at a stage boundary.
    ///
    /// # Errors
    /// - `NotFound` for unknown ids
    /// - `AlreadyRunning` if another call is driving the pipeline
    /// - `Terminal` if the pipeline already completed or failed
    /// - `StageFailed` if a stage exhausted its retries (pipeline is now `Failed`)
    /// - `Cancelled` if the pipeline was cancelled while this call drove it
    pub async fn execute(&self, id: PipelineId) -> Result<Pipeline, PipelineError> {
        self.start(id, Entry::Execute).await
    }

    /// Request a pause; honoured before the next stage starts
    ///
    /// # Errors
    /// `NotFound`, or `NotRunning` unless the pipeline is running.
    pub fn pause(&self, id: PipelineId) -> Result<(), PipelineError> {
        self.store.update(id, |rec| {
            if rec.pipeline.status() != PipelineStatus::Running {
                return Err(PipelineError::NotRunning(id));
            }
            rec.pipeline.set_status(PipelineStatus::Paused);
            Ok(())
        })?;
        tracing::info!(pipeline_id = %id, "Pause requested");
        Ok(())
    }

    /// Continue a paused pipeline from its first incomplete stage
    ///
    /// # Errors
    /// `NotPaused` unless the pipeline is paused; otherwise as [`execute`](Self::execute).
    pub async fn resume(&self, id: PipelineId) -> Result<Pipeline, PipelineError> {
        tracing::info!(pipeline_id = %id, "Resuming pipeline");
        self.start(id, Entry::Resume).await
    }

    /// Mark the pipeline failed, whatever its current status
    ///
    /// An in-flight stage is not interrupted; its result is discarded when
    /// it returns and the driving `execute` call reports `Cancelled`.
    ///
    /// # Errors
    /// `NotFound` for unknown ids.
    pub fn cancel(&self, id: PipelineId) -> Result<(), PipelineError> {
        let previous = self.store.update(id, |rec| {
            let previous = rec.pipeline.status();
            rec.pipeline.set_status(PipelineStatus::Failed);
            Ok(previous)
        })?;
        tracing::info!(pipeline_id = %id, %previous, "Pipeline cancelled");
        Ok(())
    }

    /// Snapshot of a pipeline
    #[must_use]
    pub fn get_state(&self, id: PipelineId) -> Option<Pipeline> {
        self.store.get(id).map(|rec| rec.pipeline)
    }

    /// Creation-time config of a pipeline
    #[must_use]
    pub fn config(&self, id: PipelineId) -> Option<PipelineConfig> {
        self.store.get(id).map(|rec| rec.config)
    }

    /// Snapshots of every pipeline, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<Pipeline> {
        self.store.list().into_iter().map(|rec| rec.pipeline).collect()
    }

    /// Report derived from the pipeline's current state
    #[must_use]
    pub fn generate_report(&self, id: PipelineId) -> Option<PipelineReport> {
        self.get_state(id).map(|p| PipelineReport::from_pipeline(&p))
    }

    /// Adopt a pipeline loaded from outside this engine
    ///
    /// Completed stages without a successful result are dropped, and a
    /// pipeline recorded as running comes back paused because its driver
    /// did not survive.
    pub fn restore(&self, mut pipeline: Pipeline, config: PipelineConfig) -> Pipeline {
        pipeline.reconcile();
        if pipeline.status() == PipelineStatus::Running {
            pipeline.set_status(PipelineStatus::Paused);
        }
        tracing::info!(
            pipeline_id = %pipeline.id(),
            status = %pipeline.status(),
            progress = pipeline.progress(),
            "Restored pipeline"
        );
        self.store
            .put(PipelineRecord::new(pipeline.clone(), config));
        pipeline
    }

    async fn start(&self, id: PipelineId, entry: Entry) -> Result<Pipeline, PipelineError> {
        let claimed = self.store.update(id, |rec| {
            let status = rec.pipeline.status();
            match (entry, status) {
                (Entry::Resume, PipelineStatus::Paused)
                | (Entry::Execute, PipelineStatus::Pending | PipelineStatus::Paused) => {}
                (Entry::Resume, _) => return Err(PipelineError::NotPaused(id)),
                (Entry::Execute, PipelineStatus::Running) => {
                    return Err(PipelineError::AlreadyRunning(id))
                }
                (Entry::Execute, status) => return Err(PipelineError::Terminal { id, status }),
            }

            rec.pipeline.set_status(PipelineStatus::Running);
            if rec.driver_active {
                // the previous driver is still inside a stage and will carry on
                return Ok(false);
            }
            rec.driver_active = true;
            Ok(true)
        })?;

        if !claimed {
            return self.get_state(id).ok_or(PipelineError::NotFound(id));
        }

        tracing::info!(pipeline_id = %id, "Pipeline running");
        let claim = DriverClaim::new(self.store.as_ref(), id);
        let outcome = self.drive(id).await;
        claim.release();
        outcome
    }

    async fn drive(&self, id: PipelineId) -> Result<Pipeline, PipelineError> {
        for stage in Stage::ALL {
            match self.boundary(id, stage)? {
                Boundary::Halt => {
                    tracing::info!(pipeline_id = %id, next_stage = %stage, "Pipeline paused");
                    return self.get_state(id).ok_or(PipelineError::NotFound(id));
                }
                Boundary::Skip => {
                    tracing::debug!(pipeline_id = %id, %stage, "Skipping completed stage");
                }
                Boundary::Run { config, artifacts } => {
                    tracing::info!(pipeline_id = %id, %stage, "Starting stage");
                    let result = self.controller.run(stage, &config, &artifacts).await;
                    self.record(id, result)?;
                }
            }
        }

        let pipeline = self.store.update(id, |rec| {
            if rec.pipeline.status() == PipelineStatus::Failed {
                rec.driver_active = false;
                return Err(PipelineError::Cancelled(id));
            }
            rec.pipeline.set_current_stage(None);
            rec.pipeline.set_status(PipelineStatus::Completed);
            rec.driver_active = false;
            Ok(rec.pipeline.clone())
        })?;

        tracing::info!(pipeline_id = %id, "Pipeline completed");
        Ok(pipeline)
    }

    fn boundary(&self, id: PipelineId, stage: Stage) -> Result<Boundary, PipelineError> {
        self.store.update(id, |rec| {
            match rec.pipeline.status() {
                PipelineStatus::Paused => {
                    rec.driver_active = false;
                    return Ok(Boundary::Halt);
                }
                PipelineStatus::Failed => {
                    rec.driver_active = false;
                    return Err(PipelineError::Cancelled(id));
                }
                _ => {}
            }

            if rec.pipeline.is_stage_completed(stage) {
                return Ok(Boundary::Skip);
            }

            rec.pipeline.set_current_stage(Some(stage));
            Ok(Boundary::Run {
                config: rec.config.clone(),
                artifacts: rec.pipeline.artifacts().clone(),
            })
        })
    }

    fn record(&self, id: PipelineId, result: StageResult) -> Result<(), PipelineError> {
        let stage = result.stage;
        let retries = result.retry_count;
        let success = result.success;
        let message = result.error.clone().unwrap_or_default();

        let outcome = self.store.update(id, |rec| {
            if rec.pipeline.status() == PipelineStatus::Failed {
                // cancelled while the stage was in flight
                rec.driver_active = false;
                return Err(PipelineError::Cancelled(id));
            }

            rec.pipeline.record_result(result);
            if success {
                return Ok(());
            }

            rec.pipeline.set_status(PipelineStatus::Failed);
            rec.driver_active = false;
            Err(PipelineError::StageFailed {
                stage,
                retries,
                message,
            })
        });

        match &outcome {
            Ok(()) => tracing::info!(pipeline_id = %id, %stage, retries, "Stage completed"),
            Err(e) => tracing::error!(pipeline_id = %id, %stage, "Pipeline stopped: {}", e),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::executor::{CompletionResponse, MockTaskExecutor};

    fn fast_config() -> EngineConfig {
        EngineConfig::default().with_retry(Duration::from_millis(10), Duration::from_millis(100))
    }

    fn always_ok() -> MockTaskExecutor {
        let mut mock = MockTaskExecutor::new();
        mock.expect_complete()
            .returning(|_| Ok(CompletionResponse::new("{}")));
        mock
    }

    #[test]
    fn create_returns_pending_pipeline() {
        let engine = PipelineEngine::new(Arc::new(always_ok()));
        let pipeline = engine.create(PipelineConfig::new("build a login form")).unwrap();

        assert_eq!(pipeline.status(), PipelineStatus::Pending);
        assert!(pipeline.stage_results().is_empty());
        assert_eq!(engine.get_state(pipeline.id()).unwrap(), pipeline);
        assert_eq!(
            engine.config(pipeline.id()).unwrap().task,
            "build a login form"
        );
    }

    #[test]
    fn create_rejects_blank_task() {
        let engine = PipelineEngine::new(Arc::new(always_ok()));
        let err = engine.create(PipelineConfig::new("  ")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));

        let err = engine
            .create(PipelineConfig::new("t").with_stage_timeout(Duration::ZERO))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn execute_runs_all_stages() {
        let engine = PipelineEngine::with_config(Arc::new(always_ok()), fast_config());
        let id = engine.create(PipelineConfig::new("t")).unwrap().id();

        let pipeline = engine.execute(id).await.unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Completed);
        assert_eq!(pipeline.progress(), 100);
        assert_eq!(pipeline.completed_stages(), &Stage::ALL);
        assert_eq!(pipeline.current_stage(), None);
    }

    #[tokio::test]
    async fn caller_errors() {
        let engine = PipelineEngine::new(Arc::new(always_ok()));
        let unknown = PipelineId::new();

        assert!(matches!(engine.execute(unknown).await, Err(PipelineError::NotFound(_))));
        assert!(matches!(engine.pause(unknown), Err(PipelineError::NotFound(_))));
        assert!(matches!(engine.cancel(unknown), Err(PipelineError::NotFound(_))));
        assert!(engine.get_state(unknown).is_none());
        assert!(engine.generate_report(unknown).is_none());

        let id = engine.create(PipelineConfig::new("t")).unwrap().id();
        assert!(matches!(engine.pause(id), Err(PipelineError::NotRunning(_))));
        assert!(matches!(engine.resume(id).await, Err(PipelineError::NotPaused(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stage_failure_fails_pipeline() {
        let mut mock = MockTaskExecutor::new();
        mock.expect_complete()
            .returning(|_| Err(ExecutorError::Other("quota exceeded".to_string())));

        let engine = PipelineEngine::with_config(Arc::new(mock), fast_config());
        let id = engine
            .create(PipelineConfig::new("t").with_max_retries(1))
            .unwrap()
            .id();

        let err = engine.execute(id).await.unwrap_err();
        match err {
            PipelineError::StageFailed {
                stage,
                retries,
                message,
            } => {
                assert_eq!(stage, Stage::Requirements);
                assert_eq!(retries, 1);
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }

        let pipeline = engine.get_state(id).unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Failed);
        assert_eq!(pipeline.stage_results().len(), 1);
        assert!(pipeline.completed_stages().is_empty());

        assert!(matches!(
            engine.execute(id).await,
            Err(PipelineError::Terminal {
                status: PipelineStatus::Failed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cancel_pending_is_terminal() {
        let engine = PipelineEngine::new(Arc::new(always_ok()));
        let id = engine.create(PipelineConfig::new("t")).unwrap().id();

        engine.cancel(id).unwrap();
        assert_eq!(engine.get_state(id).unwrap().status(), PipelineStatus::Failed);
        assert!(matches!(engine.execute(id).await, Err(PipelineError::Terminal { .. })));
        assert!(matches!(engine.pause(id), Err(PipelineError::NotRunning(_))));
        assert!(matches!(engine.resume(id).await, Err(PipelineError::NotPaused(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_applies_to_completed_pipelines_too() {
        let engine = PipelineEngine::with_config(Arc::new(always_ok()), fast_config());
        let id = engine.create(PipelineConfig::new("t")).unwrap().id();
        engine.execute(id).await.unwrap();

        engine.cancel(id).unwrap();
        let pipeline = engine.get_state(id).unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Failed);
        assert_eq!(pipeline.progress(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_reconciles_and_pauses_running_pipelines() {
        let engine = PipelineEngine::with_config(Arc::new(always_ok()), fast_config());
        let mut pipeline = Pipeline::new(PipelineId::new());
        pipeline.set_status(PipelineStatus::Running);

        let restored = engine.restore(pipeline, PipelineConfig::new("t"));
        assert_eq!(restored.status(), PipelineStatus::Paused);

        let done = engine.resume(restored.id()).await.unwrap();
        assert_eq!(done.status(), PipelineStatus::Completed);
        assert_eq!(engine.list().len(), 1);
    }
}
