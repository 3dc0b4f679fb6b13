//! Core types for autopipe
//!
//! Defines the fundamental types for the engine:
//! - Pipeline identifiers and status
//! - Creation-time pipeline configuration
//! - Stage results and the pipeline aggregate

use crate::config::EngineConfig;
use autopipe_artifact::{ArtifactSet, Stage, StageArtifacts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use ulid::Ulid;

/// Unique pipeline identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PipelineId(pub Ulid);

impl PipelineId {
    /// Generate new pipeline ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PipelineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PipelineId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Pipeline lifecycle status
///
/// `Pending -> Running <-> Paused -> Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
}

impl PipelineStatus {
    /// Completed and Failed accept no further transitions
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation-time pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// High-level task description
    pub task: String,
    /// Optional free-text context
    pub context: Option<String>,
    /// Whether failed stage attempts are retried
    pub auto_retry: bool,
    /// Retries after the first attempt when `auto_retry` is set
    pub max_retries: u32,
    /// Per-attempt timeout
    #[serde(with = "duration_ms", rename = "stage_timeout_ms")]
    pub stage_timeout: Duration,
}

impl PipelineConfig {
    /// Default retry budget
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Default per-attempt timeout (5 minutes)
    pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create configuration with default retry and timeout settings
    #[inline]
    #[must_use]
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            context: None,
            auto_retry: true,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            stage_timeout: Self::DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Create configuration using an engine config's defaults
    #[must_use]
    pub fn from_defaults(task: impl Into<String>, engine: &EngineConfig) -> Self {
        Self {
            task: task.into(),
            context: None,
            auto_retry: engine.defaults.auto_retry,
            max_retries: engine.defaults.max_retries,
            stage_timeout: Duration::from_secs(engine.defaults.stage_timeout_secs),
        }
    }

    /// With context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// With auto retry flag
    #[inline]
    #[must_use]
    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// With max retries
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With stage timeout
    #[inline]
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Retries actually allowed by this configuration
    #[inline]
    #[must_use]
    pub fn retry_budget(&self) -> u32 {
        if self.auto_retry {
            self.max_retries
        } else {
            0
        }
    }
}

/// Outcome of one stage's full attempt sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    /// Raw executor output of the last attempt (empty on failure)
    pub output: String,
    pub artifacts: Option<StageArtifacts>,
    /// Last error message when `success` is false
    pub error: Option<String>,
    /// Wall-clock time across all attempts, including backoff
    #[serde(with = "duration_ms", rename = "duration_ms")]
    pub duration: Duration,
    /// Retries consumed after the first attempt
    pub retry_count: u32,
}

/// Pipeline aggregate
///
/// Owned and mutated only by the engine; callers receive snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    id: PipelineId,
    status: PipelineStatus,
    current_stage: Option<Stage>,
    completed_stages: Vec<Stage>,
    stage_results: Vec<StageResult>,
    artifacts: ArtifactSet,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub(crate) fn new(id: PipelineId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: PipelineStatus::Pending,
            current_stage: None,
            completed_stages: Vec::new(),
            stage_results: Vec::new(),
            artifacts: ArtifactSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> PipelineId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Stage executing or about to execute
    #[inline]
    #[must_use]
    pub fn current_stage(&self) -> Option<Stage> {
        self.current_stage
    }

    /// Successfully finished stages, in execution order
    #[inline]
    #[must_use]
    pub fn completed_stages(&self) -> &[Stage] {
        &self.completed_stages
    }

    /// One result per stage attempted to completion, in execution order
    #[inline]
    #[must_use]
    pub fn stage_results(&self) -> &[StageResult] {
        &self.stage_results
    }

    /// Artifacts accumulated from completed stages
    #[inline]
    #[must_use]
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Percentage of stages completed, derived from `completed_stages`
    #[inline]
    #[must_use]
    pub fn progress(&self) -> u8 {
        let pct = self.completed_stages.len() * 100 / Stage::COUNT;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    #[inline]
    #[must_use]
    pub fn is_stage_completed(&self, stage: Stage) -> bool {
        self.completed_stages.contains(&stage)
    }

    /// First stage not yet completed, in execution order
    #[inline]
    #[must_use]
    pub fn next_pending_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| !self.is_stage_completed(*s))
    }

    pub(crate) fn set_status(&mut self, status: PipelineStatus) {
        self.status = status;
        self.touch();
    }

    pub(crate) fn set_current_stage(&mut self, stage: Option<Stage>) {
        self.current_stage = stage;
        self.touch();
    }

    /// Append a stage result; successful stages join `completed_stages`
    /// and contribute their artifacts.
    pub(crate) fn record_result(&mut self, result: StageResult) {
        if result.success && !self.is_stage_completed(result.stage) {
            self.completed_stages.push(result.stage);
            if let Some(artifacts) = &result.artifacts {
                self.artifacts.insert(artifacts.clone());
            }
        }
        self.stage_results.push(result);
        self.touch();
    }

    /// Drop completed stages that have no successful result behind them
    ///
    /// Used when a record is loaded from an external store.
    pub(crate) fn reconcile(&mut self) {
        let succeeded: Vec<Stage> = self
            .stage_results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.stage)
            .collect();
        let before = self.completed_stages.len();
        self.completed_stages.retain(|s| succeeded.contains(s));
        self.completed_stages.dedup();
        if self.completed_stages.len() != before {
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Serde helper storing `Duration` as integer milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(stage: Stage) -> StageResult {
        StageResult {
            stage,
            success: true,
            output: "{}".to_string(),
            artifacts: None,
            error: None,
            duration: Duration::from_millis(10),
            retry_count: 0,
        }
    }

    #[test]
    fn pipeline_id_generation() {
        let id1 = PipelineId::new();
        let id2 = PipelineId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string().parse::<PipelineId>().unwrap(), id1);
    }

    #[test]
    fn config_defaults() {
        let config = PipelineConfig::new("build a login form");
        assert!(config.auto_retry);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.stage_timeout, Duration::from_secs(300));
        assert_eq!(config.retry_budget(), 3);
        assert_eq!(config.with_auto_retry(false).retry_budget(), 0);
    }

    #[test]
    fn config_serializes_timeout_as_millis() {
        let config = PipelineConfig::new("t").with_stage_timeout(Duration::from_millis(1500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["stage_timeout_ms"], 1500);
        let back: PipelineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn status_terminality() {
        assert!(PipelineStatus::Completed.is_terminal());
        assert!(PipelineStatus::Failed.is_terminal());
        assert!(!PipelineStatus::Paused.is_terminal());
        assert_eq!(PipelineStatus::Running.to_string(), "running");
    }

    #[test]
    fn progress_follows_completed_stages() {
        let mut pipeline = Pipeline::new(PipelineId::new());
        assert_eq!(pipeline.progress(), 0);

        pipeline.record_result(success(Stage::Requirements));
        pipeline.record_result(success(Stage::Design));
        assert_eq!(pipeline.progress(), 40);
        assert_eq!(pipeline.next_pending_stage(), Some(Stage::Coding));

        for stage in [Stage::Coding, Stage::Testing, Stage::Deployment] {
            pipeline.record_result(success(stage));
        }
        assert_eq!(pipeline.progress(), 100);
        assert_eq!(pipeline.next_pending_stage(), None);
    }

    #[test]
    fn failed_results_do_not_complete_stages() {
        let mut pipeline = Pipeline::new(PipelineId::new());
        let mut failed = success(Stage::Requirements);
        failed.success = false;
        failed.error = Some("boom".to_string());

        pipeline.record_result(failed);
        assert!(pipeline.completed_stages().is_empty());
        assert_eq!(pipeline.stage_results().len(), 1);
    }

    #[test]
    fn completed_stages_never_duplicate() {
        let mut pipeline = Pipeline::new(PipelineId::new());
        pipeline.record_result(success(Stage::Requirements));
        pipeline.record_result(success(Stage::Requirements));
        assert_eq!(pipeline.completed_stages(), &[Stage::Requirements]);
    }

    #[test]
    fn reconcile_drops_unbacked_stages() {
        let mut pipeline = Pipeline::new(PipelineId::new());
        pipeline.record_result(success(Stage::Requirements));
        pipeline.completed_stages.push(Stage::Design);

        pipeline.reconcile();
        assert_eq!(pipeline.completed_stages(), &[Stage::Requirements]);
        assert_eq!(pipeline.progress(), 20);
    }
}
