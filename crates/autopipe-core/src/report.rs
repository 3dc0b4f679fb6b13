//! Pipeline reports
//!
//! Derived on demand from a pipeline snapshot; nothing here is stored.

use crate::types::{duration_ms, Pipeline, PipelineId, PipelineStatus};
use autopipe_artifact::{ArtifactSet, Stage};
use serde::Serialize;
use std::time::Duration;

/// Per-stage line of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub success: bool,
    #[serde(with = "duration_ms", rename = "duration_ms")]
    pub duration: Duration,
    pub retry_count: u32,
    pub error: Option<String>,
}

/// Highlights pulled from the coding and testing artifacts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Change descriptions from the coding stage
    pub code_changes: Vec<String>,
    /// Paths of files written by the coding stage
    pub files_changed: Vec<String>,
    /// Number of test files, if the testing stage produced artifacts
    pub test_count: Option<usize>,
    pub coverage: Option<f64>,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub pipeline_id: PipelineId,
    pub status: PipelineStatus,
    pub progress: u8,
    /// Sum of all stage result durations
    #[serde(with = "duration_ms", rename = "total_duration_ms")]
    pub total_duration: Duration,
    pub stages: Vec<StageReport>,
    pub artifacts: ArtifactSet,
    pub summary: ReportSummary,
}

impl PipelineReport {
    /// Build a report from a snapshot
    ///
    /// Artifacts are merged in result order, so a later result for a stage
    /// replaces an earlier one.
    #[must_use]
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let results = pipeline.stage_results();

        let total_duration = results.iter().map(|r| r.duration).sum();

        let stages = results
            .iter()
            .map(|r| StageReport {
                stage: r.stage,
                success: r.success,
                duration: r.duration,
                retry_count: r.retry_count,
                error: r.error.clone(),
            })
            .collect();

        let mut artifacts = ArtifactSet::new();
        for artifact in results.iter().filter_map(|r| r.artifacts.clone()) {
            artifacts.merge(artifact);
        }

        let mut summary = ReportSummary::default();
        if let Some(coding) = artifacts.coding() {
            summary.code_changes.clone_from(&coding.changes);
            summary.files_changed = coding.files.iter().map(|f| f.path.clone()).collect();
        }
        if let Some(testing) = artifacts.testing() {
            summary.test_count = Some(testing.test_files.len());
            summary.coverage = testing.coverage;
        }

        Self {
            pipeline_id: pipeline.id(),
            status: pipeline.status(),
            progress: pipeline.progress(),
            total_duration,
            stages,
            artifacts,
            summary,
        }
    }

    /// Total retries across all stages
    #[must_use]
    pub fn total_retries(&self) -> u32 {
        self.stages.iter().map(|s| s.retry_count).sum()
    }

    /// Render as plain text
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();

        report.push_str("=== Pipeline Report ===\n\n");
        report.push_str(&format!("Pipeline: {}\n", self.pipeline_id));
        report.push_str(&format!("Status: {}\n", self.status));
        report.push_str(&format!("Progress: {}%\n", self.progress));
        report.push_str(&format!("Total Duration: {}ms\n", self.total_duration.as_millis()));
        report.push_str(&format!("Total Retries: {}\n", self.total_retries()));

        if !self.stages.is_empty() {
            report.push_str("\n=== Stages ===\n");
            for (i, s) in self.stages.iter().enumerate() {
                report.push_str(&format!(
                    "{}. {} [{}] {}ms, {} retries\n",
                    i + 1,
                    s.stage,
                    if s.success { "ok" } else { "failed" },
                    s.duration.as_millis(),
                    s.retry_count
                ));
                if let Some(error) = &s.error {
                    report.push_str(&format!("   error: {}\n", error));
                }
            }
        }

        let summary = &self.summary;
        if !summary.files_changed.is_empty() || !summary.code_changes.is_empty() {
            report.push_str("\n=== Changes ===\n");
            for path in &summary.files_changed {
                report.push_str(&format!("file: {}\n", path));
            }
            for change in &summary.code_changes {
                report.push_str(&format!("- {}\n", change));
            }
        }

        if let Some(count) = summary.test_count {
            report.push_str(&format!("\nTest Files: {}\n", count));
        }
        if let Some(coverage) = summary.coverage {
            report.push_str(&format!("Coverage: {:.1}%\n", coverage));
        }

        report
    }
}
