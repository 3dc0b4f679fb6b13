//! Stage prompt construction
//!
//! Maps (stage, pipeline config, accumulated artifacts) to the system and
//! user prompts for that stage. Pure; no I/O.

use crate::types::PipelineConfig;
use autopipe_artifact::{ArtifactSet, Stage};

/// Prompts for a single stage attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePrompts {
    pub system: String,
    pub user: String,
}

const REQUIREMENTS_SCHEMA: &str = r#"{
  "functional": ["string"],
  "nonFunctional": ["string"],
  "acceptanceCriteria": ["string"]
}"#;

const DESIGN_SCHEMA: &str = r#"{
  "architecture": "string",
  "components": ["string"],
  "dataModel": "string",
  "apis": ["string"]
}"#;

const CODING_SCHEMA: &str = r#"{
  "files": [{ "path": "string", "content": "string", "language": "string" }],
  "changes": ["string"]
}"#;

const TESTING_SCHEMA: &str = r#"{
  "testFiles": [{ "path": "string", "content": "string", "language": "string" }],
  "passed": 0,
  "failed": 0,
  "coverage": 0.0
}"#;

const DEPLOYMENT_SCHEMA: &str = r#"{
  "config": "string",
  "documentation": "string",
  "checklist": ["string"]
}"#;

/// JSON schema the executor is asked to produce for a stage
#[must_use]
pub fn output_schema(stage: Stage) -> &'static str {
    match stage {
        Stage::Requirements => REQUIREMENTS_SCHEMA,
        Stage::Design => DESIGN_SCHEMA,
        Stage::Coding => CODING_SCHEMA,
        Stage::Testing => TESTING_SCHEMA,
        Stage::Deployment => DEPLOYMENT_SCHEMA,
    }
}

fn responsibility(stage: Stage) -> &'static str {
    match stage {
        Stage::Requirements => {
            "Analyze the task and extract functional requirements, non-functional \
             requirements and acceptance criteria."
        }
        Stage::Design => {
            "Design the architecture, the components, the data model and the APIs \
             that satisfy the requirements."
        }
        Stage::Coding => {
            "Implement the design. Produce complete file contents and a summary of \
             every change."
        }
        Stage::Testing => {
            "Write tests for the implementation and report how many pass, how many \
             fail and the coverage percentage."
        }
        Stage::Deployment => {
            "Produce deployment configuration, user-facing documentation and a \
             release checklist."
        }
    }
}

/// System prompt for a stage: role, responsibility and output schema
#[must_use]
pub fn system_prompt(stage: Stage) -> String {
    format!(
        "You are a {role}. {task}\n\nRespond with a single JSON object matching this schema:\n{schema}",
        role = stage.role(),
        task = responsibility(stage),
        schema = output_schema(stage),
    )
}

/// User prompt for a stage: task, optional context and prior artifacts
#[must_use]
pub fn user_prompt(stage: Stage, config: &PipelineConfig, artifacts: &ArtifactSet) -> String {
    let mut prompt = format!("Task: {}\n", config.task);

    if let Some(context) = config.context.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\nContext:\n{context}\n"));
    }

    let previous = serde_json::to_string_pretty(&artifacts.to_context_json())
        .unwrap_or_else(|_| "{}".to_string());
    prompt.push_str(&format!("\nArtifacts from previous stages:\n{previous}\n"));

    prompt.push_str(&format!(
        "\nProduce the {} stage output now.",
        stage.name()
    ));
    prompt
}

/// Build both prompts for a stage
#[must_use]
pub fn build(stage: Stage, config: &PipelineConfig, artifacts: &ArtifactSet) -> StagePrompts {
    StagePrompts {
        system: system_prompt(stage),
        user: user_prompt(stage, config, artifacts),
    }
}
