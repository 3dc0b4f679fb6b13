//! Stage artifact types
//!
//! Each stage produces its own artifact schema. [`StageArtifacts`] is the
//! tagged union over those schemas; only the variant matching the producing
//! stage is ever populated.
//!
//! Field names follow the camelCase JSON schema given to the task executor,
//! and every field defaults so partially filled responses still decode.

use crate::extract::extract_json_object;
use crate::stage::Stage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors related to artifact decoding
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// No JSON object found in the raw output
    #[error("no JSON object found in {stage} output")]
    NoJsonObject { stage: Stage },

    /// JSON object did not match the stage schema
    #[error("malformed {stage} artifacts: {source}")]
    Malformed {
        stage: Stage,
        #[source]
        source: serde_json::Error,
    },
}

/// A generated source file
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeFile {
    /// Relative file path
    pub path: String,
    /// Full file content
    pub content: String,
    /// Language name as reported by the executor
    pub language: String,
}

/// Requirements stage output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequirementsArtifacts {
    pub functional: Vec<String>,
    pub non_functional: Vec<String>,
    pub acceptance_criteria: Vec<String>,
}

/// Design stage output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DesignArtifacts {
    pub architecture: String,
    pub components: Vec<String>,
    pub data_model: String,
    pub apis: Vec<String>,
}

/// Coding stage output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodingArtifacts {
    pub files: Vec<CodeFile>,
    /// Human-readable change summaries
    pub changes: Vec<String>,
}

/// Testing stage output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestingArtifacts {
    pub test_files: Vec<CodeFile>,
    pub passed: u32,
    pub failed: u32,
    /// Coverage percentage, when the executor reports one
    pub coverage: Option<f64>,
}

/// Deployment stage output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeploymentArtifacts {
    pub config: String,
    pub documentation: String,
    pub checklist: Vec<String>,
}

/// Structured output of one stage, tagged by the producing stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "artifacts", rename_all = "lowercase")]
pub enum StageArtifacts {
    Requirements(RequirementsArtifacts),
    Design(DesignArtifacts),
    Coding(CodingArtifacts),
    Testing(TestingArtifacts),
    Deployment(DeploymentArtifacts),
}

impl StageArtifacts {
    /// Stage that produced these artifacts
    #[inline]
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            StageArtifacts::Requirements(_) => Stage::Requirements,
            StageArtifacts::Design(_) => Stage::Design,
            StageArtifacts::Coding(_) => Stage::Coding,
            StageArtifacts::Testing(_) => Stage::Testing,
            StageArtifacts::Deployment(_) => Stage::Deployment,
        }
    }

    /// Parse the first JSON object in `raw` as `stage`'s artifact schema
    ///
    /// # Errors
    /// - `ArtifactError::NoJsonObject` if `raw` contains no balanced object
    /// - `ArtifactError::Malformed` if the object does not fit the schema
    pub fn parse(stage: Stage, raw: &str) -> Result<Self, ArtifactError> {
        let json = extract_json_object(raw).ok_or(ArtifactError::NoJsonObject { stage })?;

        let artifacts = match stage {
            Stage::Requirements => StageArtifacts::Requirements(from_json(stage, json)?),
            Stage::Design => StageArtifacts::Design(from_json(stage, json)?),
            Stage::Coding => StageArtifacts::Coding(from_json(stage, json)?),
            Stage::Testing => StageArtifacts::Testing(from_json(stage, json)?),
            Stage::Deployment => StageArtifacts::Deployment(from_json(stage, json)?),
        };

        Ok(artifacts)
    }

    /// Best-effort variant of [`StageArtifacts::parse`]
    ///
    /// Decoding failures are never fatal to a stage, so they collapse to `None`.
    #[inline]
    #[must_use]
    pub fn decode(stage: Stage, raw: &str) -> Option<Self> {
        Self::parse(stage, raw).ok()
    }

    /// Requirements payload, if this is the requirements variant
    #[inline]
    #[must_use]
    pub fn as_requirements(&self) -> Option<&RequirementsArtifacts> {
        match self {
            StageArtifacts::Requirements(a) => Some(a),
            _ => None,
        }
    }

    /// Coding payload, if this is the coding variant
    #[inline]
    #[must_use]
    pub fn as_coding(&self) -> Option<&CodingArtifacts> {
        match self {
            StageArtifacts::Coding(a) => Some(a),
            _ => None,
        }
    }

    /// Testing payload, if this is the testing variant
    #[inline]
    #[must_use]
    pub fn as_testing(&self) -> Option<&TestingArtifacts> {
        match self {
            StageArtifacts::Testing(a) => Some(a),
            _ => None,
        }
    }

    /// Payload alone, serialized as a JSON value
    #[must_use]
    pub fn payload_json(&self) -> serde_json::Value {
        let value = match self {
            StageArtifacts::Requirements(a) => serde_json::to_value(a),
            StageArtifacts::Design(a) => serde_json::to_value(a),
            StageArtifacts::Coding(a) => serde_json::to_value(a),
            StageArtifacts::Testing(a) => serde_json::to_value(a),
            StageArtifacts::Deployment(a) => serde_json::to_value(a),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

fn from_json<T: DeserializeOwned>(stage: Stage, json: &str) -> Result<T, ArtifactError> {
    serde_json::from_str(json).map_err(|source| ArtifactError::Malformed { stage, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_requirements_from_prose() {
        let raw = r#"Sure. {"functional": ["users can log in"], "nonFunctional": ["p99 < 200ms"], "acceptanceCriteria": ["login succeeds with valid creds"]}"#;
        let artifacts = StageArtifacts::parse(Stage::Requirements, raw).unwrap();

        assert_eq!(artifacts.stage(), Stage::Requirements);
        let req = artifacts.as_requirements().unwrap();
        assert_eq!(req.functional, vec!["users can log in".to_string()]);
        assert_eq!(req.non_functional, vec!["p99 < 200ms".to_string()]);
        assert_eq!(req.acceptance_criteria.len(), 1);
    }

    #[test]
    fn parse_coding_files() {
        let raw = r#"{"files": [{"path": "src/login.rs", "content": "fn login() {}", "language": "rust"}], "changes": ["add login handler"]}"#;
        let artifacts = StageArtifacts::parse(Stage::Coding, raw).unwrap();

        let coding = artifacts.as_coding().unwrap();
        assert_eq!(coding.files[0].path, "src/login.rs");
        assert_eq!(coding.files[0].content, "fn login() {}");
        assert_eq!(coding.changes, vec!["add login handler".to_string()]);
    }

    #[test]
    fn missing_fields_default() {
        let artifacts = StageArtifacts::parse(Stage::Testing, r#"{"passed": 4}"#).unwrap();
        let testing = artifacts.as_testing().unwrap();
        assert_eq!(testing.passed, 4);
        assert_eq!(testing.failed, 0);
        assert!(testing.test_files.is_empty());
        assert_eq!(testing.coverage, None);
    }

    #[test]
    fn no_json_is_an_error_but_decodes_to_none() {
        let err = StageArtifacts::parse(Stage::Design, "I could not do it").unwrap_err();
        assert!(matches!(err, ArtifactError::NoJsonObject { stage: Stage::Design }));
        assert!(StageArtifacts::decode(Stage::Design, "I could not do it").is_none());
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = StageArtifacts::parse(Stage::Design, r#"{"components": "not a list"}"#)
            .unwrap_err();
        assert!(matches!(err, ArtifactError::Malformed { stage: Stage::Design, .. }));
        assert!(err.to_string().contains("malformed design artifacts"));
    }

    #[test]
    fn tagged_serialization() {
        let artifacts = StageArtifacts::Deployment(DeploymentArtifacts {
            config: "FROM rust:1".to_string(),
            documentation: String::new(),
            checklist: vec!["tag release".to_string()],
        });
        let value = serde_json::to_value(&artifacts).unwrap();
        assert_eq!(value["stage"], "deployment");
        assert_eq!(value["artifacts"]["checklist"][0], "tag release");

        let back: StageArtifacts = serde_json::from_value(value).unwrap();
        assert_eq!(back, artifacts);
    }

    #[test]
    fn payload_json_omits_tag() {
        let artifacts = StageArtifacts::Design(DesignArtifacts {
            architecture: "layered".to_string(),
            ..Default::default()
        });
        let payload = artifacts.payload_json();
        assert_eq!(payload["architecture"], "layered");
        assert!(payload.get("stage").is_none());
    }
}
