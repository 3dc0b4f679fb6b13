//! autopipe Artifact Model
//!
//! Typed per-stage artifacts and their accumulation across a pipeline run.
//!
//! # Core Concepts
//!
//! - [`Stage`]: The fixed, ordered stage sequence
//! - [`StageArtifacts`]: Tagged union of per-stage artifact schemas
//! - [`ArtifactSet`]: Artifacts accumulated across stages, keyed by stage
//! - [`extract_json_object`]: Best-effort JSON sniffing over raw executor output
//!
//! # Example
//!
//! ```rust
//! use autopipe_artifact::{ArtifactSet, Stage, StageArtifacts};
//!
//! let raw = r#"Here is the plan: {"functional": ["log in"], "acceptanceCriteria": []}"#;
//! let artifacts = StageArtifacts::decode(Stage::Requirements, raw).expect("json present");
//!
//! let mut set = ArtifactSet::new();
//! set.insert(artifacts);
//! assert_eq!(set.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifacts;
mod extract;
mod set;
mod stage;

pub use artifacts::{
    ArtifactError, CodeFile, CodingArtifacts, DeploymentArtifacts, DesignArtifacts,
    RequirementsArtifacts, StageArtifacts, TestingArtifacts,
};
pub use extract::extract_json_object;
pub use set::ArtifactSet;
pub use stage::{Stage, UnknownStage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
