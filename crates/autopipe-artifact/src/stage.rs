//! Pipeline stages
//!
//! The fixed, ordered stage sequence every pipeline walks through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named pipeline stage
///
/// Ordering follows execution order, so `Stage::Requirements < Stage::Deployment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Requirements analysis
    Requirements,
    /// Architecture and design
    Design,
    /// Implementation
    Coding,
    /// Test authoring and evaluation
    Testing,
    /// Deployment configuration and documentation
    Deployment,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 5] = [
        Stage::Requirements,
        Stage::Design,
        Stage::Coding,
        Stage::Testing,
        Stage::Deployment,
    ];

    /// Number of stages in a pipeline
    pub const COUNT: usize = Self::ALL.len();

    /// Stable lowercase name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Requirements => "requirements",
            Stage::Design => "design",
            Stage::Coding => "coding",
            Stage::Testing => "testing",
            Stage::Deployment => "deployment",
        }
    }

    /// Role the task executor plays for this stage
    #[inline]
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Stage::Requirements => "Requirements Analyst",
            Stage::Design => "Software Architect",
            Stage::Coding => "Software Developer",
            Stage::Testing => "QA Engineer",
            Stage::Deployment => "DevOps Engineer",
        }
    }

    /// Zero-based position in [`Stage::ALL`]
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Stage::Requirements => 0,
            Stage::Design => 1,
            Stage::Coding => 2,
            Stage::Testing => 3,
            Stage::Deployment => 4,
        }
    }

    /// Stage that follows this one, if any
    #[inline]
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown stage name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage: {0}")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == lowered)
            .ok_or(UnknownStage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_matches_index() {
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
        assert!(Stage::Requirements < Stage::Design);
        assert!(Stage::Testing < Stage::Deployment);
    }

    #[test]
    fn stage_next() {
        assert_eq!(Stage::Requirements.next(), Some(Stage::Design));
        assert_eq!(Stage::Deployment.next(), None);
    }

    #[test]
    fn stage_parse_roundtrip() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
        assert_eq!(" Coding ".parse::<Stage>().unwrap(), Stage::Coding);
        assert!("review".parse::<Stage>().is_err());
    }

    #[test]
    fn stage_roles_are_distinct() {
        let roles: std::collections::HashSet<_> = Stage::ALL.iter().map(Stage::role).collect();
        assert_eq!(roles.len(), Stage::COUNT);
    }

    #[test]
    fn stage_serializes_lowercase() {
        let json = serde_json::to_string(&Stage::Deployment).unwrap();
        assert_eq!(json, "\"deployment\"");
    }
}
