//! Cross-stage artifact accumulation

use crate::artifacts::{CodingArtifacts, StageArtifacts, TestingArtifacts};
use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Artifacts collected from every stage run so far, keyed by stage
///
/// Iteration order is stage execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet {
    entries: BTreeMap<Stage, StageArtifacts>,
}

impl ArtifactSet {
    /// Create an empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record artifacts unless the producing stage already has an entry
    ///
    /// Returns `true` if the artifacts were stored.
    pub fn insert(&mut self, artifacts: StageArtifacts) -> bool {
        match self.entries.entry(artifacts.stage()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(artifacts);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Record artifacts, replacing any earlier entry for the same stage
    pub fn merge(&mut self, artifacts: StageArtifacts) {
        self.entries.insert(artifacts.stage(), artifacts);
    }

    /// Artifacts for a stage
    #[inline]
    #[must_use]
    pub fn get(&self, stage: Stage) -> Option<&StageArtifacts> {
        self.entries.get(&stage)
    }

    /// Coding artifacts, if the coding stage produced any
    #[inline]
    #[must_use]
    pub fn coding(&self) -> Option<&CodingArtifacts> {
        self.get(Stage::Coding).and_then(StageArtifacts::as_coding)
    }

    /// Testing artifacts, if the testing stage produced any
    #[inline]
    #[must_use]
    pub fn testing(&self) -> Option<&TestingArtifacts> {
        self.get(Stage::Testing).and_then(StageArtifacts::as_testing)
    }

    /// Stages with recorded artifacts, in execution order
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.entries.keys().copied()
    }

    /// All recorded artifacts, in execution order
    pub fn iter(&self) -> impl Iterator<Item = &StageArtifacts> {
        self.entries.values()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object mapping stage name to artifact payload
    ///
    /// This is the shape embedded in prompts for later stages.
    #[must_use]
    pub fn to_context_json(&self) -> serde_json::Value {
        let map = self
            .entries
            .iter()
            .map(|(stage, artifacts)| (stage.name().to_string(), artifacts.payload_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<StageArtifacts> for ArtifactSet {
    fn from_iter<I: IntoIterator<Item = StageArtifacts>>(iter: I) -> Self {
        let mut set = Self::new();
        for artifacts in iter {
            set.merge(artifacts);
        }
        set
    }
}
