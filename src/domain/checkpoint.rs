// ============================================================
// CHECKPOINT TYPES
// ============================================================
// The internal (v2) representation of a benchmark's working state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::rubric::Rubric;

pub const CHECKPOINT_VERSION: &str = "2.0";

/// A worked example shown to the answering model before the question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub question: String,
    pub answer: String,
}

/// One question's working state inside a checkpoint. Owned exclusively
/// by the checkpoint map; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointItem {
    pub question: String,

    /// Ground-truth answer text.
    pub raw_answer: String,

    /// Answer template as first generated.
    pub original_answer_template: String,

    /// Answer template with the curator's edits applied.
    pub answer_template: String,

    /// RFC 3339 creation timestamp.
    pub date_created: String,

    /// RFC 3339 timestamp of the latest edit.
    pub last_modified: String,

    #[serde(default)]
    pub finished: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_rubric: Option<Rubric>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub few_shot_examples: Option<Vec<FewShotExample>>,

    /// schema.org Person-shaped author object, carried opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,

    /// Bibliographic sources, carried opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<BTreeMap<String, String>>,
}

/// Dataset-level descriptive fields, all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
}

impl DatasetMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.version.is_none()
            && self.creator.is_none()
            && self.date_created.is_none()
            && self.date_modified.is_none()
    }
}

/// The root unit of interchange for the internal format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedCheckpoint {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_rubric: Option<Rubric>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_metadata: Option<DatasetMetadata>,

    /// Question id -> item. Ordered so conversions are deterministic.
    pub checkpoint: BTreeMap<String, CheckpointItem>,
}

impl UnifiedCheckpoint {
    pub fn new() -> Self {
        Self {
            version: CHECKPOINT_VERSION.to_string(),
            global_rubric: None,
            dataset_metadata: None,
            checkpoint: BTreeMap::new(),
        }
    }

    pub fn question_count(&self) -> usize {
        self.checkpoint.len()
    }

    pub fn finished_count(&self) -> usize {
        self.checkpoint.values().filter(|item| item.finished).count()
    }
}

impl Default for UnifiedCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}
