// ============================================================
// VERIFICATION RESULT TYPES
// ============================================================
// One verification outcome per (question, answering-model,
// parsing-model, replicate) tuple, decomposed into a required
// metadata block and optional stage blocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Identity, models and timings. Always present and fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub question_id: String,

    pub question_text: String,

    pub answering_model: String,

    pub parsing_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answering_replicate: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_replicate: Option<u32>,

    /// Wall-clock timestamp of the run, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_without_errors: Option<bool>,

    /// True when the model declined to answer and the outcome flag was
    /// overridden by the abstention policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abstention_detected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_name: Option<String>,
}

/// Raw and parsed template-stage outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateBlock {
    pub raw_llm_response: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_gt_response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed_llm_response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_result: Option<Value>,
}

/// Per-trait scores keyed by trait name. Values are booleans for
/// pass/fail traits and numbers for scored/metric traits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricBlock {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub llm_trait_scores: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub regex_trait_scores: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub callable_trait_scores: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metric_trait_scores: BTreeMap<String, Value>,
}

impl RubricBlock {
    /// All (trait name, score) pairs across the four maps.
    pub fn all_scores(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.llm_trait_scores
            .iter()
            .chain(self.regex_trait_scores.iter())
            .chain(self.callable_trait_scores.iter())
            .chain(self.metric_trait_scores.iter())
    }
}

/// Excerpt-extraction stage outputs, keyed by trait name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeepJudgmentBlock {
    #[serde(default)]
    pub enabled_traits: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub excerpts: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reasoning: BTreeMap<String, Value>,
}

/// One verification outcome. `metadata` is always present; every other
/// block is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportableResult {
    pub metadata: ResultMetadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<RubricBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment: Option<DeepJudgmentBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment_rubric: Option<RubricBlock>,
}

/// One model's settings inside a verification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,

    pub model_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// The configuration a verification job ran with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default)]
    pub answering_models: Vec<ModelConfig>,

    #[serde(default)]
    pub parsing_models: Vec<ModelConfig>,
}

/// Condensed model settings reported in the export envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub provider: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

impl ModelSummary {
    /// Drop everything but the fields the export envelope reports.
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            provider: config.provider.clone(),
            name: config.model_name.clone(),
            temperature: config.temperature,
            interface: config.interface.clone(),
        }
    }
}

/// First answering/parsing model only; the full config stays with the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationConfigSummary {
    pub answering_model: ModelSummary,
    pub parsing_model: ModelSummary,
}

/// Totals and timings of the verification job, if one produced the results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// Collection statistics computed while importing a result file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub total_results: usize,
    pub question_ids: BTreeSet<String>,
    pub answering_models: BTreeSet<String>,
}

/// Conflict accounting for a prospective merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub existing_count: usize,
    pub uploaded_count: usize,
    pub conflict_count: usize,
    pub total_after_merge: usize,
}
