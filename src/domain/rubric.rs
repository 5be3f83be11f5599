// ============================================================
// RUBRIC TYPES
// ============================================================
// Evaluation criteria attached to a whole dataset (global) or to
// a single question. Pure value objects, no I/O.

use serde::{Deserialize, Serialize};

/// How an LLM-judged trait is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraitKind {
    /// Pass/fail judgment. Legacy documents call this "binary".
    #[serde(rename = "boolean", alias = "binary")]
    Boolean,
    #[serde(rename = "score")]
    Score,
}

/// Multi-stage judgment configuration: extract supporting excerpts
/// before scoring. Round-trips exactly or is entirely absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepJudgmentConfig {
    pub enabled: bool,

    /// Whether to pull verbatim excerpts from the answer before judging.
    pub extract_excerpts: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_excerpts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuzzy_match_threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt_retry_attempts: Option<u32>,

    #[serde(default)]
    pub enable_search_enhancement: bool,
}

/// A trait judged by an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmTrait {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub kind: TraitKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deep_judgment: Option<DeepJudgmentConfig>,
}

/// A trait checked by matching a regular expression against the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexTrait {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub pattern: String,

    #[serde(default = "default_true")]
    pub case_sensitive: bool,

    /// Pass when the pattern does NOT match. Legacy documents call
    /// this field "invert".
    #[serde(default, alias = "invert")]
    pub invert_result: bool,
}

/// A trait evaluated by a precompiled callable. The payload is opaque:
/// carried byte-for-byte, never decoded or re-encoded here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableTrait {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub callable_code: String,
}

/// Confusion-matrix evaluation mode for metric traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricMode {
    #[serde(rename = "tp_only")]
    TpOnly,
    #[serde(rename = "full_matrix")]
    FullMatrix,
}

/// A trait computing precision/recall-style metrics from extraction
/// instruction buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrait {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub evaluation_mode: MetricMode,

    /// Metric names to report (precision, recall, f1, ...).
    #[serde(default)]
    pub metrics: Vec<String>,

    /// Instructions for extracting true-positive items.
    #[serde(default)]
    pub tp_instructions: Vec<String>,

    /// Instructions for extracting true-negative items.
    #[serde(default)]
    pub tn_instructions: Vec<String>,
}

/// Tagged union over the four trait variants. Converters dispatch on
/// the tag so match exhaustiveness covers every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trait_type")]
pub enum RubricTrait {
    #[serde(rename = "llm")]
    Llm(LlmTrait),
    #[serde(rename = "regex")]
    Regex(RegexTrait),
    #[serde(rename = "callable")]
    Callable(CallableTrait),
    #[serde(rename = "metric")]
    Metric(MetricTrait),
}

impl RubricTrait {
    pub fn name(&self) -> &str {
        match self {
            RubricTrait::Llm(t) => &t.name,
            RubricTrait::Regex(t) => &t.name,
            RubricTrait::Callable(t) => &t.name,
            RubricTrait::Metric(t) => &t.name,
        }
    }
}

/// Whether a trait applies to the whole dataset or to one question.
/// The scope is structural: it selects where in the JSON-LD document
/// the trait is emitted, it is never a field on the trait itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricScope {
    Global,
    QuestionSpecific,
}

/// A container of evaluation traits, each variant listed independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub llm_traits: Vec<LlmTrait>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex_traits: Vec<RegexTrait>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub callable_traits: Vec<CallableTrait>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metric_traits: Vec<MetricTrait>,
}

impl Rubric {
    pub fn is_empty(&self) -> bool {
        self.llm_traits.is_empty()
            && self.regex_traits.is_empty()
            && self.callable_traits.is_empty()
            && self.metric_traits.is_empty()
    }

    /// Every trait name across all variants, in listing order.
    pub fn trait_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        names.extend(self.llm_traits.iter().map(|t| t.name.clone()));
        names.extend(self.regex_traits.iter().map(|t| t.name.clone()));
        names.extend(self.callable_traits.iter().map(|t| t.name.clone()));
        names.extend(self.metric_traits.iter().map(|t| t.name.clone()));
        names
    }

    /// Push a trait into the list matching its variant.
    pub fn push(&mut self, rubric_trait: RubricTrait) {
        match rubric_trait {
            RubricTrait::Llm(t) => self.llm_traits.push(t),
            RubricTrait::Regex(t) => self.regex_traits.push(t),
            RubricTrait::Callable(t) => self.callable_traits.push(t),
            RubricTrait::Metric(t) => self.metric_traits.push(t),
        }
    }

    /// Append every trait of `other` onto this rubric. Used when legacy
    /// string-encoded traits must be folded into ratings-derived ones.
    pub fn merge(&mut self, other: Rubric) {
        self.llm_traits.extend(other.llm_traits);
        self.regex_traits.extend(other.regex_traits);
        self.callable_traits.extend(other.callable_traits);
        self.metric_traits.extend(other.metric_traits);
    }

    /// All traits as the tagged union, in listing order.
    pub fn all_traits(&self) -> Vec<RubricTrait> {
        let mut traits = Vec::new();
        traits.extend(self.llm_traits.iter().cloned().map(RubricTrait::Llm));
        traits.extend(self.regex_traits.iter().cloned().map(RubricTrait::Regex));
        traits.extend(self.callable_traits.iter().cloned().map(RubricTrait::Callable));
        traits.extend(self.metric_traits.iter().cloned().map(RubricTrait::Metric));
        traits
    }
}

fn default_true() -> bool {
    true
}
