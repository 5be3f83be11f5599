// ============================================================
// EXPORT FORMATTER
// ============================================================
// Render the active result set to JSON (enveloped) or CSV. Field
// selection filters against the canonical column list; rubric trait
// columns are partitioned into global (one column each) and
// question-specific (a single JSON column), because question-specific
// trait sets vary per record and cannot be flattened.

use chrono::Utc;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

use crate::domain::error::{AppError, Result};
use crate::domain::result::{
    ExportableResult, JobSummary, ModelSummary, VerificationConfig, VerificationConfigSummary,
};
use crate::domain::rubric::Rubric;

pub const KARENINA_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EXPORT_FORMAT_VERSION: &str = "2.0";

/// Fixed CSV columns, in canonical order. Trait columns follow, then
/// the question_specific_rubrics JSON column.
const CANONICAL_FIELDS: [&str; 13] = [
    "question_id",
    "question_text",
    "answering_model",
    "parsing_model",
    "answering_replicate",
    "parsing_replicate",
    "timestamp",
    "execution_time",
    "completed_without_errors",
    "error",
    "run_name",
    "raw_llm_response",
    "rubric_summary",
];

/// Metadata fields that survive any field selection.
const IDENTITY_FIELDS: [&str; 4] = [
    "question_id",
    "question_text",
    "answering_model",
    "parsing_model",
];

/// A numeric trait counts as passed at or above this score.
const PASSING_SCORE: f64 = 3.0;

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub selected_fields: Option<Vec<String>>,
    pub job_id: Option<String>,
    pub verification_config: Option<VerificationConfig>,
    pub job_summary: Option<JobSummary>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selected_fields(mut self, fields: Vec<String>) -> Self {
        self.selected_fields = Some(fields);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_verification_config(mut self, config: VerificationConfig) -> Self {
        self.verification_config = Some(config);
        self
    }

    pub fn with_job_summary(mut self, summary: JobSummary) -> Self {
        self.job_summary = Some(summary);
        self
    }
}

pub struct ExportFormatter;

impl ExportFormatter {
    /// Render results as an enveloped JSON document.
    pub fn to_json(results: &[ExportableResult], options: &ExportOptions) -> Result<String> {
        let mut metadata = Map::new();
        metadata.insert(
            "export_timestamp".to_string(),
            json!(Utc::now().to_rfc3339()),
        );
        metadata.insert("karenina_version".to_string(), json!(KARENINA_VERSION));
        metadata.insert("format_version".to_string(), json!(EXPORT_FORMAT_VERSION));
        if let Some(job_id) = &options.job_id {
            metadata.insert("job_id".to_string(), json!(job_id));
        }
        if let Some(config) = &options.verification_config {
            if let Some(summary) = condense_config(config) {
                metadata.insert(
                    "verification_config".to_string(),
                    serde_json::to_value(summary).map_err(encode_error)?,
                );
            }
        }
        if let Some(summary) = &options.job_summary {
            metadata.insert(
                "job_summary".to_string(),
                serde_json::to_value(summary).map_err(encode_error)?,
            );
        }

        let mut rendered = Vec::with_capacity(results.len());
        for result in results {
            let mut value = serde_json::to_value(result).map_err(encode_error)?;
            apply_abstention_display(result, &mut value);
            if let Some(fields) = &options.selected_fields {
                filter_result_fields(&mut value, fields);
            }
            rendered.push(value);
        }

        let envelope = json!({ "metadata": Value::Object(metadata), "results": rendered });
        serde_json::to_string_pretty(&envelope).map_err(encode_error)
    }

    /// Render results as CSV with RFC 4180 escaping.
    pub fn to_csv(
        results: &[ExportableResult],
        global_rubric: Option<&Rubric>,
        selected_fields: Option<&[String]>,
    ) -> Result<String> {
        let global_names: BTreeSet<String> = global_rubric
            .map(|rubric| rubric.trait_names().into_iter().collect())
            .unwrap_or_default();

        // Superset of trait names seen across all records, partitioned
        // by membership in the supplied global rubric.
        let mut seen_global: BTreeSet<String> = BTreeSet::new();
        let mut any_question_specific = false;
        for result in results {
            if let Some(rubric) = &result.rubric {
                for (name, _) in rubric.all_scores() {
                    if global_names.contains(name) {
                        seen_global.insert(name.clone());
                    } else {
                        any_question_specific = true;
                    }
                }
            }
        }

        let mut header: Vec<String> = CANONICAL_FIELDS.iter().map(|f| f.to_string()).collect();
        header.extend(seen_global.iter().map(|name| format!("rubric_{}", name)));
        if any_question_specific {
            header.push("question_specific_rubrics".to_string());
        }

        if let Some(selected) = selected_fields {
            let selected: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
            header.retain(|column| selected.contains(column.as_str()));
        }

        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&header).map_err(csv_error)?;

        for result in results {
            let row: Vec<String> = header
                .iter()
                .map(|column| cell_value(result, column, &global_names))
                .collect();
            writer.write_record(&row).map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::ConversionError(format!("failed to flush CSV: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::ConversionError(format!("CSV is not valid UTF-8: {}", e)))
    }
}

/// First answering/parsing model only.
fn condense_config(config: &VerificationConfig) -> Option<VerificationConfigSummary> {
    let answering = config.answering_models.first()?;
    let parsing = config.parsing_models.first()?;
    Some(VerificationConfigSummary {
        answering_model: ModelSummary::from_config(answering),
        parsing_model: ModelSummary::from_config(parsing),
    })
}

/// Display transform only: the underlying boolean keeps its semantics,
/// but the exported field reads "abstained" when abstention was
/// detected and the outcome flag overridden to true.
fn apply_abstention_display(result: &ExportableResult, value: &mut Value) {
    let abstained = result.metadata.abstention_detected == Some(true)
        && result.metadata.completed_without_errors == Some(true);
    if abstained {
        if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.insert(
                "completed_without_errors".to_string(),
                json!("abstained"),
            );
        }
    }
}

/// Keep only the selected blocks and metadata fields; identity fields
/// always survive.
fn filter_result_fields(value: &mut Value, fields: &[String]) {
    let selected: BTreeSet<&str> = fields.iter().map(String::as_str).collect();
    let Some(record) = value.as_object_mut() else {
        return;
    };
    record.retain(|key, _| key == "metadata" || selected.contains(key.as_str()));
    if let Some(metadata) = record.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.retain(|key, _| {
            IDENTITY_FIELDS.contains(&key.as_str()) || selected.contains(key.as_str())
        });
    }
}

fn cell_value(result: &ExportableResult, column: &str, global_names: &BTreeSet<String>) -> String {
    let meta = &result.metadata;
    match column {
        "question_id" => meta.question_id.clone(),
        "question_text" => meta.question_text.clone(),
        "answering_model" => meta.answering_model.clone(),
        "parsing_model" => meta.parsing_model.clone(),
        "answering_replicate" => option_cell(meta.answering_replicate),
        "parsing_replicate" => option_cell(meta.parsing_replicate),
        "timestamp" => meta.timestamp.clone().unwrap_or_default(),
        "execution_time" => option_cell(meta.execution_time),
        "completed_without_errors" => option_cell(meta.completed_without_errors),
        "error" => meta.error.clone().unwrap_or_default(),
        "run_name" => meta.run_name.clone().unwrap_or_default(),
        "raw_llm_response" => result
            .template
            .as_ref()
            .map(|t| t.raw_llm_response.clone())
            .unwrap_or_default(),
        "rubric_summary" => rubric_summary(result),
        "question_specific_rubrics" => question_specific_json(result, global_names),
        _ => match column.strip_prefix("rubric_") {
            Some(name) => trait_score_cell(result, name),
            None => String::new(),
        },
    }
}

fn trait_score_cell(result: &ExportableResult, name: &str) -> String {
    result
        .rubric
        .as_ref()
        .and_then(|rubric| {
            rubric
                .all_scores()
                .find(|(score_name, _)| score_name.as_str() == name)
                .map(|(_, value)| score_cell(value))
        })
        .unwrap_or_default()
}

/// `<passed>/<total>` over the record's trait scores: boolean passes
/// when true, numeric at score >= 3.
fn rubric_summary(result: &ExportableResult) -> String {
    let Some(rubric) = &result.rubric else {
        return String::new();
    };
    let mut passed = 0usize;
    let mut total = 0usize;
    for (_, value) in rubric.all_scores() {
        total += 1;
        let pass = match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map(|v| v >= PASSING_SCORE).unwrap_or(false),
            _ => false,
        };
        if pass {
            passed += 1;
        }
    }
    if total == 0 {
        return String::new();
    }
    format!("{}/{}", passed, total)
}

/// Question-specific trait sets vary per record, so they travel as one
/// JSON-encoded object instead of flattened columns.
fn question_specific_json(result: &ExportableResult, global_names: &BTreeSet<String>) -> String {
    let Some(rubric) = &result.rubric else {
        return String::new();
    };
    let map: Map<String, Value> = rubric
        .all_scores()
        .filter(|(name, _)| !global_names.contains(*name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if map.is_empty() {
        return String::new();
    }
    Value::Object(map).to_string()
}

fn option_cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn score_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn encode_error(e: serde_json::Error) -> AppError {
    AppError::ConversionError(format!("failed to serialize export: {}", e))
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::ConversionError(format!("failed to write CSV: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::{ModelConfig, ResultMetadata, RubricBlock, TemplateBlock};
    use crate::domain::rubric::{LlmTrait, TraitKind};
    use serde_json::json;

    fn base_result(question_id: &str) -> ExportableResult {
        ExportableResult {
            metadata: ResultMetadata {
                question_id: question_id.to_string(),
                question_text: "What is 2+2?".to_string(),
                answering_model: "gpt-4".to_string(),
                parsing_model: "gpt-4o-mini".to_string(),
                answering_replicate: Some(1),
                parsing_replicate: Some(1),
                timestamp: Some("2025-03-01T12:00:00+00:00".to_string()),
                execution_time: Some(1.5),
                completed_without_errors: Some(true),
                abstention_detected: None,
                error: None,
                run_name: None,
            },
            template: Some(TemplateBlock {
                raw_llm_response: "4".to_string(),
                system_prompt: None,
                parsed_gt_response: None,
                parsed_llm_response: None,
                verify_result: None,
            }),
            rubric: None,
            deep_judgment: None,
            deep_judgment_rubric: None,
        }
    }

    fn scored_result(question_id: &str) -> ExportableResult {
        let mut result = base_result(question_id);
        let mut block = RubricBlock::default();
        block
            .llm_trait_scores
            .insert("clarity".to_string(), json!(4));
        block
            .llm_trait_scores
            .insert("local_check".to_string(), json!(true));
        result.rubric = Some(block);
        result
    }

    fn global_rubric() -> Rubric {
        Rubric {
            llm_traits: vec![LlmTrait {
                name: "clarity".to_string(),
                description: None,
                kind: TraitKind::Score,
                min_score: Some(1),
                max_score: Some(5),
                deep_judgment: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_json_envelope_shape() {
        let options = ExportOptions::new()
            .with_job_id("job-42")
            .with_verification_config(VerificationConfig {
                answering_models: vec![ModelConfig {
                    provider: "openai".to_string(),
                    model_name: "gpt-4".to_string(),
                    temperature: Some(0.1),
                    interface: Some("langchain".to_string()),
                    system_prompt: Some("be brief".to_string()),
                }],
                parsing_models: vec![ModelConfig {
                    provider: "openai".to_string(),
                    model_name: "gpt-4o-mini".to_string(),
                    temperature: None,
                    interface: None,
                    system_prompt: None,
                }],
            });
        let text = ExportFormatter::to_json(&[base_result("q1")], &options).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["metadata"]["job_id"], "job-42");
        assert_eq!(value["metadata"]["karenina_version"], KARENINA_VERSION);
        let config = &value["metadata"]["verification_config"];
        assert_eq!(config["answering_model"]["name"], "gpt-4");
        // Condensed summary only; the prompt never reaches the envelope.
        assert!(config["answering_model"].get("system_prompt").is_none());
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_abstained_display_transform() {
        let mut result = base_result("q1");
        result.metadata.abstention_detected = Some(true);
        let text = ExportFormatter::to_json(&[result], &ExportOptions::new()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["results"][0]["metadata"]["completed_without_errors"],
            "abstained"
        );
    }

    #[test]
    fn test_selected_fields_keep_identity() {
        let options =
            ExportOptions::new().with_selected_fields(vec!["timestamp".to_string()]);
        let text = ExportFormatter::to_json(&[base_result("q1")], &options).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let record = &value["results"][0];
        assert!(record.get("template").is_none());
        let metadata = record["metadata"].as_object().unwrap();
        assert!(metadata.contains_key("question_id"));
        assert!(metadata.contains_key("timestamp"));
        assert!(!metadata.contains_key("execution_time"));
    }

    #[test]
    fn test_csv_partitions_global_and_question_specific_traits() {
        let results = vec![
            scored_result("q1"),
            scored_result("q2"),
            base_result("q3"),
        ];
        let text = ExportFormatter::to_csv(&results, Some(&global_rubric()), None).unwrap();

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        let columns: Vec<&str> = headers.iter().collect();
        assert!(columns.contains(&"rubric_clarity"));
        assert!(columns.contains(&"question_specific_rubrics"));
        assert!(!columns.contains(&"rubric_local_check"));

        let clarity = columns.iter().position(|c| *c == "rubric_clarity").unwrap();
        let specific = columns
            .iter()
            .position(|c| *c == "question_specific_rubrics")
            .unwrap();
        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows[0].get(clarity).unwrap(), "4");
        let parsed: Value = serde_json::from_str(rows[0].get(specific).unwrap()).unwrap();
        assert_eq!(parsed["local_check"], json!(true));
        // The record without a rubric block leaves both cells empty.
        assert_eq!(rows[2].get(clarity).unwrap(), "");
        assert_eq!(rows[2].get(specific).unwrap(), "");
    }

    #[test]
    fn test_csv_escaping_round_trips() {
        let mut result = base_result("q1");
        result.metadata.question_text = "a,b\"c".to_string();
        let text = ExportFormatter::to_csv(&[result], None, None).unwrap();

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers().unwrap().clone();
        let position = headers
            .iter()
            .position(|h| h == "question_text")
            .unwrap();
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.get(position).unwrap(), "a,b\"c");
    }

    #[test]
    fn test_csv_selected_fields_preserve_canonical_order() {
        let selected = vec![
            "answering_model".to_string(),
            "question_id".to_string(),
            "nonexistent".to_string(),
        ];
        let text =
            ExportFormatter::to_csv(&[base_result("q1")], None, Some(&selected)).unwrap();
        let header = text.lines().next().unwrap();
        // Canonical order, not selection order; unknown names dropped.
        assert_eq!(header, "question_id,answering_model");
    }

    #[test]
    fn test_rubric_summary_counts_passes() {
        let mut result = base_result("q1");
        let mut block = RubricBlock::default();
        block.llm_trait_scores.insert("clarity".to_string(), json!(2));
        block.regex_trait_scores.insert("cites".to_string(), json!(true));
        block.metric_trait_scores.insert("recall".to_string(), json!(3.5));
        result.rubric = Some(block);
        assert_eq!(rubric_summary(&result), "2/3");
    }
}
