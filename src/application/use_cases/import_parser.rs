// ============================================================
// IMPORT PARSER
// ============================================================
// Parse an uploaded verification-result export. Three historical
// shapes are accepted, detected by a single ordered detector (no
// cascaded try/catch): the version-2.0 format with a shared_data
// section, the older unified {metadata, results} shape, and the
// oldest bare-array shape.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::application::use_cases::identifier::generate_result_id;
use crate::application::use_cases::merge_engine::ResultMap;
use crate::application::use_cases::structural_validator::validate_result_record;
use crate::domain::error::{AppError, Result};
use crate::domain::result::{ExportableResult, ImportStats};
use crate::domain::rubric::Rubric;

pub const IMPORT_FORMAT_VERSION: &str = "2.0";

/// Detected document shape, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportShape {
    /// `format_version: "2.0"` with a `shared_data` section holding the
    /// rubric definition once for the whole file.
    VersionTagged,
    /// Untagged `{metadata, results}` document.
    Unified,
    /// Bare array of result records.
    BareArray,
}

#[derive(Debug, Clone)]
pub struct ParsedImport {
    /// Records keyed by their deterministic result id.
    pub results: ResultMap,

    /// Document-level metadata, carried opaquely.
    pub metadata: Option<Value>,

    /// Rubric definition shared by every record (version-2.0 files only).
    pub shared_rubric: Option<Rubric>,

    pub stats: ImportStats,
}

pub struct ImportParser;

impl ImportParser {
    pub fn parse(raw: &str) -> Result<ParsedImport> {
        let document: Value = serde_json::from_str(raw).map_err(|e| {
            AppError::ValidationError(format!("Uploaded file is not valid JSON: {}", e))
        })?;

        let shape = detect_shape(&document)?;
        debug!(?shape, "detected import document shape");

        let (records, metadata, shared_rubric) = match shape {
            ImportShape::VersionTagged => {
                let records = required_results(&document)?;
                let metadata = document.get("metadata").cloned();
                let shared_rubric = decode_shared_rubric(&document)?;
                (records, metadata, shared_rubric)
            }
            ImportShape::Unified => {
                let records = required_results(&document)?;
                (records, document.get("metadata").cloned(), None)
            }
            ImportShape::BareArray => {
                // detect_shape guarantees the document is an array here.
                let records = document.as_array().cloned().unwrap_or_default();
                (records, None, None)
            }
        };

        if records.is_empty() {
            return Err(AppError::ValidationError(
                "Result document contains no results.".to_string(),
            ));
        }

        let mut results: ResultMap = BTreeMap::new();
        let mut stats = ImportStats::default();

        for (index, record) in records.iter().enumerate() {
            validate_result_record(record, index)?;
            let result: ExportableResult =
                serde_json::from_value(record.clone()).map_err(|e| {
                    AppError::ValidationError(format!("Result {} is malformed: {}", index, e))
                })?;

            stats.question_ids.insert(result.metadata.question_id.clone());
            stats
                .answering_models
                .insert(result.metadata.answering_model.clone());

            // Key collisions are last-write-wins, never an error.
            let key = generate_result_id(&result, index);
            results.insert(key, result);
        }
        stats.total_results = records.len();

        debug!(
            total = stats.total_results,
            questions = stats.question_ids.len(),
            models = stats.answering_models.len(),
            "parsed result import"
        );

        Ok(ParsedImport {
            results,
            metadata,
            shared_rubric,
            stats,
        })
    }
}

fn detect_shape(document: &Value) -> Result<ImportShape> {
    if let Some(root) = document.as_object() {
        let version_tagged = root
            .get("format_version")
            .and_then(Value::as_str)
            .map(|v| v == IMPORT_FORMAT_VERSION)
            .unwrap_or(false);
        if version_tagged && root.contains_key("shared_data") {
            return Ok(ImportShape::VersionTagged);
        }
        if root.get("metadata").map(Value::is_object).unwrap_or(false)
            && root.get("results").map(Value::is_array).unwrap_or(false)
        {
            return Ok(ImportShape::Unified);
        }
    } else if document.is_array() {
        return Ok(ImportShape::BareArray);
    }
    Err(AppError::ValidationError(
        "Unrecognized result document shape.".to_string(),
    ))
}

fn required_results(document: &Value) -> Result<Vec<Value>> {
    document
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            AppError::ValidationError("Result document is missing the results array.".to_string())
        })
}

fn decode_shared_rubric(document: &Value) -> Result<Option<Rubric>> {
    match document.get("shared_data").and_then(|d| d.get("rubric")) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => {
            let rubric: Rubric = serde_json::from_value(value.clone()).map_err(|e| {
                AppError::ValidationError(format!("shared_data.rubric is malformed: {}", e))
            })?;
            Ok(Some(rubric))
        }
    }
}
