// ============================================================
// STRUCTURAL VALIDATOR
// ============================================================
// Hand-written shape checks for JSON-LD documents and exported
// result records. Fails fast with the offending index/field; no
// partial repair is attempted.

use serde_json::Value;

use crate::domain::error::{AppError, Result};

const REQUIRED_METADATA_FIELDS: [&str; 4] = [
    "question_id",
    "question_text",
    "answering_model",
    "parsing_model",
];

const OPTIONAL_RECORD_BLOCKS: [&str; 4] =
    ["template", "rubric", "deep_judgment", "deep_judgment_rubric"];

/// Minimal required shape of a JSON-LD checkpoint document: the root
/// type tag, the element array, and required sub-fields on a sampled
/// item.
pub fn validate_document(document: &Value) -> Result<()> {
    let root = document.as_object().ok_or_else(|| {
        AppError::ValidationError("Document root is not a JSON object.".to_string())
    })?;

    match root.get("@type").and_then(Value::as_str) {
        Some("DataFeed") => {}
        Some(other) => {
            return Err(AppError::ValidationError(format!(
                "Expected root @type \"DataFeed\", found \"{}\".",
                other
            )))
        }
        None => {
            return Err(AppError::ValidationError(
                "Document is missing the root @type tag.".to_string(),
            ))
        }
    }

    let elements = root
        .get("dataFeedElement")
        .ok_or_else(|| {
            AppError::ValidationError("Document is missing dataFeedElement.".to_string())
        })?
        .as_array()
        .ok_or_else(|| {
            AppError::ValidationError("dataFeedElement is not an array.".to_string())
        })?;

    // Sample the first element; a document holding a malformed item
    // further in still fails later at deserialization.
    if let Some(first) = elements.first() {
        let item = first.get("item").ok_or_else(|| {
            AppError::ValidationError("dataFeedElement[0] is missing item.".to_string())
        })?;
        if item.get("text").and_then(Value::as_str).is_none() {
            return Err(AppError::ValidationError(
                "dataFeedElement[0].item is missing question text.".to_string(),
            ));
        }
        if item.get("acceptedAnswer").is_none() {
            return Err(AppError::ValidationError(
                "dataFeedElement[0].item is missing acceptedAnswer.".to_string(),
            ));
        }
    }

    Ok(())
}

/// Well-formedness of one exported result record: a metadata block with
/// the four required string fields, and every present optional block an
/// object.
pub fn validate_result_record(record: &Value, index: usize) -> Result<()> {
    let record = record.as_object().ok_or_else(|| {
        AppError::ValidationError(format!("Result {} is not a JSON object.", index))
    })?;

    let metadata = record
        .get("metadata")
        .ok_or_else(|| {
            AppError::ValidationError(format!("Result {} is missing metadata.", index))
        })?
        .as_object()
        .ok_or_else(|| {
            AppError::ValidationError(format!("Result {}: metadata is not an object.", index))
        })?;

    for field in REQUIRED_METADATA_FIELDS {
        match metadata.get(field).and_then(Value::as_str) {
            Some(value) if !value.trim().is_empty() => {}
            Some(_) => {
                return Err(AppError::ValidationError(format!(
                    "Result {}: metadata.{} is empty.",
                    index, field
                )))
            }
            None => {
                return Err(AppError::ValidationError(format!(
                    "Result {}: metadata.{} is missing or not a string.",
                    index, field
                )))
            }
        }
    }

    for block in OPTIONAL_RECORD_BLOCKS {
        if let Some(value) = record.get(block) {
            if !value.is_object() && !value.is_null() {
                return Err(AppError::ValidationError(format!(
                    "Result {}: {} is present but not an object.",
                    index, block
                )));
            }
        }
    }

    Ok(())
}
