// ============================================================
// IDENTIFIER GENERATOR
// ============================================================
// Deterministic, content-derived identifiers for questions and
// verification results. No randomness; the only clock use is the
// documented fallback when a result carries no timestamp.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::domain::result::ExportableResult;

const QUESTION_SLUG_MAX_CHARS: usize = 40;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Deterministic identifier derived from the question text alone.
/// Identical text always yields the identical id.
pub fn generate_question_id(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");
    let slug: String = collapsed
        .replace(' ', "_")
        .chars()
        .take(QUESTION_SLUG_MAX_CHARS)
        .collect();
    let slug = slug.trim_end_matches('_');
    format!("{}_{}", slug, short_hash(text))
}

/// Stable key for a result record:
/// `{question_id}_{answering}_{parsing}_{arep}_{prep}_{timestamp}`.
/// Replicates fall back to the record's positional index, the timestamp
/// to the current time. Accidental collisions are last-write-wins for
/// the caller, never an error.
pub fn generate_result_id(result: &ExportableResult, index: usize) -> String {
    let meta = &result.metadata;
    let answering = sanitize_model_name(&meta.answering_model);
    let parsing = sanitize_model_name(&meta.parsing_model);
    let answering_replicate = meta
        .answering_replicate
        .map(|r| r.to_string())
        .unwrap_or_else(|| index.to_string());
    let parsing_replicate = meta
        .parsing_replicate
        .map(|r| r.to_string())
        .unwrap_or_else(|| index.to_string());
    let timestamp = meta
        .timestamp
        .clone()
        .unwrap_or_else(|| Utc::now().timestamp_millis().to_string());
    format!(
        "{}_{}_{}_{}_{}_{}",
        meta.question_id, answering, parsing, answering_replicate, parsing_replicate, timestamp
    )
}

/// Short numeric hash: first four bytes of SHA-256 as a decimal u32.
fn short_hash(text: &str) -> u32 {
    let digest = Sha256::digest(text.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Model names appear inside mapping keys; slashes and spaces would
/// make them ambiguous to split.
fn sanitize_model_name(name: &str) -> String {
    name.replace(['/', '\\', ' '], "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::ResultMetadata;

    fn result_with(
        question_id: &str,
        answering: &str,
        replicate: Option<u32>,
        timestamp: Option<&str>,
    ) -> ExportableResult {
        ExportableResult {
            metadata: ResultMetadata {
                question_id: question_id.to_string(),
                question_text: "q".to_string(),
                answering_model: answering.to_string(),
                parsing_model: "claude-haiku".to_string(),
                answering_replicate: replicate,
                parsing_replicate: replicate,
                timestamp: timestamp.map(str::to_string),
                execution_time: None,
                completed_without_errors: Some(true),
                abstention_detected: None,
                error: None,
                run_name: None,
            },
            template: None,
            rubric: None,
            deep_judgment: None,
            deep_judgment_rubric: None,
        }
    }

    #[test]
    fn test_question_id_is_deterministic() {
        let a = generate_question_id("What is the capital of France?");
        let b = generate_question_id("What is the capital of France?");
        assert_eq!(a, b);
        assert!(a.starts_with("what_is_the_capital_of_france_"));
    }

    #[test]
    fn test_question_id_differs_for_different_text() {
        let a = generate_question_id("What is the capital of France?");
        let b = generate_question_id("What is the capital of Spain?");
        assert_ne!(a, b);
    }

    #[test]
    fn test_question_id_normalization() {
        // Punctuation stripped, whitespace collapsed, hash of the
        // ORIGINAL text, so the two ids share a slug but not a suffix.
        let a = generate_question_id("Hello,   world!");
        assert!(a.starts_with("hello_world_"));
        let b = generate_question_id("hello world");
        assert!(b.starts_with("hello_world_"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_question_id_truncates_long_text() {
        let text = "word ".repeat(50);
        let id = generate_question_id(&text);
        let slug_len = id.rsplit_once('_').unwrap().0.len();
        assert!(slug_len <= QUESTION_SLUG_MAX_CHARS);
    }

    #[test]
    fn test_result_id_sanitizes_model_names() {
        let result = result_with("q1", "openai/gpt 4o", Some(2), Some("1700000000"));
        let id = generate_result_id(&result, 0);
        assert_eq!(id, "q1_openaigpt4o_claude-haiku_2_2_1700000000");
    }

    #[test]
    fn test_result_id_falls_back_to_index() {
        let result = result_with("q1", "gpt-4", None, Some("1700000000"));
        let id = generate_result_id(&result, 7);
        assert_eq!(id, "q1_gpt-4_claude-haiku_7_7_1700000000");
    }

    #[test]
    fn test_result_ids_distinct_within_batch() {
        let a = generate_result_id(&result_with("q1", "gpt-4", Some(0), Some("1")), 0);
        let b = generate_result_id(&result_with("q1", "gpt-4", Some(1), Some("1")), 1);
        let c = generate_result_id(&result_with("q2", "gpt-4", Some(0), Some("1")), 2);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
