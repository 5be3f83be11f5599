// ============================================================
// TRAIT CONVERTER
// ============================================================
// Bidirectional mapping between rubric-trait variants and their
// schema.org Rating representation. Dispatch is on the variant tag
// and the Rating's additionalType discriminator, never on duck
// typing, so every arm is exhaustiveness-checked.

use serde_json::{json, Value};

use crate::domain::error::{AppError, Result};
use crate::domain::jsonld::{PropertyValue, Rating};
use crate::domain::rubric::{
    CallableTrait, DeepJudgmentConfig, LlmTrait, MetricMode, MetricTrait, RegexTrait, RubricScope,
    RubricTrait, TraitKind,
};

const GLOBAL_LLM: &str = "GlobalRubricTrait";
const QUESTION_LLM: &str = "QuestionSpecificRubricTrait";
const GLOBAL_REGEX: &str = "GlobalRegexTrait";
const QUESTION_REGEX: &str = "QuestionSpecificRegexTrait";
const GLOBAL_CALLABLE: &str = "GlobalCallableTrait";
const QUESTION_CALLABLE: &str = "QuestionSpecificCallableTrait";
const GLOBAL_METRIC: &str = "GlobalMetricTrait";
const QUESTION_METRIC: &str = "QuestionSpecificMetricTrait";

/// The additionalType string tagging a Rating for this variant/scope.
fn discriminator(rubric_trait: &RubricTrait, scope: RubricScope) -> &'static str {
    match (rubric_trait, scope) {
        (RubricTrait::Llm(_), RubricScope::Global) => GLOBAL_LLM,
        (RubricTrait::Llm(_), RubricScope::QuestionSpecific) => QUESTION_LLM,
        (RubricTrait::Regex(_), RubricScope::Global) => GLOBAL_REGEX,
        (RubricTrait::Regex(_), RubricScope::QuestionSpecific) => QUESTION_REGEX,
        (RubricTrait::Callable(_), RubricScope::Global) => GLOBAL_CALLABLE,
        (RubricTrait::Callable(_), RubricScope::QuestionSpecific) => QUESTION_CALLABLE,
        (RubricTrait::Metric(_), RubricScope::Global) => GLOBAL_METRIC,
        (RubricTrait::Metric(_), RubricScope::QuestionSpecific) => QUESTION_METRIC,
    }
}

/// Convert one rubric trait into its Rating representation.
pub fn trait_to_rating(rubric_trait: &RubricTrait, scope: RubricScope) -> Rating {
    let additional_type = discriminator(rubric_trait, scope).to_string();
    match rubric_trait {
        RubricTrait::Llm(t) => Rating {
            node_type: "Rating".to_string(),
            id: None,
            name: t.name.clone(),
            description: t.description.clone(),
            additional_type,
            worst_rating: t.min_score,
            best_rating: t.max_score,
            additional_property: Some(llm_properties(t)),
        },
        RubricTrait::Regex(t) => Rating {
            node_type: "Rating".to_string(),
            id: None,
            name: t.name.clone(),
            description: t.description.clone(),
            additional_type,
            worst_rating: None,
            best_rating: None,
            additional_property: Some(vec![
                PropertyValue::new("pattern", json!(t.pattern)),
                PropertyValue::new("case_sensitive", json!(t.case_sensitive)),
                PropertyValue::new("invert_result", json!(t.invert_result)),
            ]),
        },
        RubricTrait::Callable(t) => Rating {
            node_type: "Rating".to_string(),
            id: None,
            name: t.name.clone(),
            description: t.description.clone(),
            additional_type,
            worst_rating: None,
            best_rating: None,
            // Opaque payload: passed through byte-for-byte, never decoded.
            additional_property: Some(vec![PropertyValue::new(
                "callable_code",
                json!(t.callable_code),
            )]),
        },
        RubricTrait::Metric(t) => Rating {
            node_type: "Rating".to_string(),
            id: None,
            name: t.name.clone(),
            description: t.description.clone(),
            additional_type,
            worst_rating: None,
            best_rating: None,
            additional_property: Some(vec![
                PropertyValue::new("evaluation_mode", mode_value(t.evaluation_mode)),
                PropertyValue::new("metrics", json!(t.metrics)),
                PropertyValue::new("tp_instructions", json!(t.tp_instructions)),
                PropertyValue::new("tn_instructions", json!(t.tn_instructions)),
            ]),
        },
    }
}

/// Reconstruct a rubric trait from its Rating representation.
pub fn rating_to_trait(rating: &Rating) -> Result<RubricTrait> {
    match rating.additional_type.as_str() {
        GLOBAL_LLM | QUESTION_LLM => Ok(RubricTrait::Llm(decode_llm(rating)?)),
        GLOBAL_REGEX | QUESTION_REGEX => Ok(RubricTrait::Regex(decode_regex(rating)?)),
        GLOBAL_CALLABLE | QUESTION_CALLABLE => Ok(RubricTrait::Callable(decode_callable(rating)?)),
        GLOBAL_METRIC | QUESTION_METRIC => Ok(RubricTrait::Metric(decode_metric(rating)?)),
        other => Err(AppError::ConversionError(format!(
            "Rating \"{}\" has unknown additionalType \"{}\".",
            rating.name, other
        ))),
    }
}

/// Whether a Rating carries a question-specific trait.
pub fn is_question_scoped(rating: &Rating) -> bool {
    matches!(
        rating.additional_type.as_str(),
        QUESTION_LLM | QUESTION_REGEX | QUESTION_CALLABLE | QUESTION_METRIC
    )
}

fn llm_properties(t: &LlmTrait) -> Vec<PropertyValue> {
    let kind = match t.kind {
        TraitKind::Boolean => "boolean",
        TraitKind::Score => "score",
    };
    let mut properties = vec![PropertyValue::new("kind", json!(kind))];
    if let Some(config) = &t.deep_judgment {
        // Serialized as one nested bag so it round-trips exactly or is
        // entirely absent.
        let value = serde_json::to_value(config).unwrap_or(Value::Null);
        properties.push(PropertyValue::new("deep_judgment", value));
    }
    properties
}

fn mode_value(mode: MetricMode) -> Value {
    match mode {
        MetricMode::TpOnly => json!("tp_only"),
        MetricMode::FullMatrix => json!("full_matrix"),
    }
}

fn decode_llm(rating: &Rating) -> Result<LlmTrait> {
    let kind_value = property(rating, "kind")
        .ok_or_else(|| missing_property(rating, "kind"))?
        .clone();
    // Legacy "binary" deserializes to Boolean via the serde alias.
    let kind: TraitKind = serde_json::from_value(kind_value).map_err(|e| {
        AppError::ConversionError(format!(
            "Rating \"{}\" has an unrecognized kind: {}",
            rating.name, e
        ))
    })?;

    let deep_judgment = match property(rating, "deep_judgment") {
        Some(value) => Some(
            serde_json::from_value::<DeepJudgmentConfig>(value.clone()).map_err(|e| {
                AppError::ConversionError(format!(
                    "Rating \"{}\" has a malformed deep_judgment configuration: {}",
                    rating.name, e
                ))
            })?,
        ),
        None => None,
    };

    Ok(LlmTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        kind,
        min_score: rating.worst_rating,
        max_score: rating.best_rating,
        deep_judgment,
    })
}

fn decode_regex(rating: &Rating) -> Result<RegexTrait> {
    let pattern = property(rating, "pattern")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_property(rating, "pattern"))?
        .to_string();
    let case_sensitive = property(rating, "case_sensitive")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    // Older exports named this property "invert".
    let invert_result = property(rating, "invert_result")
        .or_else(|| property(rating, "invert"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(RegexTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        pattern,
        case_sensitive,
        invert_result,
    })
}

fn decode_callable(rating: &Rating) -> Result<CallableTrait> {
    let callable_code = property(rating, "callable_code")
        .and_then(Value::as_str)
        .ok_or_else(|| missing_property(rating, "callable_code"))?
        .to_string();

    Ok(CallableTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        callable_code,
    })
}

fn decode_metric(rating: &Rating) -> Result<MetricTrait> {
    let evaluation_mode = match property(rating, "evaluation_mode").and_then(Value::as_str) {
        Some("tp_only") => MetricMode::TpOnly,
        Some("full_matrix") => MetricMode::FullMatrix,
        Some(other) => {
            return Err(AppError::ConversionError(format!(
                "Rating \"{}\" has unknown evaluation_mode \"{}\".",
                rating.name, other
            )))
        }
        None => return Err(missing_property(rating, "evaluation_mode")),
    };

    Ok(MetricTrait {
        name: rating.name.clone(),
        description: rating.description.clone(),
        evaluation_mode,
        metrics: string_list(rating, "metrics"),
        tp_instructions: string_list(rating, "tp_instructions"),
        tn_instructions: string_list(rating, "tn_instructions"),
    })
}

fn property<'a>(rating: &'a Rating, name: &str) -> Option<&'a Value> {
    rating
        .additional_property
        .as_ref()?
        .iter()
        .find(|p| p.name == name)
        .map(|p| &p.value)
}

fn string_list(rating: &Rating, name: &str) -> Vec<String> {
    property(rating, name)
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn missing_property(rating: &Rating, name: &str) -> AppError {
    AppError::ConversionError(format!(
        "Rating \"{}\" is missing the {} property.",
        rating.name, name
    ))
}
