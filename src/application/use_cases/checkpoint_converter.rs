// ============================================================
// CHECKPOINT CONVERTER
// ============================================================
// Whole-document conversion between the internal (v2) checkpoint and
// the JSON-LD DataFeed representation. All-or-nothing: any failure
// surfaces as a single ConversionError, never a half-populated result.
// Inputs are never mutated; both directions build fresh structures.

use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::application::use_cases::identifier::generate_question_id;
use crate::application::use_cases::structural_validator::validate_document;
use crate::application::use_cases::trait_converter::{
    is_question_scoped, rating_to_trait, trait_to_rating,
};
use crate::domain::checkpoint::{
    CheckpointItem, DatasetMetadata, FewShotExample, UnifiedCheckpoint, CHECKPOINT_VERSION,
};
use crate::domain::error::{AppError, Result};
use crate::domain::jsonld::{
    find_property, Answer, DataFeedItem, JsonLdCheckpoint, JsonLdQuestion, PropertyValue,
    SoftwareSourceCode, SCHEMA_ORG_CONTEXT,
};
use crate::domain::rubric::{CallableTrait, MetricTrait, RegexTrait, Rubric, RubricScope};

const DEFAULT_FEED_NAME: &str = "Benchmark checkpoint";

/// System property names on a question node. Custom metadata keys are
/// prefixed with `custom_` so they can never collide with these.
const PROP_FINISHED: &str = "finished";
const PROP_ORIGINAL_TEMPLATE: &str = "original_answer_template";
const PROP_AUTHOR: &str = "author";
const PROP_SOURCES: &str = "sources";
const PROP_FEW_SHOT: &str = "few_shot_examples";
const CUSTOM_PREFIX: &str = "custom_";

/// Legacy root properties holding JSON-encoded trait lists (documents
/// written before traits moved into the rating array).
const LEGACY_REGEX_TRAITS: &str = "regex_traits";
const LEGACY_CALLABLE_TRAITS: &str = "callable_traits";
const LEGACY_METRIC_TRAITS: &str = "metric_traits";

#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionOptions {
    /// Attach deterministic @id values to item/question/answer/template
    /// nodes. When false, no node carries an identifier.
    pub preserve_ids: bool,

    /// Append a conversion-provenance property to the document root.
    pub include_metadata: bool,

    /// Run the structural validator on the produced document.
    pub validate_output: bool,

    /// The operation creates or modifies content (refreshes
    /// dateModified). Pure format conversions leave it false.
    pub is_creation: bool,
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preserve_ids(mut self, preserve_ids: bool) -> Self {
        self.preserve_ids = preserve_ids;
        self
    }

    pub fn with_include_metadata(mut self, include_metadata: bool) -> Self {
        self.include_metadata = include_metadata;
        self
    }

    pub fn with_validate_output(mut self, validate_output: bool) -> Self {
        self.validate_output = validate_output;
        self
    }

    pub fn with_is_creation(mut self, is_creation: bool) -> Self {
        self.is_creation = is_creation;
        self
    }
}

pub struct CheckpointConverter;

impl CheckpointConverter {
    /// Convert the internal checkpoint into a JSON-LD DataFeed document.
    pub fn v2_to_jsonld(
        checkpoint: &UnifiedCheckpoint,
        options: &ConversionOptions,
    ) -> Result<JsonLdCheckpoint> {
        let document = build_document(checkpoint, options)
            .map_err(|e| AppError::ConversionError(e.to_string()))?;

        if options.validate_output {
            let value = serde_json::to_value(&document).map_err(|e| {
                AppError::ConversionError(format!("failed to serialize produced document: {}", e))
            })?;
            validate_document(&value).map_err(|e| {
                AppError::ConversionError(format!("produced document failed validation: {}", e))
            })?;
        }

        debug!(
            questions = checkpoint.question_count(),
            ratings = document.rating.as_ref().map(Vec::len).unwrap_or(0),
            "converted checkpoint to JSON-LD"
        );
        Ok(document)
    }

    /// Reconstruct the internal checkpoint from a JSON-LD document.
    pub fn jsonld_to_v2(document: &JsonLdCheckpoint) -> Result<UnifiedCheckpoint> {
        let checkpoint =
            rebuild_checkpoint(document).map_err(|e| AppError::ConversionError(e.to_string()))?;
        debug!(
            questions = checkpoint.question_count(),
            "converted JSON-LD document to checkpoint"
        );
        Ok(checkpoint)
    }
}

fn build_document(
    checkpoint: &UnifiedCheckpoint,
    options: &ConversionOptions,
) -> Result<JsonLdCheckpoint> {
    let now = Utc::now().to_rfc3339();
    let meta = checkpoint.dataset_metadata.clone().unwrap_or_default();

    // dateCreated is preserved verbatim once set; a later conversion
    // must never overwrite it. dateModified is refreshed only when the
    // caller marks the operation as content-creating.
    let date_created = meta.date_created.clone().unwrap_or_else(|| now.clone());
    let date_modified = if options.is_creation {
        now.clone()
    } else {
        meta.date_modified.clone().unwrap_or_else(|| now.clone())
    };

    let rating = match &checkpoint.global_rubric {
        Some(rubric) if !rubric.is_empty() => Some(
            rubric
                .all_traits()
                .iter()
                .map(|t| trait_to_rating(t, RubricScope::Global))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    let mut elements = Vec::with_capacity(checkpoint.checkpoint.len());
    for item in checkpoint.checkpoint.values() {
        elements.push(build_feed_item(item, options)?);
    }

    let rating_count = rating.as_ref().map(Vec::len).unwrap_or(0)
        + elements
            .iter()
            .map(|e| e.item.rating.as_ref().map(Vec::len).unwrap_or(0))
            .sum::<usize>();

    let additional_property = if options.include_metadata {
        Some(vec![PropertyValue::new(
            "conversion_metadata",
            json!({
                "original_version": checkpoint.version,
                "converted_at": now,
                "question_count": checkpoint.question_count(),
                "rating_count": rating_count,
                "checkpoint_digest": checkpoint_digest(checkpoint)?,
            }),
        )])
    } else {
        None
    };

    Ok(JsonLdCheckpoint {
        context: SCHEMA_ORG_CONTEXT.to_string(),
        node_type: "DataFeed".to_string(),
        id: None,
        name: meta.name.clone().unwrap_or_else(|| DEFAULT_FEED_NAME.to_string()),
        description: meta.description.clone(),
        version: meta.version.clone().or_else(|| Some(checkpoint.version.clone())),
        creator: meta.creator.clone(),
        date_created,
        date_modified,
        rating,
        data_feed_element: elements,
        additional_property,
    })
}

fn build_feed_item(item: &CheckpointItem, options: &ConversionOptions) -> Result<DataFeedItem> {
    let qid = generate_question_id(&item.question);
    let node_id = |suffix: &str| {
        options
            .preserve_ids
            .then(|| format!("{}{}", qid, suffix))
    };

    let mut properties = vec![
        PropertyValue::new(PROP_FINISHED, json!(item.finished)),
        PropertyValue::new(PROP_ORIGINAL_TEMPLATE, json!(item.original_answer_template)),
    ];
    if let Some(author) = &item.author {
        properties.push(PropertyValue::new(PROP_AUTHOR, encode_json_string(author)?));
    }
    if let Some(sources) = &item.sources {
        properties.push(PropertyValue::new(PROP_SOURCES, encode_json_string(sources)?));
    }
    if let Some(examples) = &item.few_shot_examples {
        let value = serde_json::to_value(examples).map_err(|e| {
            AppError::ConversionError(format!("failed to encode few-shot examples: {}", e))
        })?;
        properties.push(PropertyValue::new(PROP_FEW_SHOT, encode_json_string(&value)?));
    }
    if let Some(custom) = &item.custom_metadata {
        for (key, value) in custom {
            properties.push(PropertyValue::new(
                format!("{}{}", CUSTOM_PREFIX, key),
                json!(value),
            ));
        }
    }

    let rating = match &item.question_rubric {
        Some(rubric) if !rubric.is_empty() => Some(
            rubric
                .all_traits()
                .iter()
                .map(|t| trait_to_rating(t, RubricScope::QuestionSpecific))
                .collect::<Vec<_>>(),
        ),
        _ => None,
    };

    Ok(DataFeedItem {
        node_type: "DataFeedItem".to_string(),
        id: node_id("_item"),
        date_created: item.date_created.clone(),
        date_modified: item.last_modified.clone(),
        item: JsonLdQuestion {
            node_type: "Question".to_string(),
            id: node_id(""),
            text: item.question.clone(),
            accepted_answer: Answer {
                node_type: "Answer".to_string(),
                id: node_id("_answer"),
                text: item.raw_answer.clone(),
            },
            has_part: SoftwareSourceCode {
                node_type: "SoftwareSourceCode".to_string(),
                id: node_id("_template"),
                text: item.answer_template.clone(),
                programming_language: "Python".to_string(),
            },
            rating,
            additional_property: Some(properties),
        },
        keywords: item.keywords.clone(),
    })
}

fn rebuild_checkpoint(document: &JsonLdCheckpoint) -> Result<UnifiedCheckpoint> {
    let mut global_rubric = Rubric::default();
    if let Some(ratings) = &document.rating {
        for rating in ratings {
            global_rubric.push(rating_to_trait(rating)?);
        }
    }
    global_rubric.merge(decode_legacy_traits(&document.additional_property)?);

    let dataset_metadata = DatasetMetadata {
        name: non_empty(&document.name),
        description: document.description.clone(),
        version: document.version.clone(),
        creator: document.creator.clone(),
        date_created: non_empty(&document.date_created),
        date_modified: non_empty(&document.date_modified),
    };

    let mut checkpoint_map = BTreeMap::new();
    for element in &document.data_feed_element {
        let (key, item) = rebuild_item(element)?;
        checkpoint_map.insert(key, item);
    }

    Ok(UnifiedCheckpoint {
        version: CHECKPOINT_VERSION.to_string(),
        global_rubric: (!global_rubric.is_empty()).then_some(global_rubric),
        dataset_metadata: (!dataset_metadata.is_empty()).then_some(dataset_metadata),
        checkpoint: checkpoint_map,
    })
}

fn rebuild_item(element: &DataFeedItem) -> Result<(String, CheckpointItem)> {
    let question = &element.item;
    let properties = &question.additional_property;

    let answer_template = question.has_part.text.clone();
    let original_answer_template = find_property(properties, PROP_ORIGINAL_TEMPLATE)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| answer_template.clone());

    let question_rubric = match &question.rating {
        Some(ratings) => {
            let mut rubric = Rubric::default();
            for rating in ratings.iter().filter(|r| is_question_scoped(r)) {
                rubric.push(rating_to_trait(rating)?);
            }
            (!rubric.is_empty()).then_some(rubric)
        }
        None => None,
    };

    let few_shot_examples = decode_optional_property(properties, PROP_FEW_SHOT)
        .and_then(|value| match serde_json::from_value::<Vec<FewShotExample>>(value) {
            Ok(examples) => Some(examples),
            Err(e) => {
                warn!(error = %e, "discarding malformed few-shot examples");
                None
            }
        });

    let key = question
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| generate_question_id(&question.text));

    let item = CheckpointItem {
        question: question.text.clone(),
        raw_answer: question.accepted_answer.text.clone(),
        original_answer_template,
        answer_template,
        date_created: element.date_created.clone(),
        last_modified: element.date_modified.clone(),
        finished: find_property(properties, PROP_FINISHED)
            .and_then(Value::as_bool)
            .unwrap_or(false),
        question_rubric,
        few_shot_examples,
        author: decode_optional_property(properties, PROP_AUTHOR),
        sources: decode_optional_property(properties, PROP_SOURCES),
        keywords: element.keywords.clone(),
        custom_metadata: collect_custom_metadata(properties),
    };

    Ok((key, item))
}

/// Legacy documents stored regex/callable/metric trait lists as
/// JSON-encoded strings in the root property bag. Field-name drift
/// ("invert", "binary") is absorbed by serde aliases on the trait types.
fn decode_legacy_traits(properties: &Option<Vec<PropertyValue>>) -> Result<Rubric> {
    let mut rubric = Rubric::default();
    if let Some(value) = find_property(properties, LEGACY_REGEX_TRAITS) {
        rubric.regex_traits = decode_legacy_list::<RegexTrait>(value, LEGACY_REGEX_TRAITS)?;
    }
    if let Some(value) = find_property(properties, LEGACY_CALLABLE_TRAITS) {
        rubric.callable_traits =
            decode_legacy_list::<CallableTrait>(value, LEGACY_CALLABLE_TRAITS)?;
    }
    if let Some(value) = find_property(properties, LEGACY_METRIC_TRAITS) {
        rubric.metric_traits = decode_legacy_list::<MetricTrait>(value, LEGACY_METRIC_TRAITS)?;
    }
    Ok(rubric)
}

fn decode_legacy_list<T: serde::de::DeserializeOwned>(value: &Value, name: &str) -> Result<Vec<T>> {
    let text = value.as_str().ok_or_else(|| {
        AppError::ConversionError(format!("legacy {} property is not a JSON string", name))
    })?;
    serde_json::from_str(text)
        .map_err(|e| AppError::ConversionError(format!("failed to decode legacy {}: {}", name, e)))
}

/// Optional metadata sub-fields (author, sources, few-shot examples)
/// are JSON-encoded strings; older documents stored bare objects. A
/// decode failure means "field absent", never a conversion failure.
fn decode_optional_property(properties: &Option<Vec<PropertyValue>>, name: &str) -> Option<Value> {
    let value = find_property(properties, name)?;
    match value {
        Value::String(text) => match serde_json::from_str(text) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(property = name, error = %e, "discarding undecodable property");
                None
            }
        },
        Value::Null => None,
        other => Some(other.clone()),
    }
}

fn collect_custom_metadata(
    properties: &Option<Vec<PropertyValue>>,
) -> Option<BTreeMap<String, String>> {
    let properties = properties.as_ref()?;
    let custom: BTreeMap<String, String> = properties
        .iter()
        .filter_map(|p| {
            let key = p.name.strip_prefix(CUSTOM_PREFIX)?;
            let value = match &p.value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.to_string(), value))
        })
        .collect();
    (!custom.is_empty()).then_some(custom)
}

fn encode_json_string(value: &Value) -> Result<Value> {
    let text = serde_json::to_string(value)
        .map_err(|e| AppError::ConversionError(format!("failed to encode property: {}", e)))?;
    Ok(Value::String(text))
}

fn checkpoint_digest(checkpoint: &UnifiedCheckpoint) -> Result<String> {
    let text = serde_json::to_string(checkpoint)
        .map_err(|e| AppError::ConversionError(format!("failed to digest checkpoint: {}", e)))?;
    Ok(hex::encode(Sha256::digest(text.as_bytes())))
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rubric::{LlmTrait, TraitKind};
    use serde_json::json;

    fn options_full() -> ConversionOptions {
        ConversionOptions::new()
            .with_preserve_ids(true)
            .with_include_metadata(true)
            .with_validate_output(true)
    }

    fn sample_rubric() -> Rubric {
        Rubric {
            llm_traits: vec![LlmTrait {
                name: "clarity".to_string(),
                description: Some("Clear writing".to_string()),
                kind: TraitKind::Score,
                min_score: Some(1),
                max_score: Some(5),
                deep_judgment: None,
            }],
            regex_traits: vec![RegexTrait {
                name: "cites_source".to_string(),
                description: None,
                pattern: r"\[\d+\]".to_string(),
                case_sensitive: true,
                invert_result: false,
            }],
            callable_traits: vec![],
            metric_traits: vec![],
        }
    }

    fn sample_checkpoint() -> UnifiedCheckpoint {
        let question = "What is the boiling point of water at sea level?";
        let item = CheckpointItem {
            question: question.to_string(),
            raw_answer: "100 degrees Celsius".to_string(),
            original_answer_template: "class Answer(BaseModel): ...".to_string(),
            answer_template: "class Answer(BaseModel): value: float".to_string(),
            date_created: "2025-01-01T10:00:00+00:00".to_string(),
            last_modified: "2025-02-01T10:00:00+00:00".to_string(),
            finished: true,
            question_rubric: Some(Rubric {
                llm_traits: vec![LlmTrait {
                    name: "local_check".to_string(),
                    description: None,
                    kind: TraitKind::Boolean,
                    min_score: None,
                    max_score: None,
                    deep_judgment: None,
                }],
                ..Default::default()
            }),
            few_shot_examples: Some(vec![FewShotExample {
                question: "What is 2+2?".to_string(),
                answer: "4".to_string(),
            }]),
            author: Some(json!({"@type": "Person", "name": "Ada"})),
            sources: Some(json!([{"@type": "CreativeWork", "name": "Textbook"}])),
            keywords: Some(vec!["physics".to_string()]),
            custom_metadata: Some(BTreeMap::from([(
                "difficulty".to_string(),
                "easy".to_string(),
            )])),
        };
        let key = generate_question_id(question);

        UnifiedCheckpoint {
            version: CHECKPOINT_VERSION.to_string(),
            global_rubric: Some(sample_rubric()),
            dataset_metadata: Some(DatasetMetadata {
                name: Some("Chemistry benchmark".to_string()),
                description: Some("Curated questions".to_string()),
                version: Some("1.3".to_string()),
                creator: Some(json!({"@type": "Person", "name": "Ada"})),
                date_created: Some("2024-12-01T00:00:00+00:00".to_string()),
                date_modified: Some("2025-02-01T00:00:00+00:00".to_string()),
            }),
            checkpoint: BTreeMap::from([(key, item)]),
        }
    }

    #[test]
    fn test_round_trip_preserves_checkpoint() {
        let checkpoint = sample_checkpoint();
        let document = CheckpointConverter::v2_to_jsonld(&checkpoint, &options_full()).unwrap();
        let back = CheckpointConverter::jsonld_to_v2(&document).unwrap();
        assert_eq!(back, checkpoint);
    }

    #[test]
    fn test_round_trip_without_preserved_ids() {
        let checkpoint = sample_checkpoint();
        let options = ConversionOptions::new();
        let document = CheckpointConverter::v2_to_jsonld(&checkpoint, &options).unwrap();
        assert!(document.data_feed_element[0].item.id.is_none());
        // Keys are re-derived from the question text, so the map is stable.
        let back = CheckpointConverter::jsonld_to_v2(&document).unwrap();
        assert_eq!(back.checkpoint.keys().collect::<Vec<_>>(),
                   checkpoint.checkpoint.keys().collect::<Vec<_>>());
    }

    #[test]
    fn test_date_created_is_never_overwritten() {
        let checkpoint = sample_checkpoint();
        let options = ConversionOptions::new();
        let first = CheckpointConverter::v2_to_jsonld(&checkpoint, &options).unwrap();
        let second = CheckpointConverter::v2_to_jsonld(&checkpoint, &options).unwrap();
        assert_eq!(first.date_created, "2024-12-01T00:00:00+00:00");
        assert_eq!(first.date_created, second.date_created);
        assert_eq!(first.date_modified, second.date_modified);
    }

    #[test]
    fn test_is_creation_refreshes_date_modified() {
        let checkpoint = sample_checkpoint();
        let options = ConversionOptions::new().with_is_creation(true);
        let document = CheckpointConverter::v2_to_jsonld(&checkpoint, &options).unwrap();
        assert_ne!(document.date_modified, "2025-02-01T00:00:00+00:00");
        assert_eq!(document.date_created, "2024-12-01T00:00:00+00:00");
    }

    #[test]
    fn test_conversion_metadata_property() {
        let checkpoint = sample_checkpoint();
        let document = CheckpointConverter::v2_to_jsonld(&checkpoint, &options_full()).unwrap();
        let value = find_property(&document.additional_property, "conversion_metadata").unwrap();
        assert_eq!(value["original_version"], "2.0");
        assert_eq!(value["question_count"], 1);
        // 2 global traits + 1 question-specific trait.
        assert_eq!(value["rating_count"], 3);
    }

    #[test]
    fn test_custom_metadata_prefix_round_trip() {
        let checkpoint = sample_checkpoint();
        let document = CheckpointConverter::v2_to_jsonld(&checkpoint, &options_full()).unwrap();
        let question = &document.data_feed_element[0].item;
        assert!(find_property(&question.additional_property, "custom_difficulty").is_some());

        let back = CheckpointConverter::jsonld_to_v2(&document).unwrap();
        let item = back.checkpoint.values().next().unwrap();
        assert_eq!(
            item.custom_metadata.as_ref().unwrap().get("difficulty"),
            Some(&"easy".to_string())
        );
    }

    #[test]
    fn test_undecodable_author_is_treated_as_absent() {
        let checkpoint = sample_checkpoint();
        let mut document =
            CheckpointConverter::v2_to_jsonld(&checkpoint, &ConversionOptions::new()).unwrap();
        let properties = document.data_feed_element[0]
            .item
            .additional_property
            .as_mut()
            .unwrap();
        for property in properties.iter_mut() {
            if property.name == "author" {
                property.value = json!("{not valid json");
            }
        }
        let back = CheckpointConverter::jsonld_to_v2(&document).unwrap();
        let item = back.checkpoint.values().next().unwrap();
        assert!(item.author.is_none());
        assert!(item.sources.is_some());
    }

    #[test]
    fn test_legacy_string_encoded_traits_merge_into_global_rubric() {
        let checkpoint = sample_checkpoint();
        let mut document =
            CheckpointConverter::v2_to_jsonld(&checkpoint, &ConversionOptions::new()).unwrap();
        // Legacy wire names: "invert" instead of "invert_result".
        let legacy = r#"[{"name":"legacy_regex","pattern":"foo","invert":true}]"#;
        document.additional_property = Some(vec![PropertyValue::new(
            "regex_traits",
            json!(legacy),
        )]);

        let back = CheckpointConverter::jsonld_to_v2(&document).unwrap();
        let rubric = back.global_rubric.unwrap();
        assert_eq!(rubric.regex_traits.len(), 2);
        let legacy_trait = rubric
            .regex_traits
            .iter()
            .find(|t| t.name == "legacy_regex")
            .unwrap();
        assert!(legacy_trait.invert_result);
    }

    #[test]
    fn test_empty_checkpoint_converts() {
        let checkpoint = UnifiedCheckpoint::new();
        let document = CheckpointConverter::v2_to_jsonld(&checkpoint, &options_full()).unwrap();
        assert!(document.data_feed_element.is_empty());
        assert_eq!(document.name, DEFAULT_FEED_NAME);
        let back = CheckpointConverter::jsonld_to_v2(&document).unwrap();
        assert_eq!(back.question_count(), 0);
        assert!(back.global_rubric.is_none());
    }
}
