// ============================================================
// JSON-LD WIRE TYPES
// ============================================================
// schema.org-vocabulary portable serialization of a checkpoint.
// Plain nested records; node identifiers are optional strings,
// there is no cross-document reference to resolve.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SCHEMA_ORG_CONTEXT: &str = "https://schema.org";

/// A schema.org PropertyValue entry in an `additionalProperty` bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(rename = "@type")]
    pub node_type: String,

    pub name: String,

    pub value: Value,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            node_type: "PropertyValue".to_string(),
            name: name.into(),
            value,
        }
    }
}

/// A schema.org Rating carrying one rubric trait. `additional_type`
/// discriminates the trait variant and its scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(rename = "@type")]
    pub node_type: String,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "additionalType")]
    pub additional_type: String,

    #[serde(rename = "worstRating", default, skip_serializing_if = "Option::is_none")]
    pub worst_rating: Option<i32>,

    #[serde(rename = "bestRating", default, skip_serializing_if = "Option::is_none")]
    pub best_rating: Option<i32>,

    #[serde(
        rename = "additionalProperty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_property: Option<Vec<PropertyValue>>,
}

/// The ground-truth answer node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "@type")]
    pub node_type: String,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub text: String,
}

impl Answer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            node_type: "Answer".to_string(),
            id: None,
            text: text.into(),
        }
    }
}

/// The answer template, embedded as source code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareSourceCode {
    #[serde(rename = "@type")]
    pub node_type: String,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub text: String,

    #[serde(rename = "programmingLanguage")]
    pub programming_language: String,
}

impl SoftwareSourceCode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            node_type: "SoftwareSourceCode".to_string(),
            id: None,
            text: text.into(),
            programming_language: "Python".to_string(),
        }
    }
}

/// One benchmark question with its accepted answer, template,
/// question-specific ratings and property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLdQuestion {
    #[serde(rename = "@type")]
    pub node_type: String,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub text: String,

    #[serde(rename = "acceptedAnswer")]
    pub accepted_answer: Answer,

    #[serde(rename = "hasPart")]
    pub has_part: SoftwareSourceCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Vec<Rating>>,

    #[serde(
        rename = "additionalProperty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_property: Option<Vec<PropertyValue>>,
}

/// Wrapper element in the feed, carrying the per-question timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFeedItem {
    #[serde(rename = "@type")]
    pub node_type: String,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "dateCreated")]
    pub date_created: String,

    #[serde(rename = "dateModified")]
    pub date_modified: String,

    pub item: JsonLdQuestion,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
}

/// The DataFeed document root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLdCheckpoint {
    #[serde(rename = "@context")]
    pub context: String,

    #[serde(rename = "@type")]
    pub node_type: String,

    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Value>,

    #[serde(rename = "dateCreated")]
    pub date_created: String,

    #[serde(rename = "dateModified")]
    pub date_modified: String,

    /// Global rubric traits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Vec<Rating>>,

    #[serde(rename = "dataFeedElement")]
    pub data_feed_element: Vec<DataFeedItem>,

    #[serde(
        rename = "additionalProperty",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_property: Option<Vec<PropertyValue>>,
}

/// Find a property value by name inside an optional property bag.
pub fn find_property<'a>(bag: &'a Option<Vec<PropertyValue>>, name: &str) -> Option<&'a Value> {
    bag.as_ref()?
        .iter()
        .find(|property| property.name == name)
        .map(|property| &property.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let answer = Answer::new("42");
        let value = serde_json::to_value(&answer).unwrap();
        assert_eq!(value["@type"], "Answer");
        assert_eq!(value["text"], "42");

        let code = SoftwareSourceCode::new("class Answer: ...");
        let value = serde_json::to_value(&code).unwrap();
        assert_eq!(value["programmingLanguage"], "Python");
    }

    #[test]
    fn test_find_property() {
        let bag = Some(vec![
            PropertyValue::new("finished", json!(true)),
            PropertyValue::new("custom_topic", json!("algebra")),
        ]);
        assert_eq!(find_property(&bag, "finished"), Some(&json!(true)));
        assert_eq!(find_property(&bag, "missing"), None);
        assert_eq!(find_property(&None, "finished"), None);
    }
}
