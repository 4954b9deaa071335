//! Parsing and merging of `extra_metadata`.

use serde_json::Value;
use std::collections::BTreeMap;

use versioner_api::Metadata;

use crate::error::MetadataError;

/// Upper bound on the raw `extra_metadata` document, in bytes.
pub const MAX_METADATA_SIZE: usize = 100 * 1024;

/// Parse a user-supplied JSON object.
///
/// An empty string means "no document" and yields `Ok(None)`, distinct from
/// `"{}"` which yields an empty map. The size ceiling is checked before
/// decoding.
pub fn parse(raw: &str) -> Result<Option<Metadata>, MetadataError> {
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() > MAX_METADATA_SIZE {
        return Err(MetadataError::SizeExceeded {
            limit: MAX_METADATA_SIZE,
            actual: raw.len(),
        });
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(Value::Null) => Err(MetadataError::Malformed(
            "extra_metadata must be a JSON object, not null".to_string(),
        )),
        Ok(other) => Err(MetadataError::Malformed(format!(
            "extra_metadata must be a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(MetadataError::Malformed(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Merge detected and user metadata; user keys win on collision.
///
/// When either side is absent the other is returned as is.
pub fn merge(detected: Option<Metadata>, user: Option<Metadata>) -> Option<Metadata> {
    match (detected, user) {
        (None, user) => user,
        (detected, None) => detected,
        (Some(mut merged), Some(user)) => {
            merged.extend(user);
            Some(merged)
        }
    }
}

/// Convert the detector's string bag into a metadata document.
///
/// An empty bag becomes `None` so it never masks a user document.
pub fn from_detected(bag: &BTreeMap<String, String>) -> Option<Metadata> {
    if bag.is_empty() {
        return None;
    }
    Some(
        bag.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn empty_input_is_no_document() {
        assert!(parse("").unwrap().is_none());
        assert_eq!(parse("{}").unwrap(), Some(Metadata::new()));
    }

    #[test]
    fn accepts_nested_objects() {
        let parsed = parse(r#"{"team":"payments","tags":["a","b"],"n":3}"#)
            .unwrap()
            .unwrap();
        assert_eq!(parsed["team"], json!("payments"));
        assert_eq!(parsed["tags"], json!(["a", "b"]));
    }

    #[test]
    fn rejects_non_objects() {
        for raw in ["[1,2]", "42", "\"text\"", "true", "null", "{not json"] {
            assert!(
                matches!(parse(raw), Err(MetadataError::Malformed(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn oversized_input_fails_before_decoding() {
        // Not valid JSON: only the size check can produce SizeExceeded.
        let raw = "x".repeat(150 * 1024);
        match parse(&raw) {
            Err(MetadataError::SizeExceeded { limit, actual }) => {
                assert_eq!(limit, MAX_METADATA_SIZE);
                assert_eq!(actual, 150 * 1024);
            }
            other => panic!("expected SizeExceeded, got {other:?}"),
        }
    }

    #[test]
    fn exactly_at_limit_is_decoded() {
        let padding = "a".repeat(MAX_METADATA_SIZE - r#"{"k":""}"#.len());
        let raw = format!(r#"{{"k":"{padding}"}}"#);
        assert_eq!(raw.len(), MAX_METADATA_SIZE);
        assert!(parse(&raw).unwrap().is_some());
    }

    #[test]
    fn user_wins_on_collision() {
        let merged = merge(
            Some(doc(json!({"a": "1"}))),
            Some(doc(json!({"a": "2", "b": "3"}))),
        );
        assert_eq!(merged, Some(doc(json!({"a": "2", "b": "3"}))));
    }

    #[test]
    fn absent_side_returns_other() {
        let user = doc(json!({"x": "1"}));
        assert_eq!(merge(None, Some(user.clone())), Some(user.clone()));
        assert_eq!(merge(Some(user.clone()), None), Some(user));
        assert_eq!(merge(None, None), None);
    }

    #[test]
    fn detected_bag_conversion() {
        assert_eq!(from_detected(&BTreeMap::new()), None);

        let mut bag = BTreeMap::new();
        bag.insert("vi_gh_job".to_string(), "build".to_string());
        assert_eq!(from_detected(&bag), Some(doc(json!({"vi_gh_job": "build"}))));
    }
}
