//! Wire helpers for backend payloads.
//!
//! Backend documents are loosely shaped: identifiers arrive as `_id` or `id`, as strings or
//! numbers, and references to other documents arrive either as a bare id or as the populated
//! document itself. The helpers here absorb those variants so that domain types only ever see
//! plain `String` identifiers.

use crate::{HmsError, HmsResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// A reference to another backend document.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum IdRef {
    Text(String),
    Number(serde_json::Number),
    Document(IdDocument),
}

/// A populated document; only its identifier matters here.
///
/// `_id` and `id` may both be present (a stored id plus its virtual copy), so they are read
/// as separate fields.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct IdDocument {
    #[serde(rename = "_id", default)]
    stored_id: Option<Box<IdRef>>,
    #[serde(default)]
    id: Option<Box<IdRef>>,
}

impl IdRef {
    /// Flatten to a non-blank identifier string.
    pub(crate) fn into_id(self) -> Option<String> {
        match self {
            IdRef::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            IdRef::Number(n) => Some(n.to_string()),
            IdRef::Document(doc) => first_id(doc.stored_id.map(|id| *id), doc.id.map(|id| *id)),
        }
    }
}

/// First non-blank identifier of `primary`, then `secondary`.
pub(crate) fn first_id(primary: Option<IdRef>, secondary: Option<IdRef>) -> Option<String> {
    primary
        .and_then(IdRef::into_id)
        .or_else(|| secondary.and_then(IdRef::into_id))
}

/// Decode `value` into `T`, reporting the failing field path on mismatch.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> HmsResult<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        HmsError::Decode(format!("{what} schema mismatch at {path}: {}", err.into_inner()))
    })
}

/// Unwrap a single-document payload that may be wrapped under one of `keys`.
///
/// A payload that is itself a document (has `_id` or `id`) is returned as-is.
pub(crate) fn single_payload<'a>(data: &'a Value, keys: &[&str]) -> &'a Value {
    if let Value::Object(map) = data {
        if map.contains_key("_id") || map.contains_key("id") {
            return data;
        }
        if let Some(inner) = keys.iter().find_map(|k| map.get(*k).filter(|v| v.is_object())) {
            return inner;
        }
    }
    data
}

/// Render an amount the way the backend expects: whole numbers as integers.
pub(crate) fn amount_value(amount: f64) -> Value {
    if amount.is_finite() && amount.fract() == 0.0 && amount.abs() < 9.0e15 {
        Value::from(amount as i64)
    } else {
        Value::from(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_ref_flattens_all_shapes() {
        let text: IdRef = serde_json::from_value(json!("P1")).unwrap();
        assert_eq!(text.into_id().as_deref(), Some("P1"));

        let number: IdRef = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(number.into_id().as_deref(), Some("42"));

        let doc: IdRef = serde_json::from_value(json!({"_id": "P2", "name": "x"})).unwrap();
        assert_eq!(doc.into_id().as_deref(), Some("P2"));

        let aliased: IdRef = serde_json::from_value(json!({"id": "P3"})).unwrap();
        assert_eq!(aliased.into_id().as_deref(), Some("P3"));

        let blank: IdRef = serde_json::from_value(json!("  ")).unwrap();
        assert_eq!(blank.into_id(), None);
    }

    #[test]
    fn document_with_both_id_keys_prefers_stored_id() {
        let both: IdRef = serde_json::from_value(json!({"_id": "P1", "id": "P1-virtual"})).unwrap();
        assert_eq!(both.into_id().as_deref(), Some("P1"));

        let blank_stored: IdRef = serde_json::from_value(json!({"_id": " ", "id": "P2"})).unwrap();
        assert_eq!(blank_stored.into_id().as_deref(), Some("P2"));
    }

    #[test]
    fn decode_reports_field_path() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Probe {
            amount: f64,
        }

        let err = decode::<Probe>(&json!({"amount": "lots"}), "probe").unwrap_err();
        match err {
            HmsError::Decode(msg) => {
                assert!(msg.contains("probe"));
                assert!(msg.contains("amount"));
            }
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn single_payload_unwraps_known_keys() {
        let wrapped = json!({"data": {"_id": "A1"}});
        assert_eq!(single_payload(&wrapped, &["data"]), &json!({"_id": "A1"}));

        let bare = json!({"_id": "A1", "data": {"x": 1}});
        assert_eq!(single_payload(&bare, &["data"]), &bare);
    }

    #[test]
    fn whole_amounts_render_as_integers() {
        assert_eq!(amount_value(500.0), json!(500));
        assert_eq!(amount_value(12.5), json!(12.5));
    }
}
