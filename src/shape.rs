//! Helpers for the recurring shapes the HiBob API returns inside `data`.
//!
//! The upstream is not shape-consistent across endpoints: list endpoints
//! return an array, detail endpoints a single object, a few wrap their list
//! one level deeper under `rows`, and several field values arrive as
//! `{ currentValue, formattedCurrentValue, label, type }` objects instead of
//! raw scalars. Handlers pick the helper matching their endpoint family
//! rather than re-deriving the unwrapping in place.

use serde_json::Value;

use crate::http::Envelope;

/// The records inside `data`, whatever the endpoint's wrapping convention:
/// an array is taken as-is, an object with a `rows` array is unwrapped one
/// level, any other object is a single record, `null` is empty.
pub fn records(data: &Value) -> Vec<Value> {
    if let Some(items) = data.as_array() {
        return items.clone();
    }
    if let Some(inner) = rows(data) {
        return inner.clone();
    }
    if data.is_object() {
        return vec![data.clone()];
    }
    Vec::new()
}

/// The nested `rows` array of wrapper-object endpoints.
pub fn rows(data: &Value) -> Option<&Vec<Value>> {
    data.get("rows").and_then(Value::as_array)
}

/// Continuation token, whichever pagination family the endpoint uses.
/// An absent token means end of sequence.
pub fn next_cursor(envelope: &Envelope) -> Option<String> {
    if let Some(cursor) = envelope.page.as_ref().and_then(|p| p.cursor.clone()) {
        return Some(cursor);
    }
    if envelope.has_next_page == Some(true) {
        return envelope.next.clone();
    }
    None
}

pub fn has_more(envelope: &Envelope) -> bool {
    next_cursor(envelope).is_some()
}

/// Unwrap a possibly field-wrapped value down to its scalar.
pub fn scalar(value: &Value) -> &Value {
    match value.get("currentValue") {
        Some(inner) => inner,
        None => value,
    }
}

/// Human-readable rendering of a possibly wrapped field value:
/// `formattedCurrentValue`, then `currentValue`, then the raw scalar.
pub fn display(value: &Value) -> Option<String> {
    if let Some(s) = value.get("formattedCurrentValue").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    render(scalar(value))
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// String field of a record, through the field-object convention.
pub fn text(record: &Value, key: &str) -> Option<String> {
    record.get(key).and_then(display)
}

pub fn number(record: &Value, key: &str) -> Option<f64> {
    record.get(key).map(scalar).and_then(Value::as_f64)
}

pub fn boolean(record: &Value, key: &str) -> Option<bool> {
    record.get(key).map(scalar).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Page;
    use serde_json::json;

    #[test]
    fn records_handles_all_wrapping_conventions() {
        assert_eq!(records(&json!([{"id": 1}, {"id": 2}])).len(), 2);
        assert_eq!(records(&json!({"rows": [{"id": 1}]})).len(), 1);
        assert_eq!(records(&json!({"id": 1})).len(), 1);
        assert!(records(&Value::Null).is_empty());
    }

    #[test]
    fn cursor_comes_from_page_first() {
        let env = Envelope {
            page: Some(Page {
                cursor: Some("abc".into()),
                ..Page::default()
            }),
            next: Some("ignored".into()),
            has_next_page: Some(true),
            ..Envelope::default()
        };
        assert_eq!(next_cursor(&env), Some("abc".into()));
    }

    #[test]
    fn top_level_next_requires_has_next_page() {
        let mut env = Envelope {
            next: Some("tok".into()),
            has_next_page: Some(true),
            ..Envelope::default()
        };
        assert_eq!(next_cursor(&env), Some("tok".into()));
        assert!(has_more(&env));

        env.has_next_page = Some(false);
        assert_eq!(next_cursor(&env), None);

        env.has_next_page = None;
        assert_eq!(next_cursor(&env), None);
        assert!(!has_more(&env));
    }

    #[test]
    fn wrapped_fields_unwrap_to_scalars() {
        let record = json!({
            "salary": {
                "currentValue": 98000,
                "formattedCurrentValue": "$98,000",
                "label": "Base salary",
                "type": "currency"
            },
            "name": "Noor Haddad",
            "active": {"currentValue": true}
        });
        assert_eq!(number(&record, "salary"), Some(98000.0));
        assert_eq!(text(&record, "salary"), Some("$98,000".into()));
        assert_eq!(text(&record, "name"), Some("Noor Haddad".into()));
        assert_eq!(boolean(&record, "active"), Some(true));
        assert_eq!(text(&record, "missing"), None);
    }
}
