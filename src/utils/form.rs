//! `application/x-www-form-urlencoded` decoding into JSON-shaped values.
//!
//! Query strings and form bodies share one representation so the sanitizer,
//! detectors, and validator see a single [`Value`] shape. Repeated keys become
//! arrays of strings.

use serde_json::{Map, Value};
use url::form_urlencoded;

/// Decodes a urlencoded byte string into a JSON object of strings.
pub fn decode_form(raw: &[u8]) -> Value {
    let mut map = Map::new();

    for (key, value) in form_urlencoded::parse(raw) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }

    Value::Object(map)
}

/// Encodes a JSON object back into urlencoded form.
///
/// Arrays are emitted as repeated keys; non-string scalars use their JSON text.
pub fn encode_form(value: &Value) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());

    if let Value::Object(map) = value {
        for (key, value) in map {
            match value {
                Value::Array(items) => {
                    for item in items {
                        serializer.append_pair(key, &scalar_text(item));
                    }
                }
                other => {
                    serializer.append_pair(key, &scalar_text(other));
                }
            }
        }
    }

    serializer.finish()
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_simple_pairs() {
        let value = decode_form(b"q=red+shoes&page=2");
        assert_eq!(value, json!({"q": "red shoes", "page": "2"}));
    }

    #[test]
    fn test_decode_repeated_keys() {
        let value = decode_form(b"tag=a&tag=b&tag=c");
        assert_eq!(value, json!({"tag": ["a", "b", "c"]}));
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode_form(b""), json!({}));
    }

    #[test]
    fn test_encode_preserves_pairs() {
        let encoded = encode_form(&json!({"q": "red shoes", "tag": ["a", "b"]}));
        assert_eq!(decode_form(encoded.as_bytes()), json!({"q": "red shoes", "tag": ["a", "b"]}));
    }
}
