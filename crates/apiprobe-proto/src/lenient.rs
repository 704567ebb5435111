//! Tolerant serde helpers for collaborator payloads.
//!
//! Case generators and decision oracles are frequently backed by language
//! models, which do not always respect the requested field types: numbers
//! arrive where strings were asked for, request bodies arrive as JSON objects
//! instead of serialized strings, and maps contain non-string values. These
//! helpers coerce such values instead of rejecting the whole payload.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Renders a JSON value as text: strings verbatim, `null` as empty, and
/// everything else in its compact JSON form.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deserializes any JSON scalar or structure into a `String`.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

/// Like [`string`], but keeps `null`/absent as `None`.
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(value_to_text(&v)),
    })
}

/// Deserializes an object into an insertion-ordered string map, coercing
/// values to text. `null` and non-object values yield an empty map.
pub fn string_map<'de, D>(deserializer: D) -> Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let mut map = IndexMap::new();
    if let Value::Object(obj) = value {
        for (key, v) in obj {
            map.insert(key, value_to_text(&v));
        }
    }
    Ok(map)
}

/// Deserializes a list of strings, accepting a single string or `null`.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(value_to_text).collect(),
        other => vec![value_to_text(&other)],
    })
}

/// Deserializes an optional value, treating `null` and anything that does not
/// decode as `T` as `None`.
pub fn optional_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "string")]
        text: String,
        #[serde(default, deserialize_with = "string_map")]
        map: IndexMap<String, String>,
        #[serde(default, deserialize_with = "string_list")]
        list: Vec<String>,
    }

    #[test]
    fn test_numbers_and_objects_become_text() {
        let p: Sample = serde_json::from_str(r#"{"text": 200}"#).unwrap();
        assert_eq!(p.text, "200");

        let p: Sample = serde_json::from_str(r#"{"text": {"a": 1}}"#).unwrap();
        assert_eq!(p.text, r#"{"a":1}"#);

        let p: Sample = serde_json::from_str(r#"{"text": null}"#).unwrap();
        assert_eq!(p.text, "");
    }

    #[test]
    fn test_string_map_keeps_insertion_order() {
        let p: Sample = serde_json::from_str(r#"{"map": {"z": 1, "a": true, "m": "x"}}"#).unwrap();
        let keys: Vec<&str> = p.map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(p.map["z"], "1");
        assert_eq!(p.map["a"], "true");
    }

    #[test]
    fn test_string_list_accepts_scalar() {
        let p: Sample = serde_json::from_str(r#"{"list": "users"}"#).unwrap();
        assert_eq!(p.list, vec!["users"]);

        let p: Sample = serde_json::from_str(r#"{"list": null}"#).unwrap();
        assert!(p.list.is_empty());
    }
}
