//! Lenient field decoding for backend records.
//!
//! The ticketing backend reports unset fields as `false`, `null` or `""`
//! rather than omitting them.

use serde::de::{DeserializeOwned, Deserializer, Error};
use serde::Deserialize;
use serde_json::Value;

/// `false`, `null` and `""` read as `None`; anything else must decode as `T`.
pub fn falsy_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Bool(false) => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        other => T::deserialize(other).map(Some).map_err(D::Error::custom),
    }
}

/// Like `falsy_as_none`, but unset values become `T::default()`.
pub fn falsy_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    falsy_as_none(deserializer).map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "falsy_as_none")]
        note: Option<String>,
        #[serde(default, deserialize_with = "falsy_as_none")]
        count: Option<u32>,
        #[serde(default, deserialize_with = "falsy_as_default")]
        tags: Vec<String>,
    }

    #[test]
    fn test_unset_markers_read_as_absent() {
        for unset in [json!(false), json!(null), json!("")] {
            let record: Record =
                serde_json::from_value(json!({"note": unset, "tags": unset})).unwrap();
            assert_eq!(record.note, None);
            assert!(record.tags.is_empty());
        }

        let record: Record = serde_json::from_value(json!({})).unwrap();
        assert_eq!(record.count, None);
    }

    #[test]
    fn test_set_values_still_decode_strictly() {
        let record: Record =
            serde_json::from_value(json!({"note": "hi", "count": 3, "tags": ["a"]})).unwrap();
        assert_eq!(record.note.as_deref(), Some("hi"));
        assert_eq!(record.count, Some(3));

        assert!(serde_json::from_value::<Record>(json!({"count": "three"})).is_err());
        assert!(serde_json::from_value::<Record>(json!({"note": true})).is_err());
    }
}
