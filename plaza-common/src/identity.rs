//! Identity normalization.
//!
//! The backend serializes record ids as either `id` or `_id` depending on the
//! endpoint. Records are read through [`Identified`] and carry a single `id`
//! from then on.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("record has neither `id` nor `_id`")]
pub struct MissingIdentity;

/// Wire form of a record whose identity may arrive under either key
#[derive(Debug, Deserialize)]
pub struct Identified<T> {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "_id", default)]
    legacy_id: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Identified<T> {
    /// Split into the normalized id and the rest of the record.
    /// `id` wins when both keys are present; empty strings count as absent.
    pub fn into_parts(self) -> Result<(String, T), MissingIdentity> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .or(self.legacy_id.filter(|id| !id.is_empty()))
            .ok_or(MissingIdentity)?;
        Ok((id, self.body))
    }
}

/// Read the normalized id out of an untyped JSON object (session user, etc).
pub fn id_from_value(value: &serde_json::Value) -> Option<String> {
    ["id", "_id"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|v| v.as_str()))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Body {
        name: String,
    }

    #[test]
    fn test_accepts_either_key() {
        let a: Identified<Body> = serde_json::from_value(json!({"id": "a1", "name": "x"})).unwrap();
        let b: Identified<Body> =
            serde_json::from_value(json!({"_id": "b1", "name": "y"})).unwrap();
        assert_eq!(a.into_parts().unwrap().0, "a1");
        let (id, body) = b.into_parts().unwrap();
        assert_eq!(id, "b1");
        assert_eq!(body.name, "y");
    }

    #[test]
    fn test_prefers_id_over_legacy() {
        let both: Identified<Body> =
            serde_json::from_value(json!({"id": "new", "_id": "old", "name": "x"})).unwrap();
        assert_eq!(both.into_parts().unwrap().0, "new");
    }

    #[test]
    fn test_missing_identity() {
        let none: Identified<Body> = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert_eq!(none.into_parts().unwrap_err(), MissingIdentity);

        let empty: Identified<Body> =
            serde_json::from_value(json!({"id": "", "name": "x"})).unwrap();
        assert!(empty.into_parts().is_err());
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(id_from_value(&json!({"_id": "u1"})), Some("u1".into()));
        assert_eq!(id_from_value(&json!({"id": "u2", "_id": "u1"})), Some("u2".into()));
        assert_eq!(id_from_value(&json!({"username": "x"})), None);
    }
}
