//! Untyped documents as the store sees them, and the typed rows handed to
//! callers.
//!
//! Every read crosses [`decode`]: a document either parses into its record
//! type or yields [`Error::Decode`] naming the offending path. Nothing is
//! trusted on the strength of a type annotation alone.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Error, Result, paths::DocPath};

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A document snapshot: its path and its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  pub path: DocPath,
  pub data: Fields,
}

impl Document {
  pub fn id(&self) -> &str { self.path.id() }
}

/// A typed record together with the id of the document it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row<T> {
  pub id:   String,
  pub data: T,
}

impl<T> Row<T> {
  pub fn new(id: impl Into<String>, data: T) -> Self {
    Self { id: id.into(), data }
  }
}

/// Parse a document into a typed row.
pub fn decode<T: DeserializeOwned>(doc: Document) -> Result<Row<T>> {
  let id = doc.id().to_owned();
  let data = serde_json::from_value(Value::Object(doc.data)).map_err(|source| {
    Error::Decode {
      path: doc.path.to_string(),
      source,
    }
  })?;
  Ok(Row { id, data })
}

/// Parse a list of documents, failing on the first malformed one.
pub fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<Row<T>>> {
  docs.into_iter().map(decode).collect()
}

/// Serialise a record into a field map.
pub fn encode<T: Serialize>(record: &T) -> Result<Fields> {
  match serde_json::to_value(record)? {
    Value::Object(fields) => Ok(fields),
    _ => Err(Error::NotAnObject),
  }
}

/// Deep-merge `patch` into `target`: nested objects merge field by field,
/// every other value replaces what was there.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
  for (key, value) in patch {
    match (target.get_mut(&key), value) {
      (Some(Value::Object(existing)), Value::Object(incoming)) => {
        merge_fields(existing, incoming);
      }
      (_, value) => {
        target.insert(key, value);
      }
    }
  }
}

/// Shallow field update: each top-level key in `patch` replaces the value in
/// `target` wholesale.
pub fn update_fields(target: &mut Fields, patch: Fields) {
  target.extend(patch);
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn fields(v: Value) -> Fields {
    match v {
      Value::Object(m) => m,
      _ => unreachable!(),
    }
  }

  #[test]
  fn merge_is_deep_and_keeps_untouched_fields() {
    let mut target = fields(json!({
      "a": 1,
      "settings": { "language": "en", "theme": "dark" }
    }));
    merge_fields(&mut target, fields(json!({ "settings": { "language": "de" } })));
    assert_eq!(
      Value::Object(target),
      json!({ "a": 1, "settings": { "language": "de", "theme": "dark" } })
    );
  }

  #[test]
  fn update_replaces_nested_objects_wholesale() {
    let mut target = fields(json!({
      "a": 1,
      "settings": { "language": "en", "theme": "dark" }
    }));
    update_fields(&mut target, fields(json!({ "settings": { "language": "de" } })));
    assert_eq!(
      Value::Object(target),
      json!({ "a": 1, "settings": { "language": "de" } })
    );
  }

  #[test]
  fn decode_reports_the_path_of_a_malformed_document() {
    #[derive(Debug, Deserialize)]
    struct Needs {
      #[allow(dead_code)]
      x: String,
    }

    let doc = Document {
      path: DocPath::parse("users/u/dreams/d").unwrap(),
      data: fields(json!({ "x": 3 })),
    };
    let err = decode::<Needs>(doc).unwrap_err();
    assert!(matches!(err, Error::Decode { ref path, .. } if path == "users/u/dreams/d"));
  }
}
