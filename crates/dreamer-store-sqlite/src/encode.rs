//! Conversion between [`Document`]s and the text columns of the `documents`
//! table.

use dreamer_core::{
  document::{Document, Fields},
  paths::DocPath,
};

use crate::Result;

pub fn encode_fields(data: &Fields) -> Result<String> { Ok(serde_json::to_string(data)?) }

/// Parse a stored row back into a document. Anything other than a JSON
/// object is reported as a decode failure at `path`.
pub fn decode_document(path: DocPath, data: &str) -> Result<Document> {
  let data: Fields =
    serde_json::from_str(data).map_err(|source| dreamer_core::Error::Decode {
      path: path.to_string(),
      source,
    })?;
  Ok(Document { path, data })
}

/// Raw row as read from `documents` before the path is validated.
pub struct RawDocument {
  pub path: String,
  pub data: String,
}

impl RawDocument {
  pub fn decode(self) -> Result<Document> {
    decode_document(DocPath::parse(self.path)?, &self.data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::Error;

  #[test]
  fn non_object_rows_fail_to_decode() {
    let path = DocPath::parse("users/u1").unwrap();
    let err = decode_document(path, "[1, 2]").unwrap_err();
    assert!(matches!(err, Error::Core(dreamer_core::Error::Decode { .. })));
  }

  #[test]
  fn raw_rows_validate_their_path() {
    let raw = RawDocument {
      path: "users".into(),
      data: "{}".into(),
    };
    assert!(matches!(
      raw.decode(),
      Err(Error::Core(dreamer_core::Error::InvalidPath(_)))
    ));
  }
}
