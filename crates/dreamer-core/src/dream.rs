//! Dream — the top-level journal entry that owns every other record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  document::{Fields, encode},
  lifecycle::DreamStatus,
};

/// `users/{uid}/dreams/{dreamId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dream {
  pub raw_text:     String,
  #[serde(with = "crate::timestamp")]
  pub dreamed_at:   DateTime<Utc>,
  #[serde(with = "crate::timestamp")]
  pub created_at:   DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at:   Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mood:         Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub life_context: Option<String>,
  pub status:       DreamStatus,
}

/// Input to [`crate::repo::Repository::create_dream`].
///
/// There is deliberately no status field: new dreams always start as
/// [`DreamStatus::Draft`].
#[derive(Debug, Clone, Default)]
pub struct NewDream {
  pub raw_text:     String,
  /// When the dream occurred; defaults to the creation time.
  pub dreamed_at:   Option<DateTime<Utc>>,
  pub mood:         Option<String>,
  pub life_context: Option<String>,
}

impl NewDream {
  pub fn new(raw_text: impl Into<String>) -> Self {
    Self {
      raw_text: raw_text.into(),
      ..Self::default()
    }
  }

  pub(crate) fn into_dream(self, created_at: DateTime<Utc>) -> Dream {
    Dream {
      raw_text: self.raw_text,
      dreamed_at: self.dreamed_at.unwrap_or(created_at),
      created_at,
      updated_at: None,
      mood: self.mood,
      life_context: self.life_context,
      status: DreamStatus::Draft,
    }
  }
}

/// Partial update of a dream. Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DreamPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub raw_text:     Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub dreamed_at:   Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mood:         Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub life_context: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status:       Option<DreamStatus>,
}

impl DreamPatch {
  pub fn status(status: DreamStatus) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }

  /// The fields to write, always including `updatedAt`.
  pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Result<Fields> {
    let mut fields = encode(&self)?;
    fields.insert("updatedAt".into(), crate::timestamp::format(now).into());
    Ok(fields)
  }
}

/// Options for [`crate::repo::Repository::list_dreams`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DreamListOptions {
  pub page_size:   Option<usize>,
  pub only_status: Option<DreamStatus>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn new_dreams_are_drafts_dated_at_creation() {
    let now = crate::timestamp::now();
    let dream = NewDream::new("flying over a lake").into_dream(now);
    assert_eq!(dream.status, DreamStatus::Draft);
    assert_eq!(dream.dreamed_at, now);
    assert_eq!(dream.updated_at, None);
  }

  #[test]
  fn stored_shape_is_camel_case() {
    let now = crate::timestamp::parse("2024-05-01T07:30:00Z").unwrap();
    let mut input = NewDream::new("a red door");
    input.life_context = Some("new job".into());
    let fields = encode(&input.into_dream(now)).unwrap();
    assert_eq!(
      serde_json::Value::Object(fields),
      json!({
        "rawText": "a red door",
        "dreamedAt": "2024-05-01T07:30:00.000000Z",
        "createdAt": "2024-05-01T07:30:00.000000Z",
        "lifeContext": "new job",
        "status": "draft",
      })
    );
  }

  #[test]
  fn patch_writes_only_supplied_fields() {
    let now = crate::timestamp::parse("2024-05-01T07:30:00Z").unwrap();
    let patch = DreamPatch {
      mood: Some("uneasy".into()),
      ..Default::default()
    };
    let fields = patch.into_fields(now).unwrap();
    assert_eq!(
      serde_json::Value::Object(fields),
      json!({ "mood": "uneasy", "updatedAt": "2024-05-01T07:30:00.000000Z" })
    );
  }
}
