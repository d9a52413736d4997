//! Elements — symbolic units extracted from a dream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
  Result,
  document::{Fields, encode},
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
  Symbol,
  Character,
  Place,
  Action,
  Emotion,
  Shift,
}

/// Who authored an element.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementSource {
  /// Extracted by the system.
  Ai,
  #[default]
  User,
}

/// `users/{uid}/dreams/{dreamId}/elements/{elementId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
  pub kind:       ElementKind,
  pub label:      String,
  /// Short anchors quoted from the dream text.
  #[serde(default)]
  pub evidence:   Vec<String>,
  /// Ordering hint within a kind.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub order:      Option<i64>,
  pub source:     ElementSource,
  /// Soft-delete flag: hidden from default listings, kept for undo/audit.
  #[serde(default)]
  pub deleted:    bool,
  #[serde(with = "crate::timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Element {
  /// A fresh, visible element with no evidence or ordering hint.
  pub fn new(
    kind: ElementKind,
    label: impl Into<String>,
    source: ElementSource,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      kind,
      label: label.into(),
      evidence: Vec::new(),
      order: None,
      source,
      deleted: false,
      created_at,
      updated_at: None,
    }
  }

  pub fn with_order(mut self, order: i64) -> Self {
    self.order = Some(order);
    self
  }

  pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
    self.evidence = evidence;
    self
  }
}

/// Input to [`crate::repo::Repository::upsert_element`]. Only `Some` fields
/// are written, so fields left out keep their stored values.
///
/// A patch carrying every required field (see [`Self::is_complete`]) may
/// create the element; a partial one only merges into an existing element.
/// Converting from an [`Element`] yields a complete patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub kind:       Option<ElementKind>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label:      Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub evidence:   Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order:      Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source:     Option<ElementSource>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub deleted:    Option<bool>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at: Option<DateTime<Utc>>,
}

impl ElementPatch {
  /// Whether the patch alone decodes as an [`Element`].
  pub fn is_complete(&self) -> bool {
    self.kind.is_some()
      && self.label.is_some()
      && self.source.is_some()
      && self.created_at.is_some()
  }

  /// The fields to write. Partial patches also stamp `updatedAt`.
  pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Result<Fields> {
    let complete = self.is_complete();
    let mut fields = encode(&self)?;
    if !complete {
      fields.insert("updatedAt".into(), crate::timestamp::format(now).into());
    }
    Ok(fields)
  }
}

impl From<Element> for ElementPatch {
  fn from(e: Element) -> Self {
    Self {
      kind:       Some(e.kind),
      label:      Some(e.label),
      evidence:   Some(e.evidence),
      order:      e.order,
      source:     Some(e.source),
      deleted:    Some(e.deleted),
      created_at: Some(e.created_at),
      updated_at: e.updated_at,
    }
  }
}

impl From<&Element> for ElementPatch {
  fn from(e: &Element) -> Self { e.clone().into() }
}

/// Options for [`crate::repo::Repository::list_elements`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementListOptions {
  /// Also return soft-deleted elements.
  pub include_deleted: bool,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::document::{Document, decode};

  #[test]
  fn missing_optional_fields_take_defaults() {
    let serde_json::Value::Object(data) = json!({
      "kind": "place",
      "label": "grandmother's kitchen",
      "source": "ai",
      "createdAt": "2024-05-01T07:30:00.000000Z",
    }) else {
      unreachable!()
    };
    let doc = Document {
      path: crate::paths::element("u", "d", "e").unwrap(),
      data,
    };
    let row = decode::<Element>(doc).unwrap();
    assert_eq!(row.id, "e");
    assert_eq!(row.data.kind, ElementKind::Place);
    assert_eq!(row.data.source, ElementSource::Ai);
    assert!(!row.data.deleted);
    assert!(row.data.evidence.is_empty());
    assert_eq!(row.data.order, None);
  }

  #[test]
  fn partial_patch_writes_only_supplied_fields() {
    let now = crate::timestamp::parse("2024-05-01T07:30:00Z").unwrap();
    let patch = ElementPatch {
      label: Some("home".into()),
      kind: Some(ElementKind::Place),
      ..Default::default()
    };
    assert!(!patch.is_complete());
    let fields = patch.into_fields(now).unwrap();
    assert_eq!(
      serde_json::Value::Object(fields),
      json!({
        "kind": "place",
        "label": "home",
        "updatedAt": "2024-05-01T07:30:00.000000Z",
      })
    );
  }

  #[test]
  fn patch_from_an_element_is_complete() {
    let at = crate::timestamp::parse("2024-05-01T07:30:00Z").unwrap();
    let element = Element::new(ElementKind::Symbol, "key", ElementSource::Ai, at);
    let patch = ElementPatch::from(&element);
    assert!(patch.is_complete());
    let fields = patch.into_fields(at).unwrap();
    assert_eq!(fields, encode(&element).unwrap());
  }

  #[test]
  fn unknown_kind_is_a_decode_error() {
    let serde_json::Value::Object(data) = json!({
      "kind": "smell",
      "label": "smoke",
      "source": "user",
      "createdAt": "2024-05-01T07:30:00.000000Z",
    }) else {
      unreachable!()
    };
    let doc = Document {
      path: crate::paths::element("u", "d", "e").unwrap(),
      data,
    };
    assert!(decode::<Element>(doc).is_err());
  }
}
