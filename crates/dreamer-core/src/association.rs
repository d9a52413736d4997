//! Associations — the dreamer's personal meaning attached to one element.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

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
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmotionalValence {
  Positive,
  Negative,
  Mixed,
}

// ─── Salience ────────────────────────────────────────────────────────────────

/// How significant an association feels, always within `1..=5`.
///
/// Out-of-range input is sanitised, never rejected: the value is rounded, then
/// clamped. Stored values pass through the same clamp when read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "f64", into = "u8")]
pub struct Salience(u8);

impl Salience {
  pub const MIN: u8 = 1;
  pub const MAX: u8 = 5;

  /// Round, then clamp into `1..=5`. `NaN` clamps to the minimum.
  pub fn clamp(n: f64) -> Self {
    let clamped = n
      .round()
      .max(f64::from(Self::MIN))
      .min(f64::from(Self::MAX));
    Self(clamped as u8)
  }

  pub fn get(self) -> u8 { self.0 }
}

impl From<f64> for Salience {
  fn from(n: f64) -> Self { Self::clamp(n) }
}

impl From<Salience> for u8 {
  fn from(s: Salience) -> Self { s.0 }
}

// ─── Association ─────────────────────────────────────────────────────────────

/// `users/{uid}/dreams/{dreamId}/associations/{associationId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Association {
  /// Id of the element this association belongs to. Not checked by the
  /// repository; callers must pass an existing element id.
  pub element_id:        String,
  pub association_text:  String,
  pub emotional_valence: EmotionalValence,
  pub salience:          Salience,
  #[serde(with = "crate::timestamp")]
  pub created_at:        DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at:        Option<DateTime<Utc>>,
}

/// Input to [`crate::repo::Repository::create_association`].
#[derive(Debug, Clone)]
pub struct NewAssociation {
  pub element_id:        String,
  pub association_text:  String,
  pub emotional_valence: EmotionalValence,
  /// Raw rating; clamped on write.
  pub salience:          f64,
}

impl NewAssociation {
  pub(crate) fn into_association(self, created_at: DateTime<Utc>) -> Association {
    Association {
      element_id: self.element_id,
      association_text: self.association_text,
      emotional_valence: self.emotional_valence,
      salience: Salience::clamp(self.salience),
      created_at,
      updated_at: None,
    }
  }
}

/// Partial update of an association. Only `Some` fields are written.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub element_id:        Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub association_text:  Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub emotional_valence: Option<EmotionalValence>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    serialize_with = "serialize_clamped"
  )]
  pub salience:          Option<f64>,
}

fn serialize_clamped<S: serde::Serializer>(
  n: &Option<f64>,
  serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
  n.map(Salience::clamp).serialize(serializer)
}

impl AssociationPatch {
  pub(crate) fn into_fields(self, now: DateTime<Utc>) -> Result<Fields> {
    let mut fields = encode(&self)?;
    fields.insert("updatedAt".into(), crate::timestamp::format(now).into());
    Ok(fields)
  }
}
