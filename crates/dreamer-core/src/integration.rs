//! Integration — the singleton follow-up record of a dream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Result,
  document::{Fields, encode},
};

/// `users/{uid}/dreams/{dreamId}/integration/main`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
  /// One or two questions to carry into waking life.
  pub reflective_questions: Vec<String>,
  pub practice_suggestion:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub journal_text:         Option<String>,
  #[serde(with = "crate::timestamp")]
  pub created_at:           DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at:           Option<DateTime<Utc>>,
}

impl Integration {
  pub fn new(
    reflective_questions: Vec<String>,
    practice_suggestion: impl Into<String>,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      reflective_questions,
      practice_suggestion: practice_suggestion.into(),
      journal_text: None,
      created_at,
      updated_at: None,
    }
  }
}

/// Input to [`crate::repo::Repository::upsert_integration`]. Only `Some`
/// fields are written; a partial patch only merges into an existing record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reflective_questions: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub practice_suggestion:  Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub journal_text:         Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub created_at:           Option<DateTime<Utc>>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at:           Option<DateTime<Utc>>,
}

impl IntegrationPatch {
  pub fn is_complete(&self) -> bool {
    self.reflective_questions.is_some()
      && self.practice_suggestion.is_some()
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

impl From<Integration> for IntegrationPatch {
  fn from(i: Integration) -> Self {
    Self {
      reflective_questions: Some(i.reflective_questions),
      practice_suggestion:  Some(i.practice_suggestion),
      journal_text:         i.journal_text,
      created_at:           Some(i.created_at),
      updated_at:           i.updated_at,
    }
  }
}

impl From<&Integration> for IntegrationPatch {
  fn from(i: &Integration) -> Self { i.clone().into() }
}
