//! Hypotheses — interpretive readings of a dream through one lens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::{
  Error, Result,
  document::{Fields, encode},
};

/// The fixed set of interpretive frames.
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
pub enum Lens {
  Compensation,
  Shadow,
  ArchetypalDynamics,
  RelationalAnimaAnimus,
  Individuation,
}

/// What an evidence item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
  DreamText,
  Element,
  Association,
}

/// One supporting reference inside a hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
  #[serde(rename = "type")]
  pub kind:   EvidenceKind,
  /// Element id, association id, or a dream-text anchor id.
  pub ref_id: String,
  /// Short excerpt.
  pub quote:  String,
}

/// The dreamer's reaction to a hypothesis.
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
pub enum Feedback {
  Resonates,
  DoesNotFit,
}

/// `users/{uid}/dreams/{dreamId}/hypotheses/{hypothesisId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
  pub lens:                Lens,
  pub hypothesis_text:     String,
  pub evidence:            Vec<Evidence>,
  pub reflective_question: String,
  /// Overwritten on every response; no history is kept.
  #[serde(default)]
  pub user_feedback:       Option<Feedback>,
  #[serde(with = "crate::timestamp")]
  pub created_at:          DateTime<Utc>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at:          Option<DateTime<Utc>>,
}

/// Input to [`crate::repo::Repository::upsert_hypothesis`]. Only `Some`
/// fields are written; a partial patch only merges into an existing
/// hypothesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisPatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub lens:                Option<Lens>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hypothesis_text:     Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub evidence:            Option<Vec<Evidence>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reflective_question: Option<String>,
  /// `Some(None)` writes an explicit null.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_feedback:       Option<Option<Feedback>>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub created_at:          Option<DateTime<Utc>>,
  #[serde(
    skip_serializing_if = "Option::is_none",
    with = "crate::timestamp::option"
  )]
  pub updated_at:          Option<DateTime<Utc>>,
}

impl HypothesisPatch {
  pub fn is_complete(&self) -> bool {
    self.lens.is_some()
      && self.hypothesis_text.is_some()
      && self.evidence.is_some()
      && self.reflective_question.is_some()
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

impl From<Hypothesis> for HypothesisPatch {
  fn from(h: Hypothesis) -> Self {
    Self {
      lens:                Some(h.lens),
      hypothesis_text:     Some(h.hypothesis_text),
      evidence:            Some(h.evidence),
      reflective_question: Some(h.reflective_question),
      user_feedback:       Some(h.user_feedback),
      created_at:          Some(h.created_at),
      updated_at:          h.updated_at,
    }
  }
}

impl From<&Hypothesis> for HypothesisPatch {
  fn from(h: &Hypothesis) -> Self { h.clone().into() }
}

/// A hypothesis as produced by a generator, before it is stamped and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftHypothesis {
  pub lens:                Lens,
  pub hypothesis_text:     String,
  pub evidence:            Vec<Evidence>,
  pub reflective_question: String,
}

impl DraftHypothesis {
  /// Structural check only: at least one evidence item, every evidence item
  /// carries a reference and a quote, and there is a reflective question.
  pub fn validate(&self) -> Result<()> {
    if self.evidence.is_empty() {
      return Err(Error::InvalidHypothesis(format!(
        "{} hypothesis has no evidence",
        self.lens
      )));
    }
    if let Some(bad) = self
      .evidence
      .iter()
      .find(|e| e.ref_id.trim().is_empty() || e.quote.trim().is_empty())
    {
      return Err(Error::InvalidHypothesis(format!(
        "{} hypothesis has an incomplete {:?} evidence item",
        self.lens, bad.kind
      )));
    }
    if self.reflective_question.trim().is_empty() {
      return Err(Error::InvalidHypothesis(format!(
        "{} hypothesis has no reflective question",
        self.lens
      )));
    }
    Ok(())
  }

  pub fn into_hypothesis(self, created_at: DateTime<Utc>) -> Hypothesis {
    Hypothesis {
      lens: self.lens,
      hypothesis_text: self.hypothesis_text,
      evidence: self.evidence,
      reflective_question: self.reflective_question,
      user_feedback: None,
      created_at,
      updated_at: None,
    }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn draft() -> DraftHypothesis {
    DraftHypothesis {
      lens:                Lens::Shadow,
      hypothesis_text:     "An unacknowledged part of you.".into(),
      evidence:            vec![Evidence {
        kind:   EvidenceKind::DreamText,
        ref_id: "dream-main".into(),
        quote:  "a figure in the hallway".into(),
      }],
      reflective_question: "What do you avoid seeing?".into(),
    }
  }

  #[test]
  fn well_formed_draft_validates() {
    assert!(draft().validate().is_ok());
  }

  #[test]
  fn missing_evidence_or_question_is_rejected() {
    let mut d = draft();
    d.evidence.clear();
    assert!(matches!(d.validate(), Err(Error::InvalidHypothesis(_))));

    let mut d = draft();
    d.evidence[0].ref_id = " ".into();
    assert!(d.validate().is_err());

    let mut d = draft();
    d.reflective_question.clear();
    assert!(d.validate().is_err());
  }

  #[test]
  fn stored_shape() {
    let at = crate::timestamp::parse("2024-05-01T07:30:00Z").unwrap();
    let value = serde_json::to_value(draft().into_hypothesis(at)).unwrap();
    assert_eq!(value["lens"], json!("shadow"));
    assert_eq!(value["evidence"][0]["type"], json!("dream_text"));
    assert_eq!(value["evidence"][0]["refId"], json!("dream-main"));
    assert_eq!(value["userFeedback"], serde_json::Value::Null);
    assert!(value.get("updatedAt").is_none());
  }

  #[test]
  fn full_patch_matches_the_stored_shape() {
    let at = crate::timestamp::parse("2024-05-01T07:30:00Z").unwrap();
    let hypothesis = draft().into_hypothesis(at);
    let fields = HypothesisPatch::from(&hypothesis).into_fields(at).unwrap();
    assert_eq!(fields, encode(&hypothesis).unwrap());
    assert_eq!(fields["userFeedback"], serde_json::Value::Null);
  }

  #[test]
  fn feedback_wire_names() {
    assert_eq!(serde_json::to_value(Feedback::DoesNotFit).unwrap(), json!("does_not_fit"));
    assert_eq!("resonates".parse::<Feedback>().unwrap(), Feedback::Resonates);
  }
}
