//! Hierarchical document addressing.
//!
//! Every record is addressed by a slash-separated path that alternates
//! collection and document segments:
//!
//! ```text
//! users/{uid}
//! users/{uid}/dreams/{dreamId}
//! users/{uid}/dreams/{dreamId}/elements/{elementId}
//! users/{uid}/dreams/{dreamId}/associations/{associationId}
//! users/{uid}/dreams/{dreamId}/hypotheses/{hypothesisId}
//! users/{uid}/dreams/{dreamId}/integration/main
//! ```
//!
//! Ownership is expressed only through this composition; no record carries a
//! back-reference to its parent.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Well-known document id of the singleton integration record.
pub const INTEGRATION_ID: &str = "main";

fn check_segment(segment: &str) -> Result<()> {
  if segment.is_empty() || segment.contains('/') {
    return Err(Error::InvalidPath(segment.to_owned()));
  }
  Ok(())
}

fn segment_count(path: &str) -> Result<usize> {
  let mut n = 0;
  for segment in path.split('/') {
    check_segment(segment).map_err(|_| Error::InvalidPath(path.to_owned()))?;
    n += 1;
  }
  Ok(n)
}

/// Generate a fresh document id.
pub fn new_id() -> String { Uuid::new_v4().simple().to_string() }

// ─── DocPath ─────────────────────────────────────────────────────────────────

/// Path of a single document: an even number of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath(String);

impl DocPath {
  pub fn parse(path: impl Into<String>) -> Result<Self> {
    let path = path.into();
    match segment_count(&path)? {
      n if n % 2 == 0 => Ok(Self(path)),
      _ => Err(Error::InvalidPath(path)),
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The final segment.
  pub fn id(&self) -> &str {
    self.0.rsplit('/').next().unwrap_or_default()
  }

  /// The collection this document lives in.
  pub fn parent(&self) -> CollectionPath {
    let (parent, _) = self.0.rsplit_once('/').unwrap_or_default();
    CollectionPath(parent.to_owned())
  }

  /// A sub-collection nested under this document.
  pub fn collection(&self, name: &str) -> Result<CollectionPath> {
    check_segment(name)?;
    Ok(CollectionPath(format!("{}/{name}", self.0)))
  }
}

impl fmt::Display for DocPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for DocPath {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(value) }
}

impl From<DocPath> for String {
  fn from(value: DocPath) -> Self { value.0 }
}

// ─── CollectionPath ──────────────────────────────────────────────────────────

/// Path of a collection: an odd number of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
  pub fn parse(path: impl Into<String>) -> Result<Self> {
    let path = path.into();
    match segment_count(&path)? {
      n if n % 2 == 1 => Ok(Self(path)),
      _ => Err(Error::InvalidPath(path)),
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// Address a document inside this collection.
  pub fn doc(&self, id: &str) -> Result<DocPath> {
    check_segment(id)?;
    Ok(DocPath(format!("{}/{id}", self.0)))
  }

  /// The document this collection is nested under, if any.
  pub fn parent(&self) -> Option<DocPath> {
    self
      .0
      .rsplit_once('/')
      .map(|(parent, _)| DocPath(parent.to_owned()))
  }

  /// Whether `doc` is a direct child of this collection.
  pub fn contains(&self, doc: &DocPath) -> bool { doc.parent() == *self }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Builders ────────────────────────────────────────────────────────────────

pub fn users() -> CollectionPath { CollectionPath("users".to_owned()) }

pub fn user(uid: &str) -> Result<DocPath> { users().doc(uid) }

pub fn dreams(uid: &str) -> Result<CollectionPath> {
  user(uid)?.collection("dreams")
}

pub fn dream(uid: &str, dream_id: &str) -> Result<DocPath> {
  dreams(uid)?.doc(dream_id)
}

pub fn elements(uid: &str, dream_id: &str) -> Result<CollectionPath> {
  dream(uid, dream_id)?.collection("elements")
}

pub fn element(uid: &str, dream_id: &str, element_id: &str) -> Result<DocPath> {
  elements(uid, dream_id)?.doc(element_id)
}

pub fn associations(uid: &str, dream_id: &str) -> Result<CollectionPath> {
  dream(uid, dream_id)?.collection("associations")
}

pub fn association(
  uid: &str,
  dream_id: &str,
  association_id: &str,
) -> Result<DocPath> {
  associations(uid, dream_id)?.doc(association_id)
}

pub fn hypotheses(uid: &str, dream_id: &str) -> Result<CollectionPath> {
  dream(uid, dream_id)?.collection("hypotheses")
}

pub fn hypothesis(
  uid: &str,
  dream_id: &str,
  hypothesis_id: &str,
) -> Result<DocPath> {
  hypotheses(uid, dream_id)?.doc(hypothesis_id)
}

pub fn integration_main(uid: &str, dream_id: &str) -> Result<DocPath> {
  dream(uid, dream_id)?
    .collection("integration")?
    .doc(INTEGRATION_ID)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builders_follow_the_hierarchy() {
    assert_eq!(user("u1").unwrap().as_str(), "users/u1");
    assert_eq!(dream("u1", "d1").unwrap().as_str(), "users/u1/dreams/d1");
    assert_eq!(
      element("u1", "d1", "e1").unwrap().as_str(),
      "users/u1/dreams/d1/elements/e1"
    );
    assert_eq!(
      association("u1", "d1", "a1").unwrap().as_str(),
      "users/u1/dreams/d1/associations/a1"
    );
    assert_eq!(
      hypothesis("u1", "d1", "h1").unwrap().as_str(),
      "users/u1/dreams/d1/hypotheses/h1"
    );
    assert_eq!(
      integration_main("u1", "d1").unwrap().as_str(),
      "users/u1/dreams/d1/integration/main"
    );
  }

  #[test]
  fn empty_or_slashed_segments_are_rejected() {
    assert!(dream("u1", "").is_err());
    assert!(dream("u1", "a/b").is_err());
    assert!(user("").is_err());
    assert!(DocPath::parse("users//dreams/d1").is_err());
  }

  #[test]
  fn parity_distinguishes_documents_from_collections() {
    assert!(DocPath::parse("users/u1/dreams").is_err());
    assert!(CollectionPath::parse("users/u1").is_err());
    assert!(CollectionPath::parse("users/u1/dreams").is_ok());
  }

  #[test]
  fn parent_and_id() {
    let path = element("u1", "d1", "e1").unwrap();
    assert_eq!(path.id(), "e1");
    assert_eq!(path.parent(), elements("u1", "d1").unwrap());
    assert_eq!(path.parent().parent(), Some(dream("u1", "d1").unwrap()));
    assert!(elements("u1", "d1").unwrap().contains(&path));
    assert!(!dreams("u1").unwrap().contains(&path));
    assert_eq!(users().parent(), None);
  }
}
