//! Session — the composite read model of one dream and everything under it.
//!
//! Never stored, always assembled. [`SessionAggregator::get`] does it once;
//! [`SessionAggregator::subscribe`] keeps it current from five independent
//! store watches.
//!
//! The store offers no primitive that observes a multi-collection join
//! atomically, so the push variant recomposes on every event from any of the
//! five streams. Intermediate composites may be redundant or briefly
//! inconsistent (an association can arrive before the element it refers to).
//! Consumers should render the latest emission and must not rely on emission
//! counts or interleaving.

use serde::{Deserialize, Serialize};

use crate::{
  association::Association,
  document::Row,
  dream::Dream,
  element::{Element, ElementListOptions},
  hypothesis::Hypothesis,
  integration::Integration,
  paths::{self, INTEGRATION_ID},
  repo::{Repository, by_creation, elements_query},
  store::DocumentStore,
  subscription::{Subscription, typed_doc, typed_rows},
};

/// A dream plus its visible elements, associations, hypotheses, and
/// integration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub dream_id:     String,
  pub dream:        Dream,
  pub elements:     Vec<Row<Element>>,
  pub associations: Vec<Row<Association>>,
  pub hypotheses:   Vec<Row<Hypothesis>>,
  pub integration:  Option<Row<Integration>>,
}

/// Latest value seen on each of the five streams.
#[derive(Debug, Default)]
struct Latest {
  dream:        Option<Dream>,
  elements:     Vec<Row<Element>>,
  associations: Vec<Row<Association>>,
  hypotheses:   Vec<Row<Hypothesis>>,
  integration:  Option<Row<Integration>>,
}

impl Latest {
  /// `None` whenever the dream itself is absent, whatever else is known.
  fn compose(&self, dream_id: &str) -> Option<Session> {
    let dream = self.dream.clone()?;
    Some(Session {
      dream_id: dream_id.to_owned(),
      dream,
      elements: self.elements.clone(),
      associations: self.associations.clone(),
      hypotheses: self.hypotheses.clone(),
      integration: self.integration.clone(),
    })
  }
}

/// Assembles [`Session`]s over an injected store.
pub struct SessionAggregator<S> {
  repo: Repository<S>,
}

impl<S> Clone for SessionAggregator<S> {
  fn clone(&self) -> Self {
    Self {
      repo: self.repo.clone(),
    }
  }
}

impl<S: DocumentStore> SessionAggregator<S> {
  pub fn new(repo: Repository<S>) -> Self { Self { repo } }

  /// Fetch a session once.
  ///
  /// Returns `Ok(None)` without touching sub-collections when the dream does
  /// not exist. Otherwise the four sub-reads run concurrently and the first
  /// failure fails the whole fetch; a partial session is never returned.
  pub async fn get(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Option<Session>, S::Error> {
    let Some(dream) = self.repo.get_dream(uid, dream_id).await? else {
      return Ok(None);
    };

    let (elements, associations, hypotheses, integration) = tokio::try_join!(
      self
        .repo
        .list_elements(uid, dream_id, ElementListOptions::default()),
      self.repo.list_associations(uid, dream_id),
      self.repo.list_hypotheses(uid, dream_id),
      self.repo.get_integration(uid, dream_id),
    )?;

    Ok(Some(Session {
      dream_id: dream_id.to_owned(),
      dream,
      elements,
      associations,
      hypotheses,
      integration: integration.map(|data| Row::new(INTEGRATION_ID, data)),
    }))
  }

  /// Keep a session current.
  ///
  /// `on_change` receives a freshly composed value every time any of the
  /// dream, elements, associations, hypotheses, or integration streams
  /// delivers, including the first delivery of each. It receives `None`
  /// while the dream document is absent. Cancelling the returned handle
  /// releases all five watches together.
  pub fn subscribe<F>(
    &self,
    uid: &str,
    dream_id: &str,
    mut on_change: F,
  ) -> Result<Subscription, S::Error>
  where
    F: FnMut(Option<Session>) + Send + 'static,
  {
    let store = self.repo.store();
    let mut dream_rx = store.watch_doc(paths::dream(uid, dream_id)?);
    let mut elements_rx = store.watch_query(
      paths::elements(uid, dream_id)?,
      elements_query(ElementListOptions::default()),
    );
    let mut associations_rx =
      store.watch_query(paths::associations(uid, dream_id)?, by_creation());
    let mut hypotheses_rx =
      store.watch_query(paths::hypotheses(uid, dream_id)?, by_creation());
    let mut integration_rx = store.watch_doc(paths::integration_main(uid, dream_id)?);

    let dream_id = dream_id.to_owned();
    let task = tokio::spawn(async move {
      let mut latest = Latest::default();
      loop {
        tokio::select! {
          Some(snapshot) = dream_rx.recv() => {
            let Some(dream) = typed_doc::<Dream, _>(snapshot) else { continue };
            latest.dream = dream.map(|row| row.data);
          }
          Some(snapshot) = elements_rx.recv() => {
            let Some(rows) = typed_rows(snapshot) else { continue };
            latest.elements = rows;
          }
          Some(snapshot) = associations_rx.recv() => {
            let Some(rows) = typed_rows(snapshot) else { continue };
            latest.associations = rows;
          }
          Some(snapshot) = hypotheses_rx.recv() => {
            let Some(rows) = typed_rows(snapshot) else { continue };
            latest.hypotheses = rows;
          }
          Some(snapshot) = integration_rx.recv() => {
            let Some(integration) = typed_doc(snapshot) else { continue };
            latest.integration = integration;
          }
          else => break,
        }
        on_change(latest.compose(&dream_id));
      }
    });

    Ok(Subscription::new(task))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{dream::NewDream, timestamp};

  #[test]
  fn compose_requires_the_dream() {
    let mut latest = Latest::default();
    latest.integration = Some(Row::new(
      INTEGRATION_ID,
      Integration::new(vec!["What now?".into()], "Walk", timestamp::now()),
    ));
    assert_eq!(latest.compose("d1"), None);

    latest.dream = Some(NewDream::new("a river").into_dream(timestamp::now()));
    let session = latest.compose("d1").unwrap();
    assert_eq!(session.dream_id, "d1");
    assert!(session.elements.is_empty());
    assert_eq!(session.integration.unwrap().id, "main");
  }
}
