//! [`Repository`] — typed reads and writes for every record type.
//!
//! Each operation composes document paths from the owning uid and dream id,
//! then applies typed operations against an injected [`DocumentStore`].
//! Store errors propagate unmodified and nothing is retried here.
//!
//! Writes into a dream's sub-collections carry a precondition on the dream
//! document, so a write against a removed dream fails instead of leaving
//! orphans behind.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
  association::{Association, AssociationPatch, NewAssociation},
  document::{Fields, Row, decode, decode_all, encode},
  dream::{Dream, DreamListOptions, DreamPatch, NewDream},
  element::{Element, ElementListOptions, ElementPatch},
  hypothesis::{Feedback, Hypothesis, HypothesisPatch},
  integration::{Integration, IntegrationPatch},
  paths::{self, DocPath},
  store::{Direction, DocumentStore, Query, Write, WriteBatch},
  subscription::{Subscription, spawn_rows},
  timestamp,
  user::UserProfile,
};

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Dreams, most recently dreamed first.
pub(crate) fn dreams_query(opts: DreamListOptions) -> Query {
  let mut q = Query::new();
  if let Some(status) = opts.only_status {
    q = q.where_eq("status", status.as_ref());
  }
  q = q.order_by("dreamedAt", Direction::Desc);
  if let Some(n) = opts.page_size.filter(|&n| n > 0) {
    q = q.limit(n);
  }
  q
}

/// Elements grouped by kind, then by their ordering hint.
pub(crate) fn elements_query(opts: ElementListOptions) -> Query {
  let mut q = Query::new();
  if !opts.include_deleted {
    q = q.where_in("deleted", vec![Value::Bool(false), Value::Null]);
  }
  q.order_by("kind", Direction::Asc)
    .order_by("order", Direction::Asc)
}

/// Oldest first; used for associations and hypotheses.
pub(crate) fn by_creation() -> Query {
  Query::new().order_by("createdAt", Direction::Asc)
}

/// Queue a merge of `fields` at `path`. A partial patch must land on an
/// existing document.
fn merge_patch(batch: &mut WriteBatch, path: DocPath, complete: bool, fields: Fields) {
  if !complete {
    batch.require_exists(path.clone());
  }
  batch.merge(path, fields);
}

// ─── Repository ──────────────────────────────────────────────────────────────

/// Typed access to one store. Cloning is cheap; the store is shared.
pub struct Repository<S> {
  store: Arc<S>,
}

impl<S> Clone for Repository<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: DocumentStore> Repository<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  async fn get_typed<T: serde::de::DeserializeOwned>(
    &self,
    path: DocPath,
  ) -> Result<Option<T>, S::Error> {
    match self.store.get(path).await? {
      Some(doc) => Ok(Some(decode::<T>(doc)?.data)),
      None => Ok(None),
    }
  }

  /// A batch guarded by the existence of the dream it writes under.
  fn batch_under(&self, uid: &str, dream_id: &str) -> Result<WriteBatch, S::Error> {
    let mut batch = WriteBatch::new();
    batch.require_exists(paths::dream(uid, dream_id)?);
    Ok(batch)
  }

  // ── Users ───────────────────────────────────────────────────────────────

  /// Record that `uid` was seen now, creating the profile on first sight.
  pub async fn touch_user(&self, uid: &str) -> Result<UserProfile, S::Error> {
    let path = paths::user(uid)?;
    let now = timestamp::now();
    self
      .store
      .run_transaction(move |tx| {
        let mut profile = match tx.get(&path)? {
          Some(doc) => decode::<UserProfile>(doc)?.data,
          None => UserProfile {
            created_at:   now,
            last_seen_at: None,
            settings:     None,
          },
        };
        profile.last_seen_at = Some(now);
        tx.write(Write::Set {
          path,
          data: encode(&profile)?,
          merge: true,
        })?;
        Ok(profile)
      })
      .await
  }

  pub async fn get_user(&self, uid: &str) -> Result<Option<UserProfile>, S::Error> {
    self.get_typed(paths::user(uid)?).await
  }

  /// Stamp the disclaimer acceptance time. The profile must already exist.
  pub async fn accept_disclaimer(&self, uid: &str) -> Result<(), S::Error> {
    let path = paths::user(uid)?;
    let now = timestamp::format(timestamp::now());
    let mut batch = WriteBatch::new();
    batch
      .require_exists(path.clone())
      .merge(path, encode(&json!({ "settings": { "disclaimerAcceptedAt": now } }))?);
    self.store.commit(batch).await
  }

  // ── Dreams ──────────────────────────────────────────────────────────────

  /// Create a dream with a fresh id. Its status is always `draft`.
  pub async fn create_dream(
    &self,
    uid: &str,
    input: NewDream,
  ) -> Result<Row<Dream>, S::Error> {
    let id = paths::new_id();
    let dream = input.into_dream(timestamp::now());
    let mut batch = WriteBatch::new();
    batch.set(paths::dream(uid, &id)?, encode(&dream)?);
    self.store.commit(batch).await?;
    debug!(uid, dream_id = %id, "created dream");
    Ok(Row::new(id, dream))
  }

  pub async fn get_dream(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Option<Dream>, S::Error> {
    self.get_typed(paths::dream(uid, dream_id)?).await
  }

  /// Write only the patched fields plus `updatedAt`. Fails if the dream is
  /// missing.
  pub async fn update_dream(
    &self,
    uid: &str,
    dream_id: &str,
    patch: DreamPatch,
  ) -> Result<(), S::Error> {
    let mut batch = WriteBatch::new();
    batch.update(
      paths::dream(uid, dream_id)?,
      patch.into_fields(timestamp::now())?,
    );
    self.store.commit(batch).await
  }

  pub async fn list_dreams(
    &self,
    uid: &str,
    opts: DreamListOptions,
  ) -> Result<Vec<Row<Dream>>, S::Error> {
    let docs = self.store.query(paths::dreams(uid)?, dreams_query(opts)).await?;
    Ok(decode_all(docs)?)
  }

  /// Push variant of [`Self::list_dreams`].
  pub fn subscribe_dreams<F>(
    &self,
    uid: &str,
    opts: DreamListOptions,
    on_change: F,
  ) -> Result<Subscription, S::Error>
  where
    F: FnMut(Vec<Row<Dream>>) + Send + 'static,
  {
    let watch = self.store.watch_query(paths::dreams(uid)?, dreams_query(opts));
    Ok(spawn_rows(watch, on_change))
  }

  /// Remove a dream together with every element, association, hypothesis,
  /// and its integration record.
  ///
  /// When everything fits in one store batch the delete is all-or-nothing.
  /// Larger dreams are deleted in batches of `S::MAX_BATCH_WRITES`, each
  /// atomic on its own, with the dream document in the final batch; a failure
  /// part-way leaves the dream in place so the delete can be retried.
  pub async fn delete_dream_hard(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<(), S::Error> {
    let (elements, associations, hypotheses) = tokio::try_join!(
      self.store.query(paths::elements(uid, dream_id)?, Query::new()),
      self.store.query(paths::associations(uid, dream_id)?, Query::new()),
      self.store.query(paths::hypotheses(uid, dream_id)?, Query::new()),
    )?;

    let mut doomed: Vec<DocPath> = elements
      .into_iter()
      .chain(associations)
      .chain(hypotheses)
      .map(|doc| doc.path)
      .collect();
    doomed.push(paths::integration_main(uid, dream_id)?);
    doomed.push(paths::dream(uid, dream_id)?);

    let chunk_size = S::MAX_BATCH_WRITES.max(1);
    let batches = doomed.len().div_ceil(chunk_size);
    if batches > 1 {
      info!(
        uid,
        dream_id,
        documents = doomed.len(),
        batches,
        "cascade delete exceeds one batch; deleting in chunks"
      );
    }

    for chunk in doomed.chunks(chunk_size) {
      let mut batch = WriteBatch::new();
      for path in chunk {
        batch.delete(path.clone());
      }
      self.store.commit(batch).await?;
    }

    debug!(uid, dream_id, documents = doomed.len(), "deleted dream");
    Ok(())
  }

  // ── Elements ────────────────────────────────────────────────────────────

  /// Elements ordered by kind, then ordering hint. Soft-deleted elements are
  /// left out unless `opts.include_deleted` is set.
  pub async fn list_elements(
    &self,
    uid: &str,
    dream_id: &str,
    opts: ElementListOptions,
  ) -> Result<Vec<Row<Element>>, S::Error> {
    let docs = self
      .store
      .query(paths::elements(uid, dream_id)?, elements_query(opts))
      .await?;
    Ok(decode_all(docs)?)
  }

  /// Push variant of [`Self::list_elements`].
  pub fn subscribe_elements<F>(
    &self,
    uid: &str,
    dream_id: &str,
    opts: ElementListOptions,
    on_change: F,
  ) -> Result<Subscription, S::Error>
  where
    F: FnMut(Vec<Row<Element>>) + Send + 'static,
  {
    let watch = self
      .store
      .watch_query(paths::elements(uid, dream_id)?, elements_query(opts));
    Ok(spawn_rows(watch, on_change))
  }

  /// Create or merge one element at a caller-chosen id.
  ///
  /// Pass a full [`Element`] to create or overwrite it, or an
  /// [`ElementPatch`] to change some fields of an existing element. Fields a
  /// patch leaves out, `deleted` and `createdAt` included, keep their stored
  /// values.
  pub async fn upsert_element(
    &self,
    uid: &str,
    dream_id: &str,
    element_id: &str,
    element: impl Into<ElementPatch>,
  ) -> Result<(), S::Error> {
    let patch: ElementPatch = element.into();
    let mut batch = self.batch_under(uid, dream_id)?;
    merge_patch(
      &mut batch,
      paths::element(uid, dream_id, element_id)?,
      patch.is_complete(),
      patch.into_fields(timestamp::now())?,
    );
    self.store.commit(batch).await
  }

  /// Create or merge many elements in one atomic batch.
  ///
  /// Every row is validated before anything is sent, and the store applies
  /// the batch all-or-nothing.
  pub async fn bulk_upsert_elements<P>(
    &self,
    uid: &str,
    dream_id: &str,
    rows: &[Row<P>],
  ) -> Result<(), S::Error>
  where
    P: Clone + Into<ElementPatch>,
  {
    let now = timestamp::now();
    let mut batch = self.batch_under(uid, dream_id)?;
    for row in rows {
      let patch: ElementPatch = row.data.clone().into();
      merge_patch(
        &mut batch,
        paths::element(uid, dream_id, &row.id)?,
        patch.is_complete(),
        patch.into_fields(now)?,
      );
    }
    self.store.commit(batch).await
  }

  /// Hide an element from default listings. Only `deleted` and `updatedAt`
  /// change.
  pub async fn soft_delete_element(
    &self,
    uid: &str,
    dream_id: &str,
    element_id: &str,
  ) -> Result<(), S::Error> {
    let now = timestamp::format(timestamp::now());
    let mut batch = WriteBatch::new();
    batch.update(
      paths::element(uid, dream_id, element_id)?,
      encode(&json!({ "deleted": true, "updatedAt": now }))?,
    );
    self.store.commit(batch).await
  }

  // ── Associations ────────────────────────────────────────────────────────

  /// Create an association with a fresh id and a clamped salience.
  pub async fn create_association(
    &self,
    uid: &str,
    dream_id: &str,
    input: NewAssociation,
  ) -> Result<Row<Association>, S::Error> {
    let id = paths::new_id();
    let association = input.into_association(timestamp::now());
    let mut batch = self.batch_under(uid, dream_id)?;
    batch.set(paths::association(uid, dream_id, &id)?, encode(&association)?);
    self.store.commit(batch).await?;
    Ok(Row::new(id, association))
  }

  pub async fn update_association(
    &self,
    uid: &str,
    dream_id: &str,
    association_id: &str,
    patch: AssociationPatch,
  ) -> Result<(), S::Error> {
    let mut batch = WriteBatch::new();
    batch.update(
      paths::association(uid, dream_id, association_id)?,
      patch.into_fields(timestamp::now())?,
    );
    self.store.commit(batch).await
  }

  /// Associations, oldest first.
  pub async fn list_associations(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Vec<Row<Association>>, S::Error> {
    let docs = self
      .store
      .query(paths::associations(uid, dream_id)?, by_creation())
      .await?;
    Ok(decode_all(docs)?)
  }

  /// Associations attached to one element, oldest first.
  pub async fn list_associations_for_element(
    &self,
    uid: &str,
    dream_id: &str,
    element_id: &str,
  ) -> Result<Vec<Row<Association>>, S::Error> {
    let query = by_creation().where_eq("elementId", element_id);
    let docs = self
      .store
      .query(paths::associations(uid, dream_id)?, query)
      .await?;
    Ok(decode_all(docs)?)
  }

  pub async fn delete_association(
    &self,
    uid: &str,
    dream_id: &str,
    association_id: &str,
  ) -> Result<(), S::Error> {
    let mut batch = WriteBatch::new();
    batch.delete(paths::association(uid, dream_id, association_id)?);
    self.store.commit(batch).await
  }

  /// Push variant of [`Self::list_associations`].
  pub fn subscribe_associations<F>(
    &self,
    uid: &str,
    dream_id: &str,
    on_change: F,
  ) -> Result<Subscription, S::Error>
  where
    F: FnMut(Vec<Row<Association>>) + Send + 'static,
  {
    let watch = self
      .store
      .watch_query(paths::associations(uid, dream_id)?, by_creation());
    Ok(spawn_rows(watch, on_change))
  }

  // ── Hypotheses ──────────────────────────────────────────────────────────

  /// Create or merge one hypothesis; see [`Self::upsert_element`].
  pub async fn upsert_hypothesis(
    &self,
    uid: &str,
    dream_id: &str,
    hypothesis_id: &str,
    hypothesis: impl Into<HypothesisPatch>,
  ) -> Result<(), S::Error> {
    let patch: HypothesisPatch = hypothesis.into();
    let mut batch = self.batch_under(uid, dream_id)?;
    merge_patch(
      &mut batch,
      paths::hypothesis(uid, dream_id, hypothesis_id)?,
      patch.is_complete(),
      patch.into_fields(timestamp::now())?,
    );
    self.store.commit(batch).await
  }

  /// Create or merge many hypotheses in one atomic batch.
  pub async fn bulk_upsert_hypotheses<P>(
    &self,
    uid: &str,
    dream_id: &str,
    rows: &[Row<P>],
  ) -> Result<(), S::Error>
  where
    P: Clone + Into<HypothesisPatch>,
  {
    let now = timestamp::now();
    let mut batch = self.batch_under(uid, dream_id)?;
    for row in rows {
      let patch: HypothesisPatch = row.data.clone().into();
      merge_patch(
        &mut batch,
        paths::hypothesis(uid, dream_id, &row.id)?,
        patch.is_complete(),
        patch.into_fields(now)?,
      );
    }
    self.store.commit(batch).await
  }

  /// Hypotheses, oldest first.
  pub async fn list_hypotheses(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Vec<Row<Hypothesis>>, S::Error> {
    let docs = self
      .store
      .query(paths::hypotheses(uid, dream_id)?, by_creation())
      .await?;
    Ok(decode_all(docs)?)
  }

  /// Overwrite (or clear, with `None`) the dreamer's response.
  pub async fn set_hypothesis_feedback(
    &self,
    uid: &str,
    dream_id: &str,
    hypothesis_id: &str,
    feedback: Option<Feedback>,
  ) -> Result<(), S::Error> {
    let now = timestamp::format(timestamp::now());
    let mut batch = WriteBatch::new();
    batch.update(
      paths::hypothesis(uid, dream_id, hypothesis_id)?,
      encode(&json!({ "userFeedback": feedback, "updatedAt": now }))?,
    );
    self.store.commit(batch).await
  }

  /// Push variant of [`Self::list_hypotheses`].
  pub fn subscribe_hypotheses<F>(
    &self,
    uid: &str,
    dream_id: &str,
    on_change: F,
  ) -> Result<Subscription, S::Error>
  where
    F: FnMut(Vec<Row<Hypothesis>>) + Send + 'static,
  {
    let watch = self
      .store
      .watch_query(paths::hypotheses(uid, dream_id)?, by_creation());
    Ok(spawn_rows(watch, on_change))
  }

  // ── Integration ─────────────────────────────────────────────────────────

  pub async fn get_integration(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Option<Integration>, S::Error> {
    self.get_typed(paths::integration_main(uid, dream_id)?).await
  }

  /// Create or merge the dream's singleton integration record; see
  /// [`Self::upsert_element`].
  pub async fn upsert_integration(
    &self,
    uid: &str,
    dream_id: &str,
    integration: impl Into<IntegrationPatch>,
  ) -> Result<(), S::Error> {
    let patch: IntegrationPatch = integration.into();
    let mut batch = self.batch_under(uid, dream_id)?;
    merge_patch(
      &mut batch,
      paths::integration_main(uid, dream_id)?,
      patch.is_complete(),
      patch.into_fields(timestamp::now())?,
    );
    self.store.commit(batch).await
  }

  /// Replace only the journal text. The integration record must exist.
  pub async fn update_integration_journal(
    &self,
    uid: &str,
    dream_id: &str,
    journal_text: &str,
  ) -> Result<(), S::Error> {
    let now = timestamp::format(timestamp::now());
    let mut batch = WriteBatch::new();
    batch.update(
      paths::integration_main(uid, dream_id)?,
      encode(&json!({ "journalText": journal_text, "updatedAt": now }))?,
    );
    self.store.commit(batch).await
  }
}
