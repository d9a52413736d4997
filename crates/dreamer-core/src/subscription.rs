//! [`Subscription`] — the cancellation handle returned by every push-based
//! read — and the glue that turns raw store watches into typed callbacks.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::{
  document::{Document, Row, decode, decode_all},
  store::Watch,
};

/// Owns the task that delivers snapshots to a subscriber's callback.
///
/// Cancelling stops delivery and drops every underlying store watch, which in
/// turn releases their listeners. Cancelling twice is a no-op. Dropping the
/// handle cancels as well.
#[derive(Debug)]
pub struct Subscription {
  task: JoinHandle<()>,
}

impl Subscription {
  pub(crate) fn new(task: JoinHandle<()>) -> Self { Self { task } }

  pub fn cancel(&self) { self.task.abort(); }

  /// Whether delivery has stopped, by cancellation or because every
  /// underlying watch closed.
  pub fn is_finished(&self) -> bool { self.task.is_finished() }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.task.abort(); }
}

/// Decode a collection snapshot. Store errors and malformed documents are
/// logged and the snapshot is skipped; the subscription stays alive.
pub(crate) fn typed_rows<T, E>(snapshot: Result<Vec<Document>, E>) -> Option<Vec<Row<T>>>
where
  T: DeserializeOwned,
  E: Display,
{
  match snapshot {
    Ok(docs) => match decode_all(docs) {
      Ok(rows) => Some(rows),
      Err(error) => {
        warn!(%error, "skipping undecodable collection snapshot");
        None
      }
    },
    Err(error) => {
      warn!(%error, "collection watch reported an error");
      None
    }
  }
}

/// Decode a single-document snapshot; `Some(None)` means the document is
/// absent.
pub(crate) fn typed_doc<T, E>(
  snapshot: Result<Option<Document>, E>,
) -> Option<Option<Row<T>>>
where
  T: DeserializeOwned,
  E: Display,
{
  match snapshot {
    Ok(None) => Some(None),
    Ok(Some(doc)) => match decode(doc) {
      Ok(row) => Some(Some(row)),
      Err(error) => {
        warn!(%error, "skipping undecodable document snapshot");
        None
      }
    },
    Err(error) => {
      warn!(%error, "document watch reported an error");
      None
    }
  }
}

/// Forward every decodable snapshot of a collection watch to `on_change`.
pub(crate) fn spawn_rows<T, E, F>(mut watch: Watch<Vec<Document>, E>, mut on_change: F) -> Subscription
where
  T: DeserializeOwned + Send + 'static,
  E: Display + Send + 'static,
  F: FnMut(Vec<Row<T>>) + Send + 'static,
{
  Subscription::new(tokio::spawn(async move {
    while let Some(snapshot) = watch.recv().await {
      if let Some(rows) = typed_rows(snapshot) {
        on_change(rows);
      }
    }
  }))
}
