//! Status synchronizer: reconcile a dream's stored status with the status its
//! artifacts imply.

use serde_json::json;
use tracing::{debug, info};

use crate::{
  document::encode,
  lifecycle::{ArtifactPresence, DreamStatus},
  paths,
  repo::Repository,
  store::{DocumentStore, Query, Write},
  timestamp,
};

pub struct StatusSynchronizer<S> {
  repo: Repository<S>,
}

impl<S> Clone for StatusSynchronizer<S> {
  fn clone(&self) -> Self {
    Self {
      repo: self.repo.clone(),
    }
  }
}

impl<S: DocumentStore> StatusSynchronizer<S> {
  pub fn new(repo: Repository<S>) -> Self { Self { repo } }

  /// Recompute and persist the status of one dream.
  ///
  /// Everything happens in one store transaction: the dream read, the four
  /// presence probes, and the status write. A missing dream is not an error;
  /// nothing is written and `Ok(None)` comes back. Otherwise the status that
  /// was written is returned.
  ///
  /// Presence counts any document in a sub-collection, soft-deleted elements
  /// included.
  pub async fn sync(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Option<DreamStatus>, S::Error> {
    let dream = paths::dream(uid, dream_id)?;
    let elements = paths::elements(uid, dream_id)?;
    let associations = paths::associations(uid, dream_id)?;
    let hypotheses = paths::hypotheses(uid, dream_id)?;
    let integration = paths::integration_main(uid, dream_id)?;
    let now = timestamp::now();

    let status = self
      .repo
      .store()
      .run_transaction(move |tx| {
        if tx.get(&dream)?.is_none() {
          return Ok(None);
        }

        let probe = Query::new().limit(1);
        let presence = ArtifactPresence {
          has_elements:        !tx.query(&elements, &probe)?.is_empty(),
          has_any_association: !tx.query(&associations, &probe)?.is_empty(),
          has_hypotheses:      !tx.query(&hypotheses, &probe)?.is_empty(),
          has_integration:     tx.get(&integration)?.is_some(),
        };
        let status = presence.status();

        tx.write(Write::Update {
          path:   dream,
          fields: encode(&json!({
            "status": status,
            "updatedAt": timestamp::format(now),
          }))?,
        })?;
        Ok(Some(status))
      })
      .await?;

    match status {
      Some(status) => info!(uid, dream_id, %status, "synchronized dream status"),
      None => debug!(uid, dream_id, "status sync skipped; dream not found"),
    }
    Ok(status)
  }
}
