//! Error type for `dreamer-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] dreamer_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// An update targeted a document that does not exist.
  #[error("document not found: {0}")]
  NotFound(String),

  /// A batch precondition on a document's existence did not hold.
  #[error("precondition failed: {0} does not exist")]
  PreconditionFailed(String),

  #[error("batch of {len} mutating writes exceeds the limit of {max}")]
  BatchTooLarge { len: usize, max: usize },
}

impl Error {
  /// Whether the backing connection has been closed.
  pub fn is_closed(&self) -> bool {
    matches!(self, Self::Database(tokio_rusqlite::Error::ConnectionClosed))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
