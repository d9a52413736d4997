//! Error types for `dreamer-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid document path: {0:?}")]
  InvalidPath(String),

  /// A stored document could not be parsed into its typed record.
  #[error("malformed document at {path}: {source}")]
  Decode {
    path:   String,
    #[source]
    source: serde_json::Error,
  },

  #[error("record did not serialise to a JSON object")]
  NotAnObject,

  #[error("dream not found: {0}")]
  DreamNotFound(String),

  #[error("invalid hypothesis: {0}")]
  InvalidHypothesis(String),

  #[error("hypothesis generator failed: {0}")]
  Generator(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
