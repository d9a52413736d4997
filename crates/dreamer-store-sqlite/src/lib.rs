//! SQLite backend for the dream journal document store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Documents are kept as JSON text keyed
//! by their full path; change notifications fan out over a broadcast channel
//! to every open watch.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
