//! SQL schema for the dream journal SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per document. `parent` is the collection path, so listing a
-- collection is a single index lookup.
CREATE TABLE IF NOT EXISTS documents (
    path        TEXT PRIMARY KEY,
    parent      TEXT NOT NULL,
    data        TEXT NOT NULL,   -- JSON object
    updated_at  TEXT NOT NULL    -- RFC 3339 UTC; store-assigned
);

CREATE INDEX IF NOT EXISTS documents_parent_idx ON documents(parent);

PRAGMA user_version = 1;
";
