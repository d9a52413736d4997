//! [`SqliteStore`] — the SQLite implementation of [`DocumentStore`].

use std::{path::Path, sync::Arc};

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tokio::sync::{
  broadcast::{self, error::RecvError},
  mpsc,
};
use tracing::{debug, warn};

use dreamer_core::{
  document::{Document, merge_fields, update_fields},
  paths::{CollectionPath, DocPath},
  store::{DocumentStore, Query, Transaction, Watch, Write, WriteBatch},
  timestamp,
};

use crate::{
  Error, Result,
  encode::{RawDocument, decode_document, encode_fields},
  schema::SCHEMA,
};

/// Paths touched by one committed batch or transaction.
type ChangeSet = Arc<Vec<DocPath>>;

/// Committed change sets buffered per watch before it has to re-read.
const CHANGE_BUFFER: usize = 256;

/// Snapshots buffered per watch receiver.
const WATCH_BUFFER: usize = 16;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted and clones
/// share one change feed.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<ChangeSet>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let (changes, _) = broadcast::channel(CHANGE_BUFFER);
    Ok(Self { conn, changes })
  }

  /// Close the underlying connection. Later operations on this store or any
  /// clone of it fail, and open watches report the closure and end.
  pub async fn close(&self) -> Result<()> {
    self.conn.clone().close().await?;
    debug!("store closed");
    Ok(())
  }

  fn publish(&self, changed: Vec<DocPath>) {
    if changed.is_empty() {
      return;
    }
    // No receivers just means nobody is watching.
    let _ = self.changes.send(Arc::new(changed));
  }

  /// Spawn a task that re-reads with `read` whenever a committed change
  /// touches a path for which `relevant` holds, and forwards the snapshot if
  /// it differs from the last one sent.
  fn spawn_watch<T, R, M>(&self, label: String, relevant: M, read: R) -> Watch<T, Error>
  where
    T: Clone + PartialEq + Send + 'static,
    R: Fn(&rusqlite::Connection) -> Result<T> + Clone + Send + 'static,
    M: Fn(&DocPath) -> bool + Send + 'static,
  {
    let (tx, rx) = mpsc::channel(WATCH_BUFFER);
    // Subscribe before the first read so no commit can slip between them.
    let mut changes = self.changes.subscribe();
    let conn = self.conn.clone();

    tokio::spawn(async move {
      debug!(watch = %label, "watch opened");
      let mut last: Option<T> = None;
      let mut dirty = true;
      loop {
        if dirty {
          let read = read.clone();
          let snapshot = match conn.call(move |c| Ok(read(&*c))).await {
            Ok(snapshot) => snapshot,
            Err(e) => Err(Error::from(e)),
          };
          match snapshot {
            Ok(value) if last.as_ref() == Some(&value) => {}
            Ok(value) => {
              if tx.send(Ok(value.clone())).await.is_err() {
                break;
              }
              last = Some(value);
            }
            Err(e) => {
              let closed = e.is_closed();
              warn!(watch = %label, error = %e, "watch read failed");
              if tx.send(Err(e)).await.is_err() || closed {
                break;
              }
            }
          }
        }

        dirty = tokio::select! {
          _ = tx.closed() => break,
          change = changes.recv() => match change {
            Ok(paths) => paths.iter().any(|p| relevant(p)),
            Err(RecvError::Lagged(skipped)) => {
              debug!(watch = %label, skipped, "watch lagged; re-reading");
              true
            }
            Err(RecvError::Closed) => break,
          },
        };
      }
      debug!(watch = %label, "watch closed");
    });

    rx
  }
}

// ─── Synchronous helpers (run on the connection thread) ──────────────────────

fn read_doc(conn: &rusqlite::Connection, path: &DocPath) -> Result<Option<Document>> {
  let data: Option<String> = conn
    .query_row(
      "SELECT data FROM documents WHERE path = ?1",
      rusqlite::params![path.as_str()],
      |row| row.get(0),
    )
    .optional()?;
  data
    .map(|data| decode_document(path.clone(), &data))
    .transpose()
}

fn read_collection(
  conn: &rusqlite::Connection,
  collection: &CollectionPath,
  query: &Query,
) -> Result<Vec<Document>> {
  let mut stmt =
    conn.prepare_cached("SELECT path, data FROM documents WHERE parent = ?1")?;
  let raws = stmt
    .query_map(rusqlite::params![collection.as_str()], |row| {
      Ok(RawDocument {
        path: row.get(0)?,
        data: row.get(1)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let docs = raws
    .into_iter()
    .map(RawDocument::decode)
    .collect::<Result<Vec<_>>>()?;
  Ok(query.apply(docs))
}

fn put_doc(
  conn: &rusqlite::Connection,
  path: &DocPath,
  data: &dreamer_core::document::Fields,
  now: &str,
) -> Result<()> {
  conn.execute(
    "INSERT INTO documents (path, parent, data, updated_at) VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(path) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
    rusqlite::params![
      path.as_str(),
      path.parent().as_str(),
      encode_fields(data)?,
      now
    ],
  )?;
  Ok(())
}

/// Apply one write. Returns the path if stored data may have changed.
fn apply_write(
  conn: &rusqlite::Connection,
  write: Write,
  now: &str,
) -> Result<Option<DocPath>> {
  match write {
    Write::Set {
      path,
      data,
      merge: false,
    } => {
      put_doc(conn, &path, &data, now)?;
      Ok(Some(path))
    }
    Write::Set {
      path,
      data,
      merge: true,
    } => {
      let merged = match read_doc(conn, &path)? {
        Some(mut existing) => {
          merge_fields(&mut existing.data, data);
          existing.data
        }
        None => data,
      };
      put_doc(conn, &path, &merged, now)?;
      Ok(Some(path))
    }
    Write::Update { path, fields } => {
      let Some(mut existing) = read_doc(conn, &path)? else {
        return Err(Error::NotFound(path.to_string()));
      };
      update_fields(&mut existing.data, fields);
      put_doc(conn, &path, &existing.data, now)?;
      Ok(Some(path))
    }
    Write::Delete { path } => {
      let n = conn.execute(
        "DELETE FROM documents WHERE path = ?1",
        rusqlite::params![path.as_str()],
      )?;
      Ok((n > 0).then_some(path))
    }
    Write::RequireExists { path } => {
      let exists = conn
        .query_row(
          "SELECT 1 FROM documents WHERE path = ?1",
          rusqlite::params![path.as_str()],
          |_| Ok(()),
        )
        .optional()?
        .is_some();
      if exists {
        Ok(None)
      } else {
        Err(Error::PreconditionFailed(path.to_string()))
      }
    }
  }
}

/// Apply every write inside one SQL transaction. Any error drops the
/// transaction, rolling back the writes already applied.
fn commit_writes(conn: &mut rusqlite::Connection, writes: Vec<Write>) -> Result<Vec<DocPath>> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let now = timestamp::format(timestamp::now());
  let mut changed = Vec::new();
  for write in writes {
    changed.extend(apply_write(&tx, write, &now)?);
  }
  tx.commit()?;
  Ok(changed)
}

// ─── Transactions ────────────────────────────────────────────────────────────

struct SqliteTransaction<'a> {
  conn:    &'a rusqlite::Connection,
  now:     String,
  changed: Vec<DocPath>,
}

impl Transaction for SqliteTransaction<'_> {
  type Error = Error;

  fn get(&mut self, path: &DocPath) -> Result<Option<Document>> { read_doc(self.conn, path) }

  fn query(&mut self, collection: &CollectionPath, query: &Query) -> Result<Vec<Document>> {
    read_collection(self.conn, collection, query)
  }

  fn write(&mut self, write: Write) -> Result<()> {
    self.changed.extend(apply_write(self.conn, write, &self.now)?);
    Ok(())
  }
}

fn transact<T, F>(conn: &mut rusqlite::Connection, f: F) -> Result<(T, Vec<DocPath>)>
where
  F: FnOnce(&mut dyn Transaction<Error = Error>) -> Result<T>,
{
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut handle = SqliteTransaction {
    conn:    &tx,
    now:     timestamp::format(timestamp::now()),
    changed: Vec::new(),
  };
  let value = f(&mut handle)?;
  let changed = handle.changed;
  tx.commit()?;
  Ok((value, changed))
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn get(&self, path: DocPath) -> Result<Option<Document>> {
    self.conn.call(move |conn| Ok(read_doc(conn, &path))).await?
  }

  async fn query(&self, collection: CollectionPath, query: Query) -> Result<Vec<Document>> {
    self
      .conn
      .call(move |conn| Ok(read_collection(conn, &collection, &query)))
      .await?
  }

  async fn commit(&self, batch: WriteBatch) -> Result<()> {
    let mutations = batch.writes().iter().filter(|w| w.is_mutation()).count();
    if mutations > Self::MAX_BATCH_WRITES {
      return Err(Error::BatchTooLarge {
        len: mutations,
        max: Self::MAX_BATCH_WRITES,
      });
    }
    if batch.is_empty() {
      return Ok(());
    }

    let writes = batch.into_writes();
    let count = writes.len();
    let changed = self
      .conn
      .call(move |conn| Ok(commit_writes(conn, writes)))
      .await??;
    debug!(writes = count, changed = changed.len(), "committed batch");
    self.publish(changed);
    Ok(())
  }

  async fn run_transaction<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Transaction<Error = Error>) -> Result<T> + Send + 'static,
  {
    let (value, changed) = self.conn.call(move |conn| Ok(transact(conn, f))).await??;
    debug!(changed = changed.len(), "committed transaction");
    self.publish(changed);
    Ok(value)
  }

  fn watch_doc(&self, path: DocPath) -> Watch<Option<Document>, Error> {
    let target = path.clone();
    self.spawn_watch(
      path.to_string(),
      move |changed| *changed == target,
      move |conn| read_doc(conn, &path),
    )
  }

  fn watch_query(&self, collection: CollectionPath, query: Query) -> Watch<Vec<Document>, Error> {
    let parent = collection.clone();
    self.spawn_watch(
      collection.to_string(),
      move |changed| parent.contains(changed),
      move |conn| read_collection(conn, &collection, &query),
    )
  }
}
