//! The `DocumentStore` trait and supporting query / write types.
//!
//! The trait is implemented by storage backends (e.g. `dreamer-store-sqlite`).
//! The repository, session aggregator, and status synchronizer depend on this
//! abstraction, never on a concrete backend, and receive it by injection.

use std::{cmp::Ordering, future::Future};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
  document::{Document, Fields},
  paths::{CollectionPath, DocPath},
};

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
  pub field:     String,
  pub direction: Direction,
}

/// A field predicate. A field that is absent from a document compares as
/// `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
  Eq(String, Value),
  In(String, Vec<Value>),
}

impl Filter {
  pub fn matches(&self, data: &Fields) -> bool {
    match self {
      Self::Eq(field, expected) => field_value(data, field) == expected,
      Self::In(field, allowed) => {
        let actual = field_value(data, field);
        allowed.iter().any(|v| v == actual)
      }
    }
  }
}

/// Parameters for [`DocumentStore::query`] and [`DocumentStore::watch_query`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
  pub filters:  Vec<Filter>,
  pub order_by: Vec<OrderBy>,
  pub limit:    Option<usize>,
}

impl Query {
  pub fn new() -> Self { Self::default() }

  pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::Eq(field.to_owned(), value.into()));
    self
  }

  pub fn where_in(mut self, field: &str, values: Vec<Value>) -> Self {
    self.filters.push(Filter::In(field.to_owned(), values));
    self
  }

  pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
    self.order_by.push(OrderBy {
      field: field.to_owned(),
      direction,
    });
    self
  }

  pub fn limit(mut self, n: usize) -> Self {
    self.limit = Some(n);
    self
  }

  pub fn matches(&self, data: &Fields) -> bool {
    self.filters.iter().all(|f| f.matches(data))
  }

  /// Filter, order, and truncate a collection's documents.
  ///
  /// Ties on every ordering field fall back to the document id, so results
  /// are deterministic.
  pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
    docs.retain(|d| self.matches(&d.data));
    docs.sort_by(|a, b| {
      self
        .order_by
        .iter()
        .map(|o| {
          let ord = compare_values(
            field_value(&a.data, &o.field),
            field_value(&b.data, &o.field),
          );
          match o.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
          }
        })
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| a.id().cmp(b.id()))
    });
    if let Some(n) = self.limit {
      docs.truncate(n);
    }
    docs
  }
}

fn field_value<'a>(data: &'a Fields, field: &str) -> &'a Value {
  data.get(field).unwrap_or(&Value::Null)
}

fn type_rank(v: &Value) -> u8 {
  match v {
    Value::Null => 0,
    Value::Bool(_) => 1,
    Value::Number(_) => 2,
    Value::String(_) => 3,
    Value::Array(_) => 4,
    Value::Object(_) => 5,
  }
}

/// Total order over JSON values: null < bool < number < string < array <
/// object, then by value within a type.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
  match (a, b) {
    (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
    (Value::Number(x), Value::Number(y)) => {
      let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
      x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
    (Value::String(x), Value::String(y)) => x.cmp(y),
    (Value::Array(x), Value::Array(y)) => x
      .iter()
      .zip(y)
      .map(|(a, b)| compare_values(a, b))
      .find(|ord| ord.is_ne())
      .unwrap_or_else(|| x.len().cmp(&y.len())),
    _ => type_rank(a).cmp(&type_rank(b)),
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// One write inside a batch or transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
  /// Create or overwrite. With `merge`, deep-merge into an existing document
  /// instead of replacing it.
  Set {
    path:  DocPath,
    data:  Fields,
    merge: bool,
  },
  /// Replace the given top-level fields. Fails if the document is missing.
  Update { path: DocPath, fields: Fields },
  /// Remove the document; a no-op if it does not exist.
  Delete { path: DocPath },
  /// Precondition: fail the whole batch unless the document exists.
  RequireExists { path: DocPath },
}

impl Write {
  pub fn path(&self) -> &DocPath {
    match self {
      Self::Set { path, .. }
      | Self::Update { path, .. }
      | Self::Delete { path }
      | Self::RequireExists { path } => path,
    }
  }

  /// Whether applying this write can change stored data.
  pub fn is_mutation(&self) -> bool { !matches!(self, Self::RequireExists { .. }) }
}

/// An ordered list of writes committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
  writes: Vec<Write>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  pub fn set(&mut self, path: DocPath, data: Fields) -> &mut Self {
    self.writes.push(Write::Set { path, data, merge: false });
    self
  }

  pub fn merge(&mut self, path: DocPath, data: Fields) -> &mut Self {
    self.writes.push(Write::Set { path, data, merge: true });
    self
  }

  pub fn update(&mut self, path: DocPath, fields: Fields) -> &mut Self {
    self.writes.push(Write::Update { path, fields });
    self
  }

  pub fn delete(&mut self, path: DocPath) -> &mut Self {
    self.writes.push(Write::Delete { path });
    self
  }

  pub fn require_exists(&mut self, path: DocPath) -> &mut Self {
    self.writes.push(Write::RequireExists { path });
    self
  }

  pub fn len(&self) -> usize { self.writes.len() }

  pub fn is_empty(&self) -> bool { self.writes.is_empty() }

  pub fn writes(&self) -> &[Write] { &self.writes }

  pub fn into_writes(self) -> Vec<Write> { self.writes }
}

// ─── Transactions ────────────────────────────────────────────────────────────

/// Handle passed to a [`DocumentStore::run_transaction`] closure. All reads
/// and writes through it are isolated from concurrent writers and commit
/// atomically when the closure returns `Ok`.
pub trait Transaction {
  type Error;

  fn get(&mut self, path: &DocPath) -> Result<Option<Document>, Self::Error>;

  fn query(
    &mut self,
    collection: &CollectionPath,
    query: &Query,
  ) -> Result<Vec<Document>, Self::Error>;

  fn write(&mut self, write: Write) -> Result<(), Self::Error>;
}

// ─── Watches ─────────────────────────────────────────────────────────────────

/// A live listener: the current snapshot arrives first, then a fresh full
/// snapshot each time it changes. Dropping the receiver releases the listener.
pub type Watch<T, E> = mpsc::Receiver<Result<T, E>>;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a hierarchical document store backend.
///
/// A backend is constructed explicitly and shared by `Arc`; there is no
/// process-wide handle. Its error type must absorb [`crate::Error`] so that
/// repository methods can return the backend's own errors unmodified.
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + From<crate::Error> + Send + Sync + 'static;

  /// Largest number of mutating writes a single atomic batch may carry.
  /// Preconditions ([`Write::RequireExists`]) do not count.
  const MAX_BATCH_WRITES: usize = 500;

  /// Read one document. Returns `None` if it does not exist.
  fn get(
    &self,
    path: DocPath,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// Run `query` over the direct children of `collection`.
  fn query(
    &self,
    collection: CollectionPath,
    query: Query,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Apply every write in `batch` atomically: all succeed or none do.
  fn commit(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Run `f` as a single read-modify-write transaction. An `Err` from `f`
  /// rolls back every write it made.
  fn run_transaction<T, F>(
    &self,
    f: F,
  ) -> impl Future<Output = Result<T, Self::Error>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn Transaction<Error = Self::Error>) -> Result<T, Self::Error>
      + Send
      + 'static;

  /// Listen to one document. Must be called inside a tokio runtime.
  fn watch_doc(&self, path: DocPath) -> Watch<Option<Document>, Self::Error>;

  /// Listen to a filtered, ordered collection. Must be called inside a tokio
  /// runtime.
  fn watch_query(
    &self,
    collection: CollectionPath,
    query: Query,
  ) -> Watch<Vec<Document>, Self::Error>;
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(id: &str, data: Value) -> Document {
    let Value::Object(data) = data else { unreachable!() };
    Document {
      path: DocPath::parse(format!("things/{id}")).unwrap(),
      data,
    }
  }

  fn ids(docs: &[Document]) -> Vec<&str> { docs.iter().map(Document::id).collect() }

  #[test]
  fn orders_by_several_fields_then_id() {
    let docs = vec![
      doc("c", json!({ "kind": "symbol", "order": 2 })),
      doc("a", json!({ "kind": "place", "order": 1 })),
      doc("b", json!({ "kind": "symbol", "order": 1 })),
      doc("d", json!({ "kind": "symbol", "order": 1 })),
    ];
    let q = Query::new()
      .order_by("kind", Direction::Asc)
      .order_by("order", Direction::Asc);
    assert_eq!(ids(&q.apply(docs)), ["a", "b", "d", "c"]);
  }

  #[test]
  fn descending_order_and_limit() {
    let docs = vec![
      doc("old", json!({ "at": "2024-01-01T00:00:00.000000Z" })),
      doc("new", json!({ "at": "2024-03-01T00:00:00.000000Z" })),
      doc("mid", json!({ "at": "2024-02-01T00:00:00.000000Z" })),
    ];
    let q = Query::new().order_by("at", Direction::Desc).limit(2);
    assert_eq!(ids(&q.apply(docs)), ["new", "mid"]);
  }

  #[test]
  fn in_filter_treats_missing_fields_as_null() {
    let docs = vec![
      doc("kept", json!({ "deleted": false })),
      doc("missing", json!({})),
      doc("gone", json!({ "deleted": true })),
    ];
    let q = Query::new().where_in("deleted", vec![json!(false), Value::Null]);
    let mut got = ids(&q.apply(docs)).into_iter().map(str::to_owned).collect::<Vec<_>>();
    got.sort();
    assert_eq!(got, ["kept", "missing"]);
  }

  #[test]
  fn eq_filter() {
    let docs = vec![
      doc("a", json!({ "status": "draft" })),
      doc("b", json!({ "status": "integrated" })),
    ];
    let q = Query::new().where_eq("status", "integrated");
    assert_eq!(ids(&q.apply(docs)), ["b"]);
  }

  #[test]
  fn missing_sort_field_sorts_first() {
    let docs = vec![
      doc("b", json!({ "order": 1 })),
      doc("a", json!({})),
    ];
    let q = Query::new().order_by("order", Direction::Asc);
    assert_eq!(ids(&q.apply(docs)), ["a", "b"]);
  }

  #[test]
  fn value_type_order() {
    let ladder = [
      Value::Null,
      json!(true),
      json!(3),
      json!("x"),
      json!([1]),
      json!({ "k": 1 }),
    ];
    for pair in ladder.windows(2) {
      assert_eq!(compare_values(&pair[0], &pair[1]), Ordering::Less);
    }
  }
}
