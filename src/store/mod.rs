use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

/// Errors surfaced by a document store. The access layer does not retry or
/// translate these beyond mapping them onto HTTP errors at the boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("store backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

/// A record in a named collection. `data` always carries an `id` field
/// mirroring `id`, so models deserialize straight from it.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub data: Value,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
    In,
}

/// A field predicate on a dotted path, e.g. `stats.likes`.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Serialize) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Eq,
            value: to_value(value),
        }
    }

    pub fn gte(field: &str, value: impl Serialize) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Gte,
            value: to_value(value),
        }
    }

    pub fn lte(field: &str, value: impl Serialize) -> Self {
        Self {
            field: field.to_string(),
            op: Op::Lte,
            value: to_value(value),
        }
    }

    /// Membership test: the field value must equal one of `values`.
    pub fn is_in(field: &str, values: impl Serialize) -> Self {
        Self {
            field: field.to_string(),
            op: Op::In,
            value: to_value(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn first(n: usize) -> Self {
        Self {
            limit: Some(n),
            offset: 0,
        }
    }

    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

/// A partial update: merge-writes on dotted paths plus atomic numeric deltas.
/// Deltas are applied server-side against the stored value, never read-modify-write
/// from the client.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    pub sets: Vec<(String, Value)>,
    pub increments: Vec<(String, i64)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Serialize) -> Self {
        self.sets.push((field.to_string(), to_value(value)));
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.increments.push((field.to_string(), by));
        self
    }
}

/// One operation inside a batch. A batch is atomic within itself only;
/// independent batches are independent network calls.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Create { collection: String, data: Value },
    Update { collection: String, id: Uuid, patch: Patch },
    Delete { collection: String, id: Uuid },
}

/// The hosted document database, as consumed. Collections are schemaless;
/// relationships are foreign keys resolved by follow-up queries. Reads after
/// writes are eventually consistent per document and nothing here adds
/// locking or versioning on top.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError>;

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        page: Page,
    ) -> Result<Vec<Document>, StoreError>;

    /// Stores `data` under a generated id and returns the stored document.
    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError>;

    async fn update(&self, collection: &str, id: Uuid, patch: Patch) -> Result<(), StoreError>;

    /// Deleting an absent document is not an error.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError>;

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError>;
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Generates an id for a new document and mirrors it into the payload.
pub(crate) fn prepare_document(data: Value) -> Result<(Uuid, Value), StoreError> {
    let id = Uuid::new_v4();
    let mut data = data;
    match data.as_object_mut() {
        Some(map) => {
            map.insert("id".to_string(), json!(id));
        }
        None => {
            return Err(StoreError::Malformed(
                "document must be a JSON object".to_string(),
            ))
        }
    }
    Ok((id, data))
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate objects as needed.
pub(crate) fn write_path(doc: &mut Value, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            if let Some(map) = doc.as_object_mut() {
                map.insert(path.to_string(), value);
            }
        }
        Some((head, rest)) => {
            if let Some(map) = doc.as_object_mut() {
                let entry = map
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Default::default()));
                if !entry.is_object() {
                    *entry = Value::Object(Default::default());
                }
                write_path(entry, rest, value);
            }
        }
    }
}

pub(crate) fn increment_path(doc: &mut Value, path: &str, by: i64) {
    let current = lookup_path(doc, path).and_then(Value::as_i64).unwrap_or(0);
    write_path(doc, path, json!(current + by));
}

pub(crate) fn apply_patch(doc: &mut Value, patch: &Patch) {
    for (path, value) in &patch.sets {
        write_path(doc, path, value.clone());
    }
    for (path, by) in &patch.increments {
        increment_path(doc, path, *by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_path_creates_intermediate_objects() {
        let mut doc = json!({});
        write_path(&mut doc, "stats.likes", json!(3));
        assert_eq!(doc, json!({"stats": {"likes": 3}}));
    }

    #[test]
    fn increment_path_treats_missing_as_zero() {
        let mut doc = json!({"stats": {}});
        increment_path(&mut doc, "stats.comments", 1);
        increment_path(&mut doc, "stats.comments", 2);
        assert_eq!(lookup_path(&doc, "stats.comments"), Some(&json!(3)));
    }

    #[test]
    fn apply_patch_sets_then_increments() {
        let mut doc = json!({"name": "old", "stats": {"likes": 5}});
        let patch = Patch::new().set("name", "new").increment("stats.likes", -2);
        apply_patch(&mut doc, &patch);
        assert_eq!(doc, json!({"name": "new", "stats": {"likes": 3}}));
    }
}
