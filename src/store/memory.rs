use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    apply_patch, lookup_path, prepare_document, BatchOp, Direction, Document, DocumentStore,
    Filter, Op, OrderBy, Page, Patch, StoreError,
};

/// In-memory document store, used by tests and as a fallback when no
/// database is configured. Collections preserve insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<(Uuid, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    let field = lookup_path(doc, &filter.field).unwrap_or(&Value::Null);
    match filter.op {
        Op::Eq => field == &filter.value,
        Op::Gte => cmp_values(field, &filter.value).is_some_and(|o| o != Ordering::Less),
        Op::Lte => cmp_values(field, &filter.value).is_some_and(|o| o != Ordering::Greater),
        Op::In => filter
            .value
            .as_array()
            .is_some_and(|values| values.contains(field)),
    }
}

fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn order_docs(docs: &mut [Document], order: &OrderBy) {
    // sort_by is stable, so equal keys keep their stored order
    docs.sort_by(|a, b| {
        let av = lookup_path(&a.data, &order.field).unwrap_or(&Value::Null);
        let bv = lookup_path(&b.data, &order.field).unwrap_or(&Value::Null);
        let ord = cmp_values(av, bv).unwrap_or(Ordering::Equal);
        match order.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    });
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let guard = self.collections.read().await;
        let doc = guard
            .get(collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| *doc_id == id))
            .map(|(doc_id, data)| Document {
                id: *doc_id,
                data: data.clone(),
            });
        Ok(doc)
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        page: Page,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read().await;
        let mut docs: Vec<Document> = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, data)| filters.iter().all(|f| matches(data, f)))
                    .map(|(id, data)| Document {
                        id: *id,
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &order {
            order_docs(&mut docs, order);
        }

        Ok(docs
            .into_iter()
            .skip(page.offset)
            .take(page.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError> {
        let (id, data) = prepare_document(data)?;
        let mut guard = self.collections.write().await;
        guard
            .entry(collection.to_string())
            .or_default()
            .push((id, data.clone()));
        Ok(Document { id, data })
    }

    async fn update(&self, collection: &str, id: Uuid, patch: Patch) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| *doc_id == id))
            .ok_or(StoreError::NotFound)?;
        apply_patch(&mut doc.1, &patch);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;
        if let Some(docs) = guard.get_mut(collection) {
            docs.retain(|(doc_id, _)| *doc_id != id);
        }
        Ok(())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut guard = self.collections.write().await;

        // Validate before mutating so the batch applies all-or-nothing.
        for op in &ops {
            if let BatchOp::Update { collection, id, .. } = op {
                let exists = guard
                    .get(collection)
                    .is_some_and(|docs| docs.iter().any(|(doc_id, _)| doc_id == id));
                if !exists {
                    return Err(StoreError::NotFound);
                }
            }
        }

        for op in ops {
            match op {
                BatchOp::Create { collection, data } => {
                    let (id, data) = prepare_document(data)?;
                    guard.entry(collection).or_default().push((id, data));
                }
                BatchOp::Update {
                    collection,
                    id,
                    patch,
                } => {
                    if let Some(doc) = guard
                        .get_mut(&collection)
                        .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| *doc_id == id))
                    {
                        apply_patch(&mut doc.1, &patch);
                    }
                }
                BatchOp::Delete { collection, id } => {
                    if let Some(docs) = guard.get_mut(&collection) {
                        docs.retain(|(doc_id, _)| *doc_id != id);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_injects_id_and_read_round_trips() {
        let store = MemoryStore::new();
        let doc = store
            .create("things", json!({"name": "a"}))
            .await
            .unwrap();
        assert_eq!(doc.data["id"], json!(doc.id));

        let fetched = store.read("things", doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.data, doc.data);
    }

    #[tokio::test]
    async fn query_filters_orders_and_pages() {
        let store = MemoryStore::new();
        for (owner, ts) in [("a", 3), ("b", 1), ("a", 2), ("a", 5)] {
            store
                .create("events", json!({"owner": owner, "created_at": ts}))
                .await
                .unwrap();
        }

        let docs = store
            .query(
                "events",
                &[Filter::eq("owner", "a")],
                Some(OrderBy::desc("created_at")),
                Page::new(2, 1),
            )
            .await
            .unwrap();

        let timestamps: Vec<i64> = docs
            .iter()
            .map(|d| d.data["created_at"].as_i64().unwrap())
            .collect();
        assert_eq!(timestamps, vec![3, 2]);
    }

    #[tokio::test]
    async fn query_supports_range_and_membership() {
        let store = MemoryStore::new();
        for n in 1..=4 {
            store
                .create("nums", json!({"n": n, "tag": format!("t{n}")}))
                .await
                .unwrap();
        }

        let gte = store
            .query("nums", &[Filter::gte("n", 3)], None, Page::all())
            .await
            .unwrap();
        assert_eq!(gte.len(), 2);

        let within = store
            .query(
                "nums",
                &[Filter::is_in("tag", ["t1", "t4"])],
                None,
                Page::all(),
            )
            .await
            .unwrap();
        assert_eq!(within.len(), 2);
    }

    #[tokio::test]
    async fn update_applies_nested_increments() {
        let store = MemoryStore::new();
        let doc = store
            .create("posts", json!({"stats": {"likes": 0}}))
            .await
            .unwrap();

        store
            .update("posts", doc.id, Patch::new().increment("stats.likes", 1))
            .await
            .unwrap();
        store
            .update(
                "posts",
                doc.id,
                Patch::new()
                    .increment("stats.likes", -1)
                    .set("pinned", true),
            )
            .await
            .unwrap();

        let fetched = store.read("posts", doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.data["stats"]["likes"], json!(0));
        assert_eq!(fetched.data["pinned"], json!(true));
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("posts", Uuid::new_v4(), Patch::new().set("x", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn batch_is_atomic_on_failure() {
        let store = MemoryStore::new();
        let doc = store.create("posts", json!({"n": 1})).await.unwrap();

        let err = store
            .batch(vec![
                BatchOp::Delete {
                    collection: "posts".to_string(),
                    id: doc.id,
                },
                BatchOp::Update {
                    collection: "posts".to_string(),
                    id: Uuid::new_v4(),
                    patch: Patch::new().set("n", 2),
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        // The delete before the failing op must not have been applied.
        assert!(store.read("posts", doc.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        let doc = store.create("posts", json!({})).await.unwrap();
        store.delete("posts", doc.id).await.unwrap();
        store.delete("posts", doc.id).await.unwrap();
        assert!(store.read("posts", doc.id).await.unwrap().is_none());
    }
}
