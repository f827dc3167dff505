use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{
    prepare_document, BatchOp, Direction, Document, DocumentStore, Filter, Op, OrderBy, Page,
    Patch, StoreError,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id UUID NOT NULL,
    doc JSONB NOT NULL,
    PRIMARY KEY (collection, id)
)
"#;

const DOC_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS documents_doc_idx
ON documents USING GIN (doc jsonb_path_ops)
"#;

/// Postgres-backed document store. Every collection lives in one JSONB
/// table; filters, ordering and numeric deltas are pushed down to the
/// server so increments stay atomic per document.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        sqlx::query(DOC_INDEX).execute(&pool).await?;

        Ok(Self { pool })
    }
}

fn segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

/// Text form of a scalar as produced by the `#>>` operator.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn select_query(
    collection: &str,
    filters: &[Filter],
    order: &Option<OrderBy>,
    page: Page,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut qb = QueryBuilder::new("SELECT id, doc FROM documents WHERE collection = ");
    qb.push_bind(collection.to_string());

    for filter in filters {
        match filter.op {
            Op::Eq => {
                qb.push(" AND doc #> ");
                qb.push_bind(segments(&filter.field));
                qb.push(" = ");
                qb.push_bind(Json(filter.value.clone()));
            }
            Op::Gte | Op::Lte => {
                let number = filter.value.as_f64().ok_or_else(|| {
                    StoreError::Malformed(format!(
                        "range predicate on {} requires a number",
                        filter.field
                    ))
                })?;
                qb.push(" AND (doc #>> ");
                qb.push_bind(segments(&filter.field));
                qb.push(if filter.op == Op::Gte {
                    ")::numeric >= "
                } else {
                    ")::numeric <= "
                });
                qb.push_bind(number);
            }
            Op::In => {
                let values: Vec<String> = filter
                    .value
                    .as_array()
                    .map(|vals| vals.iter().map(scalar_text).collect())
                    .unwrap_or_default();
                qb.push(" AND (doc #>> ");
                qb.push_bind(segments(&filter.field));
                qb.push(") = ANY(");
                qb.push_bind(values);
                qb.push(")");
            }
        }
    }

    if let Some(order) = order {
        qb.push(" ORDER BY doc #> ");
        qb.push_bind(segments(&order.field));
        qb.push(match order.direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
    }

    if let Some(limit) = page.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
    }
    if page.offset > 0 {
        qb.push(" OFFSET ");
        qb.push_bind(page.offset as i64);
    }

    Ok(qb)
}

fn update_query(collection: &str, id: Uuid, patch: &Patch) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE documents SET doc = ");

    let nesting = patch.sets.len() + patch.increments.len();
    for _ in 0..nesting {
        qb.push("jsonb_set(");
    }
    qb.push("doc");

    for (path, value) in &patch.sets {
        qb.push(", ");
        qb.push_bind(segments(path));
        qb.push(", ");
        qb.push_bind(Json(value.clone()));
        qb.push(", true)");
    }
    // Deltas read the pre-update column value, so they apply atomically
    // against whatever the server currently holds.
    for (path, by) in &patch.increments {
        qb.push(", ");
        qb.push_bind(segments(path));
        qb.push(", to_jsonb(COALESCE((doc #>> ");
        qb.push_bind(segments(path));
        qb.push(")::bigint, 0) + ");
        qb.push_bind(*by);
        qb.push("), true)");
    }

    qb.push(" WHERE collection = ");
    qb.push_bind(collection.to_string());
    qb.push(" AND id = ");
    qb.push_bind(id);
    qb
}

#[async_trait::async_trait]
impl DocumentStore for PgStore {
    async fn read(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT id, doc FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Document {
                id: row.try_get("id")?,
                data: row.try_get("doc")?,
            })
        })
        .transpose()
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<OrderBy>,
        page: Page,
    ) -> Result<Vec<Document>, StoreError> {
        let mut qb = select_query(collection, filters, &order, page)?;
        let rows = qb.build().fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|row| {
                Ok(Document {
                    id: row.try_get("id")?,
                    data: row.try_get("doc")?,
                })
            })
            .collect()
    }

    async fn create(&self, collection: &str, data: Value) -> Result<Document, StoreError> {
        let (id, data) = prepare_document(data)?;
        sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(id)
            .bind(Json(data.clone()))
            .execute(&self.pool)
            .await?;
        Ok(Document { id, data })
    }

    async fn update(&self, collection: &str, id: Uuid, patch: Patch) -> Result<(), StoreError> {
        let mut qb = update_query(collection, id, &patch);
        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for op in ops {
            match op {
                BatchOp::Create { collection, data } => {
                    let (id, data) = prepare_document(data)?;
                    sqlx::query("INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)")
                        .bind(collection)
                        .bind(id)
                        .bind(Json(data))
                        .execute(&mut *tx)
                        .await?;
                }
                BatchOp::Update {
                    collection,
                    id,
                    patch,
                } => {
                    let mut qb = update_query(&collection, id, &patch);
                    let result = qb.build().execute(&mut *tx).await?;
                    if result.rows_affected() == 0 {
                        return Err(StoreError::NotFound);
                    }
                }
                BatchOp::Delete { collection, id } => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                        .bind(collection)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
