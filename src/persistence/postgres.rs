//! PostgreSQL implementation of the document store.
//!
//! Documents live in a single JSONB table keyed by `(collection,
//! record_id)`. Equality clauses are pushed down as `@>` containment;
//! range and inequality clauses, ordering, and pagination are applied in
//! process on the matched rows. The store is deliberately thin: a document
//! shelf, not a query planner.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::error::GatewayError;

use super::{
    DocumentStore, FetchOptions, FieldPredicate, Filter, RECORD_ID_FIELD, apply_options,
    with_record_id,
};

/// PostgreSQL-backed [`DocumentStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `documents` table and its collection index if absent.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), GatewayError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (\
                 record_id TEXT PRIMARY KEY,\
                 collection TEXT NOT NULL,\
                 doc JSONB NOT NULL,\
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now()\
             )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS documents_collection_idx ON documents (collection)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    /// Fetches rows matching the filter's equality clauses via containment,
    /// then applies the remaining clauses in process.
    async fn fetch_matching(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Value>, GatewayError> {
        let mut containment = serde_json::Map::new();
        for (field, predicate) in filter.clauses() {
            if let FieldPredicate::Eq(value) = predicate
                && field != RECORD_ID_FIELD
            {
                containment.insert(field.clone(), value.clone());
            }
        }

        let rows = sqlx::query_as::<_, (String, Value)>(
            "SELECT record_id, doc FROM documents WHERE collection = $1 AND doc @> $2",
        )
        .bind(collection)
        .bind(Value::Object(containment))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(record_id, doc)| with_record_id(&record_id, &doc))
            .filter(|visible| filter.matches(visible))
            .collect())
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn fetch(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FetchOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let matched = self.fetch_matching(collection, filter).await?;
        Ok(apply_options(matched, options))
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<String, GatewayError> {
        let record_id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO documents (record_id, collection, doc) VALUES ($1, $2, $3)")
            .bind(&record_id)
            .bind(collection)
            .bind(&document)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(record_id)
    }

    async fn update(
        &self,
        collection: &str,
        record_id: &str,
        patch: Value,
    ) -> Result<bool, GatewayError> {
        let result = sqlx::query(
            "UPDATE documents SET doc = doc || $3 WHERE collection = $1 AND record_id = $2",
        )
        .bind(collection)
        .bind(record_id)
        .bind(&patch)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<u64, GatewayError> {
        let matched = self.fetch_matching(collection, filter).await?;
        let record_ids: Vec<String> = matched
            .iter()
            .filter_map(|doc| doc.get(RECORD_ID_FIELD))
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        if record_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE documents SET doc = doc || $2 WHERE collection = $1 AND record_id = ANY($3)",
        )
        .bind(collection)
        .bind(&patch)
        .bind(&record_ids)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, collection: &str, record_id: &str) -> Result<bool, GatewayError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND record_id = $2")
            .bind(collection)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
