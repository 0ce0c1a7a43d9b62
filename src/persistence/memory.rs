//! In-process document store.
//!
//! Default backend and the one the test suite runs against. Collections are
//! plain vectors behind a [`tokio::sync::RwLock`]; every operation works on
//! the documents' visible form (with `_id` injected) so filters can address
//! record ids the same way the PostgreSQL backend allows.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::GatewayError;

use super::{DocumentStore, FetchOptions, Filter, apply_options, apply_patch, with_record_id};

#[derive(Debug, Clone)]
struct StoredDocument {
    record_id: String,
    document: Value,
}

/// In-memory [`DocumentStore`] backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FetchOptions,
    ) -> Result<Vec<Value>, GatewayError> {
        let collections = self.collections.read().await;
        let matched = collections.get(collection).map_or_else(Vec::new, |docs| {
            docs.iter()
                .map(|stored| with_record_id(&stored.record_id, &stored.document))
                .filter(|visible| filter.matches(visible))
                .collect()
        });
        Ok(apply_options(matched, options))
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<String, GatewayError> {
        let record_id = uuid::Uuid::new_v4().to_string();
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                record_id: record_id.clone(),
                document,
            });
        Ok(record_id)
    }

    async fn update(
        &self,
        collection: &str,
        record_id: &str,
        patch: Value,
    ) -> Result<bool, GatewayError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let Some(stored) = docs.iter_mut().find(|stored| stored.record_id == record_id) else {
            return Ok(false);
        };
        apply_patch(&mut stored.document, &patch);
        Ok(true)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<u64, GatewayError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut patched = 0;
        for stored in docs.iter_mut() {
            let visible = with_record_id(&stored.record_id, &stored.document);
            if filter.matches(&visible) {
                apply_patch(&mut stored.document, &patch);
                patched += 1;
            }
        }
        Ok(patched)
    }

    async fn delete(&self, collection: &str, record_id: &str) -> Result<bool, GatewayError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|stored| stored.record_id != record_id);
        Ok(docs.len() < before)
    }
}
