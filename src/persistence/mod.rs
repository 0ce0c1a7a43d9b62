//! Persistence layer: named collections of opaque JSON documents.
//!
//! The gateway's services consume the [`DocumentStore`] trait and treat
//! every document as an opaque structured payload: inserted as given,
//! returned verbatim (plus an injected `_id` record identifier), and
//! forwarded unchanged into realtime events. Two backends exist: an
//! in-process [`MemoryStore`] used by tests and the default deployment, and
//! a PostgreSQL JSONB [`PostgresStore`].

pub mod memory;
pub mod postgres;

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Field key under which a document's record identifier is exposed.
///
/// Record ids are store-assigned and distinct from any domain-level `id`
/// field a document may carry; [`DocumentStore::update`] and
/// [`DocumentStore::delete`] address documents by record id.
pub const RECORD_ID_FIELD: &str = "_id";

/// Field-level predicate of a [`Filter`].
#[derive(Debug, Clone)]
pub enum FieldPredicate {
    /// Field equals the value.
    Eq(Value),
    /// Field differs from the value. A missing field differs from any
    /// non-null value.
    Ne(Value),
    /// Field orders strictly before the value.
    Lt(Value),
    /// Field orders strictly after the value.
    Gt(Value),
}

/// Conjunction of field predicates applied to documents of one collection.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, FieldPredicate)>,
}

impl Filter {
    /// Creates an empty filter matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality clause.
    #[must_use]
    pub fn eq(mut self, field: &str, value: Value) -> Self {
        self.clauses.push((field.to_string(), FieldPredicate::Eq(value)));
        self
    }

    /// Adds an inequality clause.
    #[must_use]
    pub fn ne(mut self, field: &str, value: Value) -> Self {
        self.clauses.push((field.to_string(), FieldPredicate::Ne(value)));
        self
    }

    /// Adds a strictly-less-than clause.
    #[must_use]
    pub fn lt(mut self, field: &str, value: Value) -> Self {
        self.clauses.push((field.to_string(), FieldPredicate::Lt(value)));
        self
    }

    /// Adds a strictly-greater-than clause.
    #[must_use]
    pub fn gt(mut self, field: &str, value: Value) -> Self {
        self.clauses.push((field.to_string(), FieldPredicate::Gt(value)));
        self
    }

    /// Returns the filter's clauses.
    #[must_use]
    pub fn clauses(&self) -> &[(String, FieldPredicate)] {
        &self.clauses
    }

    /// Returns `true` if the document satisfies every clause.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses.iter().all(|(field, predicate)| {
            let actual = document.get(field).unwrap_or(&Value::Null);
            match predicate {
                FieldPredicate::Eq(expected) => actual == expected,
                FieldPredicate::Ne(expected) => actual != expected,
                FieldPredicate::Lt(bound) => compare_values(actual, bound) == Ordering::Less,
                FieldPredicate::Gt(bound) => compare_values(actual, bound) == Ordering::Greater,
            }
        })
    }
}

/// Sort direction for one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest values first.
    Asc,
    /// Largest values first.
    Desc,
}

/// Pagination, ordering, and projection options for a fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Documents to skip after sorting.
    pub skip: usize,
    /// Maximum number of documents to return. `None` returns all.
    pub limit: Option<usize>,
    /// Sort keys applied in order; earlier keys dominate.
    pub sort: Vec<(String, SortOrder)>,
    /// Fields to retain in returned documents (`_id` is always kept).
    /// `None` returns full documents.
    pub projection: Option<Vec<String>>,
}

/// Abstract document store consumed by the gateway's services.
///
/// Implementations assign each inserted document an opaque record id and
/// expose it as the `_id` field of fetched documents. Patches are shallow
/// merges: top-level fields of the patch replace or extend the document.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Fetches documents matching the filter, honoring skip/limit/sort/
    /// projection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on backend failure.
    async fn fetch(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FetchOptions,
    ) -> Result<Vec<Value>, GatewayError>;

    /// Inserts a document and returns its store-assigned record id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on backend failure.
    async fn insert(&self, collection: &str, document: Value) -> Result<String, GatewayError>;

    /// Applies a shallow patch to the document with the given record id.
    /// Returns `false` when no such document exists.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on backend failure.
    async fn update(
        &self,
        collection: &str,
        record_id: &str,
        patch: Value,
    ) -> Result<bool, GatewayError>;

    /// Applies a shallow patch to every document matching the filter.
    /// Returns the number of patched documents.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on backend failure.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: Value,
    ) -> Result<u64, GatewayError>;

    /// Deletes the document with the given record id. Returns `false` when
    /// no such document exists.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on backend failure.
    async fn delete(&self, collection: &str, record_id: &str) -> Result<bool, GatewayError>;
}

/// Total order over JSON values used by range predicates and sorting.
///
/// Numbers compare numerically and strings lexicographically, except that
/// two RFC 3339 strings compare as instants (timestamps are stored as RFC
/// 3339 text, where fractional-second variations break a plain string
/// comparison). Values of different kinds compare equal, which keeps sorts
/// stable instead of panicking.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (
                chrono::DateTime::parse_from_rfc3339(x),
                chrono::DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(tx), Ok(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Sorts documents by the given keys; earlier keys dominate.
pub fn sort_documents(documents: &mut [Value], sort: &[(String, SortOrder)]) {
    documents.sort_by(|a, b| {
        for (field, order) in sort {
            let left = a.get(field).unwrap_or(&Value::Null);
            let right = b.get(field).unwrap_or(&Value::Null);
            let ordering = match order {
                SortOrder::Asc => compare_values(left, right),
                SortOrder::Desc => compare_values(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Applies sort, skip, limit, and projection to fetched documents.
#[must_use]
pub fn apply_options(mut documents: Vec<Value>, options: &FetchOptions) -> Vec<Value> {
    if !options.sort.is_empty() {
        sort_documents(&mut documents, &options.sort);
    }

    let documents = documents
        .into_iter()
        .skip(options.skip)
        .take(options.limit.unwrap_or(usize::MAX));

    match &options.projection {
        None => documents.collect(),
        Some(fields) => documents
            .map(|document| match document.as_object() {
                Some(map) => Value::Object(
                    map.iter()
                        .filter(|(key, _)| {
                            key.as_str() == RECORD_ID_FIELD
                                || fields.iter().any(|field| field.as_str() == key.as_str())
                        })
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                ),
                None => document,
            })
            .collect(),
    }
}

/// Injects the record id into a document copy under [`RECORD_ID_FIELD`].
#[must_use]
pub fn with_record_id(record_id: &str, document: &Value) -> Value {
    let mut visible = document.clone();
    if let Some(map) = visible.as_object_mut() {
        map.insert(
            RECORD_ID_FIELD.to_string(),
            Value::String(record_id.to_string()),
        );
    }
    visible
}

/// Shallow-merges the patch's top-level fields into the document.
pub fn apply_patch(document: &mut Value, patch: &Value) {
    if let (Some(target), Some(changes)) = (document.as_object_mut(), patch.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn eq_and_ne_clauses_match_like_the_original_queries() {
        let filter = Filter::new()
            .eq("is_active", json!(true))
            .ne("is_deleted", json!(true));

        // A document without the `is_deleted` field still satisfies `ne`.
        assert!(filter.matches(&json!({"is_active": true})));
        assert!(filter.matches(&json!({"is_active": true, "is_deleted": false})));
        assert!(!filter.matches(&json!({"is_active": true, "is_deleted": true})));
        assert!(!filter.matches(&json!({"is_active": false})));
    }

    #[test]
    fn range_clauses_compare_timestamps_as_instants() {
        let filter = Filter::new().lt("timestamp", json!("2026-08-07T12:00:00Z"));
        assert!(filter.matches(&json!({"timestamp": "2026-08-07T11:59:59.900Z"})));
        assert!(!filter.matches(&json!({"timestamp": "2026-08-07T12:00:00.100Z"})));
    }

    #[test]
    fn gt_on_numbers_compares_numerically() {
        let filter = Filter::new().gt("view_count", json!(9));
        assert!(filter.matches(&json!({"view_count": 10})));
        assert!(!filter.matches(&json!({"view_count": 9})));
    }

    #[test]
    fn sort_orders_by_keys_in_turn() {
        let mut documents = vec![
            json!({"last_activity": "2026-01-02T00:00:00Z", "created_at": "2026-01-01T00:00:00Z"}),
            json!({"last_activity": "2026-01-02T00:00:00Z", "created_at": "2026-01-02T00:00:00Z"}),
            json!({"last_activity": "2026-01-03T00:00:00Z", "created_at": "2026-01-01T00:00:00Z"}),
        ];
        sort_documents(
            &mut documents,
            &[
                ("last_activity".to_string(), SortOrder::Desc),
                ("created_at".to_string(), SortOrder::Desc),
            ],
        );
        let activities: Vec<_> = documents
            .iter()
            .map(|d| {
                (
                    d.get("last_activity").cloned(),
                    d.get("created_at").cloned(),
                )
            })
            .collect();
        assert_eq!(
            activities.first(),
            Some(&(
                Some(json!("2026-01-03T00:00:00Z")),
                Some(json!("2026-01-01T00:00:00Z"))
            ))
        );
        assert_eq!(
            activities.get(1),
            Some(&(
                Some(json!("2026-01-02T00:00:00Z")),
                Some(json!("2026-01-02T00:00:00Z"))
            ))
        );
    }

    #[test]
    fn apply_options_paginates_after_sorting() {
        let documents = vec![json!({"n": 3}), json!({"n": 1}), json!({"n": 2})];
        let options = FetchOptions {
            skip: 1,
            limit: Some(1),
            sort: vec![("n".to_string(), SortOrder::Asc)],
            projection: None,
        };
        let page = apply_options(documents, &options);
        assert_eq!(page, vec![json!({"n": 2})]);
    }

    #[test]
    fn projection_keeps_record_id() {
        let documents = vec![json!({"_id": "r1", "title": "t", "body": "b"})];
        let options = FetchOptions {
            projection: Some(vec!["title".to_string()]),
            ..FetchOptions::default()
        };
        let projected = apply_options(documents, &options);
        assert_eq!(projected, vec![json!({"_id": "r1", "title": "t"})]);
    }

    #[test]
    fn patch_is_a_shallow_merge() {
        let mut document = json!({"a": 1, "b": 2});
        apply_patch(&mut document, &json!({"b": 3, "c": 4}));
        assert_eq!(document, json!({"a": 1, "b": 3, "c": 4}));
    }
}
