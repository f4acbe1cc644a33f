//! In-memory document store.
//!
//! Used for local development and tests. Behaves like the hosted store
//! where the core depends on it:
//!
//! - `create_if_absent` and `commit` are atomic (one lock guards all state)
//! - subscribers get a full ordered snapshot on attach and after every
//!   commit that changes their result set, in commit order
//! - optionally strict about composite indexes, answering
//!   `StoreError::MissingIndex` for undeclared ones
//! - transient failures can be injected

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::ports::{
    CreateOutcome, Document, DocumentStore, Query, Snapshot, SnapshotReceiver, StoreError,
    WriteBatch, WriteMode,
};

type Collection = BTreeMap<String, JsonValue>;

struct Watcher {
    query: Query,
    tx: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
    last: Vec<Document>,
}

#[derive(Default)]
struct State {
    collections: HashMap<String, Collection>,
    watchers: Vec<Watcher>,
    failures_remaining: u32,
}

impl State {
    fn take_failure(&mut self) -> Result<(), StoreError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(StoreError::unavailable("injected failure"));
        }
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Vec<Document> {
        let docs = self
            .collections
            .get(&query.collection)
            .map(|c| {
                c.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default();
        query.apply_locally(docs)
    }

    fn field_of(&self, collection: &str, id: &str, field: &str) -> JsonValue {
        self.collections
            .get(collection)
            .and_then(|c| c.get(id))
            .and_then(|d| d.get(field))
            .cloned()
            .unwrap_or(JsonValue::Null)
    }

    fn apply(&mut self, collection: &str, id: &str, data: JsonValue, mode: WriteMode) {
        let docs = self.collections.entry(collection.to_string()).or_default();
        match (mode, docs.get_mut(id)) {
            (WriteMode::Merge, Some(JsonValue::Object(existing))) => {
                if let JsonValue::Object(fields) = data {
                    existing.extend(fields);
                }
            }
            (WriteMode::MergeMissing, Some(JsonValue::Object(existing))) => {
                if let JsonValue::Object(fields) = data {
                    for (key, value) in fields {
                        let missing = existing.get(&key).map_or(true, JsonValue::is_null);
                        if missing {
                            existing.insert(key, value);
                        }
                    }
                }
            }
            _ => {
                docs.insert(id.to_string(), data);
            }
        }
    }

    /// Pushes fresh snapshots to watchers of `touched` collections whose
    /// result set changed, and drops watchers whose receiver is gone.
    fn notify(&mut self, touched: &HashSet<String>) {
        let mut watchers = std::mem::take(&mut self.watchers);
        watchers.retain_mut(|watcher| {
            if watcher.tx.is_closed() {
                return false;
            }
            if !touched.contains(&watcher.query.collection) {
                return true;
            }
            let current = self.run_query(&watcher.query);
            if current == watcher.last {
                return true;
            }
            watcher.last = current.clone();
            watcher
                .tx
                .send(Ok(Snapshot { documents: current }))
                .is_ok()
        });
        self.watchers = watchers;
    }
}

pub struct InMemoryDocumentStore {
    state: Mutex<State>,
    /// Declared composite indexes. `None` accepts every query.
    indexes: Option<HashSet<String>>,
}

impl InMemoryDocumentStore {
    /// Store that serves every query.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            indexes: None,
        }
    }

    /// Store that rejects compound queries without a declared index, the
    /// way the hosted store does.
    pub fn with_indexes<I, S>(indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(State::default()),
            indexes: Some(indexes.into_iter().map(Into::into).collect()),
        }
    }

    // === Test Helpers ===

    /// Makes the next `count` operations fail with `Unavailable`.
    pub async fn fail_next(&self, count: u32) {
        self.state.lock().await.failures_remaining = count;
    }

    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .lock()
            .await
            .run_query(&Query::collection(collection))
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub async fn watcher_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state.watchers.retain(|w| !w.tx.is_closed());
        state.watchers.len()
    }

    fn check_index(&self, query: &Query) -> Result<(), StoreError> {
        let (Some(declared), Some(index)) = (&self.indexes, query.required_index()) else {
            return Ok(());
        };
        if declared.contains(&index) {
            Ok(())
        } else {
            Err(StoreError::MissingIndex { index })
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn put(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        state.apply(collection, id, data, mode);
        state.notify(&HashSet::from([collection.to_string()]));
        trace!(collection, id, ?mode, "Document written");
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
    ) -> Result<CreateOutcome, StoreError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;
        if let Some(existing) = state.collections.get(collection).and_then(|c| c.get(id)) {
            return Ok(CreateOutcome::Existing(Document::new(id, existing.clone())));
        }
        state.apply(collection, id, data.clone(), WriteMode::Replace);
        state.notify(&HashSet::from([collection.to_string()]));
        debug!(collection, id, "Document created");
        Ok(CreateOutcome::Created(Document::new(id, data)))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.take_failure()?;

        for pre in &batch.preconditions {
            if state.field_of(&pre.collection, &pre.id, &pre.field) != pre.expected {
                return Err(StoreError::PreconditionFailed {
                    collection: pre.collection.clone(),
                    id: pre.id.clone(),
                    field: pre.field.clone(),
                });
            }
        }

        let mut touched = HashSet::new();
        for write in batch.writes {
            touched.insert(write.collection.clone());
            state.apply(&write.collection, &write.id, write.data, write.mode);
        }
        state.notify(&touched);
        Ok(())
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.check_index(query)?;
        let mut state = self.state.lock().await;
        state.take_failure()?;
        Ok(state.run_query(query))
    }

    async fn subscribe(&self, query: Query) -> Result<SnapshotReceiver, StoreError> {
        self.check_index(&query)?;
        let mut state = self.state.lock().await;
        state.take_failure()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let initial = state.run_query(&query);
        // receiver is still in scope, send cannot fail
        let _ = tx.send(Ok(Snapshot {
            documents: initial.clone(),
        }));
        state.watchers.push(Watcher {
            query,
            tx,
            last: initial,
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Direction, Filter};
    use serde_json::json;

    #[tokio::test]
    async fn merge_keeps_unrelated_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .put("c", "1", json!({"a": 1, "b": 2}), WriteMode::Replace)
            .await
            .unwrap();
        store
            .put("c", "1", json!({"b": 3, "c": 4}), WriteMode::Merge)
            .await
            .unwrap();

        let doc = store.get("c", "1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[tokio::test]
    async fn merge_missing_never_overwrites() {
        let store = InMemoryDocumentStore::new();
        store
            .put("c", "1", json!({"name": "Ada", "status": null}), WriteMode::Replace)
            .await
            .unwrap();
        store
            .put(
                "c",
                "1",
                json!({"name": "Other", "status": "active", "extra": true}),
                WriteMode::MergeMissing,
            )
            .await
            .unwrap();

        let doc = store.get("c", "1").await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"name": "Ada", "status": "active", "extra": true}));
    }

    #[tokio::test]
    async fn create_if_absent_reports_existing() {
        let store = InMemoryDocumentStore::new();
        let first = store.create_if_absent("c", "1", json!({"v": 1})).await.unwrap();
        let second = store.create_if_absent("c", "1", json!({"v": 2})).await.unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
        assert_eq!(second.into_document().data, json!({"v": 1}));
    }

    #[tokio::test]
    async fn failed_precondition_applies_nothing() {
        let store = InMemoryDocumentStore::new();
        store
            .put("b", "1", json!({"status": "accepted"}), WriteMode::Replace)
            .await
            .unwrap();

        let batch = WriteBatch::new()
            .require("b", "1", "status", "pending")
            .put("clients", "x", json!({"id": "x"}), WriteMode::Replace)
            .put("b", "1", json!({"status": "declined"}), WriteMode::Merge);
        let result = store.commit(batch).await;

        assert!(matches!(result, Err(StoreError::PreconditionFailed { .. })));
        assert_eq!(store.count("clients").await, 0);
        let doc = store.get("b", "1").await.unwrap().unwrap();
        assert_eq!(doc.field("status"), "accepted");
    }

    #[tokio::test]
    async fn strict_store_rejects_undeclared_compound_query() {
        let store = InMemoryDocumentStore::with_indexes(["bookings(consultant_id,status)"]);
        let declared = Query::collection("bookings")
            .filter(Filter::eq("consultant_id", "k"))
            .filter(Filter::eq("status", "pending"));
        let undeclared = declared.clone().order_by("scheduled_at", Direction::Ascending);

        assert!(store.fetch(&declared).await.is_ok());
        assert!(matches!(
            store.fetch(&undeclared).await,
            Err(StoreError::MissingIndex { .. })
        ));
    }

    #[tokio::test]
    async fn subscriber_gets_initial_and_changed_snapshots_only() {
        let store = InMemoryDocumentStore::new();
        let query = Query::collection("m")
            .filter(Filter::eq("room", "r1"))
            .order_by("at", Direction::Ascending);
        let mut rx = store.subscribe(query).await.unwrap();

        assert!(rx.recv().await.unwrap().unwrap().documents.is_empty());

        store
            .put("m", "2", json!({"room": "r1", "at": 2}), WriteMode::Replace)
            .await
            .unwrap();
        store
            .put("m", "x", json!({"room": "r2", "at": 0}), WriteMode::Replace)
            .await
            .unwrap();
        store
            .put("m", "1", json!({"room": "r1", "at": 1}), WriteMode::Replace)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.documents.len(), 1);
        let second = rx.recv().await.unwrap().unwrap();
        let ids: Vec<&str> = second.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn injected_failures_are_transient_and_run_out() {
        let store = InMemoryDocumentStore::new();
        store.fail_next(1).await;

        let err = store.get("c", "1").await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.get("c", "1").await.is_ok());
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned() {
        let store = InMemoryDocumentStore::new();
        let rx = store.subscribe(Query::collection("c")).await.unwrap();
        assert_eq!(store.watcher_count().await, 1);
        drop(rx);
        assert_eq!(store.watcher_count().await, 0);
    }
}
