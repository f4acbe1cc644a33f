//! Query helpers that degrade when the store lacks a composite index.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::foundation::CoreError;
use crate::ports::{Document, DocumentStore, Query, Snapshot, SnapshotReceiver, StoreError};

/// Runs `query`, falling back to its single-field form plus local
/// filtering and sorting when the store reports a missing index.
pub async fn fetch_with_fallback(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<Document>, StoreError> {
    match store.fetch(query).await {
        Err(StoreError::MissingIndex { index }) => {
            warn!(
                collection = %query.collection,
                index = %index,
                "Missing composite index, filtering locally"
            );
            let docs = store.fetch(&query.relaxed()).await?;
            Ok(query.apply_locally(docs))
        }
        other => other,
    }
}

/// Live version of [`fetch_with_fallback`].
///
/// On a missing index the relaxed query is subscribed and every snapshot
/// is filtered and sorted locally before it is forwarded.
pub async fn subscribe_with_fallback(
    store: &dyn DocumentStore,
    query: Query,
) -> Result<SnapshotReceiver, StoreError> {
    match store.subscribe(query.clone()).await {
        Err(StoreError::MissingIndex { index }) => {
            warn!(
                collection = %query.collection,
                index = %index,
                "Missing composite index, subscribing to relaxed query"
            );
            let mut upstream = store.subscribe(query.relaxed()).await?;
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                while let Some(item) = upstream.recv().await {
                    let item = item.map(|snapshot| Snapshot {
                        documents: query.apply_locally(snapshot.documents),
                    });
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            });
            Ok(rx)
        }
        other => other,
    }
}

/// Serializes a record for the store.
pub fn encode<T: Serialize>(record: &T) -> Result<JsonValue, CoreError> {
    serde_json::to_value(record).map_err(|e| CoreError::internal(e.to_string()))
}
