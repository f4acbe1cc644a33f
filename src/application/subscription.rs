//! Handle for a live query feeding a callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::foundation::CoreError;
use crate::ports::{Snapshot, SnapshotReceiver};

/// What a subscriber sees on every change: the full ordered result set,
/// or the error that ended the subscription.
pub type Update<T> = Result<Vec<T>, CoreError>;

/// A running subscription.
///
/// `unsubscribe` stops delivery: no callback starts after it returns.
/// Calling it again, or dropping the handle, is a no-op.
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Pumps `snapshots` through `decode` into `on_change`.
    ///
    /// A store error or decode failure is delivered once and ends the
    /// subscription.
    pub fn spawn<T, D, F>(mut snapshots: SnapshotReceiver, decode: D, mut on_change: F) -> Self
    where
        T: Send + 'static,
        D: Fn(Snapshot) -> Result<Vec<T>, CoreError> + Send + 'static,
        F: FnMut(Update<T>) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);

        let task = tokio::spawn(async move {
            while let Some(item) = snapshots.recv().await {
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                let update = item.map_err(CoreError::from).and_then(&decode);
                let ended = update.is_err();
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                on_change(update);
                if ended {
                    break;
                }
            }
            flag.store(false, Ordering::SeqCst);
            debug!("Subscription pump finished");
        });

        Self { active, task }
    }

    /// Stops delivery. Idempotent.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Unsubscribed");
        }
        self.task.abort();
    }

    /// False once unsubscribed or once the underlying stream has ended.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Document, StoreError};
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn snapshot(ids: &[&str]) -> Snapshot {
        Snapshot {
            documents: ids.iter().map(|id| Document::new(*id, json!({}))).collect(),
        }
    }

    fn ids(snapshot: Snapshot) -> Result<Vec<String>, CoreError> {
        Ok(snapshot.documents.into_iter().map(|d| d.id).collect())
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn delivers_until_unsubscribed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let subscription = Subscription::spawn(rx, ids, move |update| {
            sink.lock().unwrap().push(update.unwrap());
        });

        tx.send(Ok(snapshot(&["a"]))).unwrap();
        settle().await;
        subscription.unsubscribe();
        subscription.unsubscribe();
        let _ = tx.send(Ok(snapshot(&["a", "b"])));
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![vec!["a".to_string()]]);
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn store_error_is_delivered_once_and_ends_feed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let subscription = Subscription::spawn(rx, ids, move |update| {
            sink.lock().unwrap().push(update.is_err());
        });

        tx.send(Err(StoreError::unavailable("gone"))).unwrap();
        settle().await;
        let _ = tx.send(Ok(snapshot(&["a"])));
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![true]);
        assert!(!subscription.is_active());
    }

    #[tokio::test]
    async fn dropping_handle_stops_delivery() {
        let (tx, rx) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);

        let subscription = Subscription::spawn(rx, ids, move |_| {
            *sink.lock().unwrap() += 1;
        });
        drop(subscription);

        let _ = tx.send(Ok(snapshot(&["a"])));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), 0);
    }
}
