//! MessageStream - append-only, ordered message log per conversation.

use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::domain::conversation::{Conversation, Message, MessageText, MESSAGES_COLLECTION};
use crate::domain::foundation::{ConversationId, CoreError, Principal};
use crate::ports::{
    Clock, Direction, DocumentStore, Filter, Query, Snapshot, SnapshotReceiver, StoreError,
    WriteBatch, WriteMode,
};

use super::conversation_registry::{log_members, ConversationRegistry};
use super::retry::RetryPolicy;
use super::store_query::{encode, fetch_with_fallback, subscribe_with_fallback};
use super::subscription::{Subscription, Update};

pub struct MessageStream {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    registry: Arc<ConversationRegistry>,
    retry: RetryPolicy,
    /// Held from timestamping to commit so local commit order matches
    /// `created_at` order.
    append_lock: Mutex<()>,
}

impl MessageStream {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        registry: Arc<ConversationRegistry>,
    ) -> Self {
        Self {
            store,
            clock,
            registry,
            retry: RetryPolicy::default(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Appends a message authored by `principal`.
    ///
    /// # Errors
    ///
    /// - `Invalid` if the text is blank after trimming or too long
    /// - `NotFound`/`Forbidden` if the conversation is missing or the
    ///   caller is not a participant
    pub async fn append(
        &self,
        principal: &Principal,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<Message, CoreError> {
        let text = MessageText::new(text)?;
        let conversation = self.registry.get(principal, conversation_id).await?;

        let _guard = self.append_lock.lock().await;
        let message = Message::new(
            conversation.id.clone(),
            principal.id.clone(),
            text,
            self.clock.now(),
        );
        let data = encode(&message)?;

        // same id on every attempt, so a retried put cannot duplicate
        self.retry
            .run("message.append", || {
                let data = data.clone();
                let id = message.id.to_string();
                async move {
                    Ok(self
                        .store
                        .put(MESSAGES_COLLECTION, &id, data, WriteMode::Replace)
                        .await?)
                }
            })
            .await?;

        debug!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            author_id = %message.author_id,
            "Message appended"
        );
        Ok(message)
    }

    /// Full log in ascending `created_at` order.
    pub async fn history(
        &self,
        principal: &Principal,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, CoreError> {
        let conversation = self.registry.get(principal, conversation_id).await?;
        let members = self.registry.member_ids(&conversation).await?;
        let query = &log_query(&members);
        let docs = self
            .retry
            .run("message.history", || async move {
                Ok(fetch_with_fallback(self.store.as_ref(), query).await?)
            })
            .await?;
        decode_messages(Snapshot { documents: docs })
    }

    /// Most recent message, for conversation list previews.
    pub async fn latest(
        &self,
        principal: &Principal,
        conversation_id: &ConversationId,
    ) -> Result<Option<Message>, CoreError> {
        Ok(self.history(principal, conversation_id).await?.pop())
    }

    /// Marks every message the caller has not yet seen in the
    /// conversation as seen. Returns how many were marked.
    pub async fn mark_seen(
        &self,
        principal: &Principal,
        conversation_id: &ConversationId,
    ) -> Result<usize, CoreError> {
        let mut batch = WriteBatch::new();
        let mut marked = 0usize;
        for mut message in self.history(principal, conversation_id).await? {
            if message.is_unread_by(&principal.id) && message.mark_seen_by(&principal.id) {
                batch = batch.put(
                    MESSAGES_COLLECTION,
                    message.id.to_string(),
                    json!({ "seen_by": message.seen_by }),
                    WriteMode::Merge,
                );
                marked += 1;
            }
        }
        if marked == 0 {
            return Ok(0);
        }

        self.store.commit(batch).await?;
        debug!(
            conversation_id = %conversation_id,
            reader = %principal.id,
            marked,
            "Messages marked seen"
        );
        Ok(marked)
    }

    /// Messages written to the caller, across all their conversations,
    /// that they have not seen yet.
    pub async fn unread_count(&self, principal: &Principal) -> Result<usize, CoreError> {
        let mut unread = 0;
        for conversation in self.registry.list_for(principal).await? {
            unread += self
                .history(principal, &conversation.id)
                .await?
                .iter()
                .filter(|m| m.is_unread_by(&principal.id))
                .count();
        }
        Ok(unread)
    }

    /// Delivers the ordered log now and after every change, until the
    /// returned handle is unsubscribed or dropped.
    ///
    /// The pair's conversation records are watched alongside the log, so a
    /// subscriber attached through a duplicate keeps receiving messages
    /// after the duplicates are reconciled.
    pub async fn subscribe<F>(
        &self,
        principal: &Principal,
        conversation_id: &ConversationId,
        on_change: F,
    ) -> Result<Subscription, CoreError>
    where
        F: FnMut(Update<Message>) + Send + 'static,
    {
        let conversation = self.registry.get(principal, conversation_id).await?;
        let mut members = self.registry.member_ids(&conversation).await?;
        members.sort();
        let records = self.registry.watch_pair(&conversation).await?;
        let log = subscribe_with_fallback(self.store.as_ref(), log_query(&members)).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(follow_members(
            Arc::clone(&self.store),
            conversation_id.clone(),
            members,
            records,
            log,
            tx,
        ));

        debug!(
            conversation_id = %conversation.id,
            subscriber = %principal.id,
            "Message subscription attached"
        );
        Ok(Subscription::spawn(rx, decode_messages, on_change))
    }
}

/// Relays the message log for `members`, re-attaching whenever the pair's
/// records change who the members are. Ends when the subscriber goes away.
async fn follow_members(
    store: Arc<dyn DocumentStore>,
    attached: ConversationId,
    mut members: Vec<ConversationId>,
    mut records: SnapshotReceiver,
    mut log: SnapshotReceiver,
    tx: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
) {
    loop {
        tokio::select! {
            _ = tx.closed() => break,
            item = log.recv() => {
                let Some(item) = item else { break };
                if tx.send(item).is_err() {
                    break;
                }
            }
            item = records.recv() => {
                let snapshot = match item {
                    Some(Ok(snapshot)) => snapshot,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                    None => break,
                };
                let conversations = snapshot
                    .documents
                    .iter()
                    .filter_map(|doc| match doc.decode::<Conversation>() {
                        Ok(conversation) => Some(conversation),
                        Err(e) => {
                            warn!(id = %doc.id, error = %e, "Skipping undecodable conversation");
                            None
                        }
                    })
                    .collect::<Vec<_>>();
                let Some(next) = log_members(&attached, &conversations) else {
                    continue;
                };
                if next == members {
                    continue;
                }
                match subscribe_with_fallback(store.as_ref(), log_query(&next)).await {
                    Ok(feed) => {
                        debug!(
                            conversation_id = %attached,
                            members = next.len(),
                            "Message log re-attached after reconciliation"
                        );
                        log = feed;
                        members = next;
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        }
    }
}

fn log_query(members: &[ConversationId]) -> Query {
    let filter = match members {
        [only] => Filter::eq("conversation_id", only.as_str()),
        _ => Filter::in_set(
            "conversation_id",
            members.iter().map(|id| JsonValue::from(id.as_str())),
        ),
    };
    Query::collection(MESSAGES_COLLECTION)
        .filter(filter)
        .order_by("created_at", Direction::Ascending)
}

fn decode_messages(snapshot: Snapshot) -> Result<Vec<Message>, CoreError> {
    let mut messages = snapshot
        .documents
        .iter()
        .map(|doc| doc.decode::<Message>().map_err(CoreError::from))
        .collect::<Result<Vec<_>, _>>()?;
    messages.sort_by(Message::log_order);
    Ok(messages)
}
