//! ConversationRegistry - one conversation per unordered participant pair.
//!
//! New conversations are keyed by the digest of the canonical pair and
//! created with an atomic insert-if-absent, so concurrent first contact
//! from both sides lands on the same record. Conversations created by the
//! older query-then-create flow may still exist under random ids; those
//! are reconciled by creation time, the earliest winning and the rest
//! pointing at it through `redirect_to`.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::access::AccessGuard;
use crate::domain::conversation::{Conversation, ParticipantPair, CONVERSATIONS_COLLECTION};
use crate::domain::foundation::{ConversationId, CoreError, ParticipantId, Principal};
use crate::ports::{
    Clock, Document, DocumentStore, Filter, Query, SnapshotReceiver, WriteBatch, WriteMode,
};

use super::retry::RetryPolicy;
use super::store_query::{encode, fetch_with_fallback, subscribe_with_fallback};

pub struct ConversationRegistry {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl ConversationRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Finds or creates the conversation between `a` and `b`.
    ///
    /// `find_or_create(a, b)` and `find_or_create(b, a)` return the same
    /// conversation, also when called concurrently.
    pub async fn find_or_create(
        &self,
        a: &ParticipantId,
        b: &ParticipantId,
    ) -> Result<Conversation, CoreError> {
        let pair = ParticipantPair::new(a.clone(), b.clone())?;
        self.retry
            .run("conversation.find_or_create", || self.find_or_create_once(&pair))
            .await
    }

    /// Opens (or reopens) the caller's conversation with `peer`.
    pub async fn open_with(
        &self,
        principal: &Principal,
        peer: &ParticipantId,
    ) -> Result<Conversation, CoreError> {
        self.find_or_create(&principal.id, peer).await
    }

    /// Loads a conversation the caller takes part in, following a
    /// duplicate's redirect to the canonical record.
    pub async fn get(
        &self,
        principal: &Principal,
        id: &ConversationId,
    ) -> Result<Conversation, CoreError> {
        let mut conversation = self.load(id).await?;
        AccessGuard::ensure(AccessGuard::can_participate(principal, &conversation))?;

        if let Some(target) = conversation.redirect_to.clone() {
            debug!(from = %id, to = %target, "Following conversation redirect");
            conversation = self.load(&target).await?;
            AccessGuard::ensure(AccessGuard::can_participate(principal, &conversation))?;
        }
        Ok(conversation)
    }

    /// The caller's conversations, newest first, duplicates hidden.
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<Conversation>, CoreError> {
        let id = principal.id.as_str();
        let docs = self
            .retry
            .run("conversation.list", || async move {
                let as_first = Query::collection(CONVERSATIONS_COLLECTION)
                    .filter(Filter::eq("participant_a", id));
                let as_second = Query::collection(CONVERSATIONS_COLLECTION)
                    .filter(Filter::eq("participant_b", id));
                let mut docs = self.store.fetch(&as_first).await?;
                docs.extend(self.store.fetch(&as_second).await?);
                Ok(docs)
            })
            .await?;

        let mut conversations = decode_all(&docs)?
            .into_iter()
            .filter(|c| !c.is_redirected())
            .collect::<Vec<_>>();
        conversations.sort_by(|x, y| {
            y.created_at
                .cmp(&x.created_at)
                .then_with(|| x.id.cmp(&y.id))
        });
        Ok(conversations)
    }

    /// Ids whose messages belong to `conversation`: its own plus those of
    /// duplicates redirected to it.
    pub async fn member_ids(
        &self,
        conversation: &Conversation,
    ) -> Result<Vec<ConversationId>, CoreError> {
        let query = &Query::collection(CONVERSATIONS_COLLECTION)
            .filter(Filter::eq("redirect_to", conversation.id.as_str()));
        let docs = self
            .retry
            .run("conversation.members", || async move {
                Ok(self.store.fetch(query).await?)
            })
            .await?;

        let mut ids = vec![conversation.id.clone()];
        ids.extend(decode_all(&docs)?.into_iter().map(|c| c.id));
        Ok(ids)
    }

    /// Live feed of every record of `conversation`'s pair, duplicates and
    /// redirects included.
    pub async fn watch_pair(
        &self,
        conversation: &Conversation,
    ) -> Result<SnapshotReceiver, CoreError> {
        let pair = conversation.pair()?;
        Ok(subscribe_with_fallback(self.store.as_ref(), pair_query(&pair)).await?)
    }

    /// Collapses every conversation of `pair` onto the earliest one.
    ///
    /// Returns the canonical conversation. Messages stay where they were
    /// written; readers reach them through the redirect.
    pub async fn reconcile_duplicates(
        &self,
        pair: &ParticipantPair,
    ) -> Result<Option<Conversation>, CoreError> {
        let candidates = self.conversations_of(pair).await?;
        let Some(canonical) = earliest(&candidates).cloned() else {
            return Ok(None);
        };

        let mut batch = WriteBatch::new();
        let mut redirected = 0usize;
        for conversation in &candidates {
            let target = if conversation.id == canonical.id {
                None
            } else {
                Some(canonical.id.clone())
            };
            if conversation.redirect_to != target {
                batch = batch.put(
                    CONVERSATIONS_COLLECTION,
                    conversation.id.as_str(),
                    json!({ "redirect_to": target }),
                    WriteMode::Merge,
                );
                redirected += 1;
            }
        }

        if redirected > 0 {
            self.store.commit(batch).await?;
            warn!(
                canonical = %canonical.id,
                duplicates = redirected,
                "Reconciled duplicate conversations"
            );
        }
        Ok(Some(Conversation {
            redirect_to: None,
            ..canonical
        }))
    }

    async fn find_or_create_once(&self, pair: &ParticipantPair) -> Result<Conversation, CoreError> {
        let key = pair.key();

        // 1. Canonical record
        if let Some(doc) = self.store.get(CONVERSATIONS_COLLECTION, key.as_str()).await? {
            let conversation: Conversation = doc.decode()?;
            if !conversation.is_redirected() {
                return Ok(conversation);
            }
        }

        // 2. Records from the query-then-create era
        let existing = self.conversations_of(pair).await?;
        if existing.len() > 1 {
            if let Some(canonical) = self.reconcile_duplicates(pair).await? {
                return Ok(canonical);
            }
        } else if let Some(only) = existing.into_iter().next() {
            return Ok(only);
        }

        // 3. Atomic insert keyed by the pair
        let fresh = Conversation::open(pair, self.clock.now());
        let outcome = self
            .store
            .create_if_absent(
                CONVERSATIONS_COLLECTION,
                key.as_str(),
                encode(&fresh)?,
            )
            .await?;

        if outcome.was_created() {
            info!(
                conversation_id = %key,
                participant_a = %pair.first(),
                participant_b = %pair.second(),
                "Conversation created"
            );
        }
        Ok(outcome.into_document().decode()?)
    }

    async fn conversations_of(&self, pair: &ParticipantPair) -> Result<Vec<Conversation>, CoreError> {
        let docs = fetch_with_fallback(self.store.as_ref(), &pair_query(pair)).await?;
        decode_all(&docs)
    }

    async fn load(&self, id: &ConversationId) -> Result<Conversation, CoreError> {
        let doc = self
            .retry
            .run("conversation.get", || async move {
                Ok(self.store.get(CONVERSATIONS_COLLECTION, id.as_str()).await?)
            })
            .await?
            .ok_or_else(|| CoreError::not_found("Conversation", id))?;
        Ok(doc.decode()?)
    }
}

fn decode_all(docs: &[Document]) -> Result<Vec<Conversation>, CoreError> {
    docs.iter()
        .map(|doc| doc.decode::<Conversation>().map_err(CoreError::from))
        .collect()
}

fn pair_query(pair: &ParticipantPair) -> Query {
    Query::collection(CONVERSATIONS_COLLECTION)
        .filter(Filter::eq("participant_a", pair.first().as_str()))
        .filter(Filter::eq("participant_b", pair.second().as_str()))
}

/// Ids whose messages a reader attached through `attached` should see,
/// computed from the pair's current records. `None` if `attached` is not
/// among them.
pub(crate) fn log_members(
    attached: &ConversationId,
    records: &[Conversation],
) -> Option<Vec<ConversationId>> {
    let record = records.iter().find(|c| &c.id == attached)?;
    let canonical = record.redirect_to.as_ref().unwrap_or(&record.id);
    let mut ids: Vec<ConversationId> = records
        .iter()
        .filter(|c| &c.id == canonical || c.redirect_to.as_ref() == Some(canonical))
        .map(|c| c.id.clone())
        .collect();
    if !ids.contains(canonical) {
        ids.push(canonical.clone());
    }
    ids.sort();
    Some(ids)
}

fn earliest(conversations: &[Conversation]) -> Option<&Conversation> {
    conversations
        .iter()
        .reduce(|best, next| if next.precedes(best) { next } else { best })
}
