//! NoteService - consultation notes for a practice's clients.
//!
//! Consultants write final notes. Staff write intake drafts whose clinical
//! judgement is stripped before storage; the owning consultant later
//! completes the most recent draft of a type into a final note.

use std::sync::Arc;

use tracing::info;

use crate::domain::access::{AccessGuard, NoteWriteScope};
use crate::domain::client::ClientRecord;
use crate::domain::foundation::{CoreError, ParticipantId, Principal};
use crate::domain::notes::{
    ClinicalJudgement, ConsultationNote, NotePayload, NoteStatus, NoteType, NOTES_COLLECTION,
};
use crate::ports::{Clock, Direction, DocumentStore, Filter, Query, StoreError, WriteBatch, WriteMode};

use super::clients::ClientDirectory;
use super::retry::RetryPolicy;
use super::store_query::{encode, fetch_with_fallback};

pub struct NoteService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    clients: Arc<ClientDirectory>,
    retry: RetryPolicy,
}

impl NoteService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        clients: Arc<ClientDirectory>,
    ) -> Self {
        Self {
            store,
            clock,
            clients,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Writes a note about `client_id`.
    ///
    /// The owning consultant's note is final. A staff member's note is a
    /// draft without assessment or recommendations.
    pub async fn write(
        &self,
        principal: &Principal,
        client_id: &ParticipantId,
        payload: NotePayload,
    ) -> Result<ConsultationNote, CoreError> {
        // 1. Resolve the client within the caller's practice
        let record = self.client_of_practice(principal, client_id).await?;

        // 2. Scope decides final vs. stripped draft
        let scope =
            AccessGuard::note_write_scope(principal, &record).ok_or(CoreError::Forbidden)?;
        let now = self.clock.now();
        let note = match scope {
            NoteWriteScope::Full => ConsultationNote::final_note(
                record.id.clone(),
                record.consultant_id.clone(),
                payload,
                now,
            ),
            NoteWriteScope::IntakeOnly => ConsultationNote::staff_draft(
                record.id.clone(),
                record.consultant_id.clone(),
                principal.id.clone(),
                AccessGuard::strip_for(scope, payload),
                now,
            ),
        };

        // 3. Persist
        let data = encode(&note)?;
        let id = note.id.to_string();
        self.retry
            .run("note.write", || {
                let data = data.clone();
                let id = id.as_str();
                async move {
                    self.store.create_if_absent(NOTES_COLLECTION, id, data).await?;
                    Ok(())
                }
            })
            .await?;

        info!(
            note_id = %note.id,
            client_id = %note.client_id,
            note_type = %note.note_type,
            status = note.status.as_str(),
            author_role = %note.author_role,
            "Consultation note written"
        );
        Ok(note)
    }

    /// Completes the most recent staff draft of `note_type` for the client.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is the client's consultant
    /// - `NotFound` if there is no draft of that type
    /// - `InvalidState` if the draft was finalized concurrently
    pub async fn finalize_draft(
        &self,
        principal: &Principal,
        client_id: &ParticipantId,
        note_type: NoteType,
        judgement: ClinicalJudgement,
    ) -> Result<ConsultationNote, CoreError> {
        let record = self.client_of_practice(principal, client_id).await?;
        AccessGuard::ensure(record.consultant_id == principal.id && principal.is_consultant())?;

        // 1. Latest draft of this type
        let query = Query::collection(NOTES_COLLECTION)
            .filter(Filter::eq("client_id", record.id.as_str()))
            .filter(Filter::eq("consultant_id", record.consultant_id.as_str()))
            .filter(Filter::eq("note_type", note_type.as_str()))
            .filter(Filter::eq("status", NoteStatus::Draft.as_str()))
            .order_by("created_at", Direction::Descending);
        let mut note = self
            .fetch(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::not_found("ConsultationNote", note_type))?;
        AccessGuard::ensure(AccessGuard::can_finalize_draft_note(principal, &note))?;

        // 2. Complete and commit, conditional on it still being a draft
        note.finalize(&principal.id, judgement, self.clock.now())?;
        let id = note.id.to_string();
        let batch = WriteBatch::new()
            .require(NOTES_COLLECTION, id.as_str(), "status", NoteStatus::Draft.as_str())
            .put(NOTES_COLLECTION, id.as_str(), encode(&note)?, WriteMode::Replace);
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                return Err(CoreError::invalid_state("Note is already final"));
            }
            Err(err) => return Err(err.into()),
        }

        info!(note_id = %note.id, client_id = %note.client_id, "Draft note finalized");
        Ok(note)
    }

    /// The client's notes visible to the caller, newest first.
    pub async fn list(
        &self,
        principal: &Principal,
        client_id: &ParticipantId,
        note_type: Option<NoteType>,
    ) -> Result<Vec<ConsultationNote>, CoreError> {
        let record = self.client_of_practice(principal, client_id).await?;

        let mut query = Query::collection(NOTES_COLLECTION)
            .filter(Filter::eq("client_id", record.id.as_str()))
            .filter(Filter::eq("consultant_id", record.consultant_id.as_str()));
        if let Some(note_type) = note_type {
            query = query.filter(Filter::eq("note_type", note_type.as_str()));
        }
        let query = query.order_by("created_at", Direction::Descending);

        Ok(self
            .fetch(&query)
            .await?
            .into_iter()
            .filter(|note| AccessGuard::can_view_note(principal, note))
            .collect())
    }

    async fn client_of_practice(
        &self,
        principal: &Principal,
        client_id: &ParticipantId,
    ) -> Result<ClientRecord, CoreError> {
        self.clients.get(principal, client_id).await
    }

    async fn fetch(&self, query: &Query) -> Result<Vec<ConsultationNote>, CoreError> {
        let docs = self
            .retry
            .run("note.fetch", || async move {
                Ok(fetch_with_fallback(self.store.as_ref(), query).await?)
            })
            .await?;
        docs.iter()
            .map(|doc| doc.decode().map_err(CoreError::from))
            .collect()
    }
}
