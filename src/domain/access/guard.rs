//! Role- and ownership-based access checks.
//!
//! Every check is a total function of `(principal, resource)` and denies
//! by default. Callers turn a `false` into `CoreError::Forbidden`, which is
//! reported exactly like a missing resource.

use tracing::debug;

use crate::domain::booking::Booking;
use crate::domain::client::ClientRecord;
use crate::domain::conversation::Conversation;
use crate::domain::foundation::{CoreError, Principal};
use crate::domain::notes::{ConsultationNote, NotePayload};

use super::ownership::ConsultantOwned;

/// What a principal may write into a note for a given client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteWriteScope {
    /// Every field, including assessment and recommendations.
    Full,
    /// Intake sections only. Clinical judgement is stripped before write.
    IntakeOnly,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard;

impl AccessGuard {
    /// Owning consultant, or staff whose consultant owns the client.
    pub fn can_view_client(principal: &Principal, record: &ClientRecord) -> bool {
        record.is_visible_to_practice_of(principal)
    }

    pub fn can_write_note(principal: &Principal, record: &ClientRecord) -> bool {
        Self::note_write_scope(principal, record).is_some()
    }

    pub fn note_write_scope(principal: &Principal, record: &ClientRecord) -> Option<NoteWriteScope> {
        if record.is_owned_by(principal) {
            Some(NoteWriteScope::Full)
        } else if principal.is_staff() && record.is_visible_to_practice_of(principal) {
            Some(NoteWriteScope::IntakeOnly)
        } else {
            None
        }
    }

    /// Only the consultant who owns the client may complete a staff draft.
    pub fn can_finalize_draft_note(principal: &Principal, draft: &ConsultationNote) -> bool {
        draft.is_draft() && draft.is_owned_by(principal)
    }

    pub fn can_view_note(principal: &Principal, note: &ConsultationNote) -> bool {
        note.is_visible_to_practice_of(principal)
    }

    /// The booking's consultant, their staff, or the client who made it.
    pub fn can_view_booking(principal: &Principal, booking: &Booking) -> bool {
        booking.is_visible_to_practice_of(principal)
            || (principal.is_client() && &principal.id == booking.client_id())
    }

    /// Only the owning consultant moves a booking.
    pub fn can_decide_booking(principal: &Principal, booking: &Booking) -> bool {
        booking.is_owned_by(principal)
    }

    pub fn can_participate(principal: &Principal, conversation: &Conversation) -> bool {
        conversation.has_participant(&principal.id)
    }

    /// Applies a write scope to a submitted payload.
    pub fn strip_for(scope: NoteWriteScope, mut payload: NotePayload) -> NotePayload {
        if scope == NoteWriteScope::IntakeOnly && payload.strip_clinical_judgement() {
            debug!(
                note_type = %payload.note_type(),
                "Stripped clinical judgement from intake-only note"
            );
        }
        payload
    }

    /// Converts a check result into the generic denial.
    pub fn ensure(allowed: bool) -> Result<(), CoreError> {
        if allowed {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }
}
