//! Consultation note entity and its draft/final lifecycle.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    CoreError, NoteId, ParticipantId, Role, StateMachine, Timestamp,
};

use super::payload::{ClinicalJudgement, NotePayload, NoteType};

pub const NOTES_COLLECTION: &str = "consultation_notes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    /// Intake written by staff, awaiting the consultant.
    Draft,
    /// Written or completed by the owning consultant.
    Final,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::Draft => "draft",
            NoteStatus::Final => "final",
        }
    }
}

impl StateMachine for NoteStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            NoteStatus::Draft => vec![NoteStatus::Final],
            NoteStatus::Final => vec![],
        }
    }
}

/// A consultation note about one client of one consultant.
///
/// `note_type` duplicates the payload tag so the store can filter on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationNote {
    pub id: NoteId,
    pub client_id: ParticipantId,
    pub consultant_id: ParticipantId,
    pub author_id: ParticipantId,
    pub author_role: Role,
    pub note_type: NoteType,
    pub status: NoteStatus,
    pub payload: NotePayload,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub finalized_by: Option<ParticipantId>,
    #[serde(default)]
    pub finalized_at: Option<Timestamp>,
}

impl ConsultationNote {
    /// Final note written directly by the consultant.
    pub fn final_note(
        client_id: ParticipantId,
        consultant_id: ParticipantId,
        payload: NotePayload,
        now: Timestamp,
    ) -> Self {
        Self {
            id: NoteId::new(),
            client_id,
            author_id: consultant_id.clone(),
            finalized_by: Some(consultant_id.clone()),
            consultant_id,
            author_role: Role::Consultant,
            note_type: payload.note_type(),
            status: NoteStatus::Final,
            payload,
            created_at: now,
            updated_at: now,
            finalized_at: Some(now),
        }
    }

    /// Draft written by a staff member. The payload must already be
    /// stripped of clinical judgement.
    pub fn staff_draft(
        client_id: ParticipantId,
        consultant_id: ParticipantId,
        author_id: ParticipantId,
        payload: NotePayload,
        now: Timestamp,
    ) -> Self {
        Self {
            id: NoteId::new(),
            client_id,
            consultant_id,
            author_id,
            author_role: Role::Staff,
            note_type: payload.note_type(),
            status: NoteStatus::Draft,
            payload,
            created_at: now,
            updated_at: now,
            finalized_by: None,
            finalized_at: None,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.status == NoteStatus::Draft
    }

    /// Completes a staff draft into a final note.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `by` is not the client's consultant
    /// - `InvalidState` if the note is already final
    pub fn finalize(
        &mut self,
        by: &ParticipantId,
        judgement: ClinicalJudgement,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if &self.consultant_id != by {
            return Err(CoreError::Forbidden);
        }
        self.status = self.status.transition_to(NoteStatus::Final)?;
        self.payload.complete_with(judgement);
        self.finalized_by = Some(by.clone());
        self.finalized_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notes::payload::PrenatalNote;

    fn participant(id: &str) -> ParticipantId {
        ParticipantId::new(id).unwrap()
    }

    fn draft() -> ConsultationNote {
        ConsultationNote::staff_draft(
            participant("client-1"),
            participant("consultant-1"),
            participant("staff-1"),
            NotePayload::Prenatal(PrenatalNote::default()),
            Timestamp::now(),
        )
    }

    #[test]
    fn staff_draft_records_author_role() {
        let note = draft();
        assert!(note.is_draft());
        assert_eq!(note.author_role, Role::Staff);
        assert_eq!(note.note_type, NoteType::Prenatal);
    }

    #[test]
    fn consultant_finalizes_draft_once() {
        let mut note = draft();
        let consultant = participant("consultant-1");
        let judgement = ClinicalJudgement {
            assessment: Some("Stable".into()),
            recommendations: None,
        };

        note.finalize(&consultant, judgement.clone(), Timestamp::now())
            .unwrap();
        assert_eq!(note.status, NoteStatus::Final);
        assert_eq!(note.payload.judgement(), &judgement);
        assert_eq!(note.finalized_by, Some(consultant.clone()));

        let again = note.finalize(&consultant, judgement, Timestamp::now());
        assert!(matches!(again, Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn other_consultant_cannot_finalize() {
        let mut note = draft();
        let result = note.finalize(
            &participant("consultant-2"),
            ClinicalJudgement::default(),
            Timestamp::now(),
        );
        assert_eq!(result.unwrap_err(), CoreError::Forbidden);
        assert!(note.is_draft());
    }
}
