//! Consultation notes: typed clinical payloads with a staff draft to
//! consultant final lifecycle.

mod note;
mod payload;

pub use note::{ConsultationNote, NoteStatus, NOTES_COLLECTION};
pub use payload::{
    ClinicalJudgement, EmergencyNote, FetalHealth, MaternalHealth, NotePayload, NoteType,
    Observations, PregnancyNote, PrenatalNote,
};
