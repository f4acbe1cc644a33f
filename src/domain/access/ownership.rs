//! Ownership trait for consultant-owned records.
//!
//! Bookings, client records and consultation notes each belong to exactly
//! one consultant. Implementing `ConsultantOwned` gives the guard a single
//! way to ask "who owns this?".

use crate::domain::booking::Booking;
use crate::domain::client::ClientRecord;
use crate::domain::foundation::{ParticipantId, Principal};
use crate::domain::notes::ConsultationNote;

pub trait ConsultantOwned {
    /// The consultant the record belongs to.
    fn owning_consultant(&self) -> &ParticipantId;

    /// True for the owning consultant themselves.
    fn is_owned_by(&self, principal: &Principal) -> bool {
        principal.is_consultant() && &principal.id == self.owning_consultant()
    }

    /// True for the owning consultant and for staff affiliated with them.
    fn is_visible_to_practice_of(&self, principal: &Principal) -> bool {
        if principal.is_client() {
            return false;
        }
        principal.acting_consultant() == Some(self.owning_consultant())
    }
}

impl ConsultantOwned for Booking {
    fn owning_consultant(&self) -> &ParticipantId {
        self.consultant_id()
    }
}

impl ConsultantOwned for ClientRecord {
    fn owning_consultant(&self) -> &ParticipantId {
        &self.consultant_id
    }
}

impl ConsultantOwned for ConsultationNote {
    fn owning_consultant(&self) -> &ParticipantId {
        &self.consultant_id
    }
}
