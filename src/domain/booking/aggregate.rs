//! Booking aggregate.
//!
//! A booking is an appointment request from a client to one consultant.
//! Only that consultant may read or move it, and it moves at most once.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    BookingId, CoreError, EventId, ParticipantId, StateMachine, Timestamp, ValidationError,
};

use super::events::{BookingAccepted, BookingCreated, BookingDeclined};
use super::status::{BookingStatus, BookingView};

/// Collection the ledger persists bookings in.
pub const BOOKINGS_COLLECTION: &str = "bookings";

/// Maximum length of the free-text platform label.
pub const MAX_PLATFORM_LENGTH: usize = 64;

/// Optional details a client attaches to a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    /// Name shown to the consultant and in notification emails.
    pub client_name: Option<String>,

    /// Where the session happens, e.g. "Zoom" or "In person".
    pub platform: Option<String>,

    /// Quoted fee in minor currency units.
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

/// Appointment request aggregate.
///
/// # Invariants
///
/// - `client_id != consultant_id`
/// - `status` only moves `pending -> accepted | declined`
/// - `notified_at` is set at most once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    client_id: ParticipantId,
    consultant_id: ParticipantId,
    scheduled_at: Timestamp,
    status: BookingStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    amount_cents: Option<i64>,
    #[serde(default)]
    notified_at: Option<Timestamp>,
}

impl Booking {
    /// Creates a new pending booking.
    ///
    /// # Errors
    ///
    /// - `Invalid` if a participant tries to book themselves or the
    ///   platform label is too long
    pub fn request(
        id: BookingId,
        client_id: ParticipantId,
        consultant_id: ParticipantId,
        scheduled_at: Timestamp,
        details: BookingDetails,
        now: Timestamp,
    ) -> Result<(Self, BookingCreated), CoreError> {
        if client_id == consultant_id {
            return Err(ValidationError::invalid_format(
                "consultant_id",
                "a participant cannot book themselves",
            )
            .into());
        }
        if let Some(platform) = &details.platform {
            if platform.chars().count() > MAX_PLATFORM_LENGTH {
                return Err(ValidationError::out_of_range(
                    "platform",
                    0,
                    MAX_PLATFORM_LENGTH as i64,
                    platform.chars().count() as i64,
                )
                .into());
            }
        }
        if let Some(amount) = details.amount_cents {
            if amount < 0 {
                return Err(ValidationError::out_of_range("amount_cents", 0, i64::MAX, amount).into());
            }
        }

        let booking = Self {
            id,
            client_id,
            consultant_id,
            scheduled_at,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
            client_name: clean(details.client_name),
            platform: clean(details.platform),
            amount_cents: details.amount_cents,
            notified_at: None,
        };
        let event = BookingCreated {
            event_id: EventId::new(),
            booking_id: booking.id,
            client_id: booking.client_id.clone(),
            consultant_id: booking.consultant_id.clone(),
            scheduled_at: booking.scheduled_at,
            created_at: now,
        };
        Ok((booking, event))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &BookingId {
        &self.id
    }

    pub fn client_id(&self) -> &ParticipantId {
        &self.client_id
    }

    pub fn consultant_id(&self) -> &ParticipantId {
        &self.consultant_id
    }

    pub fn scheduled_at(&self) -> Timestamp {
        self.scheduled_at
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn amount_cents(&self) -> Option<i64> {
        self.amount_cents
    }

    pub fn notified_at(&self) -> Option<Timestamp> {
        self.notified_at
    }

    /// Status as a reader sees it at `now`.
    pub fn view(&self, now: Timestamp) -> BookingView {
        BookingView::derive(self.status, self.scheduled_at, now)
    }

    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    pub fn belongs_to(&self, consultant_id: &ParticipantId) -> bool {
        &self.consultant_id == consultant_id
    }

    /// # Errors
    ///
    /// - `Forbidden` if `consultant_id` is not the booking's consultant
    pub fn ensure_owner(&self, consultant_id: &ParticipantId) -> Result<(), CoreError> {
        if self.belongs_to(consultant_id) {
            Ok(())
        } else {
            Err(CoreError::Forbidden)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Accepts the booking on behalf of its consultant.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `by` does not own the booking
    /// - `InvalidState` if the booking is no longer pending
    pub fn accept(
        &mut self,
        by: &ParticipantId,
        now: Timestamp,
    ) -> Result<BookingAccepted, CoreError> {
        self.ensure_owner(by)?;
        self.status = self.status.transition_to(BookingStatus::Accepted)?;
        self.updated_at = now;

        Ok(BookingAccepted {
            event_id: EventId::new(),
            booking_id: self.id,
            client_id: self.client_id.clone(),
            consultant_id: self.consultant_id.clone(),
            scheduled_at: self.scheduled_at,
            accepted_at: now,
        })
    }

    /// Declines the booking. The record is kept for audit.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `by` does not own the booking
    /// - `InvalidState` if the booking is no longer pending
    pub fn decline(
        &mut self,
        by: &ParticipantId,
        now: Timestamp,
    ) -> Result<BookingDeclined, CoreError> {
        self.ensure_owner(by)?;
        self.status = self.status.transition_to(BookingStatus::Declined)?;
        self.updated_at = now;

        Ok(BookingDeclined {
            event_id: EventId::new(),
            booking_id: self.id,
            client_id: self.client_id.clone(),
            consultant_id: self.consultant_id.clone(),
            declined_at: now,
        })
    }

    /// Records that the consultant has been told about this booking.
    ///
    /// Returns false if it was already recorded.
    pub fn mark_notified(&mut self, at: Timestamp) -> bool {
        if self.notified_at.is_some() {
            return false;
        }
        self.notified_at = Some(at);
        true
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
