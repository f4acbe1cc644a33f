//! Booking domain events.
//!
//! - `BookingCreated` - A client requested an appointment
//! - `BookingAccepted` - The owning consultant accepted the request
//! - `BookingDeclined` - The owning consultant declined the request

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, BookingId, EventId, ParticipantId, Timestamp};

/// Published when a client submits a booking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingCreated {
    pub event_id: EventId,
    pub booking_id: BookingId,
    pub client_id: ParticipantId,
    pub consultant_id: ParticipantId,
    pub scheduled_at: Timestamp,
    pub created_at: Timestamp,
}

domain_event!(
    BookingCreated,
    event_type = "booking.created.v1",
    aggregate_id = booking_id,
    aggregate_type = "Booking",
    occurred_at = created_at,
    event_id = event_id
);

/// Published once the accept transaction (status flip and client record
/// upsert) has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingAccepted {
    pub event_id: EventId,
    pub booking_id: BookingId,
    pub client_id: ParticipantId,
    pub consultant_id: ParticipantId,
    pub scheduled_at: Timestamp,
    pub accepted_at: Timestamp,
}

domain_event!(
    BookingAccepted,
    event_type = "booking.accepted.v1",
    aggregate_id = booking_id,
    aggregate_type = "Booking",
    occurred_at = accepted_at,
    event_id = event_id
);

/// Published when a booking is declined. The record itself is retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDeclined {
    pub event_id: EventId,
    pub booking_id: BookingId,
    pub client_id: ParticipantId,
    pub consultant_id: ParticipantId,
    pub declined_at: Timestamp,
}

domain_event!(
    BookingDeclined,
    event_type = "booking.declined.v1",
    aggregate_id = booking_id,
    aggregate_type = "Booking",
    occurred_at = declined_at,
    event_id = event_id
);
