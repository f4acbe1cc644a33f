//! Booking domain module.
//!
//! Appointment requests and their `pending -> accepted | declined`
//! lifecycle. `completed` is a derived view over accepted bookings.
//!
//! # Events
//!
//! - `BookingCreated`
//! - `BookingAccepted`
//! - `BookingDeclined`

mod aggregate;
mod events;
mod status;

pub use aggregate::{Booking, BookingDetails, BOOKINGS_COLLECTION, MAX_PLATFORM_LENGTH};
pub use events::{BookingAccepted, BookingCreated, BookingDeclined};
pub use status::{BookingFilter, BookingStatus, BookingView};
