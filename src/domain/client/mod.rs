//! Client relationship records created by accepted bookings.

mod record;

pub use record::{ClientRecord, ClientStatus, CLIENTS_COLLECTION};
