//! Access control for client records, notes, bookings and conversations.

mod guard;
mod ownership;

pub use guard::{AccessGuard, NoteWriteScope};
pub use ownership::ConsultantOwned;
