//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, principals, events and error types
//! that form the vocabulary of the booking and conversation core.

mod errors;
mod events;
mod ids;
mod keys;
mod principal;
mod state_machine;
mod timestamp;

pub use errors::{CoreError, DomainError, ErrorCode, ValidationError};
pub use events::{domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{BookingId, ConversationId, MessageId, NoteId, ParticipantId};
pub use keys::digest_key;
pub use principal::{AuthError, Principal, Role};
pub use state_machine::{StateMachine, TransitionError};
pub use timestamp::Timestamp;
