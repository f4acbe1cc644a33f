//! Application layer - services that orchestrate domain rules over ports.
//!
//! Each service takes the acting `Principal` explicitly and re-checks
//! state inside the store transaction it commits.

mod booking_ledger;
mod clients;
mod conversation_registry;
mod message_stream;
mod notes;
mod notification_dispatcher;
mod retry;
mod store_query;
mod subscription;

pub use booking_ledger::{BookingLedger, CreateBookingCommand};
pub use clients::ClientDirectory;
pub use conversation_registry::ConversationRegistry;
pub use message_stream::MessageStream;
pub use notes::NoteService;
pub use notification_dispatcher::{
    compose_body, DispatchReport, DispatchSession, NotificationDispatcher, NOTIFICATION_SUBJECT,
};
pub use retry::RetryPolicy;
pub use subscription::{Subscription, Update};
