//! Two-party conversations and their message log.

mod conversation;
mod message;
mod pair;

pub use conversation::{Conversation, CONVERSATIONS_COLLECTION};
pub use message::{Message, MessageText, MAX_MESSAGE_LENGTH, MESSAGES_COLLECTION};
pub use pair::ParticipantPair;
