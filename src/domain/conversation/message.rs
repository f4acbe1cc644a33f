//! Messages and message text validation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::domain::foundation::{
    ConversationId, MessageId, ParticipantId, Timestamp, ValidationError,
};

pub const MESSAGES_COLLECTION: &str = "messages";

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Message body, trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageText(String);

impl MessageText {
    pub fn new(text: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("text"));
        }
        let len = trimmed.chars().count();
        if len > MAX_MESSAGE_LENGTH {
            return Err(ValidationError::out_of_range(
                "text",
                1,
                MAX_MESSAGE_LENGTH as i64,
                len as i64,
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageText {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MessageText> for String {
    fn from(text: MessageText) -> Self {
        text.0
    }
}

/// An immutable chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub author_id: ParticipantId,
    pub text: MessageText,
    /// Assigned by the server clock, never by the author.
    pub created_at: Timestamp,
    /// Participants who have read the message. Starts with the author;
    /// records written before read receipts existed have none.
    #[serde(default)]
    pub seen_by: Vec<ParticipantId>,
}

impl Message {
    pub fn new(
        conversation_id: ConversationId,
        author_id: ParticipantId,
        text: MessageText,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            seen_by: vec![author_id.clone()],
            author_id,
            text,
            created_at,
        }
    }

    /// Someone else wrote it and `reader` has not marked it seen.
    pub fn is_unread_by(&self, reader: &ParticipantId) -> bool {
        &self.author_id != reader && !self.seen_by.contains(reader)
    }

    /// Records that `reader` has seen the message. Returns false if it
    /// already was.
    pub fn mark_seen_by(&mut self, reader: &ParticipantId) -> bool {
        if self.seen_by.contains(reader) {
            return false;
        }
        self.seen_by.push(reader.clone());
        true
    }

    /// Total order within a conversation: `created_at`, then id.
    pub fn log_order(&self, other: &Message) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// First `max_chars` characters, for conversation list previews.
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.text.as_str();
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => format!("{}…", &text[..cut]),
            None => text.to_string(),
        }
    }
}
