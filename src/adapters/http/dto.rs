//! Request and response bodies.
//!
//! Times are RFC 3339 strings on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::booking::{Booking, BookingDetails, BookingStatus, BookingView};
use crate::domain::client::{ClientRecord, ClientStatus};
use crate::domain::conversation::{Conversation, Message};
use crate::domain::foundation::{ParticipantId, Timestamp};
use crate::domain::notes::{ClinicalJudgement, ConsultationNote, NotePayload, NoteStatus, NoteType};

fn rfc3339(ts: Timestamp) -> String {
    ts.as_datetime().to_rfc3339()
}

// ─────────────────────────────────────────────────────────────────────────────
// Bookings
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub consultant_id: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
}

impl CreateBookingRequest {
    pub fn details(&self) -> BookingDetails {
        BookingDetails {
            client_name: self.client_name.clone(),
            platform: self.platform.clone(),
            amount_cents: self.amount_cents,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingListParams {
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub id: String,
    pub client_id: String,
    pub consultant_id: String,
    pub scheduled_at: String,
    pub status: BookingStatus,
    /// Status as displayed now, including `completed`.
    pub view: BookingView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    pub created_at: String,
}

impl BookingResponse {
    pub fn from_booking(booking: &Booking, now: Timestamp) -> Self {
        Self {
            id: booking.id().to_string(),
            client_id: booking.client_id().to_string(),
            consultant_id: booking.consultant_id().to_string(),
            scheduled_at: rfc3339(booking.scheduled_at()),
            status: booking.status(),
            view: booking.view(now),
            client_name: booking.client_name().map(str::to_string),
            platform: booking.platform().map(str::to_string),
            amount_cents: booking.amount_cents(),
            created_at: rfc3339(booking.created_at()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingCountResponse {
    pub pending: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub peer_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: String,
    pub peer_id: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageResponse>,
}

impl ConversationResponse {
    pub fn for_viewer(
        conversation: &Conversation,
        viewer: &ParticipantId,
        last_message: Option<&Message>,
    ) -> Self {
        Self {
            id: conversation.id.to_string(),
            peer_id: conversation
                .peer_of(viewer)
                .map(|p| p.to_string())
                .unwrap_or_default(),
            created_at: rfc3339(conversation.created_at),
            last_message: last_message.map(MessageResponse::from),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub conversation_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: String,
    pub seen_by: Vec<String>,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            conversation_id: message.conversation_id.to_string(),
            author_id: message.author_id.to_string(),
            text: message.text.as_str().to_string(),
            created_at: rfc3339(message.created_at),
            seen_by: message.seen_by.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: usize,
}

#[derive(Debug, Serialize)]
pub struct MarkSeenResponse {
    pub marked: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Clients and notes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub id: String,
    pub consultant_id: String,
    pub display_name: String,
    pub status: ClientStatus,
    pub created_at: String,
}

impl From<&ClientRecord> for ClientResponse {
    fn from(record: &ClientRecord) -> Self {
        Self {
            id: record.id.to_string(),
            consultant_id: record.consultant_id.to_string(),
            display_name: record.display_name_or_id().to_string(),
            status: record.status,
            created_at: rfc3339(record.created_at),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NoteListParams {
    #[serde(rename = "type")]
    pub note_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeNoteRequest {
    #[serde(rename = "type")]
    pub note_type: NoteType,
    #[serde(flatten)]
    pub judgement: ClinicalJudgement,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: String,
    pub client_id: String,
    pub author_id: String,
    pub status: NoteStatus,
    pub payload: NotePayload,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<String>,
}

impl From<&ConsultationNote> for NoteResponse {
    fn from(note: &ConsultationNote) -> Self {
        Self {
            id: note.id.to_string(),
            client_id: note.client_id.to_string(),
            author_id: note.author_id.to_string(),
            status: note.status,
            payload: note.payload.clone(),
            created_at: rfc3339(note.created_at),
            finalized_at: note.finalized_at.map(rfc3339),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Live feeds
// ─────────────────────────────────────────────────────────────────────────────

/// Frame pushed over a live WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveFrame<T> {
    /// Full ordered state after a change.
    Snapshot { items: Vec<T> },
    /// The feed ended because of an error.
    Error { code: String, message: String },
    /// The caller's access changed; the feed is closed.
    Revoked,
}
