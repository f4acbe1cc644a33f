//! Conversation and message endpoints.

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::domain::foundation::{ConversationId, ParticipantId};

use super::auth::RequireAuth;
use super::dto::{
    ConversationResponse, MarkSeenResponse, MessageResponse, OpenConversationRequest,
    PostMessageRequest, UnreadCountResponse,
};
use super::error::ApiError;
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(open_conversation).get(list_conversations))
        .route("/conversations/unread-count", get(unread_count))
        .route("/conversations/:conversation_id/seen", post(mark_seen))
        .route(
            "/conversations/:conversation_id/messages",
            get(get_messages).post(post_message),
        )
}

/// POST /api/conversations - find or create the conversation with a peer.
async fn open_conversation(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(req): Json<OpenConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let peer: ParticipantId = req.peer_id.parse()?;
    let conversation = state.conversations.open_with(&principal, &peer).await?;
    Ok(Json(ConversationResponse::for_viewer(
        &conversation,
        &principal.id,
        None,
    )))
}

/// GET /api/conversations - the caller's conversations with previews.
async fn list_conversations(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = state.conversations.list_for(&principal).await?;
    let mut body = Vec::with_capacity(conversations.len());
    for conversation in &conversations {
        let last = state.messages.latest(&principal, &conversation.id).await?;
        body.push(ConversationResponse::for_viewer(
            conversation,
            &principal.id,
            last.as_ref(),
        ));
    }
    Ok(Json(body))
}

async fn get_messages(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id: ConversationId = conversation_id.parse()?;
    let messages = state.messages.history(&principal, &conversation_id).await?;
    let body: Vec<MessageResponse> = messages.iter().map(MessageResponse::from).collect();
    Ok(Json(body))
}

async fn post_message(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(conversation_id): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id: ConversationId = conversation_id.parse()?;
    let message = state
        .messages
        .append(&principal, &conversation_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::from(&message))))
}

/// GET /api/conversations/unread-count - dashboard counter.
async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let unread = state.messages.unread_count(&principal).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

async fn mark_seen(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(conversation_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation_id: ConversationId = conversation_id.parse()?;
    let marked = state.messages.mark_seen(&principal, &conversation_id).await?;
    Ok(Json(MarkSeenResponse { marked }))
}
