//! Client and consultation note endpoints.

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::domain::foundation::ParticipantId;
use crate::domain::notes::{NotePayload, NoteType};

use super::auth::RequireAuth;
use super::dto::{ClientResponse, FinalizeNoteRequest, NoteListParams, NoteResponse};
use super::error::ApiError;
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clients", get(list_clients))
        .route("/clients/:client_id", get(get_client))
        .route("/clients/:client_id/notes", get(list_notes).post(write_note))
        .route("/clients/:client_id/notes/finalize", post(finalize_note))
}

async fn list_clients(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let clients = state.clients.list(&principal).await?;
    let body: Vec<ClientResponse> = clients.iter().map(ClientResponse::from).collect();
    Ok(Json(body))
}

async fn get_client(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id: ParticipantId = client_id.parse()?;
    let record = state.clients.get(&principal, &client_id).await?;
    Ok(Json(ClientResponse::from(&record)))
}

/// GET /api/clients/:id/notes?type=pregnancy|prenatal|emergency
async fn list_notes(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(client_id): Path<String>,
    Query(params): Query<NoteListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id: ParticipantId = client_id.parse()?;
    let note_type = params
        .note_type
        .as_deref()
        .map(str::parse::<NoteType>)
        .transpose()?;
    let notes = state.notes.list(&principal, &client_id, note_type).await?;
    let body: Vec<NoteResponse> = notes.iter().map(NoteResponse::from).collect();
    Ok(Json(body))
}

/// POST /api/clients/:id/notes - body is the tagged note payload.
async fn write_note(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(client_id): Path<String>,
    Json(payload): Json<NotePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id: ParticipantId = client_id.parse()?;
    let note = state.notes.write(&principal, &client_id, payload).await?;
    Ok((StatusCode::CREATED, Json(NoteResponse::from(&note))))
}

/// POST /api/clients/:id/notes/finalize - complete the latest staff draft.
async fn finalize_note(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(client_id): Path<String>,
    Json(req): Json<FinalizeNoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id: ParticipantId = client_id.parse()?;
    let note = state
        .notes
        .finalize_draft(&principal, &client_id, req.note_type, req.judgement)
        .await?;
    Ok(Json(NoteResponse::from(&note)))
}
