//! Booking endpoints.

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::application::CreateBookingCommand;
use crate::domain::booking::BookingFilter;
use crate::domain::foundation::{BookingId, CoreError, ParticipantId, Timestamp};

use super::auth::RequireAuth;
use super::dto::{BookingListParams, BookingResponse, CreateBookingRequest, PendingCountResponse};
use super::error::ApiError;
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/pending-count", get(pending_count))
        .route("/bookings/:booking_id", get(get_booking))
        .route("/bookings/:booking_id/accept", post(accept_booking))
        .route("/bookings/:booking_id/decline", post(decline_booking))
}

/// POST /api/bookings - a client requests an appointment.
async fn create_booking(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = CreateBookingCommand {
        consultant_id: req.consultant_id.parse::<ParticipantId>()?,
        scheduled_at: Timestamp::from_datetime(req.scheduled_at),
        details: req.details(),
    };
    let booking = state.bookings.create(&principal, cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse::from_booking(&booking, state.clock.now())),
    ))
}

/// GET /api/bookings?filter=pending|upcoming|accepted|declined|completed|all
async fn list_bookings(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Query(params): Query<BookingListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = match params.filter.as_deref() {
        Some(raw) => raw.parse::<BookingFilter>()?,
        None => BookingFilter::default(),
    };
    let bookings = state.bookings.list(&principal, filter).await?;
    let now = state.clock.now();
    let body: Vec<BookingResponse> = bookings
        .iter()
        .map(|b| BookingResponse::from_booking(b, now))
        .collect();
    Ok(Json(body))
}

async fn pending_count(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let pending = state.bookings.pending_count(&principal).await?;
    Ok(Json(PendingCountResponse { pending }))
}

async fn get_booking(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id = parse_booking_id(&booking_id)?;
    let booking = state.bookings.get(&principal, &booking_id).await?;
    Ok(Json(BookingResponse::from_booking(&booking, state.clock.now())))
}

/// POST /api/bookings/:id/accept
async fn accept_booking(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id = parse_booking_id(&booking_id)?;
    let booking = state.bookings.accept(&principal, &booking_id).await?;
    Ok(Json(BookingResponse::from_booking(&booking, state.clock.now())))
}

/// POST /api/bookings/:id/decline
async fn decline_booking(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(booking_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id = parse_booking_id(&booking_id)?;
    let booking = state.bookings.decline(&principal, &booking_id).await?;
    Ok(Json(BookingResponse::from_booking(&booking, state.clock.now())))
}

/// A malformed id cannot name any booking.
fn parse_booking_id(raw: &str) -> Result<BookingId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Core(CoreError::not_found("Booking", raw)))
}
