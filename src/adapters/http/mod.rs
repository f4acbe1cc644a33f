//! HTTP adapter - REST endpoints and live WebSocket feeds.
//!
//! Every route except `/health` expects a bearer token; the middleware
//! resolves it to a `Principal` that handlers pass to the core.

mod auth;
mod bookings;
mod clients;
mod conversations;
mod dto;
mod error;
mod live;

use std::sync::Arc;

use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::application::{
    BookingLedger, ClientDirectory, ConversationRegistry, MessageStream, NoteService,
    NotificationDispatcher,
};
use crate::ports::{Clock, IdentityProvider};

pub use auth::{auth_middleware, AuthRejection, RequireAuth};
pub use dto::LiveFrame;
pub use error::{ApiError, ErrorResponse};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub clock: Arc<dyn Clock>,
    pub bookings: Arc<BookingLedger>,
    pub conversations: Arc<ConversationRegistry>,
    pub messages: Arc<MessageStream>,
    pub clients: Arc<ClientDirectory>,
    pub notes: Arc<NoteService>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

/// Builds the complete router.
///
/// # Routes
///
/// - `GET /health`
/// - `POST|GET /api/bookings`, `GET /api/bookings/pending-count`,
///   `GET /api/bookings/:id`, `POST /api/bookings/:id/accept|decline`,
///   `GET /api/bookings/live` (WebSocket)
/// - `POST|GET /api/conversations`, `GET|POST /api/conversations/:id/messages`,
///   `GET /api/conversations/:id/live` (WebSocket)
/// - `GET /api/clients`, `GET /api/clients/:id`,
///   `GET|POST /api/clients/:id/notes`, `POST /api/clients/:id/notes/finalize`
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(bookings::routes())
        .merge(conversations::routes())
        .merge(clients::routes())
        .merge(live::routes());

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(middleware::from_fn_with_state(
            state.identity.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
