//! Live WebSocket feeds.
//!
//! # Connection Flow
//! 1. Client requests the upgrade with `?access_token=`
//! 2. Access is checked by attaching the core subscription before upgrade
//! 3. Every change pushes the full ordered state as a `snapshot` frame
//! 4. A role or affiliation change for the caller sends `revoked` and
//!    closes the socket
//! 5. On disconnect the subscription is dropped, which unsubscribes it

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::application::{DispatchSession, Subscription};
use crate::domain::foundation::{ConversationId, CoreError, Principal};
use crate::ports::PrincipalChanged;

use super::auth::RequireAuth;
use super::dto::{BookingResponse, LiveFrame, MessageResponse};
use super::error::ApiError;
use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations/:conversation_id/live", get(conversation_live))
        .route("/bookings/live", get(bookings_live))
}

type Updates<T> = mpsc::UnboundedReceiver<Result<Vec<T>, CoreError>>;

/// Everything a live socket owns; dropping it detaches from the core.
struct Feed<T> {
    updates: Updates<T>,
    _subscription: Subscription,
    _dispatch: Option<DispatchSession>,
}

/// GET /api/conversations/:id/live
async fn conversation_live(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    Path(conversation_id): Path<String>,
) -> Result<Response, ApiError> {
    let conversation_id: ConversationId = conversation_id.parse()?;
    let (tx, updates) = mpsc::unbounded_channel();
    let subscription = state
        .messages
        .subscribe(&principal, &conversation_id, move |update| {
            let _ = tx.send(update.map(|messages| {
                messages.iter().map(MessageResponse::from).collect::<Vec<_>>()
            }));
        })
        .await?;

    let feed = Feed {
        updates,
        _subscription: subscription,
        _dispatch: None,
    };
    let changes = state.identity.changes();
    Ok(ws
        .on_upgrade(move |socket| run_feed(socket, state, principal, feed, changes))
        .into_response())
}

/// GET /api/bookings/live - the practice's pending and upcoming bookings.
///
/// While a consultant or staff member watches, newly pending bookings are
/// announced to the consultant.
async fn bookings_live(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
) -> Result<Response, ApiError> {
    let (tx, updates) = mpsc::unbounded_channel();
    let clock = state.clock.clone();
    let subscription = state
        .bookings
        .watch(&principal, move |update| {
            let now = clock.now();
            let _ = tx.send(update.map(|bookings| {
                bookings
                    .iter()
                    .map(|b| BookingResponse::from_booking(b, now))
                    .collect::<Vec<_>>()
            }));
        })
        .await?;
    let dispatch = state.dispatcher.attach(&principal).await?;

    let feed = Feed {
        updates,
        _subscription: subscription,
        _dispatch: Some(dispatch),
    };
    let changes = state.identity.changes();
    Ok(ws
        .on_upgrade(move |socket| run_feed(socket, state, principal, feed, changes))
        .into_response())
}

async fn run_feed<T: Serialize + Send + 'static>(
    socket: WebSocket,
    state: AppState,
    principal: Principal,
    mut feed: Feed<T>,
    mut changes: broadcast::Receiver<PrincipalChanged>,
) {
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(participant_id = %principal.id, "Live feed connected");

    loop {
        tokio::select! {
            update = feed.updates.recv() => {
                let frame = match update {
                    Some(Ok(items)) => LiveFrame::Snapshot { items },
                    Some(Err(err)) => LiveFrame::Error {
                        code: err.code().to_string(),
                        message: err.to_string(),
                    },
                    None => break,
                };
                let last = matches!(frame, LiveFrame::Error { .. });
                if !send_frame(&mut sender, &frame).await || last {
                    break;
                }
            }
            change = changes.recv() => {
                let revoked = match change {
                    Ok(change) => change.id == principal.id,
                    // missed some changes: compare with the current profile
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        !matches!(state.identity.lookup(&principal.id).await, Ok(p) if p == principal)
                    }
                    Err(broadcast::error::RecvError::Closed) => true,
                };
                if revoked {
                    tracing::info!(participant_id = %principal.id, "Live feed revoked");
                    send_frame(&mut sender, &LiveFrame::<T>::Revoked).await;
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.send(WsMessage::Close(None)).await;
    tracing::info!(participant_id = %principal.id, "Live feed closed");
}

/// Returns false once the socket is gone.
async fn send_frame<S, T>(sender: &mut S, frame: &LiveFrame<T>) -> bool
where
    S: SinkExt<WsMessage> + Unpin,
    T: Serialize,
{
    match serde_json::to_string(frame) {
        Ok(text) => sender.send(WsMessage::Text(text)).await.is_ok(),
        Err(err) => {
            tracing::error!("Could not encode live frame: {}", err);
            false
        }
    }
}
