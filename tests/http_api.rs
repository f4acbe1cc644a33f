//! Integration tests for the HTTP surface.
//!
//! Drives the full router with in-memory adapters and checks status codes,
//! bodies and the uniform "access denied" answer for hidden resources.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use neocare::adapters::http::{router, AppState};
use neocare::adapters::{
    InMemoryDocumentStore, InMemoryEventBus, InMemoryIdentityProvider,
    RecordingNotificationChannel, SystemClock,
};
use neocare::application::{
    BookingLedger, ClientDirectory, ConversationRegistry, MessageStream, NoteService,
    NotificationDispatcher,
};
use neocare::domain::foundation::{ParticipantId, Principal};

// =============================================================================
// Test Infrastructure
// =============================================================================

const CONSULTANT: &str = "token-consultant";
const STAFF: &str = "token-staff";
const CLIENT: &str = "token-client";
const OUTSIDER: &str = "token-outsider";

fn id(s: &str) -> ParticipantId {
    ParticipantId::new(s).unwrap()
}

fn app() -> Router {
    let store = Arc::new(InMemoryDocumentStore::new());
    let clock = Arc::new(SystemClock::new());
    let identity = Arc::new(InMemoryIdentityProvider::new());
    identity.register(
        CONSULTANT,
        Principal::consultant(id("dr-ada")).with_email("ada@clinic.example"),
    );
    identity.register(STAFF, Principal::staff(id("nurse-bo"), id("dr-ada")));
    identity.register(
        CLIENT,
        Principal::client(id("mia")).with_display_name("Mia"),
    );
    identity.register(OUTSIDER, Principal::consultant(id("dr-zed")));

    let bookings = Arc::new(BookingLedger::new(
        store.clone(),
        clock.clone(),
        Arc::new(InMemoryEventBus::new()),
    ));
    let conversations = Arc::new(ConversationRegistry::new(store.clone(), clock.clone()));
    let messages = Arc::new(MessageStream::new(
        store.clone(),
        clock.clone(),
        conversations.clone(),
    ));
    let clients = Arc::new(ClientDirectory::new(store.clone()));
    let notes = Arc::new(NoteService::new(store, clock.clone(), clients.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        bookings.clone(),
        identity.clone(),
        Arc::new(RecordingNotificationChannel::new()),
        clock.clone(),
    ));

    router(AppState {
        identity,
        clock,
        bookings,
        conversations,
        messages,
        clients,
        notes,
        dispatcher,
    })
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_booking(app: &Router, days_ahead: i64) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/bookings",
        Some(CLIENT),
        Some(json!({
            "consultant_id": "dr-ada",
            "scheduled_at": (Utc::now() + ChronoDuration::days(days_ahead)).to_rfc3339(),
            "platform": "Zoom",
            "amount_cents": 12000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn health_needs_no_token() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn api_rejects_missing_and_unknown_tokens() {
    let app = app();
    let (missing, _) = call(&app, Method::GET, "/api/bookings", None, None).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);

    let (unknown, _) = call(&app, Method::GET, "/api/bookings", Some("nope"), None).await;
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Bookings
// =============================================================================

#[tokio::test]
async fn booking_flow_from_request_to_client_record() {
    let app = app();
    let booking_id = create_booking(&app, 3).await;

    let (_, count) = call(
        &app,
        Method::GET,
        "/api/bookings/pending-count",
        Some(STAFF),
        None,
    )
    .await;
    assert_eq!(count["pending"], 1);

    let (status, accepted) = call(
        &app,
        Method::POST,
        &format!("/api/bookings/{}/accept", booking_id),
        Some(CONSULTANT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["client_name"], "Mia");
    assert_eq!(accepted["amount_cents"], 12000);

    let (status, again) = call(
        &app,
        Method::POST,
        &format!("/api/bookings/{}/decline", booking_id),
        Some(CONSULTANT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["code"], "INVALID_STATE_TRANSITION");

    let (status, clients) = call(&app, Method::GET, "/api/clients", Some(STAFF), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(clients.as_array().unwrap().len(), 1);
    assert_eq!(clients[0]["id"], "mia");

    let (_, upcoming) = call(
        &app,
        Method::GET,
        "/api/bookings?filter=upcoming",
        Some(CLIENT),
        None,
    )
    .await;
    assert_eq!(upcoming.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn hidden_and_missing_bookings_look_the_same() {
    let app = app();
    let booking_id = create_booking(&app, 3).await;

    let (hidden_status, hidden) = call(
        &app,
        Method::GET,
        &format!("/api/bookings/{}", booking_id),
        Some(OUTSIDER),
        None,
    )
    .await;
    let (missing_status, missing) = call(
        &app,
        Method::GET,
        "/api/bookings/8c7f4e6a-0000-4000-8000-000000000000",
        Some(CONSULTANT),
        None,
    )
    .await;
    let (garbage_status, garbage) = call(
        &app,
        Method::GET,
        "/api/bookings/not-a-uuid",
        Some(CONSULTANT),
        None,
    )
    .await;

    assert_eq!(hidden_status, StatusCode::NOT_FOUND);
    assert_eq!(missing_status, StatusCode::NOT_FOUND);
    assert_eq!(garbage_status, StatusCode::NOT_FOUND);
    assert_eq!(hidden, missing);
    assert_eq!(missing, garbage);
    assert_eq!(hidden["error"], "access denied");
}

#[tokio::test]
async fn invalid_booking_requests_are_bad_requests() {
    let app = app();

    let (past, _) = call(
        &app,
        Method::POST,
        "/api/bookings",
        Some(CLIENT),
        Some(json!({
            "consultant_id": "dr-ada",
            "scheduled_at": (Utc::now() - ChronoDuration::days(1)).to_rfc3339()
        })),
    )
    .await;
    assert_eq!(past, StatusCode::BAD_REQUEST);

    let (filter, _) = call(
        &app,
        Method::GET,
        "/api/bookings?filter=someday",
        Some(CONSULTANT),
        None,
    )
    .await;
    assert_eq!(filter, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Conversations and notes
// =============================================================================

#[tokio::test]
async fn conversation_roundtrip_with_preview() {
    let app = app();

    let (status, opened) = call(
        &app,
        Method::POST,
        "/api/conversations",
        Some(CLIENT),
        Some(json!({ "peer_id": "dr-ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opened["peer_id"], "dr-ada");
    let conversation_id = opened["id"].as_str().unwrap().to_string();

    let (status, posted) = call(
        &app,
        Method::POST,
        &format!("/api/conversations/{}/messages", conversation_id),
        Some(CONSULTANT),
        Some(json!({ "text": "  See you Thursday  " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(posted["text"], "See you Thursday");

    let (_, listed) = call(&app, Method::GET, "/api/conversations", Some(CLIENT), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], conversation_id.as_str());
    assert_eq!(listed[0]["last_message"]["text"], "See you Thursday");

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/conversations/{}/messages", conversation_id),
        Some(OUTSIDER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (blank, _) = call(
        &app,
        Method::POST,
        &format!("/api/conversations/{}/messages", conversation_id),
        Some(CLIENT),
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(blank, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unread_count_clears_after_marking_seen() {
    let app = app();
    let (_, opened) = call(
        &app,
        Method::POST,
        "/api/conversations",
        Some(CLIENT),
        Some(json!({ "peer_id": "dr-ada" })),
    )
    .await;
    let conversation_id = opened["id"].as_str().unwrap().to_string();
    for text in ["Hello", "Are you free Friday?"] {
        call(
            &app,
            Method::POST,
            &format!("/api/conversations/{}/messages", conversation_id),
            Some(CLIENT),
            Some(json!({ "text": text })),
        )
        .await;
    }

    let (status, before) = call(
        &app,
        Method::GET,
        "/api/conversations/unread-count",
        Some(CONSULTANT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["unread"], 2);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/conversations/{}/seen", conversation_id),
        Some(OUTSIDER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, marked) = call(
        &app,
        Method::POST,
        &format!("/api/conversations/{}/seen", conversation_id),
        Some(CONSULTANT),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked["marked"], 2);

    let (_, after) = call(
        &app,
        Method::GET,
        "/api/conversations/unread-count",
        Some(CONSULTANT),
        None,
    )
    .await;
    assert_eq!(after["unread"], 0);

    let (_, own) = call(
        &app,
        Method::GET,
        "/api/conversations/unread-count",
        Some(CLIENT),
        None,
    )
    .await;
    assert_eq!(own["unread"], 0);
}

#[tokio::test]
async fn staff_draft_then_consultant_finalizes_over_http() {
    let app = app();
    let booking_id = create_booking(&app, 2).await;
    call(
        &app,
        Method::POST,
        &format!("/api/bookings/{}/accept", booking_id),
        Some(CONSULTANT),
        None,
    )
    .await;

    let (status, draft) = call(
        &app,
        Method::POST,
        "/api/clients/mia/notes",
        Some(STAFF),
        Some(json!({
            "type": "pregnancy",
            "maternal_health": { "blood_pressure": "120/80" },
            "judgement": { "assessment": "not for staff" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(draft["status"], "draft");

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/clients/mia/notes/finalize",
        Some(STAFF),
        Some(json!({ "type": "pregnancy", "assessment": "ok" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, finalized) = call(
        &app,
        Method::POST,
        "/api/clients/mia/notes/finalize",
        Some(CONSULTANT),
        Some(json!({ "type": "pregnancy", "assessment": "Healthy", "recommendations": "Rest" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(finalized["status"], "final");
    assert_eq!(finalized["id"], draft["id"]);

    let (_, notes) = call(
        &app,
        Method::GET,
        "/api/clients/mia/notes?type=pregnancy",
        Some(STAFF),
        None,
    )
    .await;
    assert_eq!(notes.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::GET, "/api/clients/mia/notes", Some(CLIENT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
