//! NeoCare API server.
//!
//! Loads configuration from the environment (`NEOCARE__*`, optionally via
//! `.env`), wires the in-process adapters and serves the HTTP and
//! WebSocket surface until interrupted.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use neocare::adapters::http::{router, AppState};
use neocare::adapters::{
    InMemoryDocumentStore, InMemoryEventBus, InMemoryIdentityProvider, JwtConfig,
    JwtIdentityProvider, LogNotificationChannel, ResendConfig, ResendNotificationChannel,
    SystemClock,
};
use neocare::application::{
    BookingLedger, ClientDirectory, ConversationRegistry, MessageStream, NoteService,
    NotificationDispatcher,
};
use neocare::config::{AppConfig, EmailConfig, ServerConfig};
use neocare::ports::{Clock, DocumentStore, IdentityProvider, NotificationChannel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting NeoCare"
    );

    let store: Arc<dyn DocumentStore> = match config.store.index_list() {
        Some(indexes) => {
            info!(count = indexes.len(), "Document store enforcing declared indexes");
            Arc::new(InMemoryDocumentStore::with_indexes(indexes))
        }
        None => Arc::new(InMemoryDocumentStore::new()),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let events = Arc::new(InMemoryEventBus::new());
    let retry = config.retry.policy();

    let directory = Arc::new(InMemoryIdentityProvider::new());
    let identity: Arc<dyn IdentityProvider> = Arc::new(JwtIdentityProvider::new(
        JwtConfig::new(
            config.auth.jwt_secret.clone(),
            config.auth.issuer.clone(),
            config.auth.audience.clone(),
        ),
        directory,
    ));

    let channel = notification_channel(&config.email)?;

    let bookings = Arc::new(
        BookingLedger::new(store.clone(), clock.clone(), events).with_retry(retry),
    );
    let conversations = Arc::new(
        ConversationRegistry::new(store.clone(), clock.clone()).with_retry(retry),
    );
    let messages = Arc::new(
        MessageStream::new(store.clone(), clock.clone(), conversations.clone())
            .with_retry(retry),
    );
    let clients = Arc::new(ClientDirectory::new(store.clone()).with_retry(retry));
    let notes = Arc::new(
        NoteService::new(store.clone(), clock.clone(), clients.clone()).with_retry(retry),
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(
        bookings.clone(),
        identity.clone(),
        channel,
        clock.clone(),
    ));

    let state = AppState {
        identity,
        clock,
        bookings,
        conversations,
        messages,
        clients,
        notes,
        dispatcher,
    };

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.server))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            ))),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "NeoCare listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("NeoCare stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_new(&server.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if server.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn notification_channel(
    email: &EmailConfig,
) -> Result<Arc<dyn NotificationChannel>, Box<dyn Error>> {
    if !email.enabled {
        info!("Email disabled, notifications will be logged only");
        return Ok(Arc::new(LogNotificationChannel));
    }
    let config = ResendConfig::new(email.resend_api_key.clone(), email.from_header());
    Ok(Arc::new(ResendNotificationChannel::new(config)?))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
