//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the core to external systems:
//! - `auth` - Identity providers (JWT, in-memory)
//! - `clock` - System and manual clocks
//! - `events` - Event bus implementations
//! - `http` - REST and WebSocket surface
//! - `notification` - Email and logging notification channels
//! - `store` - Document store implementations

pub mod auth;
pub mod clock;
pub mod events;
pub mod http;
pub mod notification;
pub mod store;

pub use auth::{InMemoryIdentityProvider, JwtConfig, JwtIdentityProvider};
pub use clock::{ManualClock, SystemClock};
pub use events::InMemoryEventBus;
pub use notification::{
    LogNotificationChannel, RecordingNotificationChannel, ResendConfig, ResendNotificationChannel,
};
pub use store::InMemoryDocumentStore;
