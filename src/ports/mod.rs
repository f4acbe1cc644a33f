//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! - `DocumentStore` - Hosted document database with live queries
//! - `IdentityProvider` - Authentication and participant profiles
//! - `NotificationChannel` - Best-effort outbound notifications
//! - `EventPublisher` - Domain event publication
//! - `Clock` - Server-assigned time

mod clock;
mod document_store;
mod event_publisher;
mod identity_provider;
mod notification_channel;

pub use clock::Clock;
pub use document_store::{
    compare_json, CreateOutcome, Direction, Document, DocumentStore, Filter, OrderBy,
    Precondition, Query, Snapshot, SnapshotReceiver, StoreError, Write, WriteBatch, WriteMode,
};
pub use event_publisher::EventPublisher;
pub use identity_provider::{IdentityProvider, PrincipalChanged};
pub use notification_channel::{NotificationChannel, NotificationError};
