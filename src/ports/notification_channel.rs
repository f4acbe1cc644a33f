//! NotificationChannel port - outbound email or similar.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Notification rejected: {0}")]
    Rejected(String),

    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),
}

/// Sends a message to one address.
///
/// Delivery is best effort. Callers log failures and carry on; a failed
/// send must never fail the operation that triggered it.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}
