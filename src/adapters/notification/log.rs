//! Notification channel that only logs.

use async_trait::async_trait;
use tracing::info;

use crate::ports::{NotificationChannel, NotificationError};

/// Used when no email provider is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        info!(to = %to, subject = %subject, lines = body.lines().count(), "Notification (not delivered)");
        Ok(())
    }
}
