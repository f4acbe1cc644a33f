//! Recording notification channel for tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::ports::{NotificationChannel, NotificationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message it is asked to send.
///
/// `fail_with` makes subsequent sends fail (without recording) until
/// `recover` is called.
#[derive(Debug, Default)]
pub struct RecordingNotificationChannel {
    sent: Mutex<Vec<SentNotification>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<SentNotification> {
        self.sent().into_iter().filter(|n| n.to == to).collect()
    }
}

#[async_trait]
impl NotificationChannel for RecordingNotificationChannel {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        if let Some(reason) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(NotificationError::Unavailable(reason));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentNotification {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_until_failing() {
        let channel = RecordingNotificationChannel::new();
        channel.send("a@x", "s", "b").await.unwrap();
        channel.fail_with("down");
        assert!(channel.send("a@x", "s", "b").await.is_err());
        channel.recover();
        channel.send("b@x", "s", "b").await.unwrap();

        assert_eq!(channel.sent().len(), 2);
        assert_eq!(channel.sent_to("b@x").len(), 1);
    }
}
