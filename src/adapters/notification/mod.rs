//! Notification channel adapters.
//!
//! - `resend` - Email delivery through the Resend HTTP API
//! - `log` - Writes messages to the trace log (development)
//! - `recording` - Captures messages for tests

mod log;
mod recording;
mod resend;

pub use log::LogNotificationChannel;
pub use recording::{RecordingNotificationChannel, SentNotification};
pub use resend::{ResendConfig, ResendNotificationChannel};
