//! Booking status and the derived views used to filter bookings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, Timestamp, ValidationError};

/// Stored lifecycle status of a booking request.
///
/// `completed` is never stored. See [`BookingView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Declined,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Declined => "declined",
        }
    }
}

impl StateMachine for BookingStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        use BookingStatus::*;
        match self {
            Pending => vec![Accepted, Declined],
            Accepted | Declined => vec![],
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as seen by a reader at a given instant.
///
/// An accepted booking whose slot is already in the past reads as
/// `Completed`; otherwise it is `Upcoming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingView {
    Pending,
    Upcoming,
    Declined,
    Completed,
}

impl BookingView {
    pub fn derive(status: BookingStatus, scheduled_at: Timestamp, now: Timestamp) -> Self {
        match status {
            BookingStatus::Pending => BookingView::Pending,
            BookingStatus::Declined => BookingView::Declined,
            BookingStatus::Accepted if scheduled_at.is_before(&now) => BookingView::Completed,
            BookingStatus::Accepted => BookingView::Upcoming,
        }
    }
}

/// Filter accepted by `BookingLedger::list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingFilter {
    Pending,
    /// Accepted and not yet past. Also accepted as `accepted`.
    #[serde(alias = "accepted")]
    Upcoming,
    Declined,
    Completed,
    #[default]
    All,
}

impl BookingFilter {
    /// Stored statuses a query must fetch to evaluate this filter.
    pub fn stored_statuses(&self) -> Vec<BookingStatus> {
        match self {
            BookingFilter::Pending => vec![BookingStatus::Pending],
            BookingFilter::Upcoming | BookingFilter::Completed => vec![BookingStatus::Accepted],
            BookingFilter::Declined => vec![BookingStatus::Declined],
            BookingFilter::All => vec![
                BookingStatus::Pending,
                BookingStatus::Accepted,
                BookingStatus::Declined,
            ],
        }
    }

    pub fn admits(&self, view: BookingView) -> bool {
        match self {
            BookingFilter::All => true,
            BookingFilter::Pending => view == BookingView::Pending,
            BookingFilter::Upcoming => view == BookingView::Upcoming,
            BookingFilter::Declined => view == BookingView::Declined,
            BookingFilter::Completed => view == BookingView::Completed,
        }
    }
}

impl FromStr for BookingFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingFilter::Pending),
            "upcoming" | "accepted" => Ok(BookingFilter::Upcoming),
            "declined" => Ok(BookingFilter::Declined),
            "completed" => Ok(BookingFilter::Completed),
            "" | "all" => Ok(BookingFilter::All),
            other => Err(ValidationError::invalid_format(
                "filter",
                format!("unknown booking filter '{}'", other),
            )),
        }
    }
}
