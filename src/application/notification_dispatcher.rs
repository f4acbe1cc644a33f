//! NotificationDispatcher - tells a consultant about new pending bookings.
//!
//! A booking is announced at most once. Within a process this is held by
//! an in-memory set; across processes and restarts by the booking's
//! `notified_at` field, which is claimed through the ledger with a
//! conditional write before anything is sent. Bookings that become
//! pending together are announced in one message. Channel failures are
//! logged and never propagate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::booking::Booking;
use crate::domain::foundation::{BookingId, CoreError, ParticipantId, Principal};
use crate::ports::{Clock, IdentityProvider, NotificationChannel};

use super::booking_ledger::BookingLedger;
use super::subscription::Subscription;

pub const NOTIFICATION_SUBJECT: &str = "Pending Booking Notification from NeoCare";

/// Result of one dispatch round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub consultant_id: ParticipantId,
    /// Bookings listed in the message, in schedule order.
    pub booking_ids: Vec<BookingId>,
    /// False when the channel failed or no address was known.
    pub delivered: bool,
}

pub struct NotificationDispatcher {
    ledger: Arc<BookingLedger>,
    identity: Arc<dyn IdentityProvider>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    notified: Mutex<HashSet<BookingId>>,
    batch_window: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        ledger: Arc<BookingLedger>,
        identity: Arc<dyn IdentityProvider>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ledger,
            identity,
            channel,
            clock,
            notified: Mutex::new(HashSet::new()),
            batch_window: Duration::from_millis(250),
        }
    }

    /// How long a live session waits for more changes before dispatching.
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Single-booking entry point.
    pub async fn on_booking_became_pending(&self, booking: &Booking) -> Option<DispatchReport> {
        self.on_snapshot(booking.consultant_id(), std::slice::from_ref(booking))
            .await
    }

    /// Handles one snapshot of a consultant's booking feed.
    ///
    /// Announces every pending booking in it that has not been announced
    /// before, in one message. Returns `None` when there was nothing new.
    pub async fn on_snapshot(
        &self,
        consultant_id: &ParticipantId,
        bookings: &[Booking],
    ) -> Option<DispatchReport> {
        // 1. New to this session, pending, owned, never claimed elsewhere
        let fresh: Vec<&Booking> = {
            let mut notified = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
            bookings
                .iter()
                .filter(|b| b.is_pending() && b.belongs_to(consultant_id))
                .filter(|b| b.notified_at().is_none())
                .filter(|b| notified.insert(*b.id()))
                .collect()
        };
        if fresh.is_empty() {
            return None;
        }

        // 2. Durable claim; the losers were announced by someone else
        let now = self.clock.now();
        let mut claimed = Vec::with_capacity(fresh.len());
        for booking in fresh {
            match self.ledger.claim_notification(booking.id(), now).await {
                Ok(true) => claimed.push(booking),
                Ok(false) => debug!(booking_id = %booking.id(), "Notification already claimed"),
                Err(err) => {
                    warn!(booking_id = %booking.id(), error = %err, "Could not claim notification");
                    self.forget(booking.id());
                }
            }
        }
        if claimed.is_empty() {
            return None;
        }
        claimed.sort_by_key(|b| (b.scheduled_at(), *b.id()));

        // 3. Address and send, best effort
        let booking_ids: Vec<BookingId> = claimed.iter().map(|b| *b.id()).collect();
        let delivered = self.deliver(consultant_id, &claimed).await;

        Some(DispatchReport {
            consultant_id: consultant_id.clone(),
            booking_ids,
            delivered,
        })
    }

    /// Watches the principal's booking feed and dispatches on changes
    /// until the returned session is stopped or dropped.
    pub async fn attach(
        self: &Arc<Self>,
        principal: &Principal,
    ) -> Result<DispatchSession, CoreError> {
        let consultant_id = principal
            .acting_consultant()
            .cloned()
            .ok_or(CoreError::Forbidden)?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Booking>>();
        let subscription = self
            .ledger
            .watch(principal, move |update| match update {
                Ok(bookings) => {
                    let _ = tx.send(bookings);
                }
                Err(err) => warn!(error = %err, "Booking feed ended"),
            })
            .await?;

        let dispatcher = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(mut latest) = rx.recv().await {
                // coalesce a burst of changes into one dispatch
                tokio::time::sleep(dispatcher.batch_window).await;
                while let Ok(newer) = rx.try_recv() {
                    latest = newer;
                }
                dispatcher.on_snapshot(&consultant_id, &latest).await;
            }
        });

        info!(subscriber = %principal.id, "Notification dispatcher attached");
        Ok(DispatchSession { subscription, task })
    }

    fn forget(&self, booking_id: &BookingId) {
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(booking_id);
    }

    async fn deliver(&self, consultant_id: &ParticipantId, bookings: &[&Booking]) -> bool {
        let consultant = match self.identity.lookup(consultant_id).await {
            Ok(principal) => principal,
            Err(err) => {
                warn!(consultant_id = %consultant_id, error = %err, "Consultant lookup failed");
                return false;
            }
        };
        let Some(email) = consultant.email.as_deref() else {
            warn!(consultant_id = %consultant_id, "Consultant has no email address");
            return false;
        };

        let body = compose_body(consultant.display_name_or_fallback(), bookings);
        match self.channel.send(email, NOTIFICATION_SUBJECT, &body).await {
            Ok(()) => {
                info!(
                    consultant_id = %consultant_id,
                    bookings = bookings.len(),
                    "Pending booking notification sent"
                );
                true
            }
            Err(err) => {
                warn!(consultant_id = %consultant_id, error = %err, "Pending booking notification failed");
                false
            }
        }
    }
}

/// Live dispatch for one consultant feed.
pub struct DispatchSession {
    subscription: Subscription,
    task: JoinHandle<()>,
}

impl DispatchSession {
    /// Idempotent.
    pub fn stop(&self) {
        self.subscription.unsubscribe();
        self.task.abort();
    }
}

impl Drop for DispatchSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Message body listing the bookings, one numbered line each.
pub fn compose_body(name: &str, bookings: &[&Booking]) -> String {
    let mut body = format!(
        "Hello, {},\n\nYou have pending booking(s) scheduled with NeoCare:\n\n",
        name
    );
    for (index, booking) in bookings.iter().enumerate() {
        let at = booking.scheduled_at();
        body.push_str(&format!(
            "{}. {} on {} at {} ({})\n",
            index + 1,
            booking.client_name().unwrap_or(booking.client_id().as_str()),
            at.as_datetime().format("%Y-%m-%d"),
            at.as_datetime().format("%H:%M"),
            booking.platform().unwrap_or("unspecified"),
        ));
    }
    body.push_str("\nPlease follow up on your pending bookings;");
    body
}
