//! BookingLedger - the booking state machine and its side effects.
//!
//! Every booking write goes through here. Transitions are committed as a
//! single conditional batch: the status precondition makes concurrent
//! accept/decline calls race safely, and accepting upserts the client
//! record in the same batch so no reader sees one without the other.

use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::access::AccessGuard;
use crate::domain::booking::{
    Booking, BookingDetails, BookingFilter, BookingStatus, BOOKINGS_COLLECTION,
};
use crate::domain::client::{ClientRecord, CLIENTS_COLLECTION};
use crate::domain::foundation::{
    BookingId, CoreError, EventEnvelope, ParticipantId, Principal, Timestamp,
};
use crate::ports::{
    Clock, Direction, DocumentStore, EventPublisher, Filter, Query, Snapshot, StoreError,
    WriteBatch, WriteMode,
};

use super::retry::RetryPolicy;
use super::store_query::{encode, fetch_with_fallback, subscribe_with_fallback};
use super::subscription::{Subscription, Update};

/// Request to book a consultant.
#[derive(Debug, Clone)]
pub struct CreateBookingCommand {
    pub consultant_id: ParticipantId,
    pub scheduled_at: Timestamp,
    pub details: BookingDetails,
}

pub struct BookingLedger {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    event_publisher: Arc<dyn EventPublisher>,
    retry: RetryPolicy,
}

impl BookingLedger {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            clock,
            event_publisher,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates a pending booking on behalf of the calling client.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the caller is not a client
    /// - `Invalid` for a slot in the past or a self-booking
    pub async fn create(
        &self,
        principal: &Principal,
        cmd: CreateBookingCommand,
    ) -> Result<Booking, CoreError> {
        // 1. Only clients request appointments
        AccessGuard::ensure(principal.is_client())?;

        // 2. Validate and build
        let now = self.clock.now();
        if cmd.scheduled_at.is_before(&now) {
            return Err(CoreError::invalid(
                "scheduled_at",
                "cannot book a slot in the past",
            ));
        }
        let mut details = cmd.details;
        if details.client_name.is_none() {
            details.client_name = principal.display_name.clone();
        }
        let (booking, event) = Booking::request(
            BookingId::new(),
            principal.id.clone(),
            cmd.consultant_id,
            cmd.scheduled_at,
            details,
            now,
        )?;

        // 3. Persist
        let data = encode(&booking)?;
        let id = booking.id().to_string();
        self.retry
            .run("booking.create", || {
                let data = data.clone();
                let id = id.as_str();
                async move {
                    self.store
                        .create_if_absent(BOOKINGS_COLLECTION, id, data)
                        .await?;
                    Ok(())
                }
            })
            .await?;

        info!(
            booking_id = %booking.id(),
            client_id = %booking.client_id(),
            consultant_id = %booking.consultant_id(),
            scheduled_at = %booking.scheduled_at(),
            "Booking requested"
        );

        // 4. Publish
        self.publish(EventEnvelope::from_event(&event).with_actor_id(principal.id.as_str()))
            .await;
        Ok(booking)
    }

    /// Loads a booking the caller may see.
    pub async fn get(
        &self,
        principal: &Principal,
        booking_id: &BookingId,
    ) -> Result<Booking, CoreError> {
        let booking = self.load(booking_id).await?;
        AccessGuard::ensure(AccessGuard::can_view_booking(principal, &booking))?;
        Ok(booking)
    }

    /// Accepts a pending booking and materializes the client record.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the booking does not exist
    /// - `Forbidden` if the caller is not the booking's consultant
    /// - `InvalidState` if the booking is no longer pending, including
    ///   when a concurrent call moved it first
    pub async fn accept(
        &self,
        principal: &Principal,
        booking_id: &BookingId,
    ) -> Result<Booking, CoreError> {
        let booking = self
            .retry
            .run("booking.accept", || self.accept_once(principal, booking_id))
            .await?;
        Ok(booking)
    }

    /// Declines a pending booking. The record is kept.
    ///
    /// # Errors
    ///
    /// Same as [`BookingLedger::accept`].
    pub async fn decline(
        &self,
        principal: &Principal,
        booking_id: &BookingId,
    ) -> Result<Booking, CoreError> {
        self.retry
            .run("booking.decline", || self.decline_once(principal, booking_id))
            .await
    }

    /// Bookings matching `filter`, ordered by `scheduled_at`.
    ///
    /// Consultants and their staff see the consultant's bookings; clients
    /// see their own.
    pub async fn list(
        &self,
        principal: &Principal,
        filter: BookingFilter,
    ) -> Result<Vec<Booking>, CoreError> {
        let query = &self.scoped_query(principal, filter.stored_statuses())?;
        let docs = self
            .retry
            .run("booking.list", || async move {
                Ok(fetch_with_fallback(self.store.as_ref(), query).await?)
            })
            .await?;

        let now = self.clock.now();
        let bookings = decode_bookings(Snapshot { documents: docs })?
            .into_iter()
            .filter(|b| AccessGuard::can_view_booking(principal, b))
            .filter(|b| filter.admits(b.view(now)))
            .collect();
        Ok(bookings)
    }

    /// Number of pending bookings for the caller's practice.
    pub async fn pending_count(&self, principal: &Principal) -> Result<usize, CoreError> {
        Ok(self.list(principal, BookingFilter::Pending).await?.len())
    }

    /// Live feed of the practice's pending and accepted bookings, ordered
    /// by `scheduled_at`.
    pub async fn watch<F>(&self, principal: &Principal, on_change: F) -> Result<Subscription, CoreError>
    where
        F: FnMut(Update<Booking>) + Send + 'static,
    {
        AccessGuard::ensure(!principal.is_client())?;
        let query = self.scoped_query(
            principal,
            vec![BookingStatus::Pending, BookingStatus::Accepted],
        )?;
        let snapshots = subscribe_with_fallback(self.store.as_ref(), query).await?;
        debug!(subscriber = %principal.id, "Booking feed attached");
        Ok(Subscription::spawn(snapshots, decode_bookings, on_change))
    }

    /// Records that the consultant was notified about a pending booking.
    ///
    /// Returns `false` if the booking was already claimed or is no longer
    /// pending. Only one caller ever gets `true` for a booking.
    pub async fn claim_notification(
        &self,
        booking_id: &BookingId,
        at: Timestamp,
    ) -> Result<bool, CoreError> {
        let id = booking_id.to_string();
        let batch = WriteBatch::new()
            .require(BOOKINGS_COLLECTION, id.as_str(), "status", BookingStatus::Pending.as_str())
            .require(BOOKINGS_COLLECTION, id.as_str(), "notified_at", JsonValue::Null)
            .put(
                BOOKINGS_COLLECTION,
                id.as_str(),
                json!({ "notified_at": at.as_micros() }),
                WriteMode::Merge,
            );

        match self.store.commit(batch).await {
            Ok(()) => Ok(true),
            Err(StoreError::PreconditionFailed { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn accept_once(
        &self,
        principal: &Principal,
        booking_id: &BookingId,
    ) -> Result<Booking, CoreError> {
        // 1. Load current state
        let mut booking = self.load(booking_id).await?;

        // 2. Guard and transition in memory (Forbidden / InvalidState)
        let now = self.clock.now();
        let event = booking.accept(&principal.id, now)?;

        // 3. Client record upsert + status flip, conditional on the state just read
        let record = ClientRecord::from_accepted_booking(
            booking.client_id().clone(),
            booking.consultant_id().clone(),
            booking.client_name().map(str::to_string),
            *booking.id(),
            now,
        );
        let id = booking.id().to_string();
        let batch = self
            .transition_batch(&id, booking.consultant_id(), BookingStatus::Accepted, now)
            .put(CLIENTS_COLLECTION, record.key(), encode(&record)?, WriteMode::MergeMissing);
        let batch = reorder_client_first(batch);

        // 4. Commit, reporting a lost race as InvalidState
        self.commit_transition(batch, booking_id).await?;

        info!(
            booking_id = %booking.id(),
            client_id = %booking.client_id(),
            consultant_id = %booking.consultant_id(),
            "Booking accepted"
        );

        // 5. Publish
        self.publish(EventEnvelope::from_event(&event).with_actor_id(principal.id.as_str()))
            .await;
        Ok(booking)
    }

    async fn decline_once(
        &self,
        principal: &Principal,
        booking_id: &BookingId,
    ) -> Result<Booking, CoreError> {
        let mut booking = self.load(booking_id).await?;

        let now = self.clock.now();
        let event = booking.decline(&principal.id, now)?;

        let id = booking.id().to_string();
        let batch =
            self.transition_batch(&id, booking.consultant_id(), BookingStatus::Declined, now);
        self.commit_transition(batch, booking_id).await?;

        info!(
            booking_id = %booking.id(),
            consultant_id = %booking.consultant_id(),
            "Booking declined"
        );

        self.publish(EventEnvelope::from_event(&event).with_actor_id(principal.id.as_str()))
            .await;
        Ok(booking)
    }

    fn transition_batch(
        &self,
        id: &str,
        consultant_id: &ParticipantId,
        to: BookingStatus,
        now: Timestamp,
    ) -> WriteBatch {
        WriteBatch::new()
            .require(BOOKINGS_COLLECTION, id, "status", BookingStatus::Pending.as_str())
            .require(BOOKINGS_COLLECTION, id, "consultant_id", consultant_id.as_str())
            .put(
                BOOKINGS_COLLECTION,
                id,
                json!({ "status": to.as_str(), "updated_at": now.as_micros() }),
                WriteMode::Merge,
            )
    }

    async fn commit_transition(
        &self,
        batch: WriteBatch,
        booking_id: &BookingId,
    ) -> Result<(), CoreError> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed { field, .. }) => {
                // Someone else moved the booking between our read and write
                let current = self.load(booking_id).await?;
                debug!(
                    booking_id = %booking_id,
                    field = %field,
                    status = %current.status(),
                    "Lost transition race"
                );
                if current.is_pending() {
                    Err(CoreError::transient("booking changed during transition"))
                } else {
                    Err(CoreError::invalid_state(format!(
                        "Booking is already {}",
                        current.status()
                    )))
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    fn scoped_query(
        &self,
        principal: &Principal,
        statuses: Vec<BookingStatus>,
    ) -> Result<Query, CoreError> {
        let owner = if principal.is_client() {
            Filter::eq("client_id", principal.id.as_str())
        } else {
            let consultant = principal.acting_consultant().ok_or(CoreError::Forbidden)?;
            Filter::eq("consultant_id", consultant.as_str())
        };
        let status = match statuses.as_slice() {
            [only] => Filter::eq("status", only.as_str()),
            many => Filter::in_set("status", many.iter().map(|s| s.as_str())),
        };
        Ok(Query::collection(BOOKINGS_COLLECTION)
            .filter(owner)
            .filter(status)
            .order_by("scheduled_at", Direction::Ascending))
    }

    async fn load(&self, booking_id: &BookingId) -> Result<Booking, CoreError> {
        let id = booking_id.to_string();
        let id = id.as_str();
        let doc = self
            .retry
            .run("booking.get", || async move {
                Ok(self.store.get(BOOKINGS_COLLECTION, id).await?)
            })
            .await?
            .ok_or_else(|| CoreError::not_found("Booking", booking_id))?;
        Ok(doc.decode()?)
    }

    async fn publish(&self, envelope: EventEnvelope) {
        let event_type = envelope.event_type.clone();
        if let Err(err) = self.event_publisher.publish(envelope).await {
            warn!(event_type = %event_type, error = %err, "Failed to publish booking event");
        }
    }
}

/// Puts the client record write ahead of the status flip. Stores that
/// apply a batch in order then never show `accepted` without the record.
fn reorder_client_first(mut batch: WriteBatch) -> WriteBatch {
    batch
        .writes
        .sort_by_key(|w| w.collection != CLIENTS_COLLECTION);
    batch
}

fn decode_bookings(snapshot: Snapshot) -> Result<Vec<Booking>, CoreError> {
    snapshot
        .documents
        .iter()
        .map(|doc| doc.decode::<Booking>().map_err(CoreError::from))
        .collect()
}
