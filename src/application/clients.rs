//! ClientDirectory - a practice's client list.
//!
//! Client records are written only by `BookingLedger::accept`; this service
//! reads them. Staff see their consultant's clients.

use std::sync::Arc;

use crate::domain::access::AccessGuard;
use crate::domain::client::{ClientRecord, CLIENTS_COLLECTION};
use crate::domain::foundation::{CoreError, ParticipantId, Principal};
use crate::ports::{Direction, DocumentStore, Filter, Query};

use super::retry::RetryPolicy;
use super::store_query::fetch_with_fallback;

pub struct ClientDirectory {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl ClientDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Loads one client of the caller's practice.
    ///
    /// A client of another practice and a missing client are both
    /// reported as `Forbidden`.
    pub async fn get(
        &self,
        principal: &Principal,
        client_id: &ParticipantId,
    ) -> Result<ClientRecord, CoreError> {
        let consultant_id = principal.acting_consultant().ok_or(CoreError::Forbidden)?;
        let record = self
            .find(client_id, consultant_id)
            .await?
            .ok_or(CoreError::Forbidden)?;
        AccessGuard::ensure(AccessGuard::can_view_client(principal, &record))?;
        Ok(record)
    }

    /// The practice's clients, newest first.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<ClientRecord>, CoreError> {
        let consultant_id = principal.acting_consultant().ok_or(CoreError::Forbidden)?;
        let query = &Query::collection(CLIENTS_COLLECTION)
            .filter(Filter::eq("consultant_id", consultant_id.as_str()))
            .order_by("created_at", Direction::Descending);

        let docs = self
            .retry
            .run("clients.list", || async move {
                Ok(fetch_with_fallback(self.store.as_ref(), query).await?)
            })
            .await?;

        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            let record: ClientRecord = doc.decode()?;
            if AccessGuard::can_view_client(principal, &record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Record for `(client, consultant)`, if any. No access check.
    pub(crate) async fn find(
        &self,
        client_id: &ParticipantId,
        consultant_id: &ParticipantId,
    ) -> Result<Option<ClientRecord>, CoreError> {
        let key = ClientRecord::document_key(client_id, consultant_id);
        let key = key.as_str();
        let doc = self
            .retry
            .run("clients.get", || async move {
                Ok(self.store.get(CLIENTS_COLLECTION, key).await?)
            })
            .await?;
        doc.map(|d| d.decode().map_err(CoreError::from)).transpose()
    }
}
