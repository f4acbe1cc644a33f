//! Client record: the relationship between a client and one consultant.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{digest_key, BookingId, ParticipantId, Timestamp};

/// Collection the ledger upserts client records into.
pub const CLIENTS_COLLECTION: &str = "clients";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

/// A client as seen by their consultant's practice.
///
/// One record exists per (client, consultant) pair. It is created by the
/// first accepted booking and merged into, never replaced, afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// The client's participant id.
    pub id: ParticipantId,
    pub consultant_id: ParticipantId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub status: ClientStatus,
    pub created_at: Timestamp,
    #[serde(default)]
    pub first_booking_id: Option<BookingId>,
}

impl ClientRecord {
    /// Record materialized when `booking_id` is accepted.
    pub fn from_accepted_booking(
        client_id: ParticipantId,
        consultant_id: ParticipantId,
        display_name: Option<String>,
        booking_id: BookingId,
        now: Timestamp,
    ) -> Self {
        Self {
            id: client_id,
            consultant_id,
            display_name,
            status: ClientStatus::Active,
            created_at: now,
            first_booking_id: Some(booking_id),
        }
    }

    /// Store key for this record.
    pub fn key(&self) -> String {
        Self::document_key(&self.id, &self.consultant_id)
    }

    /// Store key of the record for a (client, consultant) pair.
    pub fn document_key(client_id: &ParticipantId, consultant_id: &ParticipantId) -> String {
        digest_key(&["client", consultant_id.as_str(), client_id.as_str()])
    }

    pub fn display_name_or_id(&self) -> &str {
        self.display_name.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str) -> ParticipantId {
        ParticipantId::new(id).unwrap()
    }

    #[test]
    fn key_is_per_pair() {
        let client = participant("c1");
        let k1 = participant("k1");
        let k2 = participant("k2");

        assert_eq!(
            ClientRecord::document_key(&client, &k1),
            ClientRecord::document_key(&client, &k1)
        );
        assert_ne!(
            ClientRecord::document_key(&client, &k1),
            ClientRecord::document_key(&client, &k2)
        );
    }

    #[test]
    fn missing_optional_fields_deserialize_to_defaults() {
        let value = serde_json::json!({
            "id": "c1",
            "consultant_id": "k1",
            "created_at": 1_700_000_000_000_000i64,
        });
        let record: ClientRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record.status, ClientStatus::Active);
        assert_eq!(record.display_name_or_id(), "c1");
    }
}
