//! Conversation record shared by exactly two participants.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConversationId, CoreError, ParticipantId, Timestamp};

use super::pair::ParticipantPair;

pub const CONVERSATIONS_COLLECTION: &str = "conversations";

/// A conversation between one unordered pair of participants.
///
/// `participant_a`/`participant_b` hold the sorted pair so the store can
/// look a pair up with two equality filters. A conversation that lost
/// duplicate reconciliation carries `redirect_to` pointing at the
/// canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participant_a: ParticipantId,
    pub participant_b: ParticipantId,
    pub created_at: Timestamp,
    #[serde(default)]
    pub redirect_to: Option<ConversationId>,
}

impl Conversation {
    /// New conversation keyed by the pair's canonical id.
    pub fn open(pair: &ParticipantPair, now: Timestamp) -> Self {
        Self {
            id: pair.key(),
            participant_a: pair.first().clone(),
            participant_b: pair.second().clone(),
            created_at: now,
            redirect_to: None,
        }
    }

    /// The participant pair, re-validated from stored fields.
    pub fn pair(&self) -> Result<ParticipantPair, CoreError> {
        Ok(ParticipantPair::new(
            self.participant_a.clone(),
            self.participant_b.clone(),
        )?)
    }

    pub fn has_participant(&self, participant: &ParticipantId) -> bool {
        &self.participant_a == participant || &self.participant_b == participant
    }

    pub fn peer_of(&self, participant: &ParticipantId) -> Option<&ParticipantId> {
        if &self.participant_a == participant {
            Some(&self.participant_b)
        } else if &self.participant_b == participant {
            Some(&self.participant_a)
        } else {
            None
        }
    }

    pub fn is_redirected(&self) -> bool {
        self.redirect_to.is_some()
    }

    /// Ordering used to pick the canonical conversation among duplicates:
    /// earliest `created_at`, then smallest id.
    pub fn precedes(&self, other: &Conversation) -> bool {
        (self.created_at, &self.id) < (other.created_at, &other.id)
    }
}
