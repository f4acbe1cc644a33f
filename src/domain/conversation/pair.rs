//! Canonical, order-independent participant pairs.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{digest_key, ConversationId, ParticipantId, ValidationError};

/// Two distinct participants, stored in sorted order.
///
/// `ParticipantPair::new(x, y)` and `ParticipantPair::new(y, x)` are equal,
/// and so are their keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    a: ParticipantId,
    b: ParticipantId,
}

impl ParticipantPair {
    /// # Errors
    ///
    /// - `InvalidFormat` if both ids are the same participant
    pub fn new(x: ParticipantId, y: ParticipantId) -> Result<Self, ValidationError> {
        if x == y {
            return Err(ValidationError::invalid_format(
                "participants",
                "a conversation needs two distinct participants",
            ));
        }
        let (a, b) = if x < y { (x, y) } else { (y, x) };
        Ok(Self { a, b })
    }

    /// The lexicographically smaller participant.
    pub fn first(&self) -> &ParticipantId {
        &self.a
    }

    pub fn second(&self) -> &ParticipantId {
        &self.b
    }

    pub fn contains(&self, participant: &ParticipantId) -> bool {
        &self.a == participant || &self.b == participant
    }

    /// The other side of the pair, if `participant` is in it.
    pub fn peer_of(&self, participant: &ParticipantId) -> Option<&ParticipantId> {
        if &self.a == participant {
            Some(&self.b)
        } else if &self.b == participant {
            Some(&self.a)
        } else {
            None
        }
    }

    /// Conversation id owned by this pair.
    pub fn key(&self) -> ConversationId {
        ConversationId::from_key(digest_key(&[
            "conversation",
            self.a.as_str(),
            self.b.as_str(),
        ]))
    }

    pub fn to_vec(&self) -> Vec<ParticipantId> {
        vec![self.a.clone(), self.b.clone()]
    }
}
