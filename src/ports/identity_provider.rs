//! IdentityProvider port - who is calling, and in what role.
//!
//! Every core operation receives the acting `Principal` explicitly; this
//! port is only consulted at the edge (HTTP middleware, WebSocket upgrade)
//! and when one participant needs another's profile (notification email).

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::foundation::{AuthError, ParticipantId, Principal};

/// A participant's role or affiliation changed, or they were removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalChanged {
    pub id: ParticipantId,
    /// The new principal, `None` when the participant was removed.
    pub principal: Option<Principal>,
}

/// Resolves credentials and participant profiles.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken`/`TokenExpired` for bad credentials
/// - Return `AuthError::UnknownParticipant` when `lookup` finds nobody
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;

    async fn lookup(&self, id: &ParticipantId) -> Result<Principal, AuthError>;

    /// Stream of role/affiliation edits. Live sessions use it to drop
    /// access that was revoked after they attached.
    fn changes(&self) -> broadcast::Receiver<PrincipalChanged>;
}
