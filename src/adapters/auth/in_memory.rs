//! In-memory participant directory.
//!
//! Serves as the `IdentityProvider` in tests and as the profile store
//! behind the JWT adapter. Tokens map to participant ids; participants
//! map to their current `Principal`. Edits are broadcast to live sessions.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::foundation::{AuthError, ParticipantId, Principal};
use crate::ports::{IdentityProvider, PrincipalChanged};

const CHANGE_BUFFER: usize = 64;

pub struct InMemoryIdentityProvider {
    tokens: RwLock<HashMap<String, ParticipantId>>,
    participants: RwLock<HashMap<ParticipantId, Principal>>,
    force_error: RwLock<Option<AuthError>>,
    changes: broadcast::Sender<PrincipalChanged>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tokens: RwLock::new(HashMap::new()),
            participants: RwLock::new(HashMap::new()),
            force_error: RwLock::new(None),
            changes,
        }
    }

    /// Registers a participant reachable by `token`.
    pub fn register(&self, token: impl Into<String>, principal: Principal) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), principal.id.clone());
        self.remember(principal);
    }

    /// Stores the participant's profile, announcing it if it changed.
    pub fn remember(&self, principal: Principal) {
        let previous = self
            .participants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(principal.id.clone(), principal.clone());
        if previous.is_some_and(|p| p != principal) {
            self.announce(principal.id.clone(), Some(principal));
        }
    }

    /// Changes a participant's role or affiliation.
    pub fn update_principal(&self, principal: Principal) {
        self.remember(principal);
    }

    /// Removes a participant and every token pointing at them.
    pub fn remove(&self, id: &ParticipantId) {
        self.participants
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, owner| owner != id);
        self.announce(id.clone(), None);
    }

    /// Every call fails with `error` until cleared.
    pub fn fail_with(&self, error: AuthError) {
        *self.force_error.write().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn clear_error(&self) {
        *self.force_error.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn participant_count(&self) -> usize {
        self.participants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn forced_error(&self) -> Option<AuthError> {
        self.force_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn announce(&self, id: ParticipantId, principal: Option<Principal>) {
        // no receivers is fine
        let _ = self.changes.send(PrincipalChanged { id, principal });
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }
        let id = self
            .tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)?;
        self.lookup(&id).await
    }

    async fn lookup(&self, id: &ParticipantId) -> Result<Principal, AuthError> {
        if let Some(error) = self.forced_error() {
            return Err(error);
        }
        self.participants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or(AuthError::UnknownParticipant)
    }

    fn changes(&self) -> broadcast::Receiver<PrincipalChanged> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    #[tokio::test]
    async fn authenticates_registered_tokens() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("t1", Principal::consultant(pid("k1")));

        let principal = provider.authenticate("t1").await.unwrap();
        assert_eq!(principal.id, pid("k1"));
        assert!(matches!(
            provider.authenticate("nope").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn lookup_of_unknown_participant_fails() {
        let provider = InMemoryIdentityProvider::new();
        assert!(matches!(
            provider.lookup(&pid("ghost")).await,
            Err(AuthError::UnknownParticipant)
        ));
    }

    #[tokio::test]
    async fn role_change_is_broadcast() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("t1", Principal::staff(pid("s1"), pid("k1")));
        let mut changes = provider.changes();

        provider.update_principal(Principal::client(pid("s1")));

        let change = changes.recv().await.unwrap();
        assert_eq!(change.id, pid("s1"));
        assert!(change.principal.unwrap().is_client());
    }

    #[tokio::test]
    async fn unchanged_profile_is_not_broadcast() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("t1", Principal::consultant(pid("k1")));
        let mut changes = provider.changes();

        provider.remember(Principal::consultant(pid("k1")));
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn removal_revokes_tokens() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("t1", Principal::client(pid("c1")));
        let mut changes = provider.changes();

        provider.remove(&pid("c1"));

        assert!(provider.authenticate("t1").await.is_err());
        assert_eq!(changes.recv().await.unwrap().principal, None);
    }

    #[tokio::test]
    async fn forced_error_applies_until_cleared() {
        let provider = InMemoryIdentityProvider::new();
        provider.register("t1", Principal::client(pid("c1")));
        provider.fail_with(AuthError::service_unavailable("down"));
        assert!(provider.authenticate("t1").await.is_err());

        provider.clear_error();
        assert!(provider.authenticate("t1").await.is_ok());
    }
}
