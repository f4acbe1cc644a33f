//! HS256 bearer-token adapter.
//!
//! Validates tokens signed with the portal's shared secret and maps their
//! claims to a `Principal`:
//!
//! 1. Verify signature, issuer, audience and expiry
//! 2. Read `role` and, for staff, `consultant_id`
//! 3. Record the principal in the participant directory so later
//!    `lookup` calls (notification emails) can find it

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::domain::foundation::{AuthError, ParticipantId, Principal, Role};
use crate::ports::{IdentityProvider, PrincipalChanged};

use super::InMemoryIdentityProvider;

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: SecretString,
    pub issuer: String,
    pub audience: String,
}

impl JwtConfig {
    pub fn new(
        secret: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            secret: SecretString::new(secret.into()),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PortalClaims {
    sub: String,
    iss: String,
    #[serde(default)]
    aud: Audience,
    exp: i64,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    consultant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Audience can be a single string or array of strings in JWTs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl PortalClaims {
    fn into_principal(self) -> Result<Principal, AuthError> {
        let id = ParticipantId::new(self.sub).map_err(|_| AuthError::InvalidToken)?;
        let consultant_id = match self.consultant_id {
            Some(raw) => Some(ParticipantId::new(raw).map_err(|_| AuthError::InvalidToken)?),
            None => None,
        };
        Ok(Principal {
            id,
            role: self.role,
            // only staff carry an affiliation
            consultant_id: consultant_id.filter(|_| self.role == Role::Staff),
            email: self.email,
            display_name: self.name,
        })
    }
}

pub struct JwtIdentityProvider {
    config: JwtConfig,
    decoding_key: DecodingKey,
    directory: Arc<InMemoryIdentityProvider>,
}

impl JwtIdentityProvider {
    pub fn new(config: JwtConfig, directory: Arc<InMemoryIdentityProvider>) -> Self {
        let decoding_key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());
        Self {
            config,
            decoding_key,
            directory,
        }
    }

    /// Signs a token for `principal`, valid for `ttl_secs`.
    pub fn issue(&self, principal: &Principal, ttl_secs: i64) -> Result<String, AuthError> {
        let claims = PortalClaims {
            sub: principal.id.to_string(),
            iss: self.config.issuer.clone(),
            aud: Audience::Single(self.config.audience.clone()),
            exp: Utc::now().timestamp() + ttl_secs,
            role: principal.role,
            consultant_id: principal.consultant_id.as_ref().map(|c| c.to_string()),
            email: principal.email.clone(),
            name: principal.display_name.clone(),
        };
        let key = EncodingKey::from_secret(self.config.secret.expose_secret().as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key)
            .map_err(|e| AuthError::service_unavailable(format!("token signing failed: {}", e)))
    }

    fn validate_token(&self, token: &str) -> Result<PortalClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<PortalClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                use jsonwebtoken::errors::ErrorKind;
                match e.kind() {
                    ErrorKind::ExpiredSignature => {
                        tracing::debug!("Token expired");
                        AuthError::TokenExpired
                    }
                    ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience => {
                        tracing::warn!("Token issued for another party");
                        AuthError::InvalidToken
                    }
                    _ => {
                        tracing::warn!("Token validation failed: {}", e);
                        AuthError::InvalidToken
                    }
                }
            })
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let principal = self.validate_token(token)?.into_principal()?;
        self.directory.remember(principal.clone());
        Ok(principal)
    }

    async fn lookup(&self, id: &ParticipantId) -> Result<Principal, AuthError> {
        self.directory.lookup(id).await
    }

    fn changes(&self) -> broadcast::Receiver<PrincipalChanged> {
        self.directory.changes()
    }
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("issuer", &self.config.issuer)
            .field("audience", &self.config.audience)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::new(s).unwrap()
    }

    fn provider() -> JwtIdentityProvider {
        JwtIdentityProvider::new(
            JwtConfig::new("test-secret-at-least-32-bytes-long!!", "neocare", "neocare-api"),
            Arc::new(InMemoryIdentityProvider::new()),
        )
    }

    #[tokio::test]
    async fn issued_token_authenticates() {
        let provider = provider();
        let staff = Principal::staff(pid("s1"), pid("k1")).with_email("s1@example.com");
        let token = provider.issue(&staff, 300).unwrap();

        let principal = provider.authenticate(&token).await.unwrap();
        assert_eq!(principal, staff);
    }

    #[tokio::test]
    async fn authenticated_principal_can_be_looked_up() {
        let provider = provider();
        let consultant = Principal::consultant(pid("k1")).with_email("k1@example.com");
        let token = provider.issue(&consultant, 300).unwrap();
        provider.authenticate(&token).await.unwrap();

        let found = provider.lookup(&pid("k1")).await.unwrap();
        assert_eq!(found.email.as_deref(), Some("k1@example.com"));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let provider = provider();
        let token = provider.issue(&Principal::client(pid("c1")), -600).unwrap();
        assert!(matches!(
            provider.authenticate(&token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn token_from_another_secret_is_rejected() {
        let other = JwtIdentityProvider::new(
            JwtConfig::new("a-completely-different-secret-value", "neocare", "neocare-api"),
            Arc::new(InMemoryIdentityProvider::new()),
        );
        let token = other.issue(&Principal::client(pid("c1")), 300).unwrap();
        assert!(matches!(
            provider().authenticate(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let other = JwtIdentityProvider::new(
            JwtConfig::new("test-secret-at-least-32-bytes-long!!", "neocare", "someone-else"),
            Arc::new(InMemoryIdentityProvider::new()),
        );
        let token = other.issue(&Principal::client(pid("c1")), 300).unwrap();
        assert!(provider().authenticate(&token).await.is_err());
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        assert!(matches!(
            provider().authenticate("not.a.jwt").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn affiliation_is_dropped_for_non_staff() {
        let claims = PortalClaims {
            sub: "c1".into(),
            iss: "neocare".into(),
            aud: Audience::None,
            exp: 0,
            role: Role::Client,
            consultant_id: Some("k1".into()),
            email: None,
            name: None,
        };
        assert_eq!(claims.into_principal().unwrap().consultant_id, None);
    }

    #[test]
    fn debug_output_hides_secret() {
        let debug = format!("{:?}", provider());
        assert!(!debug.contains("test-secret"));
    }
}
