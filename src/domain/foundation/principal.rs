//! Authenticated principals.
//!
//! A `Principal` is what the identity provider hands the core after
//! authenticating a caller. Every core operation takes the acting principal
//! as an argument, so access decisions are plain functions of
//! `(principal, resource)`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::ParticipantId;

/// Role a participant plays in the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Consultant,
    Staff,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consultant => "consultant",
            Role::Staff => "staff",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated actor with its role and affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: ParticipantId,
    pub role: Role,

    /// For staff: the consultant whose clients they work with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<ParticipantId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Principal {
    pub fn consultant(id: ParticipantId) -> Self {
        Self {
            id,
            role: Role::Consultant,
            consultant_id: None,
            email: None,
            display_name: None,
        }
    }

    pub fn staff(id: ParticipantId, consultant_id: ParticipantId) -> Self {
        Self {
            id,
            role: Role::Staff,
            consultant_id: Some(consultant_id),
            email: None,
            display_name: None,
        }
    }

    pub fn client(id: ParticipantId) -> Self {
        Self {
            id,
            role: Role::Client,
            consultant_id: None,
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn is_consultant(&self) -> bool {
        self.role == Role::Consultant
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    pub fn is_client(&self) -> bool {
        self.role == Role::Client
    }

    /// The consultant whose client list this principal works on.
    ///
    /// Consultants act for themselves, staff for their consultant, and
    /// clients (or staff without an affiliation) for nobody.
    pub fn acting_consultant(&self) -> Option<&ParticipantId> {
        match self.role {
            Role::Consultant => Some(&self.id),
            Role::Staff => self.consultant_id.as_ref(),
            Role::Client => None,
        }
    }

    /// Display name, falling back to email and then the raw id.
    pub fn display_name_or_fallback(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// Authentication errors raised by identity adapters.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token is missing, malformed, or has an invalid signature.
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    /// Token is valid but the participant no longer exists.
    #[error("Participant not found")]
    UnknownParticipant,

    /// The authentication service is unavailable (network, config, etc.).
    #[error("Auth service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AuthError {
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}
