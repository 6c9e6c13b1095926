//! Authentication and authorization
//!
//! Credential verification is delegated to an injected [`AuthProvider`];
//! the core only validates input shape, holds the current session, keeps it
//! fresh, and answers role questions. Provider errors are mapped onto a
//! fixed code set, with unknown codes passed through verbatim.

pub mod service;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use service::{AuthConfig, AuthService};

/// The closed role set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Developer,
    Viewer,
    /// Machine identity used by worker node agents
    Node,
}

/// An authenticated principal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|role| self.has_role(*role))
    }
}

/// A provider-issued session for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user: User,
    pub access_token: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Remaining lifetime in milliseconds, clamped at zero
    pub fn remaining_ms(&self) -> i64 {
        (self.expires_at - Utc::now()).num_milliseconds().max(0)
    }
}

/// Error shape returned by an [`AuthProvider`]
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    /// Provider-specific code; mapped onto the fixed set by the service
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The injected identity-provider contract
///
/// Every call may suspend (the provider typically talks to a network). The
/// core depends only on this shape and never inspects provider internals.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn register_user(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> ProviderResult<UserSession>;

    async fn login_user(&self, email: &str, password: &str) -> ProviderResult<UserSession>;

    async fn logout_user(&self, access_token: &str) -> ProviderResult<()>;

    async fn refresh_session(&self, refresh_token: &str) -> ProviderResult<UserSession>;

    async fn get_user_by_id(&self, user_id: &str) -> ProviderResult<User>;

    async fn verify_token(&self, access_token: &str) -> ProviderResult<User>;

    async fn update_user(&self, user_id: &str, display_name: Option<&str>)
        -> ProviderResult<User>;

    async fn delete_user(&self, user_id: &str) -> ProviderResult<()>;
}
