//! Auth service - session lifecycle and role-gated authorization
//!
//! Validates credentials locally (shape only), delegates verification to
//! the injected provider, holds the single current session, and keeps it
//! fresh with a background refresh loop that swallows transient provider
//! errors and retries on the next tick.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use regex::Regex;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::error::{ErrorCode, OpError, OpResult};

use super::{AuthProvider, ProviderError, Role, User, UserSession};

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Arm the background refresh loop when a session is installed
    pub enable_auto_refresh: bool,

    /// Refresh loop tick interval (default 60s)
    pub auto_refresh_interval_ms: u64,

    /// Refresh when remaining session lifetime drops below this (default 15m)
    pub session_refresh_threshold_ms: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_auto_refresh: true,
            auto_refresh_interval_ms: 60_000,
            session_refresh_threshold_ms: 900_000,
        }
    }
}

/// Session holder and role gate over an injected provider
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    session: Arc<RwLock<Option<UserSession>>>,
    config: AuthConfig,
    refresh_shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl AuthService {
    pub fn new(provider: Arc<dyn AuthProvider>, config: AuthConfig) -> Self {
        Self {
            provider,
            session: Arc::new(RwLock::new(None)),
            config,
            refresh_shutdown: Mutex::new(None),
        }
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    /// Register a new account and install the resulting session
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> OpResult<UserSession> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        let session = self
            .provider
            .register_user(&email, password, display_name)
            .await
            .map_err(map_provider_error)?;
        self.install(session.clone());
        Ok(session)
    }

    /// Log in and install the resulting session
    pub async fn login(&self, email: &str, password: &str) -> OpResult<UserSession> {
        let email = normalize_email(email);
        validate_email(&email)?;
        if password.is_empty() {
            return Err(OpError::validation("password must not be empty"));
        }

        let session = self
            .provider
            .login_user(&email, password)
            .await
            .map_err(map_provider_error)?;
        self.install(session.clone());
        Ok(session)
    }

    /// Log out the current session, if any, and stop the refresh loop
    pub async fn logout(&self) -> OpResult<()> {
        let token = {
            let mut guard = self.session.write().expect("session lock poisoned");
            guard.take().map(|s| s.access_token)
        };
        self.stop_auto_refresh();

        if let Some(token) = token {
            self.provider
                .logout_user(&token)
                .await
                .map_err(map_provider_error)?;
            info!("session logged out");
        }
        Ok(())
    }

    /// Refresh the current session through the provider
    pub async fn refresh(&self) -> OpResult<UserSession> {
        let refresh_token = {
            let guard = self.session.read().expect("session lock poisoned");
            guard.as_ref().and_then(|s| s.refresh_token.clone())
        }
        .ok_or_else(|| {
            OpError::new(ErrorCode::SessionExpired, "no session available to refresh")
        })?;

        let session = self
            .provider
            .refresh_session(&refresh_token)
            .await
            .map_err(map_provider_error)?;

        *self.session.write().expect("session lock poisoned") = Some(session.clone());
        debug!("session refreshed");
        Ok(session)
    }

    /// Look up a user through the provider
    pub async fn get_user(&self, user_id: &str) -> OpResult<User> {
        self.provider
            .get_user_by_id(user_id)
            .await
            .map_err(map_provider_error)
    }

    /// Verify an access token through the provider
    pub async fn verify_token(&self, access_token: &str) -> OpResult<User> {
        self.provider
            .verify_token(access_token)
            .await
            .map_err(map_provider_error)
    }

    /// Update the current user's profile and refresh the cached session user
    pub async fn update_profile(&self, display_name: Option<&str>) -> OpResult<User> {
        let user = self.require_authentication()?;
        let updated = self
            .provider
            .update_user(&user.id, display_name)
            .await
            .map_err(map_provider_error)?;

        if let Some(session) = self.session.write().expect("session lock poisoned").as_mut() {
            session.user = updated.clone();
        }
        Ok(updated)
    }

    /// Delete the current user's account and drop the session
    pub async fn delete_account(&self) -> OpResult<()> {
        let user = self.require_authentication()?;
        self.provider
            .delete_user(&user.id)
            .await
            .map_err(map_provider_error)?;

        *self.session.write().expect("session lock poisoned") = None;
        self.stop_auto_refresh();
        info!("account deleted, session dropped");
        Ok(())
    }

    fn install(&self, session: UserSession) {
        *self.session.write().expect("session lock poisoned") = Some(session);
        if self.config.enable_auto_refresh {
            self.start_auto_refresh();
        }
    }

    pub fn current_session(&self) -> Option<UserSession> {
        self.session.read().expect("session lock poisoned").clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.current_session().map(|s| s.user)
    }

    // =========================================================================
    // Auto refresh
    // =========================================================================

    /// Spawn the refresh loop; calling again while running is a no-op
    pub fn start_auto_refresh(&self) {
        let mut guard = self.refresh_shutdown.lock().expect("refresh lock poisoned");
        if guard.is_some() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let provider = self.provider.clone();
        let session = self.session.clone();
        let threshold = self.config.session_refresh_threshold_ms;
        let period = Duration::from_millis(self.config.auto_refresh_interval_ms.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        refresh_tick(&provider, &session, threshold).await;
                    }
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            debug!("auto-refresh loop shutting down");
                            break;
                        }
                    }
                }
            }
        });

        *guard = Some(tx);
    }

    /// Stop the refresh loop; idempotent
    pub fn stop_auto_refresh(&self) {
        if let Some(tx) = self
            .refresh_shutdown
            .lock()
            .expect("refresh lock poisoned")
            .take()
        {
            let _ = tx.send(true);
        }
    }

    /// Tear down the service: stops the refresh loop
    pub fn destroy(&self) {
        self.stop_auto_refresh();
    }

    // =========================================================================
    // Roles and gates
    // =========================================================================

    pub fn has_role(&self, role: Role) -> bool {
        self.current_user().map(|u| u.has_role(role)).unwrap_or(false)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.current_user()
            .map(|u| u.has_any_role(roles))
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    /// Admins and operators manage cluster resources
    pub fn can_manage_resources(&self) -> bool {
        self.has_any_role(&[Role::Admin, Role::Operator])
    }

    pub fn is_node_agent(&self) -> bool {
        self.has_role(Role::Node)
    }

    /// A live session is required; expired sessions are distinguished
    pub fn require_authentication(&self) -> OpResult<User> {
        let session = self
            .current_session()
            .ok_or_else(|| OpError::new(ErrorCode::Unauthorized, "authentication required"))?;
        if session.is_expired() {
            return Err(OpError::new(ErrorCode::SessionExpired, "session has expired"));
        }
        Ok(session.user)
    }

    pub fn require_role(&self, role: Role) -> OpResult<User> {
        let user = self.require_authentication()?;
        if !user.has_role(role) {
            return Err(OpError::new(
                ErrorCode::Forbidden,
                format!("role {:?} required", role),
            ));
        }
        Ok(user)
    }

    pub fn require_any_role(&self, roles: &[Role]) -> OpResult<User> {
        let user = self.require_authentication()?;
        if !user.has_any_role(roles) {
            return Err(OpError::new(
                ErrorCode::Forbidden,
                format!("one of {:?} required", roles),
            ));
        }
        Ok(user)
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        self.stop_auto_refresh();
    }
}

/// One tick of the refresh loop; errors are swallowed and retried next tick
async fn refresh_tick(
    provider: &Arc<dyn AuthProvider>,
    session: &Arc<RwLock<Option<UserSession>>>,
    threshold_ms: i64,
) {
    let refresh_token = {
        let guard = session.read().expect("session lock poisoned");
        match guard.as_ref() {
            Some(current) if current.remaining_ms() < threshold_ms => {
                current.refresh_token.clone()
            }
            _ => None,
        }
    };

    let Some(token) = refresh_token else { return };
    match provider.refresh_session(&token).await {
        Ok(fresh) => {
            *session.write().expect("session lock poisoned") = Some(fresh);
            debug!("session auto-refreshed");
        }
        Err(err) => {
            warn!(error = %err, "session auto-refresh failed, will retry");
        }
    }
}

// ============================================================================
// Pure validation
// ============================================================================

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape-only email validation
pub fn validate_email(email: &str) -> OpResult<()> {
    let pattern = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    if !pattern.is_match(email) {
        return Err(OpError::validation(format!("'{}' is not a valid email", email)));
    }
    Ok(())
}

/// Min 8 chars with upper, lower, and digit; specials optional
pub fn validate_password(password: &str) -> OpResult<()> {
    if password.len() < 8 {
        return Err(OpError::validation("password must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(OpError::validation("password needs an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(OpError::validation("password needs a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(OpError::validation("password needs a digit"));
    }
    Ok(())
}

/// Map a provider error onto the fixed code set; unknown codes pass through
fn map_provider_error(err: ProviderError) -> OpError {
    let code = match err.code.as_str() {
        "USER_ALREADY_EXISTS" => ErrorCode::UserAlreadyExists,
        "INVALID_CREDENTIALS" => ErrorCode::InvalidCredentials,
        "SESSION_EXPIRED" => ErrorCode::SessionExpired,
        "RATE_LIMIT_EXCEEDED" => ErrorCode::RateLimitExceeded,
        "ACCOUNT_LOCKED" => ErrorCode::AccountLocked,
        "USER_NOT_FOUND" => ErrorCode::UserNotFound,
        other => ErrorCode::Unknown(other.to_string()),
    };
    OpError::new(code, err.message)
}
