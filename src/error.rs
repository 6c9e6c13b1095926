//! Structured operation errors shared by every manager
//!
//! All fallible control-plane operations return [`OpResult`], carrying an
//! [`OpError`] with a code from a closed per-manager set, a human-readable
//! message, and optional structured details. Errors are returned to the
//! caller that invoked the operation; they never cross manager boundaries
//! as panics.

use serde::{Serialize, Serializer};

/// Result type for all control-plane operations
pub type OpResult<T> = Result<T, OpError>;

/// The closed set of error codes exposed to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    // Shared
    ValidationError,

    // Nodes
    NodeNotFound,
    NodeExists,

    // Namespaces
    NamespaceExists,
    NamespaceNotFound,
    ReservedNamespace,
    NamespaceTerminating,
    QuotaExceeded,
    CannotDeleteDefault,
    NamespaceNotEmpty,

    // Packs
    PackNotFound,
    VersionExists,
    VersionNotFound,

    // Pods / scheduling
    PodNotFound,
    InvalidStatusTransition,
    NoCompatibleNodes,
    NamespaceQuotaExceeded,
    PreemptionFailed,
    SameVersion,
    RuntimeMismatch,

    // Secrets
    SecretExists,
    SecretNotFound,
    DecryptionFailed,
    MountPathConflict,
    MissingSecrets,

    // Auth
    Unauthorized,
    Forbidden,
    SessionExpired,
    InvalidCredentials,
    UserAlreadyExists,
    UserNotFound,
    RateLimitExceeded,
    AccountLocked,

    /// Provider error code outside the fixed mapping, passed through verbatim
    Unknown(String),
}

impl ErrorCode {
    /// Wire representation of the code (SCREAMING_SNAKE_CASE)
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NodeNotFound => "NODE_NOT_FOUND",
            ErrorCode::NodeExists => "NODE_EXISTS",
            ErrorCode::NamespaceExists => "NAMESPACE_EXISTS",
            ErrorCode::NamespaceNotFound => "NAMESPACE_NOT_FOUND",
            ErrorCode::ReservedNamespace => "RESERVED_NAMESPACE",
            ErrorCode::NamespaceTerminating => "NAMESPACE_TERMINATING",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::CannotDeleteDefault => "CANNOT_DELETE_DEFAULT",
            ErrorCode::NamespaceNotEmpty => "NAMESPACE_NOT_EMPTY",
            ErrorCode::PackNotFound => "PACK_NOT_FOUND",
            ErrorCode::VersionExists => "VERSION_EXISTS",
            ErrorCode::VersionNotFound => "VERSION_NOT_FOUND",
            ErrorCode::PodNotFound => "POD_NOT_FOUND",
            ErrorCode::InvalidStatusTransition => "INVALID_STATUS_TRANSITION",
            ErrorCode::NoCompatibleNodes => "NO_COMPATIBLE_NODES",
            ErrorCode::NamespaceQuotaExceeded => "NAMESPACE_QUOTA_EXCEEDED",
            ErrorCode::PreemptionFailed => "PREEMPTION_FAILED",
            ErrorCode::SameVersion => "SAME_VERSION",
            ErrorCode::RuntimeMismatch => "RUNTIME_MISMATCH",
            ErrorCode::SecretExists => "SECRET_EXISTS",
            ErrorCode::SecretNotFound => "SECRET_NOT_FOUND",
            ErrorCode::DecryptionFailed => "DECRYPTION_FAILED",
            ErrorCode::MountPathConflict => "MOUNT_PATH_CONFLICT",
            ErrorCode::MissingSecrets => "MISSING_SECRETS",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::SessionExpired => "SESSION_EXPIRED",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::UserAlreadyExists => "USER_ALREADY_EXISTS",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::AccountLocked => "ACCOUNT_LOCKED",
            ErrorCode::Unknown(code) => code,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A structured operation error
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{}: {message}", code.as_str())]
pub struct OpError {
    /// Machine-readable code from the closed set
    pub code: ErrorCode,

    /// Human-readable message
    pub message: String,

    /// Optional structured details (e.g. exceeded quota axes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl OpError {
    /// Create an error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Attach structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }
}
