//! Secret resources - encrypted key-value material injectable into pods
//!
//! Secrets are encrypted at rest and live in their own store, apart from
//! cluster state, so encrypted material can never ride along when state is
//! serialized. Plaintext exists only transiently inside
//! [`SecretManager::resolve_for_pod`] and is wiped before returning.

pub mod crypto;
pub mod manager;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crypto::{EncryptedBlob, SecretCipher};
pub use manager::{CreateSecretInput, SecretManager, SecretManagerConfig, UpdateSecretInput};

/// How a secret's keys are surfaced inside a pod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SecretInjection {
    /// Inject as environment variables
    Env {
        /// Prepended to the uppercased key when no mapping entry applies
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,

        /// Explicit key-to-env-name overrides
        #[serde(default, rename = "keyMapping")]
        key_mapping: HashMap<String, String>,
    },
    /// Inject as files under a mount path
    Volume {
        #[serde(rename = "mountPath")]
        mount_path: String,

        /// Explicit key-to-filename overrides
        #[serde(default, rename = "fileMapping")]
        file_mapping: HashMap<String, String>,
    },
}

/// An encrypted secret record
///
/// Deliberately not serializable: only [`SecretSummary`] leaves the manager.
#[derive(Debug, Clone)]
pub struct Secret {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub secret_type: String,
    pub encrypted_data: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
    pub injection: SecretInjection,
    /// Bumped on every data re-encryption, not on injection-only updates
    pub version: u64,
    /// Number of keys in the encrypted map, carried as metadata
    pub key_count: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    fn summary(&self) -> SecretSummary {
        SecretSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            secret_type: self.secret_type.clone(),
            injection: self.injection.clone(),
            version: self.version,
            key_count: self.key_count,
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The metadata-only view of a secret returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretSummary {
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub injection: SecretInjection,
    pub version: u64,
    pub key_count: usize,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Files materialized from one volume-mode secret
///
/// Not serializable by design; the payload is discarded after injection.
#[derive(Debug, Clone)]
pub struct SecretVolume {
    pub mount_path: String,
    pub files: HashMap<String, String>,
}

/// The short-lived injection payload produced for a pod
///
/// Consumers must discard it immediately after use.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub env: HashMap<String, String>,
    pub volumes: Vec<SecretVolume>,
}
