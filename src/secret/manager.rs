//! Secret manager - encrypted CRUD and the pod-injection resolver
//!
//! All operations are metadata-only on the outside: plaintext enters at
//! create/update and leaves only through [`SecretManager::resolve_for_pod`],
//! whose working buffers are wiped before returning. Nothing here logs
//! secret values, and decryption failures carry no detail beyond the code.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::{ErrorCode, OpError, OpResult};

use super::crypto::{EncryptedBlob, SecretCipher};
use super::{ResolvedSecrets, Secret, SecretInjection, SecretSummary, SecretVolume};

/// Secret manager configuration
#[derive(Debug, Clone)]
pub struct SecretManagerConfig {
    /// Operator master key; absent means an ephemeral key (development only)
    pub master_key: Option<String>,

    /// Namespace assumed when a caller passes none
    pub default_namespace: String,
}

impl Default for SecretManagerConfig {
    fn default() -> Self {
        Self {
            master_key: None,
            default_namespace: "default".to_string(),
        }
    }
}

/// Input for creating a secret
#[derive(Debug, Clone)]
pub struct CreateSecretInput {
    pub name: String,
    pub namespace: Option<String>,
    pub secret_type: String,
    pub data: HashMap<String, String>,
    pub injection: SecretInjection,
}

/// Patch applied by [`SecretManager::update`]
#[derive(Debug, Clone, Default)]
pub struct UpdateSecretInput {
    /// New plaintext map; triggers re-encryption and a version bump
    pub data: Option<HashMap<String, String>>,

    /// New injection config; does not bump the version
    pub injection: Option<SecretInjection>,
}

/// Owns the secret store, kept apart from cluster state
pub struct SecretManager {
    /// Secrets indexed by id; deliberately not part of `ClusterState`
    secrets: DashMap<String, Secret>,
    cipher: Arc<SecretCipher>,
    default_namespace: String,
}

impl SecretManager {
    pub fn new(config: SecretManagerConfig) -> Self {
        Self {
            secrets: DashMap::new(),
            cipher: Arc::new(SecretCipher::new(config.master_key.as_deref())),
            default_namespace: config.default_namespace,
        }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Encrypt and store a new secret
    pub fn create(&self, input: CreateSecretInput, created_by: &str) -> OpResult<SecretSummary> {
        if input.name.trim().is_empty() {
            return Err(OpError::validation("secret name must not be empty"));
        }
        let namespace = input
            .namespace
            .unwrap_or_else(|| self.default_namespace.clone());

        if self.find(&namespace, &input.name).is_some() {
            return Err(OpError::new(
                ErrorCode::SecretExists,
                format!("secret '{}/{}' already exists", namespace, input.name),
            ));
        }

        let key_count = input.data.len();
        let blob = self.seal(&input.data)?;

        let now = Utc::now();
        let secret = Secret {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            namespace,
            secret_type: input.secret_type,
            encrypted_data: blob.ciphertext,
            iv: blob.iv,
            auth_tag: blob.auth_tag,
            injection: input.injection,
            version: 1,
            key_count,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        let summary = secret.summary();
        info!(secret = %summary.name, namespace = %summary.namespace, "secret created");
        self.secrets.insert(secret.id.clone(), secret);
        Ok(summary)
    }

    /// Update a secret's data and/or injection config
    ///
    /// New data is re-encrypted under a fresh IV and bumps the version; an
    /// injection-only change keeps the version and stored key count.
    pub fn update(&self, secret_id: &str, patch: UpdateSecretInput) -> OpResult<SecretSummary> {
        let sealed = match &patch.data {
            Some(data) => Some((self.seal(data)?, data.len())),
            None => None,
        };

        let mut secret = self
            .secrets
            .get_mut(secret_id)
            .ok_or_else(|| not_found(secret_id))?;

        if let Some((blob, key_count)) = sealed {
            secret.encrypted_data = blob.ciphertext;
            secret.iv = blob.iv;
            secret.auth_tag = blob.auth_tag;
            secret.key_count = key_count;
            secret.version += 1;
        }
        if let Some(injection) = patch.injection {
            secret.injection = injection;
        }
        secret.updated_at = Utc::now();
        Ok(secret.summary())
    }

    pub fn delete(&self, secret_id: &str) -> OpResult<SecretSummary> {
        let (_, secret) = self
            .secrets
            .remove(secret_id)
            .ok_or_else(|| not_found(secret_id))?;
        info!(secret = %secret.name, namespace = %secret.namespace, "secret deleted");
        Ok(secret.summary())
    }

    pub fn get(&self, secret_id: &str) -> Option<SecretSummary> {
        self.secrets.get(secret_id).map(|s| s.summary())
    }

    pub fn get_by_name(&self, namespace: &str, name: &str) -> Option<SecretSummary> {
        self.find(namespace, name).map(|s| s.summary())
    }

    /// Metadata-only listing, optionally filtered to one namespace
    pub fn list(&self, namespace: Option<&str>) -> Vec<SecretSummary> {
        self.secrets
            .iter()
            .filter(|s| namespace.map(|ns| s.namespace == ns).unwrap_or(true))
            .map(|s| s.summary())
            .collect()
    }

    // =========================================================================
    // Pod resolution
    // =========================================================================

    /// Decrypt the named secrets and build the injection payload for a pod
    ///
    /// Fails before any decryption if names are missing or volume mount
    /// paths conflict; on a decryption failure all plaintext accumulated so
    /// far is wiped. The returned payload is short-lived and must be
    /// discarded by the consumer after injection.
    pub fn resolve_for_pod(&self, names: &[String], namespace: &str) -> OpResult<ResolvedSecrets> {
        // 1. Resolve every name before touching ciphertext
        let mut records: Vec<Secret> = Vec::with_capacity(names.len());
        let mut missing: Vec<String> = Vec::new();
        for name in names {
            match self.find(namespace, name) {
                Some(secret) => records.push(secret),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(OpError::new(
                ErrorCode::MissingSecrets,
                format!("secrets not found in '{}': {}", namespace, missing.join(", ")),
            )
            .with_details(serde_json::json!({ "missing": missing })));
        }

        // 2. Mount-path conflicts are detected before any decryption
        let mount_paths: Vec<&str> = records
            .iter()
            .filter_map(|s| match &s.injection {
                SecretInjection::Volume { mount_path, .. } => Some(mount_path.as_str()),
                SecretInjection::Env { .. } => None,
            })
            .collect();
        for (i, a) in mount_paths.iter().enumerate() {
            for b in &mount_paths[i + 1..] {
                if paths_conflict(a, b) {
                    return Err(OpError::new(
                        ErrorCode::MountPathConflict,
                        format!("mount paths '{}' and '{}' overlap", a, b),
                    ));
                }
            }
        }

        // 3. Decrypt all, wiping accumulated plaintext on any failure
        let mut plaintexts: Vec<HashMap<String, String>> = Vec::with_capacity(records.len());
        for secret in &records {
            match self.open(secret) {
                Ok(data) => plaintexts.push(data),
                Err(err) => {
                    for mut map in plaintexts {
                        wipe(&mut map);
                    }
                    return Err(err);
                }
            }
        }

        // 4. Build the payload
        let mut resolved = ResolvedSecrets::default();
        for (secret, data) in records.iter().zip(plaintexts.iter()) {
            match &secret.injection {
                SecretInjection::Env {
                    prefix,
                    key_mapping,
                } => {
                    for (key, value) in data {
                        let env_name = key_mapping.get(key).cloned().unwrap_or_else(|| {
                            format!("{}{}", prefix.as_deref().unwrap_or(""), key.to_uppercase())
                        });
                        resolved.env.insert(env_name, value.clone());
                    }
                }
                SecretInjection::Volume {
                    mount_path,
                    file_mapping,
                } => {
                    let files = data
                        .iter()
                        .map(|(key, value)| {
                            let file = file_mapping.get(key).cloned().unwrap_or_else(|| key.clone());
                            (file, value.clone())
                        })
                        .collect();
                    resolved.volumes.push(SecretVolume {
                        mount_path: mount_path.clone(),
                        files,
                    });
                }
            }
        }

        // 5. Wipe the working plaintext before handing back the payload
        for mut map in plaintexts {
            wipe(&mut map);
        }

        Ok(resolved)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn find(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .iter()
            .find(|s| s.namespace == namespace && s.name == name)
            .map(|s| s.clone())
    }

    fn seal(&self, data: &HashMap<String, String>) -> OpResult<EncryptedBlob> {
        let plaintext = serde_json::to_vec(data)
            .map_err(|_| OpError::validation("secret data could not be encoded"))?;
        self.cipher.encrypt(&plaintext)
    }

    fn open(&self, secret: &Secret) -> OpResult<HashMap<String, String>> {
        let blob = EncryptedBlob {
            ciphertext: secret.encrypted_data.clone(),
            iv: secret.iv.clone(),
            auth_tag: secret.auth_tag.clone(),
        };
        let plaintext = self.cipher.decrypt(&blob)?;
        serde_json::from_slice(&plaintext)
            .map_err(|_| OpError::new(ErrorCode::DecryptionFailed, "failed to decrypt secret"))
    }
}

/// Overwrite every value in a plaintext map before dropping it
fn wipe(map: &mut HashMap<String, String>) {
    for value in map.values_mut() {
        value.clear();
    }
}

/// Two mount paths conflict when equal or when one is a segment-prefix of
/// the other (`/a` vs `/a/b` conflicts; `/ab` vs `/a` does not)
fn paths_conflict(a: &str, b: &str) -> bool {
    let a = a.trim_end_matches('/');
    let b = b.trim_end_matches('/');
    if a == b {
        return true;
    }
    let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
    long.starts_with(short) && long[short.len()..].starts_with('/')
}

fn not_found(secret_id: &str) -> OpError {
    OpError::new(
        ErrorCode::SecretNotFound,
        format!("secret '{}' not found", secret_id),
    )
}
