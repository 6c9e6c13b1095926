//! At-rest encryption for secret material
//!
//! AES-256-GCM with a fresh 96-bit nonce per write and a 128-bit auth tag
//! stored alongside the ciphertext. The key is derived from the operator's
//! master key via SHA-256; the KDF is an interim measure and can be swapped
//! for a KMS without touching the encrypt/decrypt interface. Without a
//! master key an ephemeral random key is generated, which makes persisted
//! secrets unrecoverable after restart (development only).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{ErrorCode, OpError, OpResult};

/// GCM nonce length in bytes (96 bits)
pub const IV_LEN: usize = 12;

/// GCM auth tag length in bytes (128 bits)
pub const TAG_LEN: usize = 16;

/// Ciphertext plus the nonce and tag needed to open it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub ciphertext: Vec<u8>,
    pub iv: Vec<u8>,
    pub auth_tag: Vec<u8>,
}

/// AEAD envelope bound to one derived key
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl SecretCipher {
    /// Derive the encryption key from the operator master key
    ///
    /// A missing master key yields a random ephemeral key.
    pub fn new(master_key: Option<&str>) -> Self {
        let key_bytes: [u8; 32] = match master_key {
            Some(master) => {
                let mut hasher = Sha256::new();
                hasher.update(master.as_bytes());
                hasher.finalize().into()
            }
            None => {
                warn!("no master key configured; using an ephemeral key, secrets will not survive restart");
                let mut key = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut key);
                key
            }
        };

        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes)),
        }
    }

    /// Encrypt with a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> OpResult<EncryptedBlob> {
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let mut sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| OpError::validation("secret encryption failed"))?;

        // aes-gcm appends the tag; store it separately
        let auth_tag = sealed.split_off(sealed.len() - TAG_LEN);
        Ok(EncryptedBlob {
            ciphertext: sealed,
            iv: iv.to_vec(),
            auth_tag,
        })
    }

    /// Decrypt and authenticate a blob
    ///
    /// Any failure (bad key, tampered ciphertext or tag) collapses to a
    /// detail-free `DECRYPTION_FAILED`.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> OpResult<Vec<u8>> {
        if blob.iv.len() != IV_LEN || blob.auth_tag.len() != TAG_LEN {
            return Err(decryption_failed());
        }

        let mut sealed = Vec::with_capacity(blob.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&blob.ciphertext);
        sealed.extend_from_slice(&blob.auth_tag);

        self.cipher
            .decrypt(Nonce::from_slice(&blob.iv), sealed.as_ref())
            .map_err(|_| decryption_failed())
    }
}

fn decryption_failed() -> OpError {
    OpError::new(ErrorCode::DecryptionFailed, "failed to decrypt secret")
}
