//! AES-256-GCM authenticated encryption
//!
//! Wire layout: `{iv}{ciphertext}{auth_tag}`
//! - IV: 12 bytes (96 bits), random per call
//! - Ciphertext: same length as the plaintext
//! - Auth tag: 16 bytes (128 bits)

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::key_derivation::{derive_key, KeyDerivationParams, KeyPurpose};
use super::SecretKey;
use crate::error::{Result, VaultError};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypted data with IV and auth tag
#[derive(Debug, Clone)]
pub struct EncryptedData {
    /// Initialization vector (12 bytes for GCM)
    pub iv: [u8; IV_LEN],
    /// Authentication tag (16 bytes)
    pub auth_tag: [u8; TAG_LEN],
    /// Encrypted ciphertext
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize to `{iv}{ciphertext}{auth_tag}`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_LEN + self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.auth_tag);
        out
    }

    /// Parse from `{iv}{ciphertext}{auth_tag}`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < IV_LEN + TAG_LEN {
            return Err(VaultError::Decryption(format!(
                "Ciphertext too short: expected at least {} bytes, got {}",
                IV_LEN + TAG_LEN,
                bytes.len()
            )));
        }

        let (iv_bytes, rest) = bytes.split_at(IV_LEN);
        let (ciphertext, tag_bytes) = rest.split_at(rest.len() - TAG_LEN);

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);

        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(tag_bytes);

        Ok(Self {
            iv,
            auth_tag,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt plaintext using AES-256-GCM with a fresh random IV
pub fn encrypt(plaintext: &[u8], key: &SecretKey) -> Result<EncryptedData> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    // aes-gcm appends the auth tag to the ciphertext
    let ciphertext_with_tag = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::Encryption(e.to_string()))?;

    if ciphertext_with_tag.len() < TAG_LEN {
        return Err(VaultError::Encryption("Ciphertext too short".to_string()));
    }

    let tag_start = ciphertext_with_tag.len() - TAG_LEN;
    let ciphertext = ciphertext_with_tag[..tag_start].to_vec();
    let mut auth_tag = [0u8; TAG_LEN];
    auth_tag.copy_from_slice(&ciphertext_with_tag[tag_start..]);

    Ok(EncryptedData {
        iv,
        auth_tag,
        ciphertext,
    })
}

/// Decrypt and authenticate using AES-256-GCM
pub fn decrypt(encrypted: &EncryptedData, key: &SecretKey) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::Decryption(e.to_string()))?;

    let nonce = Nonce::from_slice(&encrypted.iv);

    let mut ciphertext_with_tag = encrypted.ciphertext.clone();
    ciphertext_with_tag.extend_from_slice(&encrypted.auth_tag);

    cipher
        .decrypt(nonce, ciphertext_with_tag.as_slice())
        .map_err(|_| VaultError::Decryption("authentication failed".to_string()))
}

/// Symmetric encryptor bound to one key derived from the master password
#[derive(Clone)]
pub struct Encryptor {
    key: SecretKey,
}

impl Encryptor {
    /// Derive the key for `purpose` from the master password
    pub fn new(password: &str, purpose: KeyPurpose) -> Self {
        Self::with_params(password, purpose, KeyDerivationParams::default())
    }

    /// Derive with explicit parameters
    pub fn with_params(password: &str, purpose: KeyPurpose, params: KeyDerivationParams) -> Self {
        Self {
            key: derive_key(password, purpose, Some(params)),
        }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(encrypt(plaintext, &self.key)?.to_bytes())
    }

    /// Fails with `Decryption` on a wrong key, tampering or truncation
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let encrypted = EncryptedData::from_bytes(ciphertext)?;
        decrypt(&encrypted, &self.key)
    }

    pub fn encrypt_str(&self, plaintext: &str) -> Result<Vec<u8>> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_str(&self, ciphertext: &[u8]) -> Result<String> {
        let plaintext = self.decrypt(ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|e| VaultError::Decryption(format!("Invalid UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").field("key", &self.key).finish()
    }
}
