//! Cryptographic primitives for secret storage
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption
//! - PBKDF2-HMAC-SHA256 key derivation with per-purpose salts
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{decrypt, encrypt, EncryptedData, Encryptor};
pub use key_derivation::{derive_key, KeyDerivationParams, KeyPurpose};
pub use secure_memory::{SecretKey, SecretString};
