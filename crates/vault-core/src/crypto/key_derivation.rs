//! Password-based key derivation using PBKDF2-HMAC-SHA256
//!
//! Keys are derived from the master password with a fixed, embedded salt so the
//! same password always yields the same key across runs. Storage and export
//! keys use different salts, so an export bundle can never be decrypted with
//! the key that protects the live vault (and vice versa).

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use super::SecretKey;

/// Salt for the key that encrypts secrets at rest in the vault file
const STORAGE_SALT: &[u8] = b"securepass-vault-storage-v1";

/// Salt for the key that encrypts export bundles
const EXPORT_SALT: &[u8] = b"exportsecuresalt";

/// What a derived key is used for. Each purpose has its own salt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// Per-field encryption of secrets in the vault file
    Storage,
    /// Whole-file encryption of export bundles
    Export,
}

impl KeyPurpose {
    fn salt(self) -> &'static [u8] {
        match self {
            Self::Storage => STORAGE_SALT,
            Self::Export => EXPORT_SALT,
        }
    }
}

/// Parameters for PBKDF2 key derivation
#[derive(Debug, Clone)]
pub struct KeyDerivationParams {
    /// HMAC-SHA256 iterations (default: 100 000)
    pub iterations: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            iterations: 100_000,
        }
    }
}

/// Derive a 256-bit key from the master password for the given purpose
///
/// # Arguments
/// * `password` - The master password
/// * `purpose` - Selects the embedded salt
/// * `params` - Optional key derivation parameters
pub fn derive_key(
    password: &str,
    purpose: KeyPurpose,
    params: Option<KeyDerivationParams>,
) -> SecretKey {
    let params = params.unwrap_or_default();

    let mut key_bytes = [0u8; 32];
    pbkdf2_hmac::<Sha256>(
        password.as_bytes(),
        purpose.salt(),
        params.iterations,
        &mut key_bytes,
    );

    let key = SecretKey::new(key_bytes);
    zeroize::Zeroize::zeroize(&mut key_bytes);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let key1 = derive_key("test-password-123", KeyPurpose::Storage, None);
        let key2 = derive_key("test-password-123", KeyPurpose::Storage, None);

        assert_eq!(key1.as_bytes(), key2.as_bytes());
        assert_eq!(key1.as_bytes().len(), 32);
    }

    #[test]
    fn test_derive_key_different_passwords() {
        let key1 = derive_key("password1", KeyPurpose::Storage, None);
        let key2 = derive_key("password2", KeyPurpose::Storage, None);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_storage_and_export_keys_differ() {
        let storage = derive_key("same-password", KeyPurpose::Storage, None);
        let export = derive_key("same-password", KeyPurpose::Export, None);

        assert_ne!(storage.as_bytes(), export.as_bytes());
    }

    #[test]
    fn test_iterations_change_key() {
        let fast = KeyDerivationParams { iterations: 1_000 };
        let key1 = derive_key("password", KeyPurpose::Storage, Some(fast));
        let key2 = derive_key("password", KeyPurpose::Storage, None);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_still_derives() {
        let key = derive_key("", KeyPurpose::Export, None);
        assert_ne!(key.as_bytes(), &[0u8; 32]);
    }
}
