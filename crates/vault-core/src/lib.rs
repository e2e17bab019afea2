//! # vault-core
//!
//! Core of the SecurePass local password vault:
//! - PBKDF2 key derivation with separate storage and export salts
//! - AES-256-GCM encryption of every stored secret
//! - Argon2id master-password hashing with idle-session bookkeeping
//! - SQLite credential store with search and a cached category vocabulary
//! - Encrypted export bundles

pub mod auth;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod export;
pub mod generator;
pub mod settings;
pub mod storage;
mod vault;

pub use auth::{AuthGate, AuthState, MasterCredential, PasswordHashParams};
pub use credential::{CredentialRecord, CredentialStore, CredentialUpdate, NewCredential};
pub use crypto::{Encryptor, KeyDerivationParams, KeyPurpose};
pub use error::{Result, VaultError};
pub use export::ExportBundle;
pub use generator::GeneratorOptions;
pub use settings::{Settings, SettingsManager};
pub use storage::VaultPaths;
pub use vault::{Vault, VaultOptions, VaultState, MIN_MASTER_PASSWORD_LEN};
