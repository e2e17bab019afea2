//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Vault is locked - unlock with the master password first")]
    Locked,

    #[error("No master password set - run first-time setup first")]
    NotInitialized,

    #[error("A master password is already set")]
    AlreadyInitialized,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Master password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Credential not found: {0}")]
    NotFound(i64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage unavailable: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage handle poisoned by a panicked worker")]
    StoragePoisoned,

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
