//! Credential records and their encrypted storage

mod category_cache;
mod store;
mod types;

pub use category_cache::CategoryCache;
pub use store::CredentialStore;
pub use types::*;
