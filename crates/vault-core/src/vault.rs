//! Vault orchestration
//!
//! Wires the components together in the order a front end uses them:
//! authenticate through [`AuthGate`], then open the [`CredentialStore`] and
//! [`ExportBundle`] with the verified master password.

use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::auth::{AuthGate, AuthState, PasswordHashParams};
use crate::credential::{CredentialRecord, CredentialStore, NewCredential};
use crate::crypto::{Encryptor, KeyDerivationParams, KeyPurpose};
use crate::error::{Result, VaultError};
use crate::export::ExportBundle;
use crate::generator::{self, GeneratorOptions};
use crate::settings::{Settings, SettingsManager};
use crate::storage::VaultPaths;

/// Shortest master password accepted at setup
pub const MIN_MASTER_PASSWORD_LEN: usize = 8;

/// Vault state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No master password has been set yet
    NotInitialized,
    /// Master password set, no open session
    Locked,
    /// Store and export bundle are open
    Unlocked,
}

/// Cost parameters for the slow hashes
#[derive(Debug, Clone, Default)]
pub struct VaultOptions {
    pub hash_params: PasswordHashParams,
    pub kdf_params: KeyDerivationParams,
}

/// Handles that exist only while unlocked
struct Session {
    store: CredentialStore,
    bundle: ExportBundle,
}

/// Main vault struct that orchestrates all functionality
pub struct Vault {
    paths: VaultPaths,
    auth: AuthGate,
    settings: SettingsManager,
    options: VaultOptions,
    session: Option<Session>,
}

impl Vault {
    /// Open the vault in the platform data directory
    pub fn new() -> Result<Self> {
        Self::open(VaultPaths::new()?, VaultOptions::default())
    }

    /// Open the vault in a custom directory
    pub fn with_dir(dir: PathBuf) -> Result<Self> {
        Self::open(VaultPaths::with_dir(dir)?, VaultOptions::default())
    }

    pub fn open(paths: VaultPaths, options: VaultOptions) -> Result<Self> {
        let settings = SettingsManager::new(paths.settings_file());
        let auth = AuthGate::load(paths.config_file())?
            .with_hash_params(options.hash_params.clone())
            .with_idle_timeout(settings.get().idle_timeout());

        Ok(Self {
            paths,
            auth,
            settings,
            options,
            session: None,
        })
    }

    pub fn state(&self) -> VaultState {
        match (self.auth.state(), &self.session) {
            (AuthState::Uninitialized, _) => VaultState::NotInitialized,
            (AuthState::Ready, None) => VaultState::Locked,
            (AuthState::Ready, Some(_)) => VaultState::Unlocked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == VaultState::Unlocked
    }

    /// First-run setup: set the master password and unlock
    pub async fn setup(&mut self, password: &str) -> Result<()> {
        if self.state() != VaultState::NotInitialized {
            return Err(VaultError::AlreadyInitialized);
        }
        if password.chars().count() < MIN_MASTER_PASSWORD_LEN {
            return Err(VaultError::WeakPassword {
                min: MIN_MASTER_PASSWORD_LEN,
            });
        }

        info!("Setting up new vault");
        self.auth.set_master_password(password).await?;
        self.open_session(password)
    }

    /// Verify the master password and open the store
    pub async fn unlock(&mut self, password: &str) -> Result<()> {
        if self.state() == VaultState::NotInitialized {
            return Err(VaultError::NotInitialized);
        }

        if !self.auth.verify_password(password) {
            return Err(VaultError::InvalidPassword);
        }

        if self.session.is_some() {
            debug!("Vault already unlocked");
            self.auth.update_activity();
            return Ok(());
        }

        self.open_session(password)?;
        info!("Vault unlocked");
        Ok(())
    }

    fn open_session(&mut self, password: &str) -> Result<()> {
        let kdf = self.options.kdf_params.clone();
        let encryptor = Encryptor::with_params(password, KeyPurpose::Storage, kdf.clone());
        let store = CredentialStore::open(&self.paths.vault_file(), encryptor)?;
        let bundle = ExportBundle::with_params(password, kdf);

        self.session = Some(Session { store, bundle });
        self.auth.update_activity();
        Ok(())
    }

    /// Drop the store handle and derived keys
    pub fn lock(&mut self) {
        self.session = None;
        info!("Vault locked");
    }

    /// Record user activity for idle-timeout bookkeeping
    pub fn touch(&mut self) {
        self.auth.update_activity();
    }

    /// Advisory: unlocked and not idle for longer than the timeout
    pub fn is_session_valid(&self) -> bool {
        self.is_unlocked() && self.auth.is_session_valid()
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(VaultError::Locked)
    }

    pub fn store(&self) -> Result<&CredentialStore> {
        Ok(&self.session()?.store)
    }

    /// `get_all` on a blocking worker so the caller's loop stays responsive
    pub async fn load_all(&self) -> Result<Vec<CredentialRecord>> {
        let store = self.store()?.clone();
        tokio::task::spawn_blocking(move || store.get_all()).await?
    }

    /// Export every credential. Returns how many were written.
    pub async fn export_to(&self, destination: &Path) -> Result<usize> {
        let records = self.load_all().await?;
        self.session()?.bundle.export(&records, destination).await?;
        Ok(records.len())
    }

    /// Import a bundle as new credentials. Returns how many were added.
    ///
    /// Records get fresh ids and timestamps. Nothing is added unless the whole
    /// bundle decrypts and every record is valid.
    pub async fn import_from(&self, source: &Path) -> Result<usize> {
        let session = self.session()?;
        let records = session.bundle.import(source).await?;

        let credentials: Vec<NewCredential> = records.into_iter().map(NewCredential::from).collect();
        let store = session.store.clone();
        let ids = tokio::task::spawn_blocking(move || store.add_many(&credentials))
            .await?
            .inspect_err(|e| error!("Import from {:?} rolled back: {}", source, e))?;

        Ok(ids.len())
    }

    /// Delete every credential and category and clear the master password.
    ///
    /// The cleared config is staged first so that I/O failures surface before
    /// any data is deleted; the credential wipe is a single transaction.
    pub async fn reset_account(&mut self) -> Result<()> {
        let store = self.store()?.clone();

        info!("Resetting account - deleting all data");
        let staged = self.auth.stage_reset().await.inspect_err(|e| {
            error!("Account reset aborted, config not writable: {}", e);
        })?;

        if let Err(e) = store.reset_all() {
            error!("Account reset aborted, vault unchanged: {}", e);
            staged.abort().await;
            return Err(e);
        }

        // Data is gone at this point: drop to NotInitialized even if the
        // config could not be cleared on disk.
        let committed = staged.commit().await;
        self.auth.mark_reset();
        self.session = None;

        if let Err(e) = committed {
            error!("Vault wiped but master password could not be cleared: {}", e);
            return Err(e);
        }

        info!("Account reset complete");
        Ok(())
    }

    /// Generate a password, using the saved defaults when `options` is `None`
    pub fn generate_password(&self, options: Option<&GeneratorOptions>) -> Result<String> {
        generator::generate(options.unwrap_or(&self.settings.get().generator))
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    pub async fn update_settings(&mut self, settings: Settings) -> Result<()> {
        self.auth.set_idle_timeout(settings.idle_timeout());
        self.settings.update(settings).await
    }

    pub fn paths(&self) -> &VaultPaths {
        &self.paths
    }
}
