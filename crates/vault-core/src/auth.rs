//! Master-password authentication and session liveness
//!
//! Only a salted Argon2id hash of the master password is persisted, in a small
//! JSON config record. Absence of the hash means first-run setup is required.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{Result, VaultError};
use crate::storage::{temp_path_for, write_atomic, write_new};

/// Idle time after which a session should be re-authenticated
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Persisted master credential (`config.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterCredential {
    /// PHC-format Argon2id hash, absent before first-run setup
    pub master_hash: Option<String>,
    /// Salt embedded in `master_hash`, kept alongside for inspection
    pub salt: Option<String>,
}

/// Argon2id cost parameters for the master password hash
#[derive(Debug, Clone)]
pub struct PasswordHashParams {
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for PasswordHashParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

impl PasswordHashParams {
    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|e| VaultError::PasswordHash(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No master hash stored
    Uninitialized,
    /// Master hash present
    Ready,
}

/// Master password gate
pub struct AuthGate {
    config_file: PathBuf,
    credential: MasterCredential,
    hash_params: PasswordHashParams,
    last_activity: Instant,
    idle_timeout: Duration,
}

impl AuthGate {
    /// Load the config record; a missing file means `Uninitialized`
    pub fn load(config_file: impl Into<PathBuf>) -> Result<Self> {
        let config_file = config_file.into();
        let credential = Self::load_from_file(&config_file)?;

        Ok(Self {
            config_file,
            credential,
            hash_params: PasswordHashParams::default(),
            last_activity: Instant::now(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    pub fn with_hash_params(mut self, params: PasswordHashParams) -> Self {
        self.hash_params = params;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn load_from_file(path: &Path) -> Result<MasterCredential> {
        if !path.exists() {
            debug!("No config file found, master password not set");
            return Ok(MasterCredential::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let credential: MasterCredential = serde_json::from_str(&contents)?;
        Ok(credential)
    }

    async fn save(&self, credential: &MasterCredential) -> Result<()> {
        let contents = serde_json::to_vec_pretty(credential)?;
        write_atomic(&self.config_file, &contents).await?;
        debug!("Saved config to {:?}", self.config_file);
        Ok(())
    }

    pub fn state(&self) -> AuthState {
        if self.has_master_password() {
            AuthState::Ready
        } else {
            AuthState::Uninitialized
        }
    }

    pub fn has_master_password(&self) -> bool {
        self.credential
            .master_hash
            .as_deref()
            .is_some_and(|h| !h.is_empty())
    }

    /// Hash `password` with a fresh random salt and persist it.
    ///
    /// Overwrites any existing hash.
    pub async fn set_master_password(&mut self, password: &str) -> Result<()> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .hash_params
            .hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| VaultError::PasswordHash(e.to_string()))?
            .to_string();

        let credential = MasterCredential {
            master_hash: Some(hash),
            salt: Some(salt.as_str().to_string()),
        };
        self.save(&credential).await?;
        self.credential = credential;

        info!("Master password set");
        Ok(())
    }

    /// Constant-time check of `password` against the stored hash.
    ///
    /// Always `false` before a master password is set.
    pub fn verify_password(&self, password: &str) -> bool {
        let Some(stored) = self.credential.master_hash.as_deref() else {
            return false;
        };

        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Stored master hash is malformed: {}", e);
                return false;
            }
        };

        // Cost parameters come from the PHC string itself
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Advisory: true while the last activity is within the idle timeout
    pub fn is_session_valid(&self) -> bool {
        self.last_activity.elapsed() < self.idle_timeout
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn set_idle_timeout(&mut self, timeout: Duration) {
        self.idle_timeout = timeout;
    }

    /// Clear hash and salt back to `Uninitialized`. Touches nothing else.
    pub async fn reset_master_password(&mut self) -> Result<()> {
        let cleared = MasterCredential::default();
        self.save(&cleared).await?;
        self.credential = cleared;

        info!("Master password cleared");
        Ok(())
    }

    /// Write the cleared config to a temp file without replacing the live one.
    ///
    /// Used by account reset so that any I/O failure surfaces before vault
    /// data is deleted.
    pub(crate) async fn stage_reset(&self) -> Result<StagedReset> {
        let contents = serde_json::to_vec_pretty(&MasterCredential::default())?;
        let temp_path = temp_path_for(&self.config_file);
        write_new(&temp_path, &contents).await?;

        Ok(StagedReset {
            temp_path,
            target: self.config_file.clone(),
        })
    }

    /// Adopt a staged reset after its rename succeeded
    pub(crate) fn mark_reset(&mut self) {
        self.credential = MasterCredential::default();
    }
}

/// A cleared config record written beside the live one, not yet in place
pub(crate) struct StagedReset {
    temp_path: PathBuf,
    target: PathBuf,
}

impl StagedReset {
    /// Move the cleared record into place.
    ///
    /// The rename is tried twice. If both attempts fail the live config is
    /// deleted instead, which also loads as `Uninitialized`.
    pub(crate) async fn commit(self) -> Result<()> {
        let Err(first) = tokio::fs::rename(&self.temp_path, &self.target).await else {
            return Ok(());
        };
        warn!("Replacing config failed, retrying: {}", first);

        let Err(second) = tokio::fs::rename(&self.temp_path, &self.target).await else {
            return Ok(());
        };
        warn!("Replacing config failed again, removing it: {}", second);

        let _ = tokio::fs::remove_file(&self.temp_path).await;
        match tokio::fs::remove_file(&self.target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) async fn abort(self) {
        let _ = tokio::fs::remove_file(&self.temp_path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::temp_files_in;
    use tempfile::TempDir;

    fn fast_params() -> PasswordHashParams {
        PasswordHashParams {
            memory_cost: 8192, // 8 MB (faster for testing)
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn test_gate(dir: &TempDir) -> AuthGate {
        AuthGate::load(dir.path().join("config.json"))
            .unwrap()
            .with_hash_params(fast_params())
    }

    #[test]
    fn test_uninitialized_rejects_everything() {
        let temp_dir = TempDir::new().unwrap();
        let gate = test_gate(&temp_dir);

        assert_eq!(gate.state(), AuthState::Uninitialized);
        assert!(!gate.has_master_password());
        assert!(!gate.verify_password(""));
        assert!(!gate.verify_password("anything"));
    }

    #[tokio::test]
    async fn test_set_and_verify() {
        let temp_dir = TempDir::new().unwrap();
        let mut gate = test_gate(&temp_dir);

        gate.set_master_password("correct horse").await.unwrap();

        assert_eq!(gate.state(), AuthState::Ready);
        assert!(gate.verify_password("correct horse"));
        assert!(!gate.verify_password("correct horse "));
        assert!(!gate.verify_password("Correct horse"));
        assert!(!gate.verify_password(""));
    }

    #[tokio::test]
    async fn test_set_again_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let mut gate = test_gate(&temp_dir);

        gate.set_master_password("first-password").await.unwrap();
        gate.set_master_password("second-password").await.unwrap();

        assert!(!gate.verify_password("first-password"));
        assert!(gate.verify_password("second-password"));
    }

    #[tokio::test]
    async fn test_hash_is_salted_and_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        {
            let mut gate = test_gate(&temp_dir);
            gate.set_master_password("persist-me-please").await.unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("persist-me-please"));

        let stored: MasterCredential = serde_json::from_str(&contents).unwrap();
        let salt = stored.salt.unwrap();
        assert!(stored.master_hash.unwrap().contains(&salt));

        let gate = AuthGate::load(&path).unwrap();
        assert!(gate.verify_password("persist-me-please"));
    }

    #[tokio::test]
    async fn test_same_password_different_salts() {
        let temp_a = TempDir::new().unwrap();
        let temp_b = TempDir::new().unwrap();
        let mut gate_a = test_gate(&temp_a);
        let mut gate_b = test_gate(&temp_b);

        gate_a.set_master_password("same-password").await.unwrap();
        gate_b.set_master_password("same-password").await.unwrap();

        assert_ne!(gate_a.credential.salt, gate_b.credential.salt);
        assert_ne!(gate_a.credential.master_hash, gate_b.credential.master_hash);
    }

    #[tokio::test]
    async fn test_reset_master_password() {
        let temp_dir = TempDir::new().unwrap();
        let mut gate = test_gate(&temp_dir);

        gate.set_master_password("to-be-reset").await.unwrap();
        gate.reset_master_password().await.unwrap();

        assert_eq!(gate.state(), AuthState::Uninitialized);
        assert!(!gate.verify_password("to-be-reset"));

        let reloaded = test_gate(&temp_dir);
        assert_eq!(reloaded.state(), AuthState::Uninitialized);
    }

    #[tokio::test]
    async fn test_staged_reset_abort_keeps_hash() {
        let temp_dir = TempDir::new().unwrap();
        let mut gate = test_gate(&temp_dir);
        gate.set_master_password("keep-me-please").await.unwrap();

        let staged = gate.stage_reset().await.unwrap();
        staged.abort().await;

        let reloaded = test_gate(&temp_dir);
        assert!(reloaded.verify_password("keep-me-please"));
        assert!(temp_files_in(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_staged_reset_commit_clears_hash() {
        let temp_dir = TempDir::new().unwrap();
        let mut gate = test_gate(&temp_dir);
        gate.set_master_password("clear-me-please").await.unwrap();

        gate.stage_reset().await.unwrap().commit().await.unwrap();

        let reloaded = test_gate(&temp_dir);
        assert_eq!(reloaded.state(), AuthState::Uninitialized);
        assert!(temp_files_in(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_removes_live_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.json");
        let mut gate = test_gate(&temp_dir);
        gate.set_master_password("clear-me-please").await.unwrap();

        // Staged file is gone, so both renames fail
        let staged = StagedReset {
            temp_path: temp_dir.path().join(".missing.tmp"),
            target: config_file.clone(),
        };
        staged.commit().await.unwrap();

        assert!(!config_file.exists());
        let reloaded = test_gate(&temp_dir);
        assert_eq!(reloaded.state(), AuthState::Uninitialized);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            AuthGate::load(&path),
            Err(VaultError::Serialization(_))
        ));
    }

    #[test]
    fn test_session_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let mut gate = test_gate(&temp_dir).with_idle_timeout(Duration::from_millis(50));

        assert!(gate.is_session_valid());

        std::thread::sleep(Duration::from_millis(80));
        assert!(!gate.is_session_valid());

        gate.update_activity();
        assert!(gate.is_session_valid());
    }

    #[test]
    fn test_default_idle_timeout_is_five_minutes() {
        let temp_dir = TempDir::new().unwrap();
        let gate = test_gate(&temp_dir);

        assert_eq!(gate.idle_timeout(), Duration::from_secs(300));
        assert!(gate.is_session_valid());
    }
}
