//! Encrypted export bundles
//!
//! Bundle format: `SPX1` magic followed by one AES-256-GCM message (see
//! [`crate::crypto::EncryptedData`]) whose plaintext is a JSON array of
//! [`CredentialRecord`] with secrets as plain text. The key is derived from
//! the master password with the export salt, never the storage salt.

use std::path::Path;
use tracing::{error, info};

use crate::credential::CredentialRecord;
use crate::crypto::{Encryptor, KeyDerivationParams, KeyPurpose};
use crate::error::{Result, VaultError};
use crate::storage::write_atomic;

const BUNDLE_MAGIC: &[u8; 4] = b"SPX1";

/// Export/import of credential snapshots under the export key
pub struct ExportBundle {
    encryptor: Encryptor,
}

impl ExportBundle {
    pub fn new(password: &str) -> Self {
        Self::with_params(password, KeyDerivationParams::default())
    }

    pub fn with_params(password: &str, params: KeyDerivationParams) -> Self {
        Self {
            encryptor: Encryptor::with_params(password, KeyPurpose::Export, params),
        }
    }

    /// Serialize and encrypt `records` into bundle bytes
    pub fn seal(&self, records: &[CredentialRecord]) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(records)?;
        let ciphertext = self.encryptor.encrypt(&json)?;

        let mut bundle = Vec::with_capacity(BUNDLE_MAGIC.len() + ciphertext.len());
        bundle.extend_from_slice(BUNDLE_MAGIC);
        bundle.extend_from_slice(&ciphertext);
        Ok(bundle)
    }

    /// Decrypt and parse bundle bytes. Any failure yields no records.
    pub fn unseal(&self, bundle: &[u8]) -> Result<Vec<CredentialRecord>> {
        let ciphertext = bundle
            .strip_prefix(BUNDLE_MAGIC.as_slice())
            .ok_or_else(|| VaultError::Import("not an export bundle".to_string()))?;

        let json = self.encryptor.decrypt(ciphertext).map_err(|_| {
            VaultError::Import(
                "bundle is corrupted or was exported under a different master password"
                    .to_string(),
            )
        })?;

        serde_json::from_slice(&json)
            .map_err(|e| VaultError::Import(format!("malformed bundle contents: {}", e)))
    }

    /// Write `records` to `destination`, replacing it atomically
    pub async fn export(&self, records: &[CredentialRecord], destination: &Path) -> Result<()> {
        let bundle = self.seal(records)?;

        if let Err(e) = write_atomic(destination, &bundle).await {
            error!("Export to {:?} failed: {}", destination, e);
            return Err(VaultError::Export(e.to_string()));
        }

        info!("Exported {} credentials to {:?}", records.len(), destination);
        Ok(())
    }

    /// Read and decrypt the bundle at `source`
    pub async fn import(&self, source: &Path) -> Result<Vec<CredentialRecord>> {
        let bundle = tokio::fs::read(source).await.map_err(|e| {
            error!("Import from {:?} failed: {}", source, e);
            VaultError::Import(e.to_string())
        })?;

        let records = self.unseal(&bundle).inspect_err(|e| {
            error!("Import from {:?} failed: {}", source, e);
        })?;

        info!("Imported {} credentials from {:?}", records.len(), source);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn fast() -> KeyDerivationParams {
        KeyDerivationParams { iterations: 1_000 }
    }

    fn sample_records() -> Vec<CredentialRecord> {
        let now = Utc::now();
        vec![
            CredentialRecord {
                id: 1,
                website: "example.com".to_string(),
                username: "a".to_string(),
                secret: "Sup3r$ecret".to_string(),
                category: Some("Work".to_string()),
                tags: None,
                created_at: now,
                updated_at: now,
            },
            CredentialRecord {
                id: 2,
                website: "mail.test".to_string(),
                username: "b".to_string(),
                secret: "pässwörd".to_string(),
                category: None,
                tags: Some("personal,mail".to_string()),
                created_at: now,
                updated_at: now,
            },
        ]
    }

    #[tokio::test]
    async fn test_export_import_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.enc");
        let bundle = ExportBundle::with_params("master-password", fast());
        let records = sample_records();

        bundle.export(&records, &path).await.unwrap();
        let imported = bundle.import(&path).await.unwrap();

        assert_eq!(imported, records);
    }

    #[tokio::test]
    async fn test_bundle_is_opaque() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.enc");
        let bundle = ExportBundle::with_params("master-password", fast());

        bundle.export(&sample_records(), &path).await.unwrap();
        let bytes = std::fs::read(&path).unwrap();

        assert!(bytes.starts_with(BUNDLE_MAGIC));
        let needles: [&[u8]; 3] = [b"Sup3r$ecret", b"example.com", b"website"];
        for needle in needles {
            assert!(!bytes.windows(needle.len()).any(|w| w == needle));
        }
    }

    #[tokio::test]
    async fn test_corrupted_byte_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.enc");
        let bundle = ExportBundle::with_params("master-password", fast());

        bundle.export(&sample_records(), &path).await.unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            bundle.import(&path).await,
            Err(VaultError::Import(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_master_password_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.enc");

        ExportBundle::with_params("first-password", fast())
            .export(&sample_records(), &path)
            .await
            .unwrap();

        let result = ExportBundle::with_params("second-password", fast())
            .import(&path)
            .await;
        assert!(matches!(result, Err(VaultError::Import(_))));
    }

    #[test]
    fn test_export_and_storage_keys_are_isolated() {
        let bundle = ExportBundle::with_params("master-password", fast());
        let storage =
            Encryptor::with_params("master-password", KeyPurpose::Storage, fast());

        let sealed = bundle.seal(&sample_records()).unwrap();
        assert!(storage.decrypt(&sealed[BUNDLE_MAGIC.len()..]).is_err());

        // A storage ciphertext dressed up as a bundle is rejected too
        let mut forged = BUNDLE_MAGIC.to_vec();
        forged.extend(storage.encrypt(b"[]").unwrap());
        assert!(matches!(bundle.unseal(&forged), Err(VaultError::Import(_))));
    }

    #[test]
    fn test_rejects_non_bundle_input() {
        let bundle = ExportBundle::with_params("master-password", fast());

        assert!(matches!(bundle.unseal(b""), Err(VaultError::Import(_))));
        assert!(matches!(bundle.unseal(b"[{\"id\":1}]"), Err(VaultError::Import(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_import_error() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = ExportBundle::with_params("master-password", fast());

        let result = bundle.import(&temp_dir.path().join("nope.enc")).await;
        assert!(matches!(result, Err(VaultError::Import(_))));
    }

    #[tokio::test]
    async fn test_export_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = ExportBundle::with_params("master-password", fast());

        let result = bundle
            .export(&sample_records(), &temp_dir.path().join("no/such/dir.enc"))
            .await;
        assert!(matches!(result, Err(VaultError::Export(_))));
    }

    #[test]
    fn test_bundle_json_field_names() {
        let json = serde_json::to_value(&sample_records()[0]).unwrap();

        assert_eq!(json["password"], "Sup3r$ecret");
        assert_eq!(json["website"], "example.com");
        assert!(json.get("secret").is_none());
    }
}
