//! SQLite-backed credential store
//!
//! Website, username, category and tags are stored in plaintext so they can be
//! searched and sorted. The password column only ever holds ciphertext: every
//! write encrypts through the store's [`Encryptor`] and every read decrypts
//! before a record leaves this module.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::category_cache::CategoryCache;
use super::types::{CredentialRecord, CredentialUpdate, NewCredential};
use crate::crypto::Encryptor;
use crate::error::{Result, VaultError};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS passwords (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        website TEXT NOT NULL,
        username TEXT NOT NULL,
        password BLOB NOT NULL,
        category TEXT,
        tags TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_passwords_updated_at ON passwords(updated_at DESC);

    -- No foreign key from passwords.category: deleting a category leaves
    -- records that name it untouched.
    CREATE TABLE IF NOT EXISTS categories (
        name TEXT PRIMARY KEY
    );
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, website, username, password, category, tags, created_at, updated_at FROM passwords";

/// Row as stored, before the secret is decrypted
struct StoredRow {
    id: i64,
    website: String,
    username: String,
    ciphertext: Vec<u8>,
    category: Option<String>,
    tags: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            website: row.get(1)?,
            username: row.get(2)?,
            ciphertext: row.get(3)?,
            category: row.get(4)?,
            tags: row.get(5)?,
            created_at: parse_timestamp(row, 6)?,
            updated_at: parse_timestamp(row, 7)?,
        })
    }

    fn decrypt(self, encryptor: &Encryptor) -> Result<CredentialRecord> {
        Ok(CredentialRecord {
            id: self.id,
            website: self.website,
            username: self.username,
            secret: encryptor.decrypt_str(&self.ciphertext)?,
            category: self.category,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Fixed-width UTC timestamps so `ORDER BY updated_at` is chronological
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Escape `%`, `_` and `\` so the query is matched as a literal substring
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(VaultError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Credential store over one long-lived SQLite connection.
///
/// Cloning is cheap and shares the connection, encryptor and category cache,
/// so a clone can be handed to a blocking worker.
#[derive(Clone)]
pub struct CredentialStore {
    conn: Arc<Mutex<Connection>>,
    encryptor: Arc<Encryptor>,
    categories: Arc<CategoryCache>,
}

impl CredentialStore {
    /// Take ownership of an open connection and ensure the schema exists
    pub fn new(conn: Connection, encryptor: Encryptor) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = DELETE;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -2000;",
        )?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            encryptor: Arc::new(encryptor),
            categories: Arc::new(CategoryCache::new()),
        })
    }

    /// Open or create the vault file at `path`
    pub fn open(path: &Path, encryptor: Encryptor) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!("Opened vault file {:?}", path);
        Self::new(conn, encryptor)
    }

    /// Open an in-memory vault (for testing)
    pub fn open_in_memory(encryptor: Encryptor) -> Result<Self> {
        Self::new(Connection::open_in_memory()?, encryptor)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| VaultError::StoragePoisoned)
    }

    /// Encrypt the secret, stamp both timestamps and insert. Returns the new id.
    pub fn add(&self, credential: &NewCredential) -> Result<i64> {
        require_non_empty("website", &credential.website)?;
        require_non_empty("username", &credential.username)?;

        let ciphertext = self.encryptor.encrypt_str(&credential.secret)?;
        let now = format_timestamp(&Utc::now());

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO passwords (website, username, password, category, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                credential.website,
                credential.username,
                ciphertext,
                credential.category,
                credential.tags,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Added credential {}", id);
        Ok(id)
    }

    /// Insert many credentials in one transaction, registering any category
    /// they name. Returns the new ids in input order.
    pub fn add_many(&self, credentials: &[NewCredential]) -> Result<Vec<i64>> {
        for credential in credentials {
            require_non_empty("website", &credential.website)?;
            require_non_empty("username", &credential.username)?;
        }

        let encrypted = credentials
            .iter()
            .map(|c| self.encryptor.encrypt_str(&c.secret))
            .collect::<Result<Vec<_>>>()?;
        let now = format_timestamp(&Utc::now());

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(credentials.len());
        {
            let mut insert = tx.prepare(
                "INSERT INTO passwords (website, username, password, category, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            )?;
            let mut add_category = tx.prepare("INSERT OR IGNORE INTO categories (name) VALUES (?1)")?;

            for (credential, ciphertext) in credentials.iter().zip(&encrypted) {
                insert.execute(params![
                    credential.website,
                    credential.username,
                    ciphertext,
                    credential.category,
                    credential.tags,
                    now,
                ])?;
                ids.push(tx.last_insert_rowid());

                if let Some(category) = credential.category.as_deref().filter(|c| !c.is_empty()) {
                    add_category.execute(params![category])?;
                }
            }
        }
        tx.commit()?;
        self.categories.invalidate();

        info!("Added {} credentials", ids.len());
        Ok(ids)
    }

    pub fn get(&self, id: i64) -> Result<Option<CredentialRecord>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                StoredRow::from_row,
            )
            .optional()?
        };

        row.map(|row| row.decrypt(&self.encryptor)).transpose()
    }

    /// Case-insensitive substring match on website, username, category or
    /// tags, most recently updated first. An empty query matches everything.
    pub fn search(&self, query: &str) -> Result<Vec<CredentialRecord>> {
        let sql = format!(
            r#"{} WHERE LOWER(website) LIKE LOWER(?1) ESCAPE '\'
                  OR LOWER(username) LIKE LOWER(?1) ESCAPE '\'
                  OR LOWER(category) LIKE LOWER(?1) ESCAPE '\'
                  OR LOWER(tags) LIKE LOWER(?1) ESCAPE '\'
               ORDER BY updated_at DESC, id DESC"#,
            SELECT_COLUMNS
        );
        let pattern = like_pattern(query);

        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![pattern], StoredRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        self.decrypt_all(rows)
    }

    /// Credentials whose category is exactly `category`, most recently
    /// updated first
    pub fn list_by_category(&self, category: &str) -> Result<Vec<CredentialRecord>> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "{} WHERE category = ?1 ORDER BY updated_at DESC, id DESC",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![category], StoredRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        self.decrypt_all(rows)
    }

    /// Every credential, most recently updated first
    pub fn get_all(&self) -> Result<Vec<CredentialRecord>> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt =
                conn.prepare(&format!("{} ORDER BY updated_at DESC, id DESC", SELECT_COLUMNS))?;
            let rows = stmt
                .query_map([], StoredRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        self.decrypt_all(rows)
    }

    fn decrypt_all(&self, rows: Vec<StoredRow>) -> Result<Vec<CredentialRecord>> {
        rows.into_iter()
            .map(|row| row.decrypt(&self.encryptor))
            .collect()
    }

    /// Apply the provided fields and refresh `updated_at`.
    ///
    /// Fails with `NotFound` when no credential has this id.
    pub fn update(&self, id: i64, update: &CredentialUpdate) -> Result<()> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(website) = &update.website {
            require_non_empty("website", website)?;
            assignments.push("website = ?");
            values.push(Value::Text(website.clone()));
        }
        if let Some(username) = &update.username {
            require_non_empty("username", username)?;
            assignments.push("username = ?");
            values.push(Value::Text(username.clone()));
        }
        if let Some(secret) = &update.secret {
            assignments.push("password = ?");
            values.push(Value::Blob(self.encryptor.encrypt_str(secret)?));
        }
        if let Some(category) = &update.category {
            assignments.push("category = ?");
            values.push(category.clone().map_or(Value::Null, Value::Text));
        }
        if let Some(tags) = &update.tags {
            assignments.push("tags = ?");
            values.push(tags.clone().map_or(Value::Null, Value::Text));
        }

        assignments.push("updated_at = ?");
        values.push(Value::Text(format_timestamp(&Utc::now())));
        values.push(Value::Integer(id));

        let sql = format!("UPDATE passwords SET {} WHERE id = ?", assignments.join(", "));

        let changed = self.conn()?.execute(&sql, params_from_iter(values.iter()))?;
        if changed == 0 {
            return Err(VaultError::NotFound(id));
        }

        debug!("Updated credential {}", id);
        Ok(())
    }

    /// Remove a credential. Deleting a missing id is not an error.
    pub fn delete(&self, id: i64) -> Result<()> {
        let removed = self
            .conn()?
            .execute("DELETE FROM passwords WHERE id = ?1", params![id])?;

        debug!("Deleted credential {} ({} rows)", id, removed);
        Ok(())
    }

    /// Delete every credential and every category in one transaction
    pub fn reset_all(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let credentials = tx.execute("DELETE FROM passwords", [])?;
        let categories = tx.execute("DELETE FROM categories", [])?;
        tx.commit()?;
        self.categories.invalidate();

        info!(
            "Vault reset: removed {} credentials and {} categories",
            credentials, categories
        );
        Ok(())
    }

    /// Returns `false` if the category already exists
    pub fn add_category(&self, name: &str) -> Result<bool> {
        require_non_empty("category", name)?;

        let conn = self.conn()?;
        let added = match conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name]) {
            Ok(_) => true,
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                false
            }
            Err(e) => return Err(e.into()),
        };
        self.categories.invalidate();

        debug!("Add category {:?}: {}", name, added);
        Ok(added)
    }

    /// Remove a category name. Records that reference it are left as they are.
    pub fn delete_category(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM categories WHERE name = ?1", params![name])?;
        self.categories.invalidate();

        debug!("Deleted category {:?}", name);
        Ok(())
    }

    /// Category names in ascending order, served from the cache when warm
    pub fn list_categories(&self) -> Result<Vec<String>> {
        if let Some(names) = self.categories.get() {
            return Ok(names);
        }

        // Populate under the connection lock so a concurrent mutation cannot
        // invalidate between our read and our put.
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM categories ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        self.categories.put(names.clone());

        Ok(names)
    }
}
