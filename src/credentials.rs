use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

/// File name of the credential record inside the storage directory
pub const CREDENTIAL_FILE: &str = "laundrify-official.json";

/// Pairing state persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Version of the client that last wrote the record. `None` means the
    /// record predates version tracking.
    #[serde(default, alias = "schemaVersion", skip_serializing_if = "Option::is_none")]
    pub plugin_version: Option<String>,
    #[serde(default)]
    pub auth_code: String,
    /// Empty when the client is not registered
    #[serde(default)]
    pub access_token: String,
}

impl CredentialRecord {
    pub fn has_token(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// Owns the credential record, both on disk and in memory.
///
/// Every mutation goes through [`CredentialStore::save`], so the in-memory
/// copy and the file never diverge for longer than a failed write.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    record: Mutex<CredentialRecord>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            record: Mutex::new(CredentialRecord::default()),
        }
    }

    /// Store backed by the fixed credential file name inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CREDENTIAL_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, CredentialRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the record from disk and make it the current in-memory record.
    ///
    /// Returns `ConfigNotFound` when the file doesn't exist (first run) and
    /// `ConfigRead` for any other I/O or parse failure. Neither replaces the
    /// in-memory record.
    pub fn load(&self) -> Result<CredentialRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(
                    "Credential file ({}) doesn't exist - will be created on init",
                    self.path.display()
                );
                return Err(Error::ConfigNotFound(self.path.clone()));
            }
            Err(err) => {
                return Err(Error::ConfigRead {
                    path: self.path.clone(),
                    reason: err.to_string(),
                })
            }
        };

        let record: CredentialRecord =
            serde_json::from_str(&content).map_err(|err| Error::ConfigRead {
                path: self.path.clone(),
                reason: err.to_string(),
            })?;

        debug!(
            "Read credentials from {} (version: {:?}, registered: {})",
            self.path.display(),
            record.plugin_version,
            record.has_token()
        );

        *self.lock() = record.clone();
        Ok(record)
    }

    /// Stamp `updated_at`, make `record` current and write it to disk.
    ///
    /// The in-memory record is updated even if the write fails.
    pub fn save(&self, mut record: CredentialRecord) -> Result<()> {
        record.updated_at = Some(Utc::now());
        *self.lock() = record.clone();
        self.write(&record)
    }

    /// Like [`save`](Self::save) but only logs a write failure.
    pub fn persist(&self, record: CredentialRecord) {
        if let Err(err) = self.save(record) {
            error!("{}", err);
        }
    }

    /// Snapshot of the in-memory record
    pub fn current(&self) -> CredentialRecord {
        self.lock().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        let record = self.lock();
        record.has_token().then(|| record.access_token.clone())
    }

    /// Forget the access token and persist the change (best-effort).
    pub fn clear_access_token(&self) {
        let mut record = self.current();
        record.access_token.clear();
        self.persist(record);
    }

    /// Store a freshly issued access token and persist it (best-effort).
    pub fn set_access_token(&self, token: &str) {
        let mut record = self.current();
        record.access_token = token.to_string();
        self.persist(record);
    }

    /// Delete the credential file and reset the in-memory record
    pub fn remove(&self) -> Result<()> {
        *self.lock() = CredentialRecord::default();

        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Credential file {} removed", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("Credential file does not exist, nothing to remove");
                Ok(())
            }
            Err(err) => Err(Error::ConfigWrite {
                path: self.path.clone(),
                reason: err.to_string(),
            }),
        }
    }

    fn write(&self, record: &CredentialRecord) -> Result<()> {
        let write_err = |err: io::Error| Error::ConfigWrite {
            path: self.path.clone(),
            reason: err.to_string(),
        };

        let content = serde_json::to_string_pretty(record).map_err(|err| Error::ConfigWrite {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        // Write next to the target and rename over it so readers never see a partial file
        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        if let Err(err) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(err));
        }

        debug!("Credentials have been written to {}", self.path.display());
        Ok(())
    }
}
