//! Identity → secret persistence.
//!
//! Exactly one secret per identity. `upsert` overwrites unconditionally, so
//! the newest secret supersedes every earlier one the moment it commits.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{QauthError, Result};
use crate::identity::Identity;
use crate::queue::{lock_exclusive, lock_shared, parent_dir};
use crate::secret::Secret;

/// Storage contract for per-identity secrets.
pub trait SecretStore: Send + Sync {
    /// Look up the current secret, or [`QauthError::NotFound`].
    fn get(&self, identity: &Identity) -> Result<Secret>;

    /// Insert or replace the secret for `identity`.
    fn upsert(&self, identity: &Identity, secret: Secret) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store, mainly for tests and ephemeral deployments.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<Identity, Secret>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.secrets.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, identity: &Identity) -> Result<Secret> {
        self.secrets
            .read()
            .unwrap()
            .get(identity)
            .cloned()
            .ok_or_else(|| QauthError::NotFound(identity.to_string()))
    }

    fn upsert(&self, identity: &Identity, secret: Secret) -> Result<()> {
        self.secrets
            .write()
            .unwrap()
            .insert(identity.clone(), secret);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Single-file JSON store
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    secrets: BTreeMap<String, String>,
}

const STORE_VERSION: u32 = 1;

/// Store backed by one JSON file, rewritten atomically on every upsert.
///
/// Upserts hold an exclusive lock on the `<path>.lock` sidecar, so handles
/// in different processes serialize too.
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreFile> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreFile {
                    version: STORE_VERSION,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e.into()),
        };
        let file: StoreFile = serde_json::from_str(&text)?;
        if file.version != STORE_VERSION {
            return Err(QauthError::Config(format!(
                "{} has store version {}, expected {STORE_VERSION}",
                self.path.display(),
                file.version
            )));
        }
        Ok(file)
    }

    fn write(&self, file: &StoreFile) -> Result<()> {
        let json = serde_json::to_string_pretty(file)?;
        let mut tmp = NamedTempFile::new_in(parent_dir(&self.path))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn get(&self, identity: &Identity) -> Result<Secret> {
        let _guard = lock_shared(&self.path)?;
        let file = self.read()?;
        let stored = file
            .secrets
            .get(identity.as_str())
            .ok_or_else(|| QauthError::NotFound(identity.to_string()))?;
        Secret::parse(stored)
    }

    fn upsert(&self, identity: &Identity, secret: Secret) -> Result<()> {
        let _guard = lock_exclusive(&self.path)?;
        let mut file = self.read()?;
        file.secrets
            .insert(identity.as_str().to_string(), secret.as_str().to_string());
        self.write(&file)
    }
}
