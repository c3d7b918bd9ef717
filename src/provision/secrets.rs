// ABOUTME: Secret store collaborator trait and a file-backed implementation.
// ABOUTME: Secrets are generated once and fetched on every later run.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("secret store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Secret store collaborator. `put` on an existing name is a success and
/// leaves the stored value untouched, so re-runs never rotate credentials
/// out from under already-running services.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretError>;
    async fn get(&self, name: &str) -> Result<Option<String>, SecretError>;
}

/// Generate a fresh secret value. Callers must persist it before use.
pub fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LENGTH)
        .map(char::from)
        .collect()
}

/// JSON-file-backed secret store under the state directory. Suitable for a
/// single operator host; swap in a real secret manager via the trait.
pub struct FileSecretStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within one process.
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, SecretError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_all(&self, secrets: &HashMap<String, String>) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(secrets)?;
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn put(&self, name: &str, value: &str) -> Result<(), SecretError> {
        let _guard = self.lock.lock();
        let mut secrets = self.read_all()?;
        if secrets.contains_key(name) {
            // Already exists: not an error, keep the stored value.
            return Ok(());
        }
        secrets.insert(name.to_string(), value.to_string());
        self.write_all(&secrets)
    }

    async fn get(&self, name: &str) -> Result<Option<String>, SecretError> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.get(name).cloned())
    }
}
