//! Credential storage: device identity, bearer token, and the cached
//! encryption session.
//!
//! Stores are synchronous; both built-in implementations complete in
//! microseconds and are only touched at stream setup, never per frame.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use wave::Session;

use crate::error::{AsrError, Result};

/// Everything the client must persist to speak on behalf of one device.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Registered device identifier.
    pub device_id: String,
    /// Bearer token carried on streaming requests.
    pub token: String,
    /// Cached encryption session from the last successful handshake, so
    /// a restarted process can skip the key exchange until expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("device_id", &self.device_id)
            .field("token", &"[REDACTED]")
            .field("session", &self.session)
            .finish()
    }
}

/// Pluggable persistence for [`Credential`]s.
pub trait CredentialStore: Send + Sync {
    /// Loads the stored credential, if any.
    fn load(&self) -> Result<Option<Credential>>;

    /// Persists the credential, replacing any previous one.
    fn save(&self, credential: &Credential) -> Result<()>;
}

/// In-memory store; credentials die with the process.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with a credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| AsrError::CredentialStore("store lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| AsrError::CredentialStore("store lock poisoned".to_string()))?;
        *guard = Some(credential.clone());
        Ok(())
    }
}

/// JSON file store.
///
/// A missing file reads as no credential; parent directories are created
/// on first save.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Creates a store backed by the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at the conventional per-user config location,
    /// e.g. `~/.config/doubao-asr/credentials.json` on Linux.
    pub fn default_path() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            AsrError::CredentialStore("no user config directory available".to_string())
        })?;
        Ok(Self::new(base.join("doubao-asr").join("credentials.json")))
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AsrError::CredentialStore(err.to_string())),
        };

        let credential = serde_json::from_str(&data)
            .map_err(|e| AsrError::CredentialStore(format!("corrupt credential file: {e}")))?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AsrError::CredentialStore(e.to_string()))?;
        }

        let data = serde_json::to_string_pretty(credential)
            .map_err(|e| AsrError::CredentialStore(e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| AsrError::CredentialStore(e.to_string()))
    }
}
