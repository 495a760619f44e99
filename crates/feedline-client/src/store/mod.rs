//! Durable credential storage.
//!
//! [`CredentialStore`] is a small key/value map holding the session mirror:
//! access token, refresh token, username and avatar reference. Backends are
//! fallible; the store wrapper is not. Any backend failure is logged and
//! treated as an absent value or a no-op so that storage problems never
//! reach the caller.

mod file;
mod memory;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Keys of the persisted session entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Access,
    Refresh,
    Username,
    ProfilePicture,
}

impl StorageKey {
    /// Every key, in the order they are cleared.
    pub const ALL: [StorageKey; 4] = [
        StorageKey::Access,
        StorageKey::Refresh,
        StorageKey::Username,
        StorageKey::ProfilePicture,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::Username => "username",
            Self::ProfilePicture => "profile_picture",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A fallible string key/value backend.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Infallible credential store over a [`StorageBackend`].
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn StorageBackend>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn get(&self, key: StorageKey) -> Option<String> {
        match self.backend.get(key.as_str()) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read credential store");
                None
            }
        }
    }

    pub fn set(&self, key: StorageKey, value: &str) {
        if let Err(e) = self.backend.set(key.as_str(), value) {
            warn!(key = %key, error = %e, "Failed to write credential store");
        }
    }

    pub fn remove(&self, key: StorageKey) {
        if let Err(e) = self.backend.remove(key.as_str()) {
            warn!(key = %key, error = %e, "Failed to remove credential store key");
        }
    }

    /// Remove every session key.
    pub fn clear(&self) {
        for key in StorageKey::ALL {
            self.remove(key);
        }
    }

    /// Whether an access token is stored.
    #[inline]
    pub fn has_access_token(&self) -> bool {
        self.get(StorageKey::Access).is_some()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
