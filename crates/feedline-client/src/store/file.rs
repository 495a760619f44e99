use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::{StorageBackend, StoreError};

/// Backend persisting all entries as one JSON object on disk.
///
/// Every mutation rewrites the file through a temporary sibling and a rename,
/// so a crash mid-write leaves the previous contents intact. A missing file
/// reads as empty.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Credential file written");
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock();
        let mut entries = self.load()?;
        if f(&mut entries) {
            self.save(&entries)?;
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CredentialStore, StorageKey};
    use std::sync::Arc;

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("session.json"));
        assert_eq!(backend.get("access").unwrap(), None);
        backend.remove("access").unwrap();
        assert!(!backend.path().exists());
    }

    #[test]
    fn test_values_survive_a_new_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = CredentialStore::new(Arc::new(FileBackend::new(&path)));
        store.set(StorageKey::Access, "a1");
        store.set(StorageKey::Username, "ana");

        let reopened = CredentialStore::new(Arc::new(FileBackend::new(&path)));
        assert_eq!(reopened.get(StorageKey::Access).as_deref(), Some("a1"));
        assert_eq!(reopened.get(StorageKey::Username).as_deref(), Some("ana"));

        reopened.clear();
        assert_eq!(store.get(StorageKey::Access), None);
    }

    #[test]
    fn test_corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{not json").unwrap();

        let backend = FileBackend::new(&path);
        assert!(matches!(backend.get("access"), Err(StoreError::Json(_))));

        let store = CredentialStore::new(Arc::new(backend));
        assert_eq!(store.get(StorageKey::Access), None);
    }
}
