//! Key/value backends for persisted records.

use crate::store::StoreError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A string-valued record store.
pub trait StorageBackend: Send {
    /// Read a record, `None` when it was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace a record.
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a record if present.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// One JSON file per record inside a data directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write-then-rename so a crash never leaves a truncated record
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Volatile backend for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("nested"));

        assert_eq!(backend.read("profile").unwrap(), None);
        backend.write("profile", "{}").unwrap();
        assert_eq!(backend.read("profile").unwrap().as_deref(), Some("{}"));
        assert!(dir.path().join("nested").join("profile.json").exists());

        backend.remove("profile").unwrap();
        assert_eq!(backend.read("profile").unwrap(), None);
    }

    #[test]
    fn test_memory_backend_overwrites() {
        let mut backend = MemoryBackend::new();
        backend.write("k", "1").unwrap();
        backend.write("k", "2").unwrap();
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("2"));
    }
}
