//! Key-value blob backends for the result log

use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Durable slot holding one opaque string per key.
///
/// Writes replace the whole blob; there are no partial updates.
pub trait BlobStore: Send + Sync {
    /// Read the blob stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Replace the blob stored under `key`
    fn save(&self, key: &str, blob: &str) -> Result<()>;

    /// Delete the blob stored under `key`; missing keys are not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn ensure_directory(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| {
                AppError::storage(format!("Failed to create data directory '{}': {}", self.dir.display(), e))
            })?;
        }
        Ok(())
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| AppError::storage(format!("Failed to read '{}': {}", path.display(), e)))
    }

    fn save(&self, key: &str, blob: &str) -> Result<()> {
        self.ensure_directory()?;

        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));

        // Write aside then rename so readers never observe a half-written blob
        fs::write(&tmp, blob)
            .map_err(|e| AppError::storage(format!("Failed to write '{}': {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).map_err(|e| {
            AppError::storage(format!("Failed to replace '{}': {}", path.display(), e))
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| AppError::storage(format!("Failed to remove '{}': {}", path.display(), e)))?;
        }
        Ok(())
    }
}

/// In-process backend; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with one blob
    pub fn with_blob(key: &str, blob: &str) -> Self {
        let store = Self::new();
        store.lock().insert(key.to_string(), blob.to_string());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<()> {
        self.lock().insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}
