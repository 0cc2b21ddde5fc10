//! Storage Backends

use crate::cache::{CacheKey, StoreError};
use fxhash::FxHashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Byte storage addressed by cache key and codec extension
pub trait Backend {
    /// Stored bytes, or `None` if absent
    fn read(&self, key: &CacheKey, extension: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store bytes, replacing any previous entry
    fn write(&mut self, key: &CacheKey, extension: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Delete an entry; returns whether it existed
    fn remove(&mut self, key: &CacheKey, extension: &str) -> Result<bool, StoreError>;
}

/// In-process map; contents die with the process
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: FxHashMap<(CacheKey, String), Vec<u8>>,
}

impl MemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &CacheKey, extension: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .get(&(key.clone(), extension.to_string()))
            .cloned())
    }

    fn write(&mut self, key: &CacheKey, extension: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.entries
            .insert((key.clone(), extension.to_string()), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey, extension: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .remove(&(key.clone(), extension.to_string()))
            .is_some())
    }
}

/// Files under a root directory: `<root>/<session>/<field>.<extension>`.
///
/// Writes go to a temporary sibling first and are renamed into place, so an
/// interrupted write leaves the previous entry intact.
#[derive(Debug, Clone)]
pub struct DirBackend {
    root: PathBuf,
}

impl DirBackend {
    /// Backend rooted at `root` (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding `key`
    pub fn path_for(&self, key: &CacheKey, extension: &str) -> PathBuf {
        self.root
            .join(key.session().as_str())
            .join(format!("{}.{}", key.field(), extension))
    }
}

impl Backend for DirBackend {
    fn read(&self, key: &CacheKey, extension: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key, extension)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &CacheKey, extension: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key, extension);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension(format!("{extension}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey, extension: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(key, extension)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
