//! Compute-Once Cache
//!
//! Each entry is addressed by a [`CacheKey`]: the session it belongs to and a
//! field name inside that session. [`Cache::get_or_compute`] loads the entry if
//! it exists and otherwise computes, saves and returns it.

use crate::backend::Backend;
use crate::codec::Codec;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Errors from cache operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Session identity or field name unusable as a key
    #[error("invalid cache key component {0:?}")]
    InvalidKey(String),

    /// Backend I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized
    #[error("failed to encode value: {0}")]
    Encode(String),

    /// Stored bytes could not be deserialized
    #[error("failed to decode value: {0}")]
    Decode(String),
}

fn check_component(part: &str) -> Result<(), StoreError> {
    let bad = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidKey(part.to_string()));
    }
    Ok(())
}

/// Opaque identity of one benchmark session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Validate and wrap a session identity
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        check_component(&id)?;
        Ok(Self(id))
    }

    /// The identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// (session, field) address of one cached value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    session: SessionId,
    field: String,
}

impl CacheKey {
    /// Build a key; the field name follows the same rules as session identities
    pub fn new(session: &SessionId, field: impl Into<String>) -> Result<Self, StoreError> {
        let field = field.into();
        check_component(&field)?;
        Ok(Self {
            session: session.clone(),
            field,
        })
    }

    /// Owning session
    pub fn session(&self) -> &SessionId {
        &self.session
    }

    /// Field name
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session, self.field)
    }
}

/// Key-value cache over a backend and a codec
#[derive(Debug, Clone)]
pub struct Cache<B, C> {
    backend: B,
    codec: C,
}

impl<B: Backend, C: Codec> Cache<B, C> {
    /// Wrap a backend with a codec
    pub fn new(backend: B, codec: C) -> Self {
        Self { backend, codec }
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load a value if present
    pub fn load<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, StoreError> {
        match self.backend.read(key, self.codec.extension())? {
            Some(bytes) => {
                debug!(%key, bytes = bytes.len(), "cache hit");
                self.codec.decode(&bytes).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Store a value, replacing any previous one
    pub fn save<T: Serialize>(&mut self, key: &CacheKey, value: &T) -> Result<(), StoreError> {
        let bytes = self.codec.encode(value)?;
        debug!(%key, bytes = bytes.len(), "cache save");
        self.backend.write(key, self.codec.extension(), &bytes)
    }

    /// Whether a value is stored under `key`
    pub fn contains(&self, key: &CacheKey) -> Result<bool, StoreError> {
        Ok(self.backend.read(key, self.codec.extension())?.is_some())
    }

    /// Drop the value under `key`; returns whether one existed
    pub fn invalidate(&mut self, key: &CacheKey) -> Result<bool, StoreError> {
        self.backend.remove(key, self.codec.extension())
    }

    /// Load the value under `key`, or compute, save and return it
    pub fn get_or_compute<T, F>(&mut self, key: &CacheKey, compute: F) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        self.try_get_or_compute(key, || Ok::<T, StoreError>(compute()))
    }

    /// Fallible [`get_or_compute`](Self::get_or_compute); nothing is saved on error
    pub fn try_get_or_compute<T, E, F>(&mut self, key: &CacheKey, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StoreError>,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.load(key)? {
            return Ok(value);
        }
        let value = compute()?;
        self.save(key, &value)?;
        Ok(value)
    }
}
