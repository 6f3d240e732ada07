//! Local keyed cache for canvas documents.
//!
//! Writes are synchronous and keyed per project. The cache holds serialized
//! JSON so that backends never need to understand the document schema.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use memory::MemoryCache;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileCache;

use crate::canvas::CanvasDocument;
use thiserror::Error;

/// Namespace prefix for cache keys.
pub const CACHE_KEY_PREFIX: &str = "infinidraw:project:";

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage quota exceeded while writing {0}")]
    QuotaExceeded(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// The cache key for a project's document.
pub fn cache_key(project_id: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{project_id}")
}

/// A synchronous key-value cache.
pub trait LocalCache {
    /// Read a value. Absent keys are `Ok(None)`.
    fn read(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// All keys currently stored.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Drop up to `count` of the least recently written entries. Returns the evicted keys.
    fn evict_oldest(&self, count: usize) -> StorageResult<Vec<String>>;

    /// Serialize and store a project's document.
    fn save_document(&self, project_id: &str, document: &CanvasDocument) -> StorageResult<()> {
        let json = document
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.write(&cache_key(project_id), &json)
    }

    /// Load a project's document, if cached.
    fn load_document(&self, project_id: &str) -> StorageResult<Option<CanvasDocument>> {
        let Some(json) = self.read(&cache_key(project_id))? else {
            return Ok(None);
        };
        CanvasDocument::from_json(&json)
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("Failed to parse {project_id}: {e}")))
    }
}
