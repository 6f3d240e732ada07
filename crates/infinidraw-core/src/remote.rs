//! Remote document store contract.
//!
//! The remote store is the authoritative copy of each project. Calls are
//! async and return boxed futures so that web and native backends can share
//! one trait.

use crate::canvas::CanvasDocument;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Remote store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Not authorized")]
    Unauthorized,
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RemoteError {
    /// Network and timeout failures may succeed on retry; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Network(_) | RemoteError::Timeout)
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The authoritative store.
pub trait RemoteStore {
    /// Fetch a project's document. `Ok(None)` covers both "no document" and
    /// "not allowed to read it".
    fn load_document(&self, project_id: &str) -> BoxFuture<'_, RemoteResult<Option<CanvasDocument>>>;

    /// Replace a project's document.
    fn save_document(&self, project_id: &str, document: &CanvasDocument) -> BoxFuture<'_, RemoteResult<()>>;
}

/// In-process remote store for tests and offline use.
///
/// Documents pass through JSON on save, like a real backend. Failures can be
/// scripted with [`MemoryRemote::fail_next`].
#[derive(Debug, Default)]
pub struct MemoryRemote {
    documents: RwLock<HashMap<String, String>>,
    failures: Mutex<VecDeque<RemoteError>>,
    saves: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with `error`. Calls queue up in order.
    pub fn fail_next(&self, error: RemoteError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Seed a stored document directly.
    pub fn insert(&self, project_id: &str, document: &CanvasDocument) -> RemoteResult<()> {
        let json = document
            .to_json()
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        self.documents
            .write()
            .map_err(|e| RemoteError::Network(format!("Lock error: {e}")))?
            .insert(project_id.to_string(), json);
        Ok(())
    }

    /// The stored document, if any.
    pub fn get(&self, project_id: &str) -> RemoteResult<Option<CanvasDocument>> {
        let docs = self
            .documents
            .read()
            .map_err(|e| RemoteError::Network(format!("Lock error: {e}")))?;
        docs.get(project_id)
            .map(|json| {
                CanvasDocument::from_json(json).map_err(|e| RemoteError::Serialization(e.to_string()))
            })
            .transpose()
    }

    fn take_failure(&self) -> RemoteResult<()> {
        let next = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        match next {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteStore for MemoryRemote {
    fn load_document(&self, project_id: &str) -> BoxFuture<'_, RemoteResult<Option<CanvasDocument>>> {
        let project_id = project_id.to_string();
        Box::pin(async move {
            self.take_failure()?;
            self.get(&project_id)
        })
    }

    fn save_document(&self, project_id: &str, document: &CanvasDocument) -> BoxFuture<'_, RemoteResult<()>> {
        let project_id = project_id.to_string();
        let document = document.clone();
        Box::pin(async move {
            self.take_failure()?;
            self.insert(&project_id, &document)?;
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}
