//! Persistence: debounced local cache writes and remote sync.
//!
//! Two write paths hang off the same change stream. A change schedules a
//! local write after a short debounce; a successful local write marks the
//! state dirty and schedules a remote write after a longer one. Remote
//! failures are classified and retried with exponential backoff. Nothing
//! here ever blocks or reverts editing: failures only show up through
//! [`SaveStatus`] and [`PersistenceSync::last_error`].

use crate::canvas::CanvasDocument;
use crate::config::SyncConfig;
use crate::input::Instant;
use crate::remote::{RemoteError, RemoteStore};
use crate::storage::{LocalCache, StorageError, StorageResult};
use thiserror::Error;

/// User-facing save status. Later variants take priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SaveStatus {
    Saved,
    Saving,
    Offline,
    Error,
}

/// Why persistence is unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Remote sync failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("Local cache failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Remote sync gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: RemoteError },
}

/// Which copy a loaded document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentSource {
    Local,
    Remote,
}

/// Pick the newer snapshot. Ties go to the local copy.
pub fn resolve_conflict(
    local: Option<&CanvasDocument>,
    remote: Option<&CanvasDocument>,
) -> Option<DocumentSource> {
    match (local, remote) {
        (None, None) => None,
        (Some(_), None) => Some(DocumentSource::Local),
        (None, Some(_)) => Some(DocumentSource::Remote),
        (Some(l), Some(r)) if r.last_modified > l.last_modified => Some(DocumentSource::Remote),
        (Some(_), Some(_)) => Some(DocumentSource::Local),
    }
}

/// Drives the local and remote write paths for one project.
pub struct PersistenceSync<L: LocalCache, R: RemoteStore> {
    project_id: String,
    config: SyncConfig,
    local: L,
    remote: R,
    /// When the pending local write is due.
    local_due: Option<Instant>,
    /// When the pending remote write is due. Only meaningful while dirty.
    remote_due: Option<Instant>,
    /// The remote copy is behind the local one.
    dirty: bool,
    /// Failed remote attempts since the last success.
    attempts: u32,
    /// Remote sync stopped until [`retry_now`](Self::retry_now).
    halted: bool,
    online: bool,
    last_error: Option<SyncError>,
    observed_revision: Option<u64>,
}

impl<L: LocalCache, R: RemoteStore> PersistenceSync<L, R> {
    pub fn new(project_id: impl Into<String>, local: L, remote: R, config: SyncConfig) -> Self {
        Self {
            project_id: project_id.into(),
            config,
            local,
            remote,
            local_due: None,
            remote_due: None,
            dirty: false,
            attempts: 0,
            halted: false,
            online: true,
            last_error: None,
            observed_revision: None,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Whether the remote copy is known to be behind.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    pub fn status(&self) -> SaveStatus {
        if self.last_error.is_some() {
            SaveStatus::Error
        } else if !self.online {
            SaveStatus::Offline
        } else if self.local_due.is_some() || self.dirty {
            SaveStatus::Saving
        } else {
            SaveStatus::Saved
        }
    }

    /// The earliest time [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let remote = self.remote_due.filter(|_| self.remote_ready());
        match (self.local_due, remote) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn remote_ready(&self) -> bool {
        self.dirty && self.online && !self.halted
    }

    /// Record a state change; restarts the local debounce.
    pub fn note_change(&mut self, now: Instant) {
        self.local_due = Some(now + self.config.local_debounce());
    }

    /// Record a change if `revision` differs from the last one seen.
    pub fn observe(&mut self, revision: u64, now: Instant) {
        if self.observed_revision.replace(revision).is_some_and(|seen| seen != revision) {
            self.note_change(now);
        }
    }

    /// Connectivity changed. Coming back online flushes any queued sync.
    pub fn set_online(&mut self, online: bool, now: Instant) {
        if self.online == online {
            return;
        }
        self.online = online;
        if online {
            log::info!("back online");
            if self.dirty {
                self.remote_due = Some(now);
            }
        } else {
            log::info!("offline, remote sync suspended");
        }
    }

    /// Manual retry after a terminal failure or exhausted retries.
    pub fn retry_now(&mut self, now: Instant) {
        self.halted = false;
        self.attempts = 0;
        self.last_error = None;
        if self.dirty {
            self.remote_due = Some(now);
        }
    }

    /// Run whatever writes are due at `now`.
    pub async fn poll(&mut self, document: &CanvasDocument, now: Instant) {
        if self.local_due.is_some_and(|due| due <= now) {
            self.local_due = None;
            match self.write_local(document) {
                Ok(()) => {
                    if matches!(self.last_error, Some(SyncError::Storage(_))) {
                        self.last_error = None;
                    }
                }
                Err(e) => {
                    log::warn!("local cache write failed for {}: {e}", self.project_id);
                    self.last_error = Some(SyncError::Storage(e));
                }
            }
            // The remote copy is behind either way
            self.dirty = true;
            self.remote_due = Some(now + self.config.remote_debounce());
        }

        if self.remote_ready() && self.remote_due.is_some_and(|due| due <= now) {
            self.sync_remote(document, now).await;
        }
    }

    fn write_local(&self, document: &CanvasDocument) -> StorageResult<()> {
        match self.local.save_document(&self.project_id, document) {
            Err(StorageError::QuotaExceeded(key)) => {
                let evicted = self.local.evict_oldest(self.config.eviction_batch)?;
                log::warn!(
                    "cache quota exceeded writing {key}, evicted {} entries",
                    evicted.len()
                );
                self.local.save_document(&self.project_id, document)
            }
            other => other,
        }
    }

    async fn sync_remote(&mut self, document: &CanvasDocument, now: Instant) {
        self.remote_due = None;
        match self.remote.save_document(&self.project_id, document).await {
            Ok(()) => {
                log::info!("synced {} to remote", self.project_id);
                self.dirty = false;
                self.attempts = 0;
                if !matches!(self.last_error, Some(SyncError::Storage(_))) {
                    self.last_error = None;
                }
            }
            Err(e) if e.is_retryable() => {
                self.attempts += 1;
                if self.attempts >= self.config.max_attempts {
                    log::error!(
                        "remote sync for {} failed {} times, giving up: {e}",
                        self.project_id,
                        self.attempts
                    );
                    self.halted = true;
                    self.last_error = Some(SyncError::RetriesExhausted {
                        attempts: self.attempts,
                        last: e,
                    });
                } else {
                    let delay = self.config.backoff(self.attempts);
                    log::warn!("remote sync failed ({e}), retrying in {delay:?}");
                    self.remote_due = Some(now + delay);
                }
            }
            Err(e) => {
                log::error!("remote sync for {} failed: {e}", self.project_id);
                self.halted = true;
                self.last_error = Some(SyncError::Remote(e));
            }
        }
    }

    /// Load the project, preferring whichever copy is newer.
    ///
    /// A local copy that is strictly newer than the remote (or has no remote
    /// counterpart) is queued for sync immediately. If the remote read fails
    /// the local copy is used as-is.
    pub async fn load(&mut self, now: Instant) -> Option<(CanvasDocument, DocumentSource)> {
        let local = match self.local.load_document(&self.project_id) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("ignoring unreadable local copy of {}: {e}", self.project_id);
                None
            }
        };
        let remote = match self.remote.load_document(&self.project_id).await {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("remote load for {} failed, using local copy: {e}", self.project_id);
                return local.map(|doc| (doc, DocumentSource::Local));
            }
        };

        match resolve_conflict(local.as_ref(), remote.as_ref())? {
            DocumentSource::Local => {
                let doc = local?;
                let newer = remote
                    .as_ref()
                    .is_none_or(|r| doc.last_modified > r.last_modified);
                if newer {
                    log::info!("local copy of {} is newer, queueing sync", self.project_id);
                    self.dirty = true;
                    self.remote_due = Some(now);
                }
                Some((doc, DocumentSource::Local))
            }
            DocumentSource::Remote => {
                let doc = remote?;
                if let Err(e) = self.local.save_document(&self.project_id, &doc) {
                    log::warn!("could not refresh local cache for {}: {e}", self.project_id);
                }
                Some((doc, DocumentSource::Remote))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::{CanvasEngine, Command};
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryCache;
    use crate::tools::ToolKind;
    use std::time::Duration;

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    fn doc(last_modified: i64) -> CanvasDocument {
        CanvasDocument {
            last_modified,
            ..CanvasDocument::default()
        }
    }

    fn sync() -> PersistenceSync<MemoryCache, MemoryRemote> {
        PersistenceSync::new("p1", MemoryCache::new(), MemoryRemote::new(), SyncConfig::default())
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_resolve_conflict() {
        let (old, new) = (doc(100), doc(200));
        assert_eq!(resolve_conflict(Some(&old), Some(&new)), Some(DocumentSource::Remote));
        assert_eq!(resolve_conflict(Some(&new), Some(&old)), Some(DocumentSource::Local));
        let (a, b) = (doc(150), doc(150));
        assert_eq!(resolve_conflict(Some(&a), Some(&b)), Some(DocumentSource::Local));
        assert_eq!(resolve_conflict(None, Some(&b)), Some(DocumentSource::Remote));
        assert_eq!(resolve_conflict(Some(&a), None), Some(DocumentSource::Local));
        assert_eq!(resolve_conflict(None, None), None);
    }

    #[test]
    fn test_debounced_local_then_remote() {
        let t0 = Instant::now();
        let mut s = sync();
        let d = doc(10);
        s.note_change(t0);
        assert_eq!(s.status(), SaveStatus::Saving);

        // Nothing due yet
        block_on(s.poll(&d, t0 + Duration::from_millis(500)));
        assert!(s.local().load_document("p1").unwrap().is_none());

        // Another change restarts the local debounce
        s.note_change(t0 + Duration::from_millis(500));
        block_on(s.poll(&d, t0 + Duration::from_millis(1200)));
        assert!(s.local().load_document("p1").unwrap().is_none());

        block_on(s.poll(&d, t0 + Duration::from_millis(1500)));
        assert_eq!(s.local().load_document("p1").unwrap(), Some(d.clone()));
        assert!(s.is_dirty());
        assert_eq!(s.remote().save_count(), 0);

        block_on(s.poll(&d, t0 + Duration::from_millis(3500)));
        assert_eq!(s.remote().save_count(), 1);
        assert!(!s.is_dirty());
        assert_eq!(s.status(), SaveStatus::Saved);
    }

    #[test]
    fn test_retryable_failures_back_off() {
        let t0 = Instant::now();
        let mut s = sync();
        let d = doc(10);
        s.remote().fail_next(RemoteError::Timeout);
        s.remote().fail_next(RemoteError::Network("reset".into()));

        s.note_change(t0);
        block_on(s.poll(&d, t0 + secs(1)));
        block_on(s.poll(&d, t0 + secs(3)));
        assert_eq!(s.attempts(), 1);
        assert_eq!(s.next_deadline(), Some(t0 + secs(4)));
        assert_eq!(s.status(), SaveStatus::Saving);

        block_on(s.poll(&d, t0 + secs(4)));
        assert_eq!(s.attempts(), 2);
        // Second backoff doubles
        assert_eq!(s.next_deadline(), Some(t0 + secs(6)));

        block_on(s.poll(&d, t0 + secs(6)));
        assert_eq!(s.remote().save_count(), 1);
        assert_eq!(s.attempts(), 0);
        assert_eq!(s.status(), SaveStatus::Saved);
    }

    #[test]
    fn test_retries_exhaust_then_manual_retry() {
        let t0 = Instant::now();
        let config = SyncConfig {
            max_attempts: 2,
            ..SyncConfig::default()
        };
        let mut s = PersistenceSync::new("p1", MemoryCache::new(), MemoryRemote::new(), config);
        let d = doc(10);
        s.remote().fail_next(RemoteError::Timeout);
        s.remote().fail_next(RemoteError::Timeout);

        s.note_change(t0);
        block_on(s.poll(&d, t0 + secs(1)));
        block_on(s.poll(&d, t0 + secs(3)));
        block_on(s.poll(&d, t0 + secs(60)));
        assert!(matches!(
            s.last_error(),
            Some(SyncError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(s.status(), SaveStatus::Error);
        assert_eq!(s.next_deadline(), None);

        s.retry_now(t0 + secs(61));
        block_on(s.poll(&d, t0 + secs(61)));
        assert_eq!(s.remote().save_count(), 1);
        assert_eq!(s.status(), SaveStatus::Saved);
    }

    #[test]
    fn test_terminal_failure_halts_immediately() {
        let t0 = Instant::now();
        let mut s = sync();
        let d = doc(10);
        s.remote().fail_next(RemoteError::Unauthorized);

        s.note_change(t0);
        block_on(s.poll(&d, t0 + secs(1)));
        block_on(s.poll(&d, t0 + secs(3)));
        assert_eq!(s.last_error(), Some(&SyncError::Remote(RemoteError::Unauthorized)));
        assert_eq!(s.attempts(), 0);

        // Further changes still reach the local cache but not the remote
        s.note_change(t0 + secs(10));
        block_on(s.poll(&doc(20), t0 + secs(20)));
        assert_eq!(s.local().load_document("p1").unwrap(), Some(doc(20)));
        assert_eq!(s.remote().save_count(), 0);
    }

    #[test]
    fn test_offline_queues_until_reconnect() {
        let t0 = Instant::now();
        let mut s = sync();
        let d = doc(10);
        s.set_online(false, t0);
        s.note_change(t0);
        block_on(s.poll(&d, t0 + secs(1)));
        block_on(s.poll(&d, t0 + secs(10)));
        assert_eq!(s.remote().save_count(), 0);
        assert_eq!(s.status(), SaveStatus::Offline);

        s.set_online(true, t0 + secs(11));
        assert_eq!(s.next_deadline(), Some(t0 + secs(11)));
        block_on(s.poll(&d, t0 + secs(11)));
        assert_eq!(s.remote().save_count(), 1);
        assert_eq!(s.status(), SaveStatus::Saved);
    }

    #[test]
    fn test_error_status_outranks_offline() {
        let t0 = Instant::now();
        let mut s = sync();
        s.remote().fail_next(RemoteError::Validation("schema".into()));
        s.note_change(t0);
        block_on(s.poll(&doc(1), t0 + secs(1)));
        block_on(s.poll(&doc(1), t0 + secs(3)));
        s.set_online(false, t0 + secs(4));
        assert_eq!(s.status(), SaveStatus::Error);
        assert!(SaveStatus::Error > SaveStatus::Offline);
        assert!(SaveStatus::Offline > SaveStatus::Saving);
        assert!(SaveStatus::Saving > SaveStatus::Saved);
    }

    #[test]
    fn test_quota_eviction_and_single_retry() {
        let t0 = Instant::now();
        let d = doc(10);
        let needed = d.to_json().unwrap().len();
        let cache = MemoryCache::with_quota(needed + 9);
        cache.write("stale-a", &"x".repeat(8)).unwrap();
        cache.write("stale-b", &"y".repeat(2)).unwrap();

        let config = SyncConfig {
            eviction_batch: 1,
            ..SyncConfig::default()
        };
        let mut s = PersistenceSync::new("p1", cache, MemoryRemote::new(), config);
        s.note_change(t0);
        block_on(s.poll(&d, t0 + secs(1)));
        assert_eq!(s.local().load_document("p1").unwrap(), Some(d));
        assert_eq!(s.local().read("stale-a").unwrap(), None);
        assert!(s.local().read("stale-b").unwrap().is_some());
        assert_eq!(s.last_error(), None);
    }

    #[test]
    fn test_quota_failure_surfaces_without_blocking_remote() {
        let t0 = Instant::now();
        let mut s = PersistenceSync::new(
            "p1",
            MemoryCache::with_quota(4),
            MemoryRemote::new(),
            SyncConfig::default(),
        );
        let d = doc(10);
        s.note_change(t0);
        block_on(s.poll(&d, t0 + secs(1)));
        assert!(matches!(
            s.last_error(),
            Some(SyncError::Storage(StorageError::QuotaExceeded(_)))
        ));
        block_on(s.poll(&d, t0 + secs(3)));
        assert_eq!(s.remote().save_count(), 1);
        assert_eq!(s.status(), SaveStatus::Error);
    }

    #[test]
    fn test_load_prefers_newer_local_and_queues_sync() {
        let t0 = Instant::now();
        let mut s = sync();
        s.local().save_document("p1", &doc(300)).unwrap();
        s.remote().insert("p1", &doc(200)).unwrap();

        let (loaded, source) = block_on(s.load(t0)).unwrap();
        assert_eq!(source, DocumentSource::Local);
        assert_eq!(loaded.last_modified, 300);
        assert!(s.is_dirty());

        block_on(s.poll(&loaded, t0));
        assert_eq!(s.remote().get("p1").unwrap().unwrap().last_modified, 300);
    }

    #[test]
    fn test_load_tie_prefers_local_without_sync() {
        let t0 = Instant::now();
        let mut s = sync();
        s.local().save_document("p1", &doc(150)).unwrap();
        s.remote().insert("p1", &doc(150)).unwrap();
        let (_, source) = block_on(s.load(t0)).unwrap();
        assert_eq!(source, DocumentSource::Local);
        assert!(!s.is_dirty());
    }

    #[test]
    fn test_load_newer_remote_refreshes_cache() {
        let t0 = Instant::now();
        let mut s = sync();
        s.local().save_document("p1", &doc(100)).unwrap();
        s.remote().insert("p1", &doc(200)).unwrap();
        let (loaded, source) = block_on(s.load(t0)).unwrap();
        assert_eq!(source, DocumentSource::Remote);
        assert_eq!(loaded.last_modified, 200);
        assert_eq!(s.local().load_document("p1").unwrap(), Some(doc(200)));
        assert!(!s.is_dirty());
    }

    #[test]
    fn test_load_remote_failure_falls_back_to_local() {
        let t0 = Instant::now();
        let mut s = sync();
        s.local().save_document("p1", &doc(100)).unwrap();
        s.remote().fail_next(RemoteError::Timeout);
        let (loaded, source) = block_on(s.load(t0)).unwrap();
        assert_eq!(source, DocumentSource::Local);
        assert_eq!(loaded.last_modified, 100);
        assert!(!s.is_dirty());

        let mut empty = sync();
        assert!(block_on(empty.load(t0)).is_none());
    }

    #[test]
    fn test_engine_revisions_drive_sync() {
        let t0 = Instant::now();
        let mut engine = CanvasEngine::new(EngineConfig::default());
        let mut s = sync();
        s.observe(engine.revision(), t0);
        assert_eq!(s.status(), SaveStatus::Saved);

        engine.execute(Command::SelectTool(ToolKind::Ellipse));
        s.observe(engine.revision(), t0);
        assert_eq!(s.status(), SaveStatus::Saving);

        block_on(s.poll(&engine.document(), t0 + secs(1)));
        block_on(s.poll(&engine.document(), t0 + secs(3)));
        let saved = s.remote().get("p1").unwrap().unwrap();
        assert_eq!(saved.tool, ToolKind::Ellipse);
        assert_eq!(saved.last_modified, engine.last_modified());
    }
}
