//! File-based cache for native platforms.

use super::{LocalCache, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File-based cache for native platforms.
///
/// Stores each entry as a JSON file in a directory. Keys are sanitized
/// into file names, so `keys()` reports the sanitized form.
#[derive(Debug)]
pub struct FileCache {
    /// Base directory for cache entries.
    base_path: PathBuf,
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::StorageFull {
        StorageError::QuotaExceeded(path.display().to_string())
    } else {
        StorageError::Io(format!("Failed to {action} {}: {e}", path.display()))
    }
}

impl FileCache {
    /// Create a cache in `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create cache directory: {e}"))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create the cache in the default location.
    ///
    /// On Linux: `~/.local/share/infinidraw/cache/`
    /// On Windows: `%LOCALAPPDATA%\infinidraw\cache\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("infinidraw").join("cache"))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{safe_key}.json"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `(modified, stem)` for every entry file.
    fn entries(&self) -> StorageResult<Vec<(SystemTime, String)>> {
        let dir = fs::read_dir(&self.base_path)
            .map_err(|e| io_error("read directory", &self.base_path, e))?;
        let mut entries = Vec::new();
        for entry in dir.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((modified, stem.to_string()));
        }
        Ok(entries)
    }
}

impl LocalCache for FileCache {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.entry_path(key);
        match fs::read_to_string(&path) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.entry_path(key);
        fs::write(&path, value).map_err(|e| io_error("write", &path, e))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(_, stem)| stem).collect())
    }

    fn evict_oldest(&self, count: usize) -> StorageResult<Vec<String>> {
        let mut entries = self.entries()?;
        entries.sort();
        let mut evicted = Vec::new();
        for (_, stem) in entries.into_iter().take(count) {
            self.remove(&stem)?;
            log::info!("evicted cache entry {stem}");
            evicted.push(stem);
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasDocument;
    use tempfile::tempdir;

    #[test]
    fn test_file_cache_write_read() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf()).unwrap();

        cache.write("entry", "{\"a\":1}").unwrap();
        assert_eq!(cache.read("entry").unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(cache.read("missing").unwrap(), None);
    }

    #[test]
    fn test_file_cache_document() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf()).unwrap();

        let doc = CanvasDocument {
            last_modified: 99,
            ..CanvasDocument::default()
        };
        cache.save_document("project-1", &doc).unwrap();
        let loaded = cache.load_document("project-1").unwrap().unwrap();
        assert_eq!(loaded.last_modified, 99);
    }

    #[test]
    fn test_file_cache_sanitizes_key() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf()).unwrap();

        cache.write("infinidraw:project:a/b", "x").unwrap();
        assert_eq!(cache.read("infinidraw:project:a/b").unwrap().as_deref(), Some("x"));
        assert_eq!(cache.keys().unwrap(), vec!["infinidraw_project_a_b".to_string()]);
    }

    #[test]
    fn test_file_cache_remove_and_evict() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().to_path_buf()).unwrap();

        cache.write("one", "1").unwrap();
        cache.write("two", "2").unwrap();
        cache.remove("one").unwrap();
        cache.remove("one").unwrap();
        assert_eq!(cache.keys().unwrap(), vec!["two".to_string()]);

        assert_eq!(cache.evict_oldest(3).unwrap(), vec!["two".to_string()]);
        assert!(cache.keys().unwrap().is_empty());
    }

    #[test]
    fn test_file_cache_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let cache = FileCache::new(nested.clone()).unwrap();
        assert_eq!(cache.base_path(), nested.as_path());
        assert!(nested.exists());
    }
}
