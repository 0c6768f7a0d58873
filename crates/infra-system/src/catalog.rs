// Library catalog - where library jobs deposit their results

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the library jobs found out about one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub size_bytes: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub errors: Vec<String>,
}

/// Shared path -> entry map
///
/// Cheap to clone; every clone sees the same entries. Written from job
/// helper tasks and blocking threads.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Arc<Mutex<BTreeMap<PathBuf, CatalogEntry>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_info(&self, path: &Path, size_bytes: u64, modified: Option<DateTime<Utc>>) {
        let mut entries = self.lock();
        let entry = entries.entry(path.to_path_buf()).or_default();
        entry.size_bytes = Some(size_bytes);
        entry.modified = modified;
    }

    pub fn record_checksum(&self, path: &Path, checksum: String) {
        self.lock()
            .entry(path.to_path_buf())
            .or_default()
            .checksum = Some(checksum);
    }

    pub fn record_error(&self, path: &Path, error: impl Into<String>) {
        self.lock()
            .entry(path.to_path_buf())
            .or_default()
            .errors
            .push(error.into());
    }

    pub fn get(&self, path: &Path) -> Option<CatalogEntry> {
        self.lock().get(path).cloned()
    }

    /// True if a job already failed on `path`
    pub fn has_errors(&self, path: &Path) -> bool {
        self.lock()
            .get(path)
            .is_some_and(|entry| !entry.errors.is_empty())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn entries(&self) -> BTreeMap<PathBuf, CatalogEntry> {
        self.lock().clone()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, CatalogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_merge_per_path() {
        let catalog = Catalog::new();
        let path = Path::new("/library/a.jpg");

        catalog.record_info(path, 2048, None);
        catalog.record_checksum(path, "abc".to_string());

        let entry = catalog.get(path).unwrap();
        assert_eq!(entry.size_bytes, Some(2048));
        assert_eq!(entry.checksum.as_deref(), Some("abc"));
        assert!(!catalog.has_errors(path));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let catalog = Catalog::new();
        let writer = catalog.clone();
        writer.record_error(Path::new("/library/gone.mov"), "vanished");

        assert!(catalog.has_errors(Path::new("/library/gone.mov")));
        let json = catalog.to_json().unwrap();
        assert!(json.contains("vanished"));
    }
}
