// Library scan job
// Walks a directory and fans out per-file jobs through the scheduler handle
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use pictor_core::application::{BackgroundJob, Completion, Job, SchedulerHandle};
use pictor_core::domain::Priority;

use crate::catalog::Catalog;
use crate::jobs::{display_name, ChecksumJob, FileInfoJob};

/// Finds every file under `root` and schedules its info and checksum jobs
///
/// Each `ChecksumJob` depends on the `FileInfoJob` of the same file. Child
/// jobs are accepted by the scheduler before the scan itself completes, so
/// the scheduler never goes idle between the scan and its children.
pub struct ScanDirectoryJob {
    root: PathBuf,
    scheduler: SchedulerHandle,
    catalog: Catalog,
    priority: Priority,
}

impl ScanDirectoryJob {
    /// `priority` applies to the jobs spawned for each file
    pub fn new(
        root: impl Into<PathBuf>,
        scheduler: SchedulerHandle,
        catalog: Catalog,
        priority: Priority,
    ) -> Self {
        Self {
            root: root.into(),
            scheduler,
            catalog,
            priority,
        }
    }
}

impl Job for ScanDirectoryJob {
    fn title(&self) -> String {
        "Scanning library".to_string()
    }

    fn details(&self) -> String {
        display_name(&self.root)
    }

    fn execute(&mut self, completion: Completion) {
        let root = self.root.clone();
        let scheduler = self.scheduler.clone();
        let catalog = self.catalog.clone();
        let priority = self.priority;

        tokio::spawn(async move {
            let walk_root = root.clone();
            let files = match tokio::task::spawn_blocking(move || collect_files(&walk_root)).await {
                Ok(Ok(files)) => files,
                Ok(Err(e)) => {
                    warn!(root = %root.display(), error = %e, "Failed to scan library");
                    catalog.record_error(&root, format!("scan: {e}"));
                    completion.complete();
                    return;
                }
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Scan task failed");
                    completion.complete();
                    return;
                }
            };

            info!(root = %root.display(), files = files.len(), "Library scanned");

            for path in files {
                let info_job = BackgroundJob::new(priority, FileInfoJob::new(&path, catalog.clone()));
                let mut checksum_job =
                    BackgroundJob::new(priority, ChecksumJob::new(&path, catalog.clone()));
                checksum_job.add_dependency(&info_job.handle());

                // Dependency first, so the checksum never waits on an unknown job
                let submitted = match scheduler.submit(info_job).await {
                    Ok(_) => scheduler.submit(checksum_job).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                if let Err(e) = submitted {
                    warn!(path = %path.display(), error = %e, "Stopping scan, scheduler unavailable");
                    break;
                }
                debug!(path = %path.display(), "File jobs scheduled");
            }

            completion.complete();
        });
    }
}

/// Regular files under `root`, sorted, hidden entries skipped
///
/// Unreadable subdirectories are logged and skipped; only an unreadable
/// root is an error.
pub fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut directories = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(directory) = directories.pop() {
        let entries = match std::fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(e),
            Err(e) => {
                warn!(path = %directory.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };
        is_root = false;

        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                directories.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_files_recurses_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("2024/summer")).unwrap();
        fs::create_dir_all(dir.path().join(".thumbnails")).unwrap();
        fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        fs::write(dir.path().join("2024/summer/a.jpg"), b"a").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        fs::write(dir.path().join(".thumbnails/t.png"), b"t").unwrap();

        let files = collect_files(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("2024/summer/a.jpg"),
                dir.path().join("b.jpg"),
            ]
        );
    }

    #[test]
    fn test_collect_files_missing_root_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_files(&dir.path().join("nope")).is_err());
    }
}
