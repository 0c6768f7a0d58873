// Checksum job
// reason: sha2 for content hashes, spawn_blocking for the read loop
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use pictor_core::application::{Completion, Job};

use crate::catalog::Catalog;
use crate::jobs::display_name;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Computes the SHA-256 of one file into the catalog
///
/// Normally declared dependent on the file's `FileInfoJob`; if that job
/// already recorded an error for the path, hashing is skipped.
pub struct ChecksumJob {
    path: PathBuf,
    catalog: Catalog,
}

impl ChecksumJob {
    pub fn new(path: impl Into<PathBuf>, catalog: Catalog) -> Self {
        Self {
            path: path.into(),
            catalog,
        }
    }
}

impl Job for ChecksumJob {
    fn title(&self) -> String {
        "Computing checksum".to_string()
    }

    fn details(&self) -> String {
        display_name(&self.path)
    }

    fn execute(&mut self, completion: Completion) {
        if self.catalog.has_errors(&self.path) {
            debug!(path = %self.path.display(), "Skipping checksum of unreadable file");
            completion.complete();
            return;
        }

        let path = self.path.clone();
        let catalog = self.catalog.clone();

        tokio::spawn(async move {
            let hash_path = path.clone();
            let result = tokio::task::spawn_blocking(move || sha256_file(&hash_path)).await;
            match result {
                Ok(Ok(checksum)) => {
                    debug!(path = %path.display(), checksum = %checksum, "Checksum computed");
                    catalog.record_checksum(&path, checksum);
                }
                Ok(Err(e)) => {
                    warn!(path = %path.display(), error = %e, "Failed to hash file");
                    catalog.record_error(&path, format!("checksum: {e}"));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Checksum task failed");
                    catalog.record_error(&path, format!("checksum task: {e}"));
                }
            }
            completion.complete();
        });
    }
}

/// Hex encoded SHA-256 of the file contents
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
