// File info job
// reason: tokio::fs keeps metadata reads off the scheduler task
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

use pictor_core::application::{Completion, Job};

use crate::catalog::Catalog;
use crate::jobs::display_name;

/// Reads size and modification time of one file into the catalog
pub struct FileInfoJob {
    path: PathBuf,
    catalog: Catalog,
}

impl FileInfoJob {
    pub fn new(path: impl Into<PathBuf>, catalog: Catalog) -> Self {
        Self {
            path: path.into(),
            catalog,
        }
    }
}

impl Job for FileInfoJob {
    fn title(&self) -> String {
        "Reading file info".to_string()
    }

    fn details(&self) -> String {
        display_name(&self.path)
    }

    fn execute(&mut self, completion: Completion) {
        let path = self.path.clone();
        let catalog = self.catalog.clone();

        tokio::spawn(async move {
            match tokio::fs::metadata(&path).await {
                Ok(metadata) => {
                    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
                    catalog.record_info(&path, metadata.len(), modified);
                    debug!(
                        job_id = %completion.job_id(),
                        path = %path.display(),
                        size = metadata.len(),
                        "File info recorded"
                    );
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read file info");
                    catalog.record_error(&path, format!("metadata: {e}"));
                }
            }
            completion.complete();
        });
    }
}
