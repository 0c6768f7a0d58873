// Library jobs - concrete Job bodies working on a photo library
// All slow work runs on spawn_blocking or tokio::fs; execute() only kicks it off

pub mod checksum;
pub mod file_info;
pub mod scan;

pub use checksum::ChecksumJob;
pub use file_info::FileInfoJob;
pub use scan::ScanDirectoryJob;

use std::path::Path;

/// Last path component, or the whole path when there is none
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
