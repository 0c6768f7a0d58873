// Pictor Infrastructure - System Adapters
// Implements: LoadHint (CPU-backed) and the library job kinds

pub mod catalog;
pub mod cpu_load_hint;
pub mod jobs;

pub use catalog::{Catalog, CatalogEntry};
pub use cpu_load_hint::CpuLoadHint;
pub use jobs::{ChecksumJob, FileInfoJob, ScanDirectoryJob};
