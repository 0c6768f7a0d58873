// Priority Domain Model

use serde::{Deserialize, Serialize};

/// Job importance class (lower index = more important)
///
/// Foreground levels serve whatever the user is looking at right now;
/// background levels are speculative prefetch and bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Work requested by the viewer's current cycle (e.g. next image)
    ForegroundCycle = 0,
    /// Thumbnails requested by the visible thumbnail view
    ForegroundThumbnail = 1,
    /// Metadata probing (lengths, sizes, checksums)
    BackgroundInfo = 2,
    /// Thumbnails nobody is looking at yet
    BackgroundThumbnail = 3,
    /// Preview frames and other prefetch
    BackgroundPreview = 4,
}

/// First background level. Everything strictly above it is foreground.
pub const BACKGROUND_BOUNDARY: Priority = Priority::BackgroundInfo;

impl Priority {
    /// Number of priority levels
    pub const COUNT: usize = 5;

    /// All levels, highest priority first
    pub const ALL: [Priority; Priority::COUNT] = [
        Priority::ForegroundCycle,
        Priority::ForegroundThumbnail,
        Priority::BackgroundInfo,
        Priority::BackgroundThumbnail,
        Priority::BackgroundPreview,
    ];

    /// Position of this level (0 is highest)
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// True for levels that bypass pause
    pub fn is_foreground(self) -> bool {
        self < BACKGROUND_BOUNDARY
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::ForegroundCycle => write!(f, "FOREGROUND_CYCLE"),
            Priority::ForegroundThumbnail => write!(f, "FOREGROUND_THUMBNAIL"),
            Priority::BackgroundInfo => write!(f, "BACKGROUND_INFO"),
            Priority::BackgroundThumbnail => write!(f, "BACKGROUND_THUMBNAIL"),
            Priority::BackgroundPreview => write!(f, "BACKGROUND_PREVIEW"),
        }
    }
}
