/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the catalogue, the poll loops and the timelapse assembler.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single camera in the catalogue
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CameraDescriptor {
    /// Short unique key used on the command line and in filenames
    pub slug: String,
    /// Human readable name (e.g., "Anzac Bridge")
    pub name: String,
    /// Snapshot URL polled for new frames
    pub url: String,
}

/// Per-camera counters for one download run
///
/// Owned by exactly one poll loop and handed back when the loop stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    pub slug: String,
    pub download_count: u64,
    pub last_timestamp: Option<DateTime<Local>>,
}

impl PollState {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            download_count: 0,
            last_timestamp: None,
        }
    }

    /// Record one successfully written frame
    pub fn record(&mut self, at: DateTime<Local>) {
        self.download_count += 1;
        self.last_timestamp = Some(at);
    }
}

/// A frame stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Full path to the image file
    pub path: PathBuf,
    pub slug: String,
    /// Capture time parsed from the filename
    pub captured_at: NaiveDateTime,
    /// Disambiguation suffix for frames written within the same second (0 = none)
    pub sequence: u32,
    pub size_bytes: u64,
}

impl Frame {
    /// Filename only (e.g., "anzacbr_20250627_141547.jpeg")
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }
}
