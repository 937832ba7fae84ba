/// Frame persistence
///
/// Frames are named `{stem}_{YYYYMMDD}_{HHMMSS}.{ext}`. When a camera
/// produces two frames within the same second the later one gets a
/// `-1`, `-2`, ... suffix; an existing frame is never overwritten.
///
/// Bytes are written to a hidden `.part` file first and linked into
/// place once synced, so an interrupted write never leaves a truncated frame.

use chrono::{DateTime, TimeZone};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::validator::ImageKind;
use crate::config::Layout;
use crate::error::StorageError;

/// Timestamp layout embedded in frame filenames
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Lower-case a camera name and replace spaces and slashes with underscores
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Filename stem for a camera: the slug, or the display name if the slug is blank
pub fn frame_stem(slug: &str, name: &str) -> String {
    if slug.trim().is_empty() {
        normalize_name(name)
    } else {
        normalize_name(slug)
    }
}

/// Build a frame filename from a formatted timestamp; `sequence` 0 means no suffix
fn compose_file_name(stem: &str, stamp: &str, sequence: u32, kind: ImageKind) -> String {
    if sequence == 0 {
        format!("{}_{}.{}", stem, stamp, kind.extension())
    } else {
        format!("{}_{}-{}.{}", stem, stamp, sequence, kind.extension())
    }
}

/// Create the directory a camera writes into
fn prepare_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|source| StorageError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Everything needed to persist one validated frame
#[derive(Debug, Clone)]
pub struct FrameWrite<'a, Tz: TimeZone> {
    pub images_dir: &'a Path,
    pub layout: Layout,
    pub slug: &'a str,
    pub name: &'a str,
    pub kind: ImageKind,
    pub timestamp: DateTime<Tz>,
}

/// Persist validated bytes and return the final path
///
/// Runs the blocking filesystem work on tokio's blocking pool.
pub async fn write_frame<Tz>(
    request: FrameWrite<'_, Tz>,
    bytes: Vec<u8>,
) -> Result<PathBuf, StorageError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let dir = request.layout.camera_dir(request.images_dir, request.slug);
    let stem = frame_stem(request.slug, request.name);
    let timestamp = request.timestamp.format(TIMESTAMP_FORMAT).to_string();
    let kind = request.kind;

    tokio::task::spawn_blocking(move || write_frame_blocking(&dir, &stem, &timestamp, kind, &bytes))
        .await?
}

/// Blocking implementation of frame writing
fn write_frame_blocking(
    dir: &Path,
    stem: &str,
    timestamp: &str,
    kind: ImageKind,
    bytes: &[u8],
) -> Result<PathBuf, StorageError> {
    prepare_dir(dir)?;

    let mut sequence = 0u32;
    loop {
        let file_name = compose_file_name(stem, timestamp, sequence, kind);
        let final_path = dir.join(&file_name);

        if final_path.exists() {
            sequence += 1;
            continue;
        }

        let temp_path = dir.join(format!(".{}.part", file_name));
        let write_err = |source| StorageError::Write {
            path: final_path.clone(),
            source,
        };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&temp_path) {
            Ok(file) => file,
            // A stale .part from an interrupted run; take the next name
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                sequence += 1;
                continue;
            }
            Err(e) => return Err(write_err(e)),
        };

        let result = file.write_all(bytes).and_then(|_| file.sync_all());
        drop(file);
        let result = result.and_then(|_| publish(&temp_path, &final_path));
        let _ = fs::remove_file(&temp_path);

        match result {
            Ok(()) => return Ok(final_path),
            // Another writer claimed the name after the exists() check
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                sequence += 1;
                continue;
            }
            Err(e) => return Err(write_err(e)),
        }
    }
}

/// Give the finished temp file its final name without replacing an existing file.
///
/// A hard link fails with `AlreadyExists` when `target` is taken, unlike a
/// rename. Filesystems without hard links fall back to an exclusive copy.
fn publish(temp: &Path, target: &Path) -> std::io::Result<()> {
    match fs::hard_link(temp, target) {
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported => {
            let mut src = fs::File::open(temp)?;
            let mut dst = OpenOptions::new().write(true).create_new(true).open(target)?;
            std::io::copy(&mut src, &mut dst)?;
            dst.sync_all()
        }
        other => other,
    }
}
