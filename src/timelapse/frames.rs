use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::Path;
use walkdir::WalkDir;

use crate::capture::validator::ImageKind;
use crate::capture::writer::{normalize_name, TIMESTAMP_FORMAT};
use crate::config::Layout;
use crate::error::TimelapseError;
use crate::state::data::Frame;

/// Inclusive calendar-day filter on capture time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// `start` counts from midnight, `end` through 23:59:59
    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        if let Some(start) = self.start {
            if *at < start.and_time(NaiveTime::MIN) {
                return false;
            }
        }
        if let Some(end) = self.end {
            let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
            if *at > end.and_time(end_of_day) {
                return false;
            }
        }
        true
    }
}

/// Parse a frame filename of the form `{stem}_{YYYYMMDD}_{HHMMSS}[-N].{ext}`
///
/// `frame_stem` is the normalized slug the writer used. Returns the capture
/// time and sequence number, or None if the name belongs to another camera
/// or does not follow the pattern.
pub fn parse_frame_name(frame_stem: &str, file_name: &str) -> Option<(NaiveDateTime, u32)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    ImageKind::from_extension(ext)?;

    let rest = stem.strip_prefix(frame_stem)?.strip_prefix('_')?;
    let (stamp, sequence) = match rest.split_once('-') {
        Some((stamp, seq)) => (stamp, seq.parse::<u32>().ok()?),
        None => (rest, 0),
    };

    // "YYYYMMDD_HHMMSS" exactly, so "other_slug_..." prefixes never match
    if stamp.len() != 15 {
        return None;
    }
    let captured_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some((captured_at, sequence))
}

/// List the stored frames of one camera within `range`, oldest first
///
/// An empty or missing directory yields an empty list.
pub fn list_frames(
    images_dir: &Path,
    layout: Layout,
    slug: &str,
    range: DateRange,
) -> Result<Vec<Frame>, TimelapseError> {
    let dir = layout.camera_dir(images_dir, slug);
    let stem = normalize_name(slug);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut frames = Vec::new();
    for entry in WalkDir::new(&dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        let Some((captured_at, sequence)) = parse_frame_name(&stem, &file_name) else {
            continue;
        };
        if !range.contains(&captured_at) {
            continue;
        }

        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        frames.push(Frame {
            path: entry.path().to_path_buf(),
            slug: slug.to_string(),
            captured_at,
            sequence,
            size_bytes,
        });
    }

    frames.sort_by(|a, b| {
        a.captured_at
            .cmp(&b.captured_at)
            .then(a.sequence.cmp(&b.sequence))
    });
    Ok(frames)
}
