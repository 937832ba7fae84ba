/// Timelapse assembly module
///
/// This module turns stored frames into a video:
/// - Finding and filtering frames on disk (frames.rs)
/// - Driving the external encoder (encoder.rs)

pub mod encoder;
pub mod frames;

use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

use crate::error::TimelapseError;
use crate::state::data::Frame;
pub use encoder::{Encoder, Quality};
pub use frames::{list_frames, DateRange};

/// Output filename: `{slug}_timelapse{range}_{YYYYMMDD_HHMMSS}.mp4`
pub fn output_path(dir: &Path, slug: &str, range: &DateRange, now: NaiveDateTime) -> PathBuf {
    let range_suffix = match (range.start, range.end) {
        (Some(start), Some(end)) => {
            format!("_{}_to_{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
        }
        (Some(start), None) => format!("_from_{}", start.format("%Y%m%d")),
        (None, Some(end)) => format!("_until_{}", end.format("%Y%m%d")),
        (None, None) => String::new(),
    };
    dir.join(format!(
        "{}_timelapse{}_{}.mp4",
        slug,
        range_suffix,
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Encode `frames` (already sorted) into `output`
///
/// Writes a concat list next to the output, runs the encoder and removes
/// the list again. With no frames the encoder is never started.
pub async fn build_video(
    encoder: &Encoder,
    frames: &[Frame],
    framerate: u32,
    quality: Quality,
    output: &Path,
) -> Result<PathBuf, TimelapseError> {
    if frames.is_empty() {
        return Err(TimelapseError::NoFramesMatched);
    }

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| TimelapseError::Io { path, source }
    };

    let out_dir = output.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(out_dir).await.map_err(io_err(out_dir))?;

    // The concat demuxer resolves relative entries against the list's own directory
    let mut paths = Vec::with_capacity(frames.len());
    for frame in frames {
        let absolute = tokio::fs::canonicalize(&frame.path)
            .await
            .map_err(io_err(&frame.path))?;
        paths.push(absolute);
    }

    let list_path = output.with_extension("frames.txt");
    tracing::debug!(
        camera = %frames[0].slug,
        count = paths.len(),
        list = %list_path.display(),
        "writing frame list"
    );
    tokio::fs::write(&list_path, encoder::concat_list(&paths, framerate))
        .await
        .map_err(io_err(&list_path))?;

    let result = encoder.encode(&list_path, framerate, quality, output).await;
    if let Err(e) = tokio::fs::remove_file(&list_path).await {
        tracing::warn!(path = %list_path.display(), error = %e, "could not remove frame list");
    }
    result?;

    Ok(output.to_path_buf())
}
