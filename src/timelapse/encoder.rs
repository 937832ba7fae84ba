/// External video encoder (ffmpeg)
///
/// The encoder is a separate program; this module only builds its
/// argument list, runs it and reports its exit status.

use clap::ValueEnum;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::TimelapseError;

/// Output quality preset, mapped to an x264 CRF value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
    Highest,
}

impl Quality {
    /// Constant rate factor passed to libx264 (lower is better)
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Low => 28,
            Quality::Medium => 23,
            Quality::High => 18,
            Quality::Highest => 15,
        }
    }
}

/// Handle to the encoder executable
#[derive(Debug, Clone)]
pub struct Encoder {
    program: PathBuf,
}

impl Encoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Check that the encoder runs at all (`ffmpeg -version`)
    pub async fn check_available(&self) -> Result<(), TimelapseError> {
        let unavailable = |reason: String| TimelapseError::EncoderUnavailable {
            program: self.program_name(),
            reason,
        };

        let status = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(unavailable(format!("'-version' exited with {}", status)))
        }
    }

    /// Arguments for encoding the concat list at `list_path` into `output`
    pub fn args(list_path: &Path, framerate: u32, quality: Quality, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(list_path.as_os_str().to_owned());
        for arg in [
            "-r".to_string(),
            framerate.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-crf".to_string(),
            quality.crf().to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ] {
            args.push(arg.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Run the encoder, surfacing a non-zero exit as `EncoderFailed`
    pub async fn encode(
        &self,
        list_path: &Path,
        framerate: u32,
        quality: Quality,
        output: &Path,
    ) -> Result<(), TimelapseError> {
        let args = Self::args(list_path, framerate, quality, output);
        tracing::debug!(program = %self.program.display(), ?args, "running encoder");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TimelapseError::EncoderUnavailable {
                program: self.program_name(),
                reason: e.to_string(),
            })?;

        if result.status.success() {
            Ok(())
        } else {
            Err(TimelapseError::EncoderFailed {
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            })
        }
    }
}

/// Render an ffmpeg concat-demuxer list that shows each frame for 1/framerate seconds
///
/// The last file is repeated because the demuxer ignores the final duration.
pub fn concat_list(frames: &[PathBuf], framerate: u32) -> String {
    let duration = 1.0 / f64::from(framerate.max(1));
    let mut list = String::from("ffconcat version 1.0\n");
    for path in frames {
        list.push_str(&format!("file '{}'\n", escape_path(path)));
        list.push_str(&format!("duration {:.6}\n", duration));
    }
    if let Some(last) = frames.last() {
        list.push_str(&format!("file '{}'\n", escape_path(last)));
    }
    list
}

/// Quote a path for the concat list: `'` becomes `'\''`
fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_crf() {
        assert_eq!(Quality::Low.crf(), 28);
        assert_eq!(Quality::Medium.crf(), 23);
        assert_eq!(Quality::High.crf(), 18);
        assert_eq!(Quality::Highest.crf(), 15);
        assert_eq!(Quality::default(), Quality::High);
    }

    #[test]
    fn test_argument_template() {
        let args = Encoder::args(
            Path::new("/tmp/list.txt"),
            30,
            Quality::High,
            Path::new("timelapses/out.mp4"),
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec![
                "-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i",
                "/tmp/list.txt", "-r", "30", "-c:v", "libx264", "-pix_fmt", "yuv420p", "-crf",
                "18", "-movflags", "+faststart", "timelapses/out.mp4",
            ]
        );
    }

    #[test]
    fn test_concat_list() {
        let frames = vec![PathBuf::from("/img/a_1.jpeg"), PathBuf::from("/img/it's.jpeg")];
        let list = concat_list(&frames, 25);
        assert_eq!(
            list,
            "ffconcat version 1.0\n\
             file '/img/a_1.jpeg'\nduration 0.040000\n\
             file '/img/it'\\''s.jpeg'\nduration 0.040000\n\
             file '/img/it'\\''s.jpeg'\n"
        );
    }

    #[tokio::test]
    async fn test_missing_encoder_is_unavailable() {
        let encoder = Encoder::new("/definitely/not/a/real/ffmpeg");
        let result = encoder.check_available().await;
        assert!(matches!(result, Err(TimelapseError::EncoderUnavailable { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_encoder_failed() {
        // `false` ignores its arguments and exits 1
        let encoder = Encoder::new("false");
        let result = encoder
            .encode(Path::new("list.txt"), 30, Quality::High, Path::new("out.mp4"))
            .await;
        assert!(matches!(result, Err(TimelapseError::EncoderFailed { code: Some(1), .. })));
    }
}
