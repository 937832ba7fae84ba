/// Runtime settings
///
/// Settings are layered: built-in defaults, then an optional JSON config
/// file, then command line overrides applied by `main`.
///
/// The config file is looked up in the user's config directory when no
/// explicit path is given:
/// - Linux: ~/.config/traffic-timelapse/config.json
/// - macOS: ~/Library/Application Support/traffic-timelapse/config.json
/// - Windows: %APPDATA%\traffic-timelapse\config.json

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::writer::normalize_name;
use crate::error::ConfigError;

/// Where frames are stored on disk
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Every camera writes into `images_dir`, names are slug-prefixed
    #[default]
    Shared,
    /// Each camera gets `images_dir/<slug>/`
    PerCamera,
}

impl Layout {
    /// Directory holding the frames of `slug`, named like the frame stems
    pub fn camera_dir(&self, images_dir: &Path, slug: &str) -> PathBuf {
        match self {
            Layout::Shared => images_dir.to_path_buf(),
            Layout::PerCamera => images_dir.join(normalize_name(slug)),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Root directory for downloaded frames
    pub images_dir: PathBuf,
    /// Output directory for encoded videos
    pub timelapse_dir: PathBuf,
    /// Seconds between poll cycles
    pub interval_secs: u64,
    /// Upper bound on a single HTTP fetch
    pub fetch_timeout_secs: u64,
    pub layout: Layout,
    /// Encoder executable, looked up on PATH when not absolute
    pub encoder: PathBuf,
    /// Replacement for the built-in camera table
    pub cameras_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            timelapse_dir: PathBuf::from("timelapses"),
            interval_secs: 20,
            fetch_timeout_secs: 10,
            layout: Layout::Shared,
            encoder: PathBuf::from("ffmpeg"),
            cameras_file: None,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or from the default location if a file exists there.
    ///
    /// A missing explicit file is an error; a missing default file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a JSON settings file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("traffic-timelapse");
        path.push("config.json");
        Some(path)
    }

    /// Reject values that would make the poll loop spin or never time out
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Zero("interval"));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Zero("fetch timeout"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.images_dir, PathBuf::from("images"));
        assert_eq!(settings.timelapse_dir, PathBuf::from("timelapses"));
        assert_eq!(settings.interval(), Duration::from_secs(20));
        assert_eq!(settings.layout, Layout::Shared);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "interval_secs": 5, "layout": "per_camera" }"#).unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.interval_secs, 5);
        assert_eq!(settings.layout, Layout::PerCamera);
        assert_eq!(settings.fetch_timeout_secs, 10);
        assert_eq!(settings.encoder, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "intervall": 5 }"#).unwrap();

        assert!(matches!(Settings::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = Settings { interval_secs: 0, ..Settings::default() };
        assert!(matches!(settings.validate(), Err(ConfigError::Zero("interval"))));
    }

    #[test]
    fn test_layout_camera_dir() {
        let root = Path::new("images");
        assert_eq!(Layout::Shared.camera_dir(root, "anzacbr"), PathBuf::from("images"));
        assert_eq!(
            Layout::PerCamera.camera_dir(root, "anzacbr"),
            PathBuf::from("images/anzacbr")
        );
        assert_eq!(
            Layout::PerCamera.camera_dir(root, "AnzacBR"),
            PathBuf::from("images/anzacbr")
        );
    }
}
