use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error for the command line surface, consolidating errors from all modules.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Timelapse(#[from] TimelapseError),
}

/// Errors loading or resolving the camera catalogue.
#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("camera '{0}' not found")]
    NotFound(String),
    #[error("none of the requested cameras exist: {}", .0.join(", "))]
    NoValidCameras(Vec<String>),
    #[error("duplicate camera slug '{0}' in catalogue")]
    DuplicateSlug(String),
    #[error("invalid camera slug '{0}': use letters, digits, '_' or '-'")]
    InvalidSlug(String),
    #[error("camera entry #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
    #[error("failed to read catalogue {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalogue JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A single HTTP fetch failed. Never fatal to a poll loop.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The payload is not a plausible raster image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty payload")]
    Empty,
    #[error("payload looks like text/HTML, not an image")]
    LooksLikeText,
    #[error("server declared content type '{0}'")]
    HtmlContentType(String),
    #[error("payload is only {size} bytes (minimum {min})")]
    TooSmall { size: usize, min: usize },
    #[error("unrecognized image signature {0:02x?}")]
    UnknownSignature(Vec<u8>),
}

/// Filesystem failures while persisting frames.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write frame {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("background write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a single poll cycle did not produce a frame.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A poll loop stopped because of an unrecoverable local error.
#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("poll task panicked or was aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors limited to the timelapse command.
#[derive(Error, Debug)]
pub enum TimelapseError {
    #[error("no images to process")]
    NoFramesMatched,
    #[error("video encoder '{program}' is not available: {reason}")]
    EncoderUnavailable { program: String, reason: String },
    #[error("video encoder exited with {}: {stderr}", .code.map_or("a signal".to_string(), |c| format!("code {c}")))]
    EncoderFailed { code: Option<i32>, stderr: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid settings or command line values.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
