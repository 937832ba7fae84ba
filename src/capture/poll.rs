use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::fetcher::ImageSource;
use super::validator::validate_response;
use super::writer::{write_frame, FrameWrite};
use crate::config::Layout;
use crate::error::{CycleError, PollError, StorageError};
use crate::state::data::{CameraDescriptor, PollState};

/// Settings shared by every poll loop of a run
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub images_dir: PathBuf,
    pub layout: Layout,
    pub interval: Duration,
    /// Stop after this many cycles; `None` polls until cancelled
    pub max_cycles: Option<u64>,
}

/// Sent to the coordinator after every written frame
#[derive(Debug, Clone)]
pub struct FrameSaved {
    pub slug: String,
    /// The camera's count including this frame
    pub download_count: u64,
    pub path: PathBuf,
}

/// A loop that stopped on an unrecoverable error, with the frames it
/// wrote before stopping
#[derive(Debug)]
pub struct LoopFailure {
    pub state: PollState,
    pub error: PollError,
}

/// Fetch, validate and write one camera's frames on a fixed interval
pub struct PollLoop<S> {
    camera: CameraDescriptor,
    config: Arc<PollConfig>,
    source: Arc<S>,
    events: mpsc::Sender<FrameSaved>,
    cancel: CancellationToken,
}

impl<S: ImageSource> PollLoop<S> {
    pub fn new(
        camera: CameraDescriptor,
        config: Arc<PollConfig>,
        source: Arc<S>,
        events: mpsc::Sender<FrameSaved>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            camera,
            config,
            source,
            events,
            cancel,
        }
    }

    /// Poll until cancelled, `max_cycles` is reached, or a write fails.
    ///
    /// Network and validation failures skip the cycle; only filesystem
    /// errors end the loop early.
    pub async fn run(self) -> Result<PollState, LoopFailure> {
        let slug = self.camera.slug.as_str();
        let mut state = PollState::new(slug);

        let dir = self.config.layout.camera_dir(&self.config.images_dir, slug);
        if let Err(source) = tokio::fs::create_dir_all(&dir).await {
            let error = StorageError::CreateDir { path: dir, source };
            tracing::error!(camera = slug, error = %error, "cannot prepare image directory");
            return Err(LoopFailure {
                state,
                error: error.into(),
            });
        }

        tracing::info!(camera = slug, url = %self.camera.url, "poll loop started");

        let mut cycles = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.cycle().await {
                Ok((path, at)) => {
                    state.record(at);
                    println!(
                        "📸 [{}] Downloaded {} ({} from this camera)",
                        slug,
                        path.file_name().unwrap_or_default().to_string_lossy(),
                        state.download_count
                    );
                    // The coordinator may already be gone during shutdown
                    let _ = self
                        .events
                        .send(FrameSaved {
                            slug: slug.to_string(),
                            download_count: state.download_count,
                            path,
                        })
                        .await;
                }
                Err(CycleError::Storage(e)) => {
                    tracing::error!(
                        camera = slug,
                        downloaded = state.download_count,
                        error = %e,
                        "stopping poll loop"
                    );
                    return Err(LoopFailure {
                        state,
                        error: e.into(),
                    });
                }
                Err(e) => {
                    tracing::warn!(camera = slug, error = %e, "poll cycle skipped");
                }
            }

            cycles += 1;
            if self.config.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }

        tracing::info!(camera = slug, downloaded = state.download_count, "poll loop stopped");
        Ok(state)
    }

    /// One fetch, validate and write attempt
    async fn cycle(&self) -> Result<(PathBuf, DateTime<Local>), CycleError> {
        let response = self.source.fetch(&self.camera.url).await?;
        if !response.is_success() {
            return Err(CycleError::Status(response.status));
        }

        let kind = validate_response(&response)?;
        let at = Local::now();

        let request = FrameWrite {
            images_dir: &self.config.images_dir,
            layout: self.config.layout,
            slug: &self.camera.slug,
            name: &self.camera.name,
            kind,
            timestamp: at,
        };
        let path = write_frame(request, response.bytes).await?;

        Ok((path, at))
    }
}
