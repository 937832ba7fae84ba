use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::fetcher::ImageSource;
use super::poll::{LoopFailure, PollConfig, PollLoop};
use crate::error::PollError;
use crate::state::data::{CameraDescriptor, PollState};

/// Result of a multi-camera download run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Final state of every loop that stopped cleanly, in request order
    pub per_camera: Vec<PollState>,
    /// Loops that stopped on an unrecoverable error, with their counts so far
    pub failed: Vec<LoopFailure>,
    /// Last cross-camera total printed while running
    pub reported_total: u64,
}

impl RunSummary {
    /// Frames written by every loop, including ones that later failed
    pub fn total(&self) -> u64 {
        self.per_camera
            .iter()
            .chain(self.failed.iter().map(|f| &f.state))
            .map(|s| s.download_count)
            .sum()
    }
}

/// Runs one poll loop per camera and aggregates their progress
pub struct Coordinator<S> {
    config: Arc<PollConfig>,
    source: Arc<S>,
}

impl<S: ImageSource> Coordinator<S> {
    pub fn new(config: PollConfig, source: S) -> Self {
        Self {
            config: Arc::new(config),
            source: Arc::new(source),
        }
    }

    /// Poll every camera concurrently until they all stop.
    ///
    /// Cancelling `cancel` stops every loop; a loop that fails does not
    /// affect the others.
    pub async fn run(&self, cameras: Vec<CameraDescriptor>, cancel: CancellationToken) -> RunSummary {
        let (tx, mut rx) = mpsc::channel(64);
        let camera_count = cameras.len();

        let mut handles = Vec::with_capacity(camera_count);
        for camera in cameras {
            let slug = camera.slug.clone();
            let poll_loop = PollLoop::new(
                camera,
                self.config.clone(),
                self.source.clone(),
                tx.clone(),
                cancel.child_token(),
            );
            handles.push((slug, tokio::spawn(poll_loop.run())));
        }
        // Only the loops hold senders now, so the channel closes when the last one stops
        drop(tx);

        let mut latest: HashMap<String, u64> = HashMap::new();
        let mut reported_total = 0;
        while let Some(saved) = rx.recv().await {
            tracing::debug!(camera = %saved.slug, path = %saved.path.display(), "frame saved");
            latest.insert(saved.slug, saved.download_count);
            reported_total = latest.values().sum();
            println!(
                "📊 Total images downloaded: {} across {} camera(s)",
                reported_total, camera_count
            );
        }

        let mut summary = RunSummary {
            reported_total,
            ..RunSummary::default()
        };
        for (slug, handle) in handles {
            match handle.await {
                Ok(Ok(state)) => summary.per_camera.push(state),
                Ok(Err(failure)) => summary.failed.push(failure),
                Err(e) => {
                    tracing::error!(camera = %slug, error = %e, "poll task ended abnormally");
                    // Only the last reported count survives a panicked task
                    let mut state = PollState::new(slug.as_str());
                    state.download_count = latest.get(&slug).copied().unwrap_or(0);
                    summary.failed.push(LoopFailure {
                        state,
                        error: PollError::Task(e),
                    });
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::{camera, frame_files, Scripted, ScriptedSource};
    use crate::config::Layout;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn poll_config(images_dir: &Path, layout: Layout, max_cycles: Option<u64>) -> PollConfig {
        PollConfig {
            images_dir: images_dir.to_path_buf(),
            layout,
            interval: Duration::from_millis(10),
            max_cycles,
        }
    }

    #[tokio::test]
    async fn test_two_cameras_three_cycles_each() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = Coordinator::new(
            poll_config(dir.path(), Layout::PerCamera, Some(3)),
            ScriptedSource::always(Scripted::Jpeg(1200)),
        );

        let summary = coordinator
            .run(vec![camera("anzacbr"), camera("georgest")], CancellationToken::new())
            .await;

        assert!(summary.failed.is_empty());
        assert_eq!(summary.per_camera.len(), 2);
        assert_eq!(summary.total(), 6);
        assert_eq!(summary.reported_total, 6);
        for state in &summary.per_camera {
            assert_eq!(state.download_count, 3);
            let on_disk = frame_files(&dir.path().join(&state.slug));
            assert_eq!(on_disk.len() as u64, state.download_count);
            assert!(on_disk.iter().all(|f| f.starts_with(&format!("{}_", state.slug))));
        }
    }

    #[tokio::test]
    async fn test_shared_layout_counts_match_disk() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = Coordinator::new(
            poll_config(dir.path(), Layout::Shared, Some(2)),
            ScriptedSource::always(Scripted::Jpeg(1500)),
        );
        let cameras = vec![camera("anzacbr"), camera("georgest"), camera("harbourbr")];

        let summary = coordinator.run(cameras, CancellationToken::new()).await;

        let files = frame_files(dir.path());
        assert_eq!(files.len() as u64, summary.total());
        for state in &summary.per_camera {
            let prefix = format!("{}_", state.slug);
            let count = files.iter().filter(|f| f.starts_with(&prefix)).count();
            assert_eq!(count as u64, state.download_count);
        }
    }

    #[tokio::test]
    async fn test_failing_camera_does_not_affect_others() {
        let dir = tempfile::tempdir().unwrap();
        // georgest's per-camera directory is blocked by a regular file
        std::fs::write(dir.path().join("georgest"), b"in the way").unwrap();

        let coordinator = Coordinator::new(
            poll_config(dir.path(), Layout::PerCamera, Some(2)),
            ScriptedSource::always(Scripted::Jpeg(1200)),
        );
        let summary = coordinator
            .run(vec![camera("anzacbr"), camera("georgest")], CancellationToken::new())
            .await;

        assert_eq!(summary.per_camera.len(), 1);
        assert_eq!(summary.per_camera[0].slug, "anzacbr");
        assert_eq!(summary.per_camera[0].download_count, 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].state.slug, "georgest");
        assert!(matches!(summary.failed[0].error, PollError::Storage(_)));
    }

    #[tokio::test]
    async fn test_failed_camera_frames_stay_in_total() {
        let tmp = tempfile::tempdir().unwrap();
        let images = tmp.path().join("images");
        let coordinator = Coordinator::new(
            PollConfig {
                images_dir: images.clone(),
                layout: Layout::Shared,
                interval: Duration::from_millis(300),
                max_cycles: Some(3),
            },
            ScriptedSource::always(Scripted::Jpeg(1200)),
        );
        let run = tokio::spawn(async move {
            coordinator
                .run(vec![camera("anzacbr")], CancellationToken::new())
                .await
        });

        // Break the directory while the loop sleeps after its first frame
        for _ in 0..200 {
            if images.is_dir() && frame_files(&images).len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        std::fs::remove_dir_all(&images).unwrap();
        std::fs::write(&images, b"in the way").unwrap();

        let summary = run.await.unwrap();
        assert!(summary.per_camera.is_empty());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].state.download_count, 1);
        assert_eq!(summary.reported_total, 1);
        assert_eq!(summary.total(), summary.reported_total);
    }

    #[tokio::test]
    async fn test_cancel_stops_every_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let dir: PathBuf = tmp.path().to_path_buf();
        let coordinator = Arc::new(Coordinator::new(
            PollConfig {
                images_dir: dir.clone(),
                layout: Layout::Shared,
                interval: Duration::from_secs(3600),
                max_cycles: None,
            },
            ScriptedSource::always(Scripted::Jpeg(1200)),
        ));
        let cancel = CancellationToken::new();

        let run = {
            let coordinator = coordinator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                coordinator
                    .run(vec![camera("anzacbr"), camera("georgest")], cancel)
                    .await
            })
        };

        // Let both loops finish their immediate first cycle
        for _ in 0..200 {
            if frame_files(&dir).len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();

        let summary = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("coordinator did not stop after cancellation")
            .unwrap();
        assert_eq!(summary.per_camera.len(), 2);
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn test_no_cameras_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = Coordinator::new(
            poll_config(dir.path(), Layout::Shared, None),
            ScriptedSource::always(Scripted::Jpeg(1200)),
        );
        let summary = coordinator.run(Vec::new(), CancellationToken::new()).await;
        assert_eq!(summary.total(), 0);
        assert!(summary.failed.is_empty());
    }
}
