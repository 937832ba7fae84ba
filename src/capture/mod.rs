/// Camera capture module
///
/// This module handles the download side:
/// - Fetching snapshots over HTTP (fetcher.rs)
/// - Rejecting payloads that are not images (validator.rs)
/// - Naming and persisting frames (writer.rs)
/// - The per-camera polling loop (poll.rs)
/// - Running many cameras at once (coordinator.rs)

pub mod coordinator;
pub mod fetcher;
pub mod poll;
pub mod validator;
pub mod writer;

pub use coordinator::Coordinator;
pub use fetcher::HttpFetcher;
pub use poll::PollConfig;
