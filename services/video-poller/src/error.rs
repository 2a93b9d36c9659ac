//! Service-specific error types

use thiserror::Error;

/// Errors from one page fetch against the search API.
///
/// Pool exhaustion is deliberately absent: running out of eligible keys
/// degrades to an empty page inside the fetcher, so the scheduler never
/// sees it as a fault. Everything here is fatal for the current page and
/// surfaces to the scheduler, which retries on its next tick.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search returned unexpected status {status}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("key pool error: {0}")]
    Keys(#[from] youtube_pool::Error),
}

/// Errors from the video store file.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("video file parse error: {0}")]
    Parse(String),
}
