//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no usable api keys available")]
    NoKeysAvailable,

    #[error("key store error: {0}")]
    Store(#[from] youtube_keys::Error),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
