//! Error types.

use thiserror::Error;

/// Failure talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    /// Insert collided with an existing row (duplicate like/follow).
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("storage bucket missing: {0}")]
    BucketMissing(String),
    #[error("local store: {0}")]
    Store(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Upload validation. Display strings are shown to the user as-is.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Unable to read this video.")]
    UnreadableMedia,
    #[error("Video must be 5s–3min long.")]
    InvalidDuration,
    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),
    #[error("Please pick a video first.")]
    NoMedia,
    #[error("Please add a title.")]
    MissingTitle,
    #[error("Please add a description.")]
    MissingDescription,
    #[error("An upload is already in progress.")]
    Busy,
    #[error("Could not read file: {0}")]
    Io(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("settings store: {0}")]
    Store(String),
    #[error("sign in first")]
    NotSignedIn,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("only the owner can do that")]
    Forbidden,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<nine_s_core::errors::NineSError> for BackendError {
    fn from(e: nine_s_core::errors::NineSError) -> Self {
        BackendError::Store(e.to_string())
    }
}

impl From<nine_s_core::errors::NineSError> for Error {
    fn from(e: nine_s_core::errors::NineSError) -> Self {
        Error::Store(e.to_string())
    }
}
