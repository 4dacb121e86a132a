use cutline_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("mpv error: {0}")]
    Mpv(String),

    #[error("invalid playback config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
