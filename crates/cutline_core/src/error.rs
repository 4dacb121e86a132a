use crate::types::TimeUs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Track not found: {0}")]
    TrackNotFound(uuid::Uuid),

    #[error("Track is locked: {0}")]
    TrackLocked(uuid::Uuid),

    #[error("Clip not found: {0}")]
    ClipNotFound(uuid::Uuid),

    #[error("Media not found: {0}")]
    MediaNotFound(uuid::Uuid),

    #[error("Invalid trim: {trim_start} + {trim_end} exceeds source length {native}")]
    InvalidTrim {
        trim_start: TimeUs,
        trim_end: TimeUs,
        native: TimeUs,
    },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid speed: {0}")]
    InvalidSpeed(f64),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

pub type Result<T> = std::result::Result<T, CoreError>;
