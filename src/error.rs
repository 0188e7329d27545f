// PPE Watch Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PpeWatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Unknown class id {class_id} in frame {frame}")]
    UnknownClassId { frame: usize, class_id: u32 },

    #[error("Invalid label table: {0}")]
    LabelTable(String),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PpeWatchError {
    fn from(err: anyhow::Error) -> Self {
        PpeWatchError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PpeWatchError>;
