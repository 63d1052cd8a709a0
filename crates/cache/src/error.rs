use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    InvalidPattern(#[from] globset::Error),

    #[error("Invalid cache path: {0}")]
    InvalidPath(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}
