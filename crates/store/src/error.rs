use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid store path: {0}")]
    InvalidPath(String),

    #[error("Unsupported snapshot schema version {found} (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("Write queue is shutting down")]
    ShuttingDown,

    #[error("Write queue is full")]
    QueueFull,

    #[error("Write worker is gone")]
    WorkerGone,

    #[error("Unit of work panicked: {0}")]
    WorkPanicked(String),

    #[error("{0}")]
    Other(String),
}
