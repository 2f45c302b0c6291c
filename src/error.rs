use crate::status::{Status, STATUS_CRASH, STATUS_ERR, STATUS_TIMEOUT};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("thread pool not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("primary worker {index} is missing")]
    PrimaryWorkerMissing { index: usize },

    #[error("cannot release {requested} secondary workers, only {available} running")]
    InsufficientSecondary { requested: usize, available: usize },

    #[error("no capacity left for a secondary worker")]
    NoSecondaryCapacity,

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("task dropped before completion")]
    TaskDropped,

    #[error("task failed: {0}")]
    TaskFailed(Status),

    #[error("worker panic: {0}")]
    WorkerPanic(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Status code this error maps to.
    pub fn code(&self) -> i32 {
        match self {
            Error::Timeout(_) => STATUS_TIMEOUT,
            Error::PrimaryWorkerMissing { .. } => STATUS_CRASH,
            Error::TaskFailed(status) => status.code(),
            _ => STATUS_ERR,
        }
    }

    /// Whether the caller should treat this as unrecoverable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::PrimaryWorkerMissing { .. } => true,
            Error::TaskFailed(status) => status.is_crash(),
            _ => false,
        }
    }
}
