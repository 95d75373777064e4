//! Error types for CDP

use thiserror::Error;

/// Result type alias for CDP operations
pub type Result<T> = std::result::Result<T, CdpError>;

/// Main error type for CDP
#[derive(Error, Debug)]
pub enum CdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error in '{document}': {reason}")]
    Parse { document: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Every value of the identifier space has already been handed out
    #[error("Identifier space exhausted: all {capacity} values of length {size} are in use")]
    IdSpaceExhausted { size: usize, capacity: u128 },

    #[error("Gave up generating a unique identifier after {attempts} attempts")]
    IdRetryExhausted { attempts: usize },

    #[error("Archive '{0}' has no entries")]
    EmptyArchive(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl CdpError {
    /// Create a parse error for the named document
    pub fn parse(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            document: document.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a lock-poisoned error from any poison guard
    pub fn poisoned<T>(what: &str, err: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned(format!("{}: {}", what, err))
    }
}

impl From<tokio::task::JoinError> for CdpError {
    fn from(err: tokio::task::JoinError) -> Self {
        CdpError::Task(err.to_string())
    }
}
