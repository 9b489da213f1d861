use serde::Serialize;

/// Application error types surfaced by the reminder engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "type", content = "message")]
pub enum AppError {
    /// Bad user input: empty message, unparseable or past time, empty selector
    #[error("Validation error: {0}")]
    Validation(String),
    /// The durable store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),
    /// An internal scheduler invariant did not hold
    #[error("Scheduler inconsistency: {0}")]
    SchedulerInconsistency(String),
    /// Invalid runtime configuration
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Persistence(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Persistence(error.to_string())
    }
}

// Convenience constructors
impl AppError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        AppError::Persistence(msg.into())
    }

    pub fn inconsistency<S: Into<String>>(msg: S) -> Self {
        AppError::SchedulerInconsistency(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        AppError::Config(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

/// Result type alias for engine operations
pub type AppResult<T> = Result<T, AppError>;
