use thiserror::Error;
use crate::backend::BackendError;

/// Application-level errors.
/// Some variants are reserved for future use as error handling is expanded.
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Password prompt cancelled")]
    PasswordCancelled,

    #[error("Password did not work for {0}")]
    PasswordExhausted(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type AppResult<T> = Result<T, AppError>;
