use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store not configured, unreachable, or the request deadline passed.
    #[error("Service unavailable")]
    Unavailable,

    /// Covers unknown, expired and already consumed tokens alike.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Unique violation. Only the account resolver recovers from it; anywhere
    /// else it is an internal failure.
    #[error("Record already exists")]
    Conflict,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidInput,
    InvalidToken,
    ServiceUnavailable,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput(_) => ErrorCode::InvalidInput,
            AppError::Unavailable => ErrorCode::ServiceUnavailable,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Conflict | AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
