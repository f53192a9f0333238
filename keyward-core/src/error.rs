use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, UserError>;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid user token")]
    InvalidToken,
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("password hash error: {0}")]
    Hash(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}

impl UserError {
    /// Transient failures may succeed on retry and never mean "bad credentials".
    pub fn is_transient(&self) -> bool {
        matches!(self, UserError::StoreUnavailable(_))
    }
}
