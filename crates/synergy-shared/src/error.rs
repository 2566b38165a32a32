use thiserror::Error;

/// Errors surfaced by remote operations, the identity provider and
/// client-side input checks.
///
/// Every variant is recoverable: callers present a message and keep going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynergyError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use: {0}")]
    EmailAlreadyInUse(String),

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SynergyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Client-side input check failures. These are raised at the point of
/// input and never reach the remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("{0}")]
    Rejected(&'static str),

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
}

pub type Result<T> = std::result::Result<T, SynergyError>;
