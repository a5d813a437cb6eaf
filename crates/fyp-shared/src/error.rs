use thiserror::Error;

/// Rejection of a lifecycle operation. Every variant is client-facing; none
/// of them leaves state behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not possible in the current state: {0}")]
    Precondition(String),

    #[error("Supervisor is at capacity ({current}/{limit} active projects)")]
    CapacityExceeded { current: u32, limit: u32 },
}

impl LifecycleError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        Self::Precondition(reason.into())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} value: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed session token")]
    Malformed,

    #[error("Session token signature is invalid")]
    BadSignature,

    #[error("Session token has expired")]
    Expired,

    #[error("Token encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}
