//! The error taxonomy from spec.md §7, as a concrete type instead of prose.
//!
//! `SpineError` carries enough structure for the HTTP adapter to pick a
//! status code and a machine-readable `error` discriminator without string
//! matching; the `Display` impl is for logs only.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpineError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("role is not permitted to access this job")]
    Forbidden,

    #[error("role is authenticated but is not this job's owner")]
    NotOwner,

    #[error("job {0} not found")]
    NotFound(String),

    #[error("job is already claimed or its lease has not yet expired")]
    AlreadyClaimed,

    #[error("job is in a terminal status and cannot be claimed")]
    TerminalStatus,

    #[error("job is not running")]
    NotRunning,

    #[error("job has reached its maximum attempt count")]
    MaxAttemptsReached,

    #[error("could not acquire the per-job claim lock")]
    Locked,

    #[error("internal error: {0}")]
    Internal(String),
}

impl SpineError {
    /// The machine-readable discriminator spec.md §7 and §6.1 require in
    /// 401/403/404/409 bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            SpineError::Unauthorized => "unauthorized",
            SpineError::Forbidden => "forbidden",
            SpineError::NotOwner => "not_owner",
            SpineError::NotFound(_) => "not_found",
            SpineError::AlreadyClaimed => "already_claimed",
            SpineError::TerminalStatus => "terminal_status",
            SpineError::NotRunning => "not_running",
            SpineError::MaxAttemptsReached => "max_attempts_reached",
            SpineError::Locked => "locked",
            SpineError::Internal(_) => "internal",
        }
    }

    /// HTTP status spec.md's endpoint table assigns to this error.
    pub fn status_code(&self) -> u16 {
        match self {
            SpineError::Unauthorized => 401,
            SpineError::Forbidden | SpineError::NotOwner => 403,
            SpineError::NotFound(_) => 404,
            SpineError::AlreadyClaimed
            | SpineError::TerminalStatus
            | SpineError::NotRunning
            | SpineError::MaxAttemptsReached
            | SpineError::Locked => 409,
            SpineError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpineError>;
