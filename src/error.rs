//! Error values returned by the credential store, the post repository and the
//! session authenticator.
//!
//! Handlers are the only place these are turned into HTTP responses; see
//! `api::handlers` for the mapping.

use std::fmt;

use thiserror::Error;

use crate::model::PostId;

/// Why a login attempt was rejected.
///
/// Both reasons are logged, but the login form only ever shows a single
/// generic message so callers cannot probe which usernames exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownUser,
    BadCredentials,
}

impl AuthFailure {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownUser => "unknown user",
            Self::BadCredentials => "bad credentials",
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A required field was missing.
    #[error("{0}")]
    Validation(&'static str),
    /// Uniqueness violation.
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    Auth(AuthFailure),
    #[error("post {0} does not exist")]
    NotFound(PostId),
    /// The requester is authenticated but does not own the post.
    #[error("post {0} belongs to another user")]
    Forbidden(PostId),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Password(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// SQLite reports `UNIQUE` constraint failures with extended code 2067, which
/// sqlx classifies as `ErrorKind::UniqueViolation`.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
