//! Account error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] maxima_core::EmailError),

    /// Missing or malformed role tag.
    #[error("invalid role: {0}")]
    InvalidRole(#[from] maxima_core::UserRoleError),

    /// Password was empty.
    #[error("password cannot be empty")]
    EmptyPassword,

    /// Email is already registered.
    #[error("email is already registered")]
    EmailTaken,

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No user has the given email.
    #[error("user not found")]
    UserNotFound,

    /// No user holds the given token.
    #[error("invalid token")]
    TokenNotFound,

    /// The token exists but is past its lifetime.
    #[error("token has expired")]
    TokenExpired,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Bearer token signing error.
    #[error("token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<maxima_core::account::TokenExpired> for AccountError {
    fn from(_: maxima_core::account::TokenExpired) -> Self {
        Self::TokenExpired
    }
}
