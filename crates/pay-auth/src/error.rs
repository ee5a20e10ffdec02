//! Authentication error types.

use pay_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid email address")]
    InvalidEmail,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("invalid or expired reset token")]
    InvalidResetToken,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("mail delivery failed: {0}")]
    Mail(String),
}

impl AuthError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => 401,
            AuthError::EmailTaken
            | AuthError::InvalidEmail
            | AuthError::InvalidInput(_)
            | AuthError::WeakPassword { .. }
            | AuthError::InvalidResetToken => 400,
            AuthError::Crypto(_) | AuthError::Storage(_) | AuthError::Mail(_) => 500,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::EmailTaken,
            StoreError::NotFound(msg) | StoreError::Backend(msg) => AuthError::Storage(msg),
        }
    }
}
