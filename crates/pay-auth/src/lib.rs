//! # pay-auth
//!
//! Accounts and sessions for the payments backend: Argon2id password
//! hashes, HS256 access tokens and single-use password reset tokens.

pub mod config;
pub mod error;
pub mod mailer;
pub mod password;
pub mod service;
pub mod token;

pub use config::{AuthConfig, MIN_JWT_SECRET_LEN};
pub use error::AuthError;
pub use mailer::{HttpMailer, LogMailer, MailMessage, Mailer, SharedMailer};
pub use service::{AuthService, LoginOutput, RegisterInput, RESET_REQUESTED_MESSAGE};
pub use token::AccessTokenClaims;
