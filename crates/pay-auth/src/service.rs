//! Authentication service: registration, login, password reset and
//! bearer token verification.

use chrono::{Duration, Utc};
use pay_core::{NewUser, SharedUserStore, User};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::mailer::{MailMessage, SharedMailer};
use crate::password;
use crate::token;

/// Message returned for every reset request, known email or not.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If the email is registered, a password reset link has been sent";

const MAX_NAME_LEN: usize = 100;

/// Input for the registration flow.
#[derive(Debug)]
pub struct RegisterInput {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Successful login result.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Authentication service.
///
/// Holds the user store as a trait object so the auth layer has no
/// dependency on the database crate.
pub struct AuthService {
    users: SharedUserStore,
    mailer: SharedMailer,
    config: AuthConfig,
}

/// Trim and lowercase an email, rejecting obviously malformed ones.
pub fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::InvalidEmail);
    };
    let valid = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace);
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail)
    }
}

impl AuthService {
    pub fn new(users: SharedUserStore, mailer: SharedMailer, config: AuthConfig) -> Self {
        Self {
            users,
            mailer,
            config,
        }
    }

    fn check_password_policy(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::WeakPassword {
                min: self.config.min_password_length,
            });
        }
        Ok(())
    }

    /// Create an account. Duplicate emails are rejected.
    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterInput) -> Result<User, AuthError> {
        let email = normalize_email(&input.email)?;
        let name = input.name.trim();
        let last_name = input.last_name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN || last_name.len() > MAX_NAME_LEN {
            return Err(AuthError::InvalidInput(format!(
                "name must be 1..={MAX_NAME_LEN} characters"
            )));
        }
        self.check_password_policy(&input.password)?;

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = password::hash_password(&input.password)?;
        // the store enforces uniqueness as well, so a racing insert still conflicts
        let user = self
            .users
            .create(NewUser {
                name: name.to_string(),
                last_name: last_name.to_string(),
                email,
                password_hash,
            })
            .await?;

        info!(user_id = user.id, "Registered user");
        Ok(user)
    }

    /// Verify credentials and issue an access token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self.users.get_by_email(&email).await?;

        let matches = password::verify_password_or_dummy(
            password,
            user.as_ref().map(|u| u.password_hash.as_str()),
        )?;
        let Some(user) = user.filter(|_| matches) else {
            return Err(AuthError::InvalidCredentials);
        };

        let access_token = token::issue_access_token(user.id, &self.config)?;
        info!(user_id = user.id, "User logged in");
        Ok(LoginOutput {
            access_token,
            token_type: "bearer",
            expires_in: self.config.access_token_lifetime_secs,
        })
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate(&self, bearer: &str) -> Result<User, AuthError> {
        let claims = token::decode_access_token(bearer, &self.config)?;
        let user_id = claims.user_id()?;
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::TokenInvalid("user no longer exists".into()))
    }

    /// Start a password reset. The result never reveals whether the email
    /// is registered.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<&'static str, AuthError> {
        let Ok(email) = normalize_email(email) else {
            return Ok(RESET_REQUESTED_MESSAGE);
        };
        let Some(user) = self.users.get_by_email(&email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(RESET_REQUESTED_MESSAGE);
        };

        let raw_token = token::generate_reset_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.reset_token_lifetime_secs as i64);
        self.users
            .set_reset_token(user.id, Some(token::hash_reset_token(&raw_token)), Some(expires_at))
            .await?;

        let message = MailMessage {
            to: user.email.clone(),
            subject: "Password reset".to_string(),
            text: format!(
                "Hello {},\n\nUse the link below to choose a new password. It expires in {} minutes.\n\n{}\n\nIf you did not request this, ignore this email.\n",
                user.name,
                self.config.reset_token_lifetime_secs / 60,
                self.config.reset_link(&raw_token)
            ),
        };
        if let Err(e) = self.mailer.send(&message).await {
            warn!(user_id = user.id, "Failed to send reset email: {}", e);
        }

        Ok(RESET_REQUESTED_MESSAGE)
    }

    /// Complete a password reset. Each token works once.
    #[instrument(skip(self, raw_token, new_password))]
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<User, AuthError> {
        self.check_password_policy(new_password)?;
        if raw_token.trim().is_empty() {
            return Err(AuthError::InvalidResetToken);
        }

        let password_hash = password::hash_password(new_password)?;
        let user = self
            .users
            .consume_reset_token(&token::hash_reset_token(raw_token.trim()), &password_hash, Utc::now())
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        info!(user_id = user.id, "Password reset completed");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        assert!(normalize_email("ana").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@localhost").is_err());
        assert!(normalize_email("ana@@example.com").is_err());
        assert!(normalize_email("a na@example.com").is_err());
    }

    #[tokio::test]
    async fn both_login_failures_run_the_password_verifier() {
        use crate::mailer::LogMailer;
        use crate::password::VERIFY_CALLS;
        use pay_core::InMemoryStore;
        use std::sync::Arc;

        let service = AuthService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(LogMailer::new()),
            AuthConfig::new("a-unit-test-secret-of-32-bytes!!"),
        );
        service
            .register(RegisterInput {
                name: "Ana".into(),
                last_name: "López".into(),
                email: "ana@example.com".into(),
                password: "correct-horse".into(),
            })
            .await
            .unwrap();

        let calls = || VERIFY_CALLS.with(|c| c.get());

        let before = calls();
        let err = service.login("nobody@example.com", "correct-horse").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(calls(), before + 1);

        let before = calls();
        let err = service.login("ana@example.com", "wrong-horse").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(calls(), before + 1);
    }
}
