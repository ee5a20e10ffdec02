//! Authentication configuration.

/// Shortest accepted `JWT_SECRET`, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Configuration for the authentication service.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for HS256 access tokens.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 1800 = 30 minutes).
    pub access_token_lifetime_secs: u64,
    /// Password reset token lifetime in seconds (default: 3600 = 1 hour).
    pub reset_token_lifetime_secs: u64,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Base URL used to build reset links.
    pub frontend_url: String,
}

impl AuthConfig {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            ..Self::default()
        }
    }

    /// `{frontend_url}/reset-password?token={token}`
    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.frontend_url.trim_end_matches('/'),
            token
        )
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_lifetime_secs: 1800,
            reset_token_lifetime_secs: 3600,
            min_password_length: 8,
            frontend_url: "http://localhost:3000".into(),
        }
    }
}
