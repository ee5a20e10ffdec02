//! # User Types
//!
//! Account records shared by the auth and payment layers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered user.
///
/// `password_hash` and the reset token hash never leave the service;
/// they are skipped on serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub last_name: String,
    /// Unique, stored lowercase
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub reset_token_hash: Option<String>,
    #[serde(skip)]
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }

    /// Whether `token_hash` matches an unexpired reset token
    pub fn reset_token_valid(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        match (&self.reset_token_hash, self.reset_token_expires_at) {
            (Some(stored), Some(expires)) => stored == token_hash && expires > now,
            _ => false,
        }
    }
}

/// Input for inserting a user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User {
            id: 1,
            name: "Ana".into(),
            last_name: "López".into(),
            email: "ana@example.com".into(),
            password_hash: "$argon2id$...".into(),
            reset_token_hash: Some("abc".into()),
            reset_token_expires_at: Some(Utc::now() + Duration::hours(1)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(user().full_name(), "Ana López");
    }

    #[test]
    fn test_reset_token_valid() {
        let u = user();
        assert!(u.reset_token_valid("abc", Utc::now()));
        assert!(!u.reset_token_valid("abd", Utc::now()));
        assert!(!u.reset_token_valid("abc", Utc::now() + Duration::hours(2)));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_token_hash").is_none());
        assert_eq!(json["email"], "ana@example.com");
    }
}
