//! Password hashing and verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use std::sync::LazyLock;

use crate::error::AuthError;

/// Hash checked when no account matches, so a miss costs one Argon2 run
/// like a wrong password does.
static DUMMY_HASH: LazyLock<Result<String, AuthError>> =
    LazyLock::new(|| hash_password("dummy-password-for-unknown-accounts"));

#[cfg(test)]
thread_local! {
    pub(crate) static VERIFY_CALLS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Hash a plaintext password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut rng = rand::rng();
    let salt_bytes: [u8; 16] = rand::Rng::random(&mut rng);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AuthError::Crypto(format!("salt encode: {e}")))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("hash error: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::Crypto)` if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    #[cfg(test)]
    VERIFY_CALLS.with(|calls| calls.set(calls.get() + 1));

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Verify against the account's hash, or against a dummy hash when there
/// is no account. A missing account never matches.
pub fn verify_password_or_dummy(password: &str, hash: Option<&str>) -> Result<bool, AuthError> {
    match hash {
        Some(hash) => verify_password(password, hash),
        None => {
            if let Ok(dummy) = DUMMY_HASH.as_ref() {
                let _ = verify_password(password, dummy);
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("hunter22").unwrap();
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash").is_err());
    }

    #[test]
    fn missing_account_runs_argon2_and_never_matches() {
        let dummy = DUMMY_HASH.as_ref().unwrap();
        assert!(dummy.starts_with("$argon2id$"));

        let before = VERIFY_CALLS.with(|c| c.get());
        assert!(!verify_password_or_dummy("dummy-password-for-unknown-accounts", None).unwrap());
        assert_eq!(VERIFY_CALLS.with(|c| c.get()), before + 1);
    }
}
