//! Password hashing and random password generation.
//!
//! Argon2id with a per-password random salt; verification recomputes and
//! compares in constant time via the `argon2` verifier.

use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;

use crate::error::{Error, Result};

/// Alphanumeric alphabet for generated passwords, excluding the visually
/// ambiguous `O` and `0`.
const PASSWORD_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz123456789";

/// Length of passwords produced by the reset flow.
pub const GENERATED_PASSWORD_LENGTH: usize = 8;

/// Hash a password with Argon2id and a fresh random salt.
///
/// # Errors
/// Returns [`Error::Internal`] if hashing fails.
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hashed| hashed.to_string())
        .map_err(|err| Error::Internal(anyhow!("password hashing failed: {err}")))
}

/// Verify a password against a stored PHC hash string. An empty or
/// unparsable hash never verifies.
#[must_use]
pub fn verify(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate a random password of `length` characters from
/// [`PASSWORD_ALPHABET`].
#[must_use]
pub fn generate(length: usize) -> String {
    let mut rng = rand::rngs::OsRng;
    (0..length)
        .map(|_| {
            let index = rng.gen_range(0..PASSWORD_ALPHABET.len());
            char::from(PASSWORD_ALPHABET[index])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash("12345678").unwrap();
        assert!(verify("12345678", &hashed));
        assert!(!verify("87654321", &hashed));
    }

    #[test]
    fn test_salts_differ() {
        let first = hash("12345678").unwrap();
        let second = hash("12345678").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_empty_hash_never_verifies() {
        assert!(!verify("12345678", ""));
        assert!(!verify("", ""));
    }

    #[test]
    fn test_generate_length_and_alphabet() {
        let password = generate(GENERATED_PASSWORD_LENGTH);
        assert_eq!(password.len(), 8);
        assert!(password
            .bytes()
            .all(|byte| PASSWORD_ALPHABET.contains(&byte)));
        assert!(!password.contains('O'));
        assert!(!password.contains('0'));
    }
}
