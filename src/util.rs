//! Small helpers shared by the ledgers and handlers.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern")
});

/// Normalize an email for lookup/uniqueness checks. Comparison is
/// case-insensitive throughout.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Generate a high-entropy opaque token (32 random bytes, base64url without
/// padding, 43 characters). Used for refresh tokens and pending actions; the
/// raw value is handed to the client, never derived from anything.
#[must_use]
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" fOo@bAr.com "), "foo@bar.com");
        assert_eq!(normalize_email("foo@bar.com"), "foo@bar.com");
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("foo@bar.com"));
        assert!(!valid_email("foobar.com"));
        assert!(!valid_email("foo@bar"));
        assert!(!valid_email(""));
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_random_token_unique() {
        assert_ne!(random_token(), random_token());
    }
}
