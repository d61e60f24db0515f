//! Stateless access token codec.
//!
//! Tokens are compact HS512 JWTs carrying the user id and email. There is no
//! revocation list: logout revokes only the refresh token, outstanding access
//! tokens stay valid until natural expiry.

use anyhow::anyhow;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id (UUID string).
    pub sub: String,
    pub email: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenCodec {
    #[must_use]
    pub fn new(signing_key: &SecretString, lifetime: Duration) -> Self {
        let secret = signing_key.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime,
        }
    }

    /// Issue a signed access token for `user`, expiring after the configured
    /// lifetime.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] if signing fails.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding)
            .map_err(|err| Error::Internal(anyhow!("access token signing failed: {err}")))
    }

    /// Validate signature, declared algorithm and expiry. A token declaring
    /// any algorithm other than HS512 is rejected regardless of its
    /// signature.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] for any invalid token.
    pub fn validate(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_required_spec_claims(&["exp"]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| Error::authentication("invalid access token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64ct::{Base64UrlUnpadded, Encoding};
    use uuid::Uuid;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "foo@bar.com".to_string(),
            password_hash: String::new(),
            confirmed: true,
            enabled: true,
            otp_secret_enc: None,
            otp_enabled: false,
            created_at: Utc::now(),
        }
    }

    fn test_codec(lifetime: Duration) -> TokenCodec {
        TokenCodec::new(
            &SecretString::from("unit-test-signing-key".to_string()),
            lifetime,
        )
    }

    #[test]
    fn test_issue_and_validate() {
        let codec = test_codec(Duration::minutes(5));
        let user = test_user();
        let token = codec.issue(&user).unwrap();
        let claims = codec.validate(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "foo@bar.com");
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = test_codec(Duration::minutes(-5));
        let token = codec.issue(&test_user()).unwrap();
        assert!(codec.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let codec = test_codec(Duration::minutes(5));
        let other = TokenCodec::new(
            &SecretString::from("different-key".to_string()),
            Duration::minutes(5),
        );
        let token = codec.issue(&test_user()).unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let codec = test_codec(Duration::minutes(5));
        let token = codec.issue(&test_user()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let payload = Base64UrlUnpadded::decode_vec(parts[1]).unwrap();
        let tampered = String::from_utf8(payload)
            .unwrap()
            .replace("foo@bar.com", "bar@bar.com");
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            Base64UrlUnpadded::encode_string(tampered.as_bytes()),
            parts[2]
        );
        assert!(codec.validate(&forged).is_err());
    }

    #[test]
    fn test_algorithm_substitution_rejected() {
        let codec = test_codec(Duration::minutes(5));
        let user = test_user();
        // Same key, different declared algorithm: must be refused.
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp(),
        };
        let downgraded = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"unit-test-signing-key"),
        )
        .unwrap();
        assert!(codec.validate(&downgraded).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = test_codec(Duration::minutes(5));
        assert!(codec.validate("xxxxxxx").is_err());
        assert!(codec.validate("").is_err());
    }
}
