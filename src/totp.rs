//! TOTP second-factor manager.
//!
//! Per-user state machine: `Disabled -> PendingConfirmation -> Enabled`,
//! plus `Enabled -> Disabled`. The secret is stored encrypted at rest
//! (ChaCha20-Poly1305, key derived from the configured passphrase) from the
//! moment of enrollment; only a confirmed secret gates login.

use anyhow::anyhow;
use base64ct::{Base64, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use crate::config::TotpConfig;
use crate::error::{Error, Result};
use crate::store::User;

const NONCE_LEN: usize = 12;

/// Plaintext enrollment material returned once to the user.
#[derive(Debug)]
pub struct Enrollment {
    /// Base32 secret for manual entry.
    pub secret: String,
    /// Provisioning QR code as a `data:image/png;base64,...` URL.
    pub image: String,
}

#[derive(Clone)]
pub struct TotpManager {
    issuer: String,
    cipher_key: [u8; 32],
}

impl TotpManager {
    #[must_use]
    pub fn new(config: &TotpConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            cipher_key: derive_key(&config.encryption_key),
        }
    }

    /// Begin enrollment: generate a fresh random secret, store it encrypted
    /// on the user in an unconfirmed state, and return the provisioning
    /// material. Does not flip `otp_enabled`.
    ///
    /// # Errors
    /// Returns [`Error::Conflict`] if the second factor is already enabled,
    /// [`Error::Internal`] on crypto failure.
    pub fn init(&self, user: &mut User) -> Result<Enrollment> {
        if user.otp_enabled {
            return Err(Error::conflict("second factor already enabled"));
        }

        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|err| Error::Internal(anyhow!("secret generation failed: {err:?}")))?;
        let totp = self.totp_for(secret_bytes, &user.email)?;

        let image = totp
            .get_qr_base64()
            .map(|encoded| format!("data:image/png;base64,{encoded}"))
            .map_err(|err| Error::Internal(anyhow!("QR generation failed: {err}")))?;
        let secret_base32 = totp.get_secret_base32();

        user.otp_secret_enc = Some(self.encrypt(&secret_base32, user.id)?);
        Ok(Enrollment {
            secret: secret_base32,
            image,
        })
    }

    /// Confirm enrollment with a current passcode. On success the second
    /// factor starts gating login; on failure the state is unchanged.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] for a wrong passcode or when no
    /// enrollment is pending.
    pub fn confirm(&self, user: &mut User, passcode: &str) -> Result<()> {
        let Some(encrypted) = user.otp_secret_enc.clone() else {
            return Err(Error::authentication("no pending second factor enrollment"));
        };
        if self.check(&encrypted, user.id, passcode)? {
            user.otp_enabled = true;
            Ok(())
        } else {
            Err(Error::authentication("invalid passcode"))
        }
    }

    /// Unconditionally clear the secret and the enabled flag. Callers must
    /// have authenticated the user already.
    pub fn disable(&self, user: &mut User) {
        user.otp_secret_enc = None;
        user.otp_enabled = false;
    }

    /// Verify a login passcode against the user's confirmed secret.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] if the stored secret cannot be decrypted.
    pub fn verify(&self, user: &User, passcode: &str) -> Result<bool> {
        let Some(encrypted) = user.otp_secret_enc.as_deref() else {
            return Ok(false);
        };
        self.check(encrypted, user.id, passcode)
    }

    fn check(&self, encrypted_secret: &str, user_id: Uuid, passcode: &str) -> Result<bool> {
        let secret_base32 = self.decrypt(encrypted_secret, user_id)?;
        let secret_bytes = Secret::Encoded(secret_base32)
            .to_bytes()
            .map_err(|err| Error::Internal(anyhow!("stored secret malformed: {err:?}")))?;
        // The account label is irrelevant for verification.
        let totp = self.totp_for(secret_bytes, "user")?;
        Ok(totp.check_current(passcode).unwrap_or(false))
    }

    /// One time-step of clock skew is allowed on either side.
    fn totp_for(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP> {
        TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| Error::Internal(anyhow!("TOTP init failed: {err}")))
    }

    /// Encrypt the base32 secret, binding the ciphertext to the owning user
    /// via AAD. Output is `nonce || ciphertext`, base64.
    fn encrypt(&self, secret_base32: &str, user_id: Uuid) -> Result<String> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.cipher_key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let aad = construct_aad(user_id);
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: secret_base32.as_bytes(),
                    aad: &aad,
                },
            )
            .map_err(|err| Error::Internal(anyhow!("secret encryption failed: {err}")))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);
        Ok(Base64::encode_string(&combined))
    }

    fn decrypt(&self, encoded: &str, user_id: Uuid) -> Result<String> {
        let combined = Base64::decode_vec(encoded)
            .map_err(|err| Error::Internal(anyhow!("stored secret not base64: {err}")))?;
        if combined.len() < NONCE_LEN {
            return Err(Error::Internal(anyhow!("stored secret too short")));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.cipher_key));
        let aad = construct_aad(user_id);
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|err| Error::Internal(anyhow!("secret decryption failed: {err}")))?;
        String::from_utf8(plaintext)
            .map_err(|err| Error::Internal(anyhow!("decrypted secret not UTF-8: {err}")))
    }
}

fn derive_key(encryption_key: &SecretString) -> [u8; 32] {
    let digest = Sha256::digest(encryption_key.expose_secret().as_bytes());
    digest.into()
}

fn construct_aad(user_id: Uuid) -> Vec<u8> {
    format!("totp-secret:v1|{user_id}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_manager() -> TotpManager {
        let config = TotpConfig::new(
            "Authgate Test".to_string(),
            SecretString::from("0123456789abcdef".to_string()),
        )
        .unwrap();
        TotpManager::new(&config)
    }

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

    fn current_passcode(secret_base32: &str) -> String {
        let totp = TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            Secret::Encoded(secret_base32.to_string()).to_bytes().unwrap(),
            Some("Authgate Test".to_string()),
            "foo@bar.com".to_string(),
        )
        .unwrap();
        totp.generate_current().unwrap()
    }

    #[test]
    fn test_init_leaves_otp_disabled() {
        let manager = test_manager();
        let mut user = test_user();
        let enrollment = manager.init(&mut user).unwrap();

        assert!(!enrollment.secret.is_empty());
        assert!(enrollment.image.starts_with("data:image/png;base64,"));
        assert!(user.otp_secret_enc.is_some());
        assert!(!user.otp_enabled);
        // Secret is never stored in cleartext.
        assert!(!user
            .otp_secret_enc
            .as_deref()
            .unwrap()
            .contains(&enrollment.secret));
    }

    #[test]
    fn test_confirm_flips_enabled() {
        let manager = test_manager();
        let mut user = test_user();
        let enrollment = manager.init(&mut user).unwrap();

        let passcode = current_passcode(&enrollment.secret);
        manager.confirm(&mut user, &passcode).unwrap();
        assert!(user.otp_enabled);
    }

    #[test]
    fn test_confirm_wrong_passcode_leaves_state() {
        let manager = test_manager();
        let mut user = test_user();
        manager.init(&mut user).unwrap();

        assert!(manager.confirm(&mut user, "000000").is_err());
        assert!(!user.otp_enabled);
        assert!(user.otp_secret_enc.is_some());
    }

    #[test]
    fn test_verify_after_confirm() {
        let manager = test_manager();
        let mut user = test_user();
        let enrollment = manager.init(&mut user).unwrap();
        let passcode = current_passcode(&enrollment.secret);
        manager.confirm(&mut user, &passcode).unwrap();

        assert!(manager.verify(&user, &passcode).unwrap());
        assert!(!manager.verify(&user, "000000").unwrap());
    }

    #[test]
    fn test_disable_clears_everything() {
        let manager = test_manager();
        let mut user = test_user();
        manager.init(&mut user).unwrap();
        user.otp_enabled = true;

        manager.disable(&mut user);
        assert!(user.otp_secret_enc.is_none());
        assert!(!user.otp_enabled);
    }

    #[test]
    fn test_init_refused_when_enabled() {
        let manager = test_manager();
        let mut user = test_user();
        user.otp_enabled = true;
        assert!(manager.init(&mut user).is_err());
    }

    #[test]
    fn test_ciphertext_bound_to_user() {
        let manager = test_manager();
        let mut user = test_user();
        manager.init(&mut user).unwrap();

        // The same ciphertext under another user id must not decrypt.
        let encrypted = user.otp_secret_enc.clone().unwrap();
        assert!(manager.decrypt(&encrypted, Uuid::new_v4()).is_err());
        assert!(manager.decrypt(&encrypted, user.id).is_ok());
    }
}
