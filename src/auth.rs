//! Authentication service: orchestrates login/renew/logout/signup/change/
//! reset/confirm flows over the ledgers, the token codec and the stores.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::notify::{Notification, Notifier};
use crate::password;
use crate::pending::PendingActionLedger;
use crate::session::RefreshTokenLedger;
use crate::store::{PendingActionKind, User, UserStore};
use crate::token::TokenCodec;
use crate::totp::TotpManager;
use crate::util::normalize_email;

/// Kinds whose live presence means an email address is already spoken for.
const CLAIMING_KINDS: [PendingActionKind; 2] = [
    PendingActionKind::ConfirmAccount,
    PendingActionKind::ChangeEmail,
];

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Outcome of a login attempt that passed the password check.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(SessionTokens),
    /// TOTP is enabled and no valid current passcode was supplied. No
    /// tokens are issued, not even a partial one; the client must resubmit
    /// email, password and passcode together.
    SecondFactorRequired,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    refresh_tokens: RefreshTokenLedger,
    pending_actions: PendingActionLedger,
    codec: TokenCodec,
    totp: Option<TotpManager>,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: RefreshTokenLedger,
        pending_actions: PendingActionLedger,
        codec: TokenCodec,
        totp: Option<TotpManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            pending_actions,
            codec,
            totp,
            notifier,
        }
    }

    /// Authenticate with email and password, plus a TOTP passcode when the
    /// account has the second factor enabled.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] for an unknown, unconfirmed or
    /// disabled account or a password mismatch.
    pub async fn login(
        &self,
        email: &str,
        password_input: &str,
        passcode: Option<&str>,
    ) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        let Some(user) = self.users.get_by_email(&email).await? else {
            warn!(email, "login rejected: unknown account");
            return Err(Error::authentication("invalid credentials"));
        };
        if !user.confirmed {
            warn!(user_id = %user.id, "login rejected: unconfirmed account");
            return Err(Error::authentication("invalid credentials"));
        }
        if !user.enabled {
            warn!(user_id = %user.id, "login rejected: disabled account");
            return Err(Error::authentication("invalid credentials"));
        }
        if !password::verify(password_input, &user.password_hash) {
            warn!(user_id = %user.id, "login rejected: password mismatch");
            return Err(Error::authentication("invalid credentials"));
        }

        // Only a confirmed secret gates login; an unconfirmed enrollment is
        // ignored here.
        if user.otp_enabled {
            if let Some(manager) = &self.totp {
                let verified = match passcode {
                    Some(code) => manager.verify(&user, code)?,
                    None => false,
                };
                if !verified {
                    info!(user_id = %user.id, "login pending second factor");
                    return Ok(LoginOutcome::SecondFactorRequired);
                }
            }
        }

        let refresh = self.refresh_tokens.create(user.id).await?;
        let access = self.codec.issue(&user)?;
        info!(user_id = %user.id, "successful login");
        Ok(LoginOutcome::Success(SessionTokens {
            access_token: access,
            refresh_token: refresh.token,
        }))
    }

    /// Exchange a live refresh token for a fresh access token. The refresh
    /// token itself is not rotated.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for an unknown or expired refresh
    /// token, [`Error::Authentication`] if the account is no longer
    /// confirmed and enabled.
    pub async fn renew(&self, user_id: Uuid, refresh_token: &str) -> Result<SessionTokens> {
        let Some(record) = self.refresh_tokens.get(refresh_token).await? else {
            warn!(%user_id, "renewal rejected: unknown refresh token");
            return Err(Error::validation("unknown refresh token"));
        };
        if record.expires_at <= Utc::now() {
            warn!(%user_id, "renewal rejected: refresh token expired");
            return Err(Error::validation("refresh token expired"));
        }

        let Some(user) = self.users.get(user_id).await? else {
            warn!(%user_id, "renewal rejected: unknown account");
            return Err(Error::authentication("invalid credentials"));
        };
        if !user.confirmed || !user.enabled {
            warn!(user_id = %user.id, "renewal rejected: account not active");
            return Err(Error::authentication("invalid credentials"));
        }

        let access = self.codec.issue(&user)?;
        info!(user_id = %user.id, "successful renewal");
        Ok(SessionTokens {
            access_token: access,
            refresh_token: record.token,
        })
    }

    /// Revoke a refresh token. Outstanding access tokens remain valid until
    /// natural expiry.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for an unknown token.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        self.refresh_tokens.delete(refresh_token).await
    }

    /// Create an unconfirmed account and dispatch the confirmation token.
    ///
    /// # Errors
    /// Returns [`Error::Conflict`] when the address is already claimed by an
    /// account or a live pending action.
    pub async fn signup(&self, email: &str, password_input: &str) -> Result<Uuid> {
        let email = normalize_email(email);
        if self.users.get_by_email(&email).await?.is_some() {
            return Err(Error::conflict("email already registered"));
        }
        if self
            .pending_actions
            .has_live_conflict(&CLAIMING_KINDS, &email, Utc::now())
            .await?
        {
            return Err(Error::conflict("email already targeted by a pending action"));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash: password::hash(password_input)?,
            confirmed: false,
            enabled: true,
            otp_secret_enc: None,
            otp_enabled: false,
            created_at: Utc::now(),
        };
        self.users.create(user.clone()).await?;

        let action = self
            .pending_actions
            .create(PendingActionKind::ConfirmAccount, user.id, "", &email)
            .await?;
        self.dispatch(
            &email,
            Notification::SignupConfirmation {
                token: action.token,
            },
        )
        .await;
        info!(user_id = %user.id, "account created, confirmation pending");
        Ok(user.id)
    }

    /// Replace the password after verifying the old one.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] on old-password mismatch.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut user = self.require_user(user_id).await?;
        if !password::verify(old_password, &user.password_hash) {
            warn!(%user_id, "password change rejected: old password mismatch");
            return Err(Error::authentication("invalid credentials"));
        }
        user.password_hash = password::hash(new_password)?;
        self.users.update(user).await?;
        info!(%user_id, "password changed");
        Ok(())
    }

    /// Start an email change. The address only switches once the pending
    /// action is confirmed.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] on password mismatch,
    /// [`Error::Conflict`] when the new address is already claimed.
    pub async fn change_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        password_input: &str,
    ) -> Result<()> {
        let user = self.require_user(user_id).await?;
        if !password::verify(password_input, &user.password_hash) {
            warn!(%user_id, "email change rejected: password mismatch");
            return Err(Error::authentication("invalid credentials"));
        }

        let new_email = normalize_email(new_email);
        if self.users.get_by_email(&new_email).await?.is_some() {
            return Err(Error::conflict("email already registered"));
        }
        if self
            .pending_actions
            .has_live_conflict(&CLAIMING_KINDS, &new_email, Utc::now())
            .await?
        {
            return Err(Error::conflict("email already targeted by a pending action"));
        }

        let action = self
            .pending_actions
            .create(
                PendingActionKind::ChangeEmail,
                user.id,
                &new_email,
                &new_email,
            )
            .await?;
        self.dispatch(
            &new_email,
            Notification::EmailChangeConfirmation {
                token: action.token,
            },
        )
        .await;
        info!(%user_id, "email change pending confirmation");
        Ok(())
    }

    /// Start a password reset for an existing account.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for an unknown email (preserved
    /// behavior; discloses account existence).
    pub async fn init_forgot_password(&self, email: &str) -> Result<()> {
        let email = normalize_email(email);
        let Some(user) = self.users.get_by_email(&email).await? else {
            warn!(email, "password reset rejected: unknown email");
            return Err(Error::validation("unknown email"));
        };

        let action = self
            .pending_actions
            .create(
                PendingActionKind::InitPasswordReset,
                user.id,
                "",
                &user.email,
            )
            .await?;
        self.dispatch(
            &user.email,
            Notification::PasswordResetConfirmation {
                token: action.token,
            },
        )
        .await;
        info!(user_id = %user.id, "password reset pending confirmation");
        Ok(())
    }

    /// Consume a pending action token: activate the account, switch the
    /// email, or reset the password, then delete the action (single use).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for an unknown or expired token or when
    /// the owning account is missing or disabled.
    pub async fn confirm(&self, token: &str) -> Result<()> {
        let Some(action) = self.pending_actions.get(token).await? else {
            return Err(Error::NotFound);
        };
        // Expiry is checked here, at use time; the row itself is left in
        // place.
        if !action.is_live(Utc::now()) {
            warn!(user_id = %action.user_id, "confirm rejected: action expired");
            return Err(Error::NotFound);
        }
        let Some(mut user) = self.users.get(action.user_id).await? else {
            return Err(Error::NotFound);
        };
        if !user.enabled {
            return Err(Error::NotFound);
        }

        match action.kind {
            PendingActionKind::ConfirmAccount => {
                user.confirmed = true;
                self.users.update(user.clone()).await?;
                info!(user_id = %user.id, "account confirmed");
            }
            PendingActionKind::ChangeEmail => {
                user.email = action.payload.clone();
                self.users.update(user.clone()).await?;
                info!(user_id = %user.id, "email change confirmed");
            }
            PendingActionKind::InitPasswordReset => {
                let new_password = password::generate(password::GENERATED_PASSWORD_LENGTH);
                user.password_hash = password::hash(&new_password)?;
                self.users.update(user.clone()).await?;
                self.dispatch(
                    &user.email,
                    Notification::NewPassword {
                        password: new_password,
                    },
                )
                .await;
                info!(user_id = %user.id, "password reset confirmed");
            }
        }

        self.pending_actions.consume(&action.token).await
    }

    /// Delete the account and cascade deletion of its refresh tokens.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] on password mismatch.
    pub async fn delete_account(&self, user_id: Uuid, password_input: &str) -> Result<()> {
        let user = self.require_user(user_id).await?;
        if !password::verify(password_input, &user.password_hash) {
            warn!(%user_id, "account deletion rejected: password mismatch");
            return Err(Error::authentication("invalid credentials"));
        }
        // Explicit cascade: the ledger holds the user's live sessions.
        self.refresh_tokens.delete_all_for_user(user.id).await?;
        self.users.delete(user.id).await?;
        info!(%user_id, "account deleted");
        Ok(())
    }

    /// Load the user behind a validated access token; the account may have
    /// been deleted since the token was issued.
    ///
    /// # Errors
    /// Returns [`Error::Authentication`] when the account no longer exists.
    pub async fn require_user(&self, user_id: Uuid) -> Result<User> {
        match self.users.get(user_id).await? {
            Some(user) => Ok(user),
            None => {
                warn!(%user_id, "request rejected: unknown account");
                Err(Error::authentication("invalid credentials"))
            }
        }
    }

    /// Notification delivery is best-effort: the flow has already committed
    /// its state change, so a transport failure is logged and not surfaced.
    async fn dispatch(&self, recipient: &str, notification: Notification) {
        let kind = notification.kind();
        if let Err(err) = self.notifier.notify(recipient, notification).await {
            error!(kind, recipient, "notification dispatch failed: {err:?}");
        }
    }
}
