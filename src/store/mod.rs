//! Storage seam: record types and the capability traits the service layers
//! are constructed with. Durable persistence is an external collaborator;
//! the bundled [`memory::MemoryStore`] keeps everything in-process and is
//! what the tests substitute in.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;

/// Account record. Owned by the authentication service; mutated only through
/// its flows. `email` is stored normalized (trimmed, lowercase).
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Argon2 PHC string. Empty means no password is set and login always
    /// fails.
    pub password_hash: String,
    pub confirmed: bool,
    pub enabled: bool,
    /// Encrypted TOTP secret (nonce || ciphertext, base64). Present from
    /// enrollment on; only gates login once `otp_enabled` is set.
    pub otp_secret_enc: Option<String>,
    pub otp_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Opaque session-renewal token. Created on login, deleted on logout or
/// account deletion. Expiry is judged by callers at use time; there is no
/// background sweeper.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingActionKind {
    ConfirmAccount,
    ChangeEmail,
    InitPasswordReset,
}

impl PendingActionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmAccount => "confirm_account",
            Self::ChangeEmail => "change_email",
            Self::InitPasswordReset => "init_password_reset",
        }
    }
}

/// Time-boxed, single-use confirmation token representing an unconfirmed
/// account-lifecycle intent. Deleted on successful confirm; an expired row
/// stays until a confirm attempt finds it invalid.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub token: String,
    pub kind: PendingActionKind,
    pub user_id: Uuid,
    /// Free-form payload, e.g. the pending new email for a change-email
    /// action.
    pub payload: String,
    /// Normalized email address the action targets, used for conflict
    /// detection across signup and email-change flows.
    pub target_email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingAction {
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: User) -> Result<()>;
    async fn update(&self, user: User) -> Result<()>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<User>>;
    /// Lookup by normalized email.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: RefreshToken) -> Result<()>;
    async fn get(&self, token: &str) -> Result<Option<RefreshToken>>;
    /// Returns `false` when the token was unknown; callers decide whether
    /// that is an error.
    async fn delete(&self, token: &str) -> Result<bool>;
    async fn delete_by_user(&self, user_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait PendingActionStore: Send + Sync {
    async fn create(&self, action: PendingAction) -> Result<()>;
    async fn get(&self, token: &str) -> Result<Option<PendingAction>>;
    /// Returns `false` when the token was unknown.
    async fn delete(&self, token: &str) -> Result<bool>;
    /// All actions (live or expired) targeting a normalized email.
    async fn find_by_target_email(&self, email: &str) -> Result<Vec<PendingAction>>;
}
