//! Outbound notification seam. Template rendering and mail transport are
//! external collaborators; the service layer only emits structured events.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// A structured notification event. Token/password values are carried to the
/// transport and must never end up in logs.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Confirmation token for a freshly signed-up account.
    SignupConfirmation { token: String },
    /// Confirmation token for a pending email change, sent to the new
    /// address.
    EmailChangeConfirmation { token: String },
    /// Confirmation token for a password reset request.
    PasswordResetConfirmation { token: String },
    /// The generated replacement password, sent exactly once in cleartext.
    NewPassword { password: String },
}

impl Notification {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SignupConfirmation { .. } => "signup_confirmation",
            Self::EmailChangeConfirmation { .. } => "email_change_confirmation",
            Self::PasswordResetConfirmation { .. } => "password_reset_confirmation",
            Self::NewPassword { .. } => "new_password",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch a notification to `recipient`.
    async fn notify(&self, recipient: &str, notification: Notification) -> Result<()>;
}

/// Default notifier: records that a dispatch happened without any real
/// delivery. Logs the event kind and recipient only, never the carried
/// value.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, notification: Notification) -> Result<()> {
        info!(kind = notification.kind(), recipient, "notification dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            Notification::SignupConfirmation {
                token: "t".to_string()
            }
            .kind(),
            "signup_confirmation"
        );
        assert_eq!(
            Notification::NewPassword {
                password: "p".to_string()
            }
            .kind(),
            "new_password"
        );
    }
}
