//! Pending action ledger: unique, typed, time-boxed single-use confirmation
//! tokens.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{PendingAction, PendingActionKind, PendingActionStore};
use crate::util::random_token;

const MAX_TOKEN_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct PendingActionLedger {
    store: Arc<dyn PendingActionStore>,
    lifetime: Duration,
}

impl PendingActionLedger {
    #[must_use]
    pub fn new(store: Arc<dyn PendingActionStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    /// Create a pending action. At most one live action may target the same
    /// (kind, target-email) pair: a second attempt is a conflict, not an
    /// overwrite. Expired rows do not block creation.
    ///
    /// # Errors
    /// Returns [`Error::Conflict`] when a live action of the same kind
    /// already targets `target_email`, [`Error::Internal`] on store failure.
    pub async fn create(
        &self,
        kind: PendingActionKind,
        user_id: Uuid,
        payload: &str,
        target_email: &str,
    ) -> Result<PendingAction> {
        let now = Utc::now();
        let existing = self.store.find_by_target_email(target_email).await?;
        if existing
            .iter()
            .any(|action| action.kind == kind && action.is_live(now))
        {
            return Err(Error::conflict(format!(
                "a pending {} action already targets this address",
                kind.as_str()
            )));
        }

        let action = PendingAction {
            token: self.new_unique_token().await?,
            kind,
            user_id,
            payload: payload.to_string(),
            target_email: target_email.to_string(),
            created_at: now,
            expires_at: now + self.lifetime,
        };
        self.store.create(action.clone()).await?;
        Ok(action)
    }

    /// Whether any live action of one of `kinds` targets `email`. Used by
    /// signup and change-email to refuse addresses with an outstanding
    /// claim.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] on store failure.
    pub async fn has_live_conflict(
        &self,
        kinds: &[PendingActionKind],
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let existing = self.store.find_by_target_email(email).await?;
        Ok(existing
            .iter()
            .any(|action| kinds.contains(&action.kind) && action.is_live(now)))
    }

    /// Look up by token. Expiry is the caller's judgment, made at use time;
    /// the ledger never removes rows proactively.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] on store failure.
    pub async fn get(&self, token: &str) -> Result<Option<PendingAction>> {
        Ok(self.store.get(token).await?)
    }

    /// Consume (delete) an action, guaranteeing single use.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the token is unknown,
    /// [`Error::Internal`] on store failure.
    pub async fn consume(&self, token: &str) -> Result<()> {
        if self.store.delete(token).await? {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }

    async fn new_unique_token(&self) -> Result<String> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = random_token();
            if self.store.get(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(Error::Internal(anyhow::anyhow!(
            "exhausted pending action token candidates"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn test_ledger() -> PendingActionLedger {
        PendingActionLedger::new(Arc::new(MemoryStore::new()), Duration::minutes(60))
    }

    #[tokio::test]
    async fn test_create_and_consume() {
        let ledger = test_ledger();
        let action = ledger
            .create(
                PendingActionKind::ConfirmAccount,
                Uuid::new_v4(),
                "",
                "foo@bar.com",
            )
            .await
            .unwrap();
        assert!(action.expires_at > action.created_at);

        ledger.consume(&action.token).await.unwrap();
        // Single use: second consume is NotFound.
        assert!(matches!(
            ledger.consume(&action.token).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_same_kind_same_target_conflicts() {
        let ledger = test_ledger();
        ledger
            .create(
                PendingActionKind::ChangeEmail,
                Uuid::new_v4(),
                "new@bar.com",
                "new@bar.com",
            )
            .await
            .unwrap();
        let second = ledger
            .create(
                PendingActionKind::ChangeEmail,
                Uuid::new_v4(),
                "new@bar.com",
                "new@bar.com",
            )
            .await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_different_kind_same_target_allowed() {
        let ledger = test_ledger();
        let user_id = Uuid::new_v4();
        ledger
            .create(
                PendingActionKind::ConfirmAccount,
                user_id,
                "",
                "foo@bar.com",
            )
            .await
            .unwrap();
        ledger
            .create(
                PendingActionKind::InitPasswordReset,
                user_id,
                "",
                "foo@bar.com",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_live_conflict_lookup() {
        let ledger = test_ledger();
        ledger
            .create(
                PendingActionKind::ChangeEmail,
                Uuid::new_v4(),
                "foo@bar.com",
                "foo@bar.com",
            )
            .await
            .unwrap();

        let now = Utc::now();
        assert!(ledger
            .has_live_conflict(
                &[
                    PendingActionKind::ConfirmAccount,
                    PendingActionKind::ChangeEmail
                ],
                "foo@bar.com",
                now
            )
            .await
            .unwrap());
        assert!(!ledger
            .has_live_conflict(
                &[PendingActionKind::InitPasswordReset],
                "foo@bar.com",
                now
            )
            .await
            .unwrap());
        assert!(!ledger
            .has_live_conflict(
                &[PendingActionKind::ChangeEmail],
                "other@bar.com",
                now
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_action_does_not_block_creation() {
        let store = Arc::new(MemoryStore::new());
        let expired_ledger =
            PendingActionLedger::new(store.clone(), Duration::minutes(-1));
        expired_ledger
            .create(
                PendingActionKind::ChangeEmail,
                Uuid::new_v4(),
                "new@bar.com",
                "new@bar.com",
            )
            .await
            .unwrap();

        let ledger = PendingActionLedger::new(store, Duration::minutes(60));
        ledger
            .create(
                PendingActionKind::ChangeEmail,
                Uuid::new_v4(),
                "new@bar.com",
                "new@bar.com",
            )
            .await
            .unwrap();
    }
}
