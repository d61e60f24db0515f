//! Refresh token ledger: stateful store of unique opaque session-renewal
//! tokens.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::{RefreshToken, RefreshTokenStore};
use crate::util::random_token;

/// How many collision re-checks before giving up. With a 256-bit token space
/// a single retry is already unreachable in practice.
const MAX_TOKEN_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct RefreshTokenLedger {
    store: Arc<dyn RefreshTokenStore>,
    lifetime: Duration,
}

impl RefreshTokenLedger {
    #[must_use]
    pub fn new(store: Arc<dyn RefreshTokenStore>, lifetime: Duration) -> Self {
        Self { store, lifetime }
    }

    /// Generate a fresh token, re-checked against the live store before it
    /// is considered usable. The narrow check-then-insert race is tolerated:
    /// best-effort, not linearizable.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] if the store fails or no unused token is
    /// found within the attempt budget.
    pub async fn new_unique_token(&self) -> Result<String> {
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let candidate = random_token();
            if self.store.get(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(Error::Internal(anyhow::anyhow!(
            "exhausted refresh token candidates"
        )))
    }

    /// Create and persist a refresh token for `user_id`.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] on store failure.
    pub async fn create(&self, user_id: Uuid) -> Result<RefreshToken> {
        let now = Utc::now();
        let record = RefreshToken {
            token: self.new_unique_token().await?,
            user_id,
            created_at: now,
            expires_at: now + self.lifetime,
        };
        self.store.create(record.clone()).await?;
        Ok(record)
    }

    /// Look up a token. Callers, not the ledger, decide whether the record
    /// is expired.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] on store failure.
    pub async fn get(&self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self.store.get(token).await?)
    }

    /// Delete a token. Deleting an unknown token is a caller-visible error,
    /// matching the login/renew/logout flows.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for an unknown token.
    pub async fn delete(&self, token: &str) -> Result<()> {
        if self.store.delete(token).await? {
            Ok(())
        } else {
            Err(Error::validation("unknown refresh token"))
        }
    }

    /// Remove every live refresh token owned by `user_id` (explicit cascade
    /// on account deletion).
    ///
    /// # Errors
    /// Returns [`Error::Internal`] on store failure.
    pub async fn delete_all_for_user(&self, user_id: Uuid) -> Result<()> {
        Ok(self.store.delete_by_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn test_ledger() -> RefreshTokenLedger {
        RefreshTokenLedger::new(Arc::new(MemoryStore::new()), Duration::minutes(60))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let ledger = test_ledger();
        let user_id = Uuid::new_v4();
        let record = ledger.create(user_id).await.unwrap();
        assert!(record.expires_at > record.created_at);

        let found = ledger.get(&record.token).await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_error() {
        let ledger = test_ledger();
        assert!(ledger.delete("no-such-token").await.is_err());
    }

    #[tokio::test]
    async fn test_deleted_token_is_gone() {
        let ledger = test_ledger();
        let record = ledger.create(Uuid::new_v4()).await.unwrap();
        ledger.delete(&record.token).await.unwrap();
        assert!(ledger.get(&record.token).await.unwrap().is_none());
        // A second delete is an error, not silently idempotent.
        assert!(ledger.delete(&record.token).await.is_err());
    }

    #[tokio::test]
    async fn test_cascade_delete() {
        let ledger = test_ledger();
        let user_id = Uuid::new_v4();
        let first = ledger.create(user_id).await.unwrap();
        let second = ledger.create(user_id).await.unwrap();
        let other = ledger.create(Uuid::new_v4()).await.unwrap();

        ledger.delete_all_for_user(user_id).await.unwrap();
        assert!(ledger.get(&first.token).await.unwrap().is_none());
        assert!(ledger.get(&second.token).await.unwrap().is_none());
        assert!(ledger.get(&other.token).await.unwrap().is_some());
    }
}
