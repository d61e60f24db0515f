//! In-process store. Per-record operations are atomic (single write lock),
//! which is all the flows require: within one user's record last-write-wins
//! is acceptable.

use super::{PendingAction, PendingActionStore, RefreshToken, RefreshTokenStore, User, UserStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    refresh_tokens: RwLock<HashMap<String, RefreshToken>>,
    pending_actions: RwLock<HashMap<String, PendingAction>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, user: User) -> Result<()> {
        self.users.write().await.insert(user.id, user);
        Ok(())
    }

    async fn update(&self, user: User) -> Result<()> {
        self.users.write().await.insert(user.id, user);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.users.write().await.remove(&id);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn create(&self, token: RefreshToken) -> Result<()> {
        self.refresh_tokens
            .write()
            .await
            .insert(token.token.clone(), token);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self.refresh_tokens.read().await.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        Ok(self.refresh_tokens.write().await.remove(token).is_some())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<()> {
        self.refresh_tokens
            .write()
            .await
            .retain(|_, record| record.user_id != user_id);
        Ok(())
    }
}

#[async_trait]
impl PendingActionStore for MemoryStore {
    async fn create(&self, action: PendingAction) -> Result<()> {
        self.pending_actions
            .write()
            .await
            .insert(action.token.clone(), action);
        Ok(())
    }

    async fn get(&self, token: &str) -> Result<Option<PendingAction>> {
        Ok(self.pending_actions.read().await.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        Ok(self.pending_actions.write().await.remove(token).is_some())
    }

    async fn find_by_target_email(&self, email: &str) -> Result<Vec<PendingAction>> {
        Ok(self
            .pending_actions
            .read()
            .await
            .values()
            .filter(|action| action.target_email == email)
            .cloned()
            .collect())
    }
}
