use super::CredentialStore;
use crate::error::Result;
use crate::user::{Role, User};
use async_trait::async_trait;
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

/// 进程内存储，主要用于测试和嵌入式场景
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    roles: RwLock<Vec<Role>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roles(roles: Vec<Role>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            roles: RwLock::new(roles),
        }
    }

    async fn find_first<F>(&self, pred: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        let users = self.users.read().await;
        let mut matches: Vec<&User> = users.values().filter(|u| pred(u)).collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matches.first().map(|u| (*u).clone())
    }
}

fn token_eq(stored: Option<&str>, presented: &str) -> bool {
    stored
        .map(|s| bool::from(s.as_bytes().ct_eq(presented.as_bytes())))
        .unwrap_or(false)
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.find_first(|u| u.email == email).await)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        Ok(self
            .find_first(|u| token_eq(u.token.as_deref(), token))
            .await)
    }

    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>> {
        Ok(self
            .find_first(|u| token_eq(u.reset_token(), token))
            .await)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn save(&self, user: &User) -> Result<()> {
        self.users
            .write()
            .await
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn persist_batch(&self, users: &[User]) -> Result<()> {
        let mut guard = self.users.write().await;
        for user in users {
            guard.insert(user.id.clone(), user.clone());
        }
        Ok(())
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|r| r.id == role_id)
            .cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        Ok(self.roles.read().await.clone())
    }
}
