//! 请求级身份缓存：同一工作单元内按 email 记忆查询结果

use super::models::User;
use crate::error::Result;
use crate::store::CredentialStore;
use std::collections::HashMap;

/// 命中与未命中都会缓存；存储错误不缓存。随所属 `RequestScope` 一起销毁。
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<String, Option<User>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load(
        &mut self,
        store: &dyn CredentialStore,
        email: &str,
    ) -> Result<Option<User>> {
        if let Some(hit) = self.entries.get(email) {
            return Ok(hit.clone());
        }
        let loaded = store.find_by_email(email).await?;
        self.entries.insert(email.to_string(), loaded.clone());
        Ok(loaded)
    }

    pub fn invalidate(&mut self, email: &str) {
        self.entries.remove(email);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::user::{Role, UserStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 统计 find_by_email 调用次数的存储包装
    pub(crate) struct CountingStore {
        pub inner: MemoryStore,
        pub email_lookups: AtomicUsize,
        pub token_lookups: AtomicUsize,
    }

    impl CountingStore {
        pub fn new() -> Self {
            Self {
                inner: MemoryStore::with_roles(crate::store::default_roles()),
                email_lookups: AtomicUsize::new(0),
                token_lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CredentialStore for CountingStore {
        async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
            self.inner.find_by_id(id).await
        }
        async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
            self.email_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_email(email).await
        }
        async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
            self.token_lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_token(token).await
        }
        async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>> {
            self.inner.find_by_password_reset_token(token).await
        }
        async fn list_users(&self) -> Result<Vec<User>> {
            self.inner.list_users().await
        }
        async fn save(&self, user: &User) -> Result<()> {
            self.inner.save(user).await
        }
        async fn persist_batch(&self, users: &[User]) -> Result<()> {
            self.inner.persist_batch(users).await
        }
        async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
            self.inner.find_role(role_id).await
        }
        async fn list_roles(&self) -> Result<Vec<Role>> {
            self.inner.list_roles().await
        }
    }

    fn user(email: &str) -> User {
        User {
            id: "u1".into(),
            email: email.into(),
            full_name: String::new(),
            password_hash: String::new(),
            status: UserStatus::Active,
            role: Role {
                id: 1,
                name: "Guest".into(),
            },
            token: None,
            password_reset: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn loads_each_email_once() {
        let store = CountingStore::new();
        store.save(&user("a@example.com")).await.unwrap();
        let mut cache = IdentityCache::new();

        for _ in 0..3 {
            let hit = cache.get_or_load(&store, "a@example.com").await.unwrap();
            assert!(hit.is_some());
        }
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn misses_are_cached_too() {
        let store = CountingStore::new();
        let mut cache = IdentityCache::new();
        assert!(cache.get_or_load(&store, "x@example.com").await.unwrap().is_none());
        assert!(cache.get_or_load(&store, "x@example.com").await.unwrap().is_none());
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let store = CountingStore::new();
        let mut cache = IdentityCache::new();
        cache.get_or_load(&store, "a@example.com").await.unwrap();
        store.save(&user("a@example.com")).await.unwrap();
        cache.invalidate("a@example.com");
        assert!(cache.get_or_load(&store, "a@example.com").await.unwrap().is_some());
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn separate_caches_do_not_share_entries() {
        let store = CountingStore::new();
        let mut first = IdentityCache::new();
        first.get_or_load(&store, "a@example.com").await.unwrap();
        store.save(&user("a@example.com")).await.unwrap();

        let mut second = IdentityCache::new();
        assert!(second.get_or_load(&store, "a@example.com").await.unwrap().is_some());
    }
}
