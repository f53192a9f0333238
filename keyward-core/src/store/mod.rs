//! 凭据存储契约及实现

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{Result, UserError};
use crate::user::{Role, User};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// 用户与角色的持久化契约。
///
/// 邮箱唯一性由调用方（`UserManager`）保证，存储层只按字段精确查找并返回首个匹配。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_token(&self, token: &str) -> Result<Option<User>>;
    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn save(&self, user: &User) -> Result<()>;
    /// 一次性写入多个用户
    async fn persist_batch(&self, users: &[User]) -> Result<()>;
    async fn find_role(&self, role_id: i64) -> Result<Option<Role>>;
    async fn list_roles(&self) -> Result<Vec<Role>>;
}

/// 为每次存储调用加上超时，并把超时与 IO 故障归为 `StoreUnavailable`
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(UserError::Io(e))) => {
                warn!(op, error = %e, "credential store io failure");
                Err(UserError::StoreUnavailable(format!("{op}: {e}")))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(op, timeout_ms, "credential store call timed out");
                Err(UserError::StoreUnavailable(format!(
                    "{op} timed out after {timeout_ms}ms"
                )))
            }
        }
    }
}

#[async_trait]
impl CredentialStore for BoundedStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.bounded("find_by_id", self.inner.find_by_id(id)).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.bounded("find_by_email", self.inner.find_by_email(email))
            .await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        self.bounded("find_by_token", self.inner.find_by_token(token))
            .await
    }

    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>> {
        self.bounded(
            "find_by_password_reset_token",
            self.inner.find_by_password_reset_token(token),
        )
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.bounded("list_users", self.inner.list_users()).await
    }

    async fn save(&self, user: &User) -> Result<()> {
        self.bounded("save", self.inner.save(user)).await
    }

    async fn persist_batch(&self, users: &[User]) -> Result<()> {
        self.bounded("persist_batch", self.inner.persist_batch(users))
            .await
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        self.bounded("find_role", self.inner.find_role(role_id)).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        self.bounded("list_roles", self.inner.list_roles()).await
    }
}

/// 默认角色：1 = Guest，2 = Admin
pub fn default_roles() -> Vec<Role> {
    vec![
        Role {
            id: 1,
            name: "Guest".to_string(),
        },
        Role {
            id: crate::user::ADMIN_ROLE_ID,
            name: "Admin".to_string(),
        },
    ]
}
