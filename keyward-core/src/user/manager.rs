//! 用户管理器：核心结构、用户 CRUD 与 bearer token 管理

use super::auth::Authenticator;
use super::crypto::PasswordHasher;
use super::models::*;
use super::notify::Notifier;
use super::password::check_password_policy;
use super::reset::PasswordResetManager;
use super::tokens::TokenGenerator;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::{Result, UserError};
use crate::store::{BoundedStore, CredentialStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

/// 管理员角色 ID
pub const ADMIN_ROLE_ID: i64 = 2;
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_NAME: &str = "Admin";
pub const ADMIN_PASSWORD: &str = "Secur1ty";

/// 用户管理器
#[derive(Clone)]
pub struct UserManager {
    /// 带超时的凭据存储
    pub(super) store: Arc<dyn CredentialStore>,
    pub(super) hasher: PasswordHasher,
    pub(super) tokens: TokenGenerator,
    auth: Authenticator,
    resets: PasswordResetManager,
}

// ============================================================================
// 构造器和配置
// ============================================================================

impl UserManager {
    /// 创建新的用户管理器。存储调用统一加上 `config.store_timeout` 超时。
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        let store: Arc<dyn CredentialStore> =
            Arc::new(BoundedStore::new(store, config.store_timeout));
        Self {
            hasher: PasswordHasher::new(config.bcrypt_cost),
            tokens: TokenGenerator::new(config.bearer_token_bytes),
            auth: Authenticator::new(store.clone(), config),
            resets: PasswordResetManager::new(store.clone(), config),
            store,
        }
    }

    /// 配置重置通知发送方
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.resets = self.resets.with_notifier(notifier);
        self
    }

    /// 配置时钟（重置 token 的签发与过期判定）
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.resets = self.resets.with_clock(clock);
        self
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub fn resets(&self) -> &PasswordResetManager {
        &self.resets
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }
}

// ============================================================================
// 用户 CRUD 操作
// ============================================================================

impl UserManager {
    async fn resolve_role(&self, role_id: i64) -> Result<Role> {
        self.store
            .find_role(role_id)
            .await?
            .ok_or_else(|| UserError::NotFound(format!("role: {}", role_id)))
    }

    /// 创建用户
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn add_user(&self, req: CreateUserRequest) -> Result<User> {
        // 不允许重复邮箱
        if self.check_user_exists(&req.email).await? {
            return Err(UserError::AlreadyExists(format!("email: {}", req.email)));
        }

        let role = self.resolve_role(req.role_id).await?;
        check_password_policy(&req.password)?;
        let password_hash = self.hasher.hash(&req.password).await?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: req.email,
            full_name: req.full_name,
            password_hash,
            status: req.status,
            role,
            token: None,
            password_reset: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.save(&user).await?;

        info!(user_id = %user.id, "created user");
        Ok(user)
    }

    /// 更新用户资料、状态与角色
    #[instrument(skip(self, req))]
    pub async fn update_user(&self, id: &str, req: UpdateUserRequest) -> Result<User> {
        let mut user = self.get_user(id).await?;

        // 修改邮箱时不能与其他用户冲突
        if user.email != req.email && self.check_user_exists(&req.email).await? {
            return Err(UserError::AlreadyExists(format!("email: {}", req.email)));
        }

        if user.role.id != req.role_id {
            user.role = self.resolve_role(req.role_id).await?;
        }
        user.email = req.email;
        user.full_name = req.full_name;
        user.status = req.status;
        user.updated_at = Some(Utc::now());

        self.store.save(&user).await?;

        info!(user_id = %id, "updated user");
        Ok(user)
    }

    /// 存储中没有任何用户时创建默认管理员，返回是否创建
    #[instrument(skip(self))]
    pub async fn create_admin_user_if_not_exists(&self) -> Result<bool> {
        if !self.store.list_users().await?.is_empty() {
            return Ok(false);
        }
        let role = self.resolve_role(ADMIN_ROLE_ID).await?;
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: ADMIN_EMAIL.to_string(),
            full_name: ADMIN_NAME.to_string(),
            password_hash: self.hasher.hash(ADMIN_PASSWORD).await?,
            status: UserStatus::Active,
            role,
            token: None,
            password_reset: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.save(&user).await?;
        info!(user_id = %user.id, "created default admin user");
        Ok(true)
    }

    /// 获取用户
    pub async fn get_user(&self, id: &str) -> Result<User> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| UserError::NotFound(format!("user: {}", id)))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.store.find_by_email(email).await
    }

    /// 是否已有该邮箱的用户
    pub async fn check_user_exists(&self, email: &str) -> Result<bool> {
        Ok(self.store.find_by_email(email).await?.is_some())
    }

    /// 用户角色名是否在给定列表中（精确匹配）
    pub async fn has_role(&self, email: &str, roles: &[&str]) -> Result<bool> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| UserError::NotFound(format!("user: {}", email)))?;
        Ok(roles.iter().any(|r| *r == user.role_name()))
    }

    /// 列出所有用户（按创建时间、ID 排序）
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let mut users = self.store.list_users().await?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.store.list_roles().await
    }
}

// ============================================================================
// Bearer token
// ============================================================================

impl UserManager {
    /// 生成新的 bearer token（不落盘）
    pub fn generate_token(&self) -> String {
        self.tokens.bearer_token()
    }

    /// 为用户设置 token 并持久化
    #[instrument(skip(self, user, token), fields(user_id = %user.id))]
    pub async fn update_token(&self, mut user: User, token: String) -> Result<User> {
        user.token = Some(token);
        user.updated_at = Some(Utc::now());
        self.store.save(&user).await?;
        info!("bearer token updated");
        Ok(user)
    }

    /// 为所有用户重新生成 token，并一次性批量写入
    #[instrument(skip(self))]
    pub async fn regenerate_tokens(&self) -> Result<Vec<User>> {
        let now = Utc::now();
        let mut users = self.list_users().await?;
        for user in users.iter_mut() {
            user.token = Some(self.tokens.bearer_token());
            user.updated_at = Some(now);
        }
        self.store.persist_batch(&users).await?;
        info!(count = users.len(), "regenerated bearer tokens");
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use crate::user::{RequestScope, TokenVerdict};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn config() -> AuthConfig {
        AuthConfig {
            header_auth_enabled: true,
            bcrypt_cost: 4,
            ..AuthConfig::default()
        }
    }

    async fn manager(dir: &TempDir) -> UserManager {
        let store = FileStore::open(dir.path()).await.unwrap();
        UserManager::new(Arc::new(store), &config())
    }

    fn request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            full_name: "Test User".into(),
            password: "Secur1ty".into(),
            role_id: 1,
            status: UserStatus::Active,
        }
    }

    #[tokio::test]
    async fn add_and_authenticate() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        let user = manager.add_user(request("a@example.com")).await.unwrap();
        assert_eq!(user.role_name(), "Guest");
        assert_ne!(user.password_hash, "Secur1ty");

        let mut scope = RequestScope::new();
        let verdict = manager
            .authenticator()
            .authenticate_by_password(&mut scope, "a@example.com", "Secur1ty")
            .await
            .unwrap();
        assert!(verdict.is_success());
    }

    #[tokio::test]
    async fn duplicate_email_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        manager.add_user(request("a@example.com")).await.unwrap();
        let err = manager.add_user(request("a@example.com")).await.unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unknown_role_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        let mut req = request("a@example.com");
        req.role_id = 42;
        let err = manager.add_user(req).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_changes_role_and_rejects_taken_email() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        let a = manager.add_user(request("a@example.com")).await.unwrap();
        manager.add_user(request("b@example.com")).await.unwrap();

        let updated = manager
            .update_user(
                &a.id,
                UpdateUserRequest {
                    email: "a2@example.com".into(),
                    full_name: "A Two".into(),
                    role_id: ADMIN_ROLE_ID,
                    status: UserStatus::Retired,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.role_name(), "Admin");
        assert!(manager.find_by_email("a@example.com").await.unwrap().is_none());
        assert!(manager.has_role("a2@example.com", &["Admin"]).await.unwrap());

        let err = manager
            .update_user(
                &a.id,
                UpdateUserRequest {
                    email: "b@example.com".into(),
                    full_name: "A Two".into(),
                    role_id: ADMIN_ROLE_ID,
                    status: UserStatus::Active,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn admin_bootstrap_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        assert!(manager.create_admin_user_if_not_exists().await.unwrap());
        assert!(!manager.create_admin_user_if_not_exists().await.unwrap());

        let users = manager.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, ADMIN_EMAIL);
        assert!(manager.has_role(ADMIN_EMAIL, &["Admin"]).await.unwrap());
        assert!(!manager.has_role(ADMIN_EMAIL, &["Guest", "admin"]).await.unwrap());
        assert!(manager.validate_password(&users[0], ADMIN_PASSWORD).await.unwrap());
    }

    #[tokio::test]
    async fn has_role_for_unknown_user_is_not_found() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        let err = manager.has_role("x@example.com", &["Admin"]).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn change_password_requires_current_unless_forced() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        let user = manager.add_user(request("a@example.com")).await.unwrap();

        let err = manager
            .change_password(&user.id, Some("wrong1"), "NewPass1", false)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Unauthorized(_)));

        let err = manager
            .change_password(&user.id, Some("Secur1ty"), "short", false)
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::PolicyViolation(_)));

        let changed = manager
            .change_password(&user.id, Some("Secur1ty"), "NewPass1", false)
            .await
            .unwrap();
        assert!(manager.validate_password(&changed, "NewPass1").await.unwrap());

        let forced = manager
            .change_password(&user.id, None, "Forced99", true)
            .await
            .unwrap();
        assert!(manager.validate_password(&forced, "Forced99").await.unwrap());
    }

    #[tokio::test]
    async fn issued_token_authenticates_via_header() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        let user = manager.add_user(request("a@example.com")).await.unwrap();
        let token = manager.generate_token();
        manager.update_token(user, token.clone()).await.unwrap();

        let mut scope = RequestScope::new();
        let verdict = manager
            .authenticator()
            .authenticate_by_token(&mut scope, Some(&token))
            .await
            .unwrap();
        assert!(matches!(verdict, TokenVerdict::Success(_)));
    }

    #[tokio::test]
    async fn regenerate_rotates_every_token() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            let user = manager.add_user(request(email)).await.unwrap();
            let token = manager.generate_token();
            manager.update_token(user, token).await.unwrap();
        }
        let before: HashSet<String> = manager
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|u| u.token)
            .collect();

        let rotated = manager.regenerate_tokens().await.unwrap();
        assert_eq!(rotated.len(), 3);
        let after: HashSet<String> = rotated.iter().filter_map(|u| u.token.clone()).collect();
        assert_eq!(after.len(), 3);
        assert!(before.is_disjoint(&after));

        let auth = manager.authenticator();
        for old in &before {
            let mut scope = RequestScope::new();
            let verdict = auth.authenticate_by_token(&mut scope, Some(old)).await.unwrap();
            assert!(matches!(verdict, TokenVerdict::FailureInvalidToken));
        }
        for new in &after {
            let mut scope = RequestScope::new();
            let verdict = auth.authenticate_by_token(&mut scope, Some(new)).await.unwrap();
            assert!(matches!(verdict, TokenVerdict::Success(_)));
        }
    }

    #[tokio::test]
    async fn reset_round_trip_through_file_store() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir).await;
        manager.add_user(request("a@example.com")).await.unwrap();

        let issued = manager
            .resets()
            .request_reset("a@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(manager.resets().consume(&issued.token, "NewPass1").await.unwrap());

        let mut scope = RequestScope::new();
        let auth = manager.authenticator();
        assert!(auth
            .authenticate_by_password(&mut scope, "a@example.com", "NewPass1")
            .await
            .unwrap()
            .is_success());
        let mut scope = RequestScope::new();
        assert!(!auth
            .authenticate_by_password(&mut scope, "a@example.com", "Secur1ty")
            .await
            .unwrap()
            .is_success());
    }
}
