//! 认证决策：密码登录、header token 认证、会话身份解析

use super::cache::IdentityCache;
use super::crypto::PasswordHasher;
use super::models::User;
use super::session::IdentityStorage;
use crate::config::AuthConfig;
use crate::error::{Result, UserError};
use crate::store::CredentialStore;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// 对外统一的失败提示，不暴露具体失败原因
pub const INVALID_CREDENTIALS: &str = "Invalid credentials.";

/// 密码认证结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthVerdict {
    /// 认证成功，携带身份（email），供会话存储
    Success(String),
    FailureIdentityNotFound,
    FailureRetired,
    FailureInvalidCredential,
}

impl AuthVerdict {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthVerdict::Success(_))
    }

    pub fn identity(&self) -> Option<&str> {
        match self {
            AuthVerdict::Success(identity) => Some(identity),
            _ => None,
        }
    }

    /// 面向用户的提示；停用账户与凭据错误使用同一文案
    pub fn message(&self) -> &'static str {
        match self {
            AuthVerdict::Success(_) => "Authenticated successfully.",
            _ => INVALID_CREDENTIALS,
        }
    }

    /// 内部用的失败分类，便于日志与测试
    pub fn code(&self) -> &'static str {
        match self {
            AuthVerdict::Success(_) => "success",
            AuthVerdict::FailureIdentityNotFound => "identity_not_found",
            AuthVerdict::FailureRetired => "retired",
            AuthVerdict::FailureInvalidCredential => "invalid_credential",
        }
    }
}

/// Header token 认证结果
#[derive(Debug, Clone)]
pub enum TokenVerdict {
    /// 未启用 header 认证或未携带 token
    NotAttempted,
    Success(User),
    FailureRetired,
    FailureInvalidToken,
}

impl TokenVerdict {
    pub fn is_attempted(&self) -> bool {
        !matches!(self, TokenVerdict::NotAttempted)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            TokenVerdict::Success(user) => Some(user),
            _ => None,
        }
    }

    /// 转换为"未知 token 即错误"的形式：未知 token 返回 `InvalidToken`，
    /// 停用用户与未尝试返回 `Ok(None)`
    pub fn into_user(self) -> Result<Option<User>> {
        match self {
            TokenVerdict::Success(user) => Ok(Some(user)),
            TokenVerdict::FailureInvalidToken => Err(UserError::InvalidToken),
            TokenVerdict::FailureRetired | TokenVerdict::NotAttempted => Ok(None),
        }
    }
}

/// 单个工作单元（一次请求）的认证上下文。每个请求新建，不跨请求复用。
#[derive(Debug, Default)]
pub struct RequestScope {
    cache: IdentityCache,
    current_user: Option<User>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut IdentityCache {
        &mut self.cache
    }
}

/// 认证决策引擎，密码与 header 两条通道共用
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    header_auth_enabled: bool,
    header_name: String,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(config.bcrypt_cost),
            header_auth_enabled: config.header_auth_enabled,
            header_name: config.header_name.clone(),
        }
    }

    pub fn header_auth_enabled(&self) -> bool {
        self.header_auth_enabled
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// 从 header 列表中取出配置的 token header（名称不区分大小写）
    pub fn token_from_headers<'h, I>(&self, headers: I) -> Option<&'h str>
    where
        I: IntoIterator<Item = (&'h str, &'h str)>,
    {
        headers
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.header_name))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// 邮箱 + 密码认证。停用检查在密码校验之前。
    #[instrument(skip(self, scope, password))]
    pub async fn authenticate_by_password(
        &self,
        scope: &mut RequestScope,
        email: &str,
        password: &str,
    ) -> Result<AuthVerdict> {
        let user = scope
            .cache
            .get_or_load(self.store.as_ref(), email)
            .await?;

        let Some(user) = user else {
            warn!("login failed: identity not found");
            return Ok(AuthVerdict::FailureIdentityNotFound);
        };

        if user.status.is_retired() {
            warn!(user_id = %user.id, "login failed: user is retired");
            return Ok(AuthVerdict::FailureRetired);
        }

        if !self.hasher.verify(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login failed: invalid password");
            return Ok(AuthVerdict::FailureInvalidCredential);
        }

        info!(user_id = %user.id, "user authenticated");
        Ok(AuthVerdict::Success(user.email))
    }

    /// Bearer token（header）认证。成功时记录为当前用户。
    #[instrument(skip(self, scope, token))]
    pub async fn authenticate_by_token(
        &self,
        scope: &mut RequestScope,
        token: Option<&str>,
    ) -> Result<TokenVerdict> {
        if !self.header_auth_enabled {
            return Ok(TokenVerdict::NotAttempted);
        }
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(TokenVerdict::NotAttempted);
        };

        let Some(user) = self.store.find_by_token(token).await? else {
            warn!("header auth failed: invalid user token");
            return Ok(TokenVerdict::FailureInvalidToken);
        };

        if user.status.is_retired() {
            warn!(user_id = %user.id, "header auth rejected: user is retired");
            return Ok(TokenVerdict::FailureRetired);
        }

        debug!(user_id = %user.id, "header auth succeeded");
        scope.current_user = Some(user.clone());
        Ok(TokenVerdict::Success(user))
    }

    /// 密码登录，成功后把身份写入会话存储
    #[instrument(skip(self, scope, storage, password))]
    pub async fn login(
        &self,
        scope: &mut RequestScope,
        storage: &mut dyn IdentityStorage,
        email: &str,
        password: &str,
    ) -> Result<AuthVerdict> {
        let verdict = self.authenticate_by_password(scope, email, password).await?;
        if let Some(identity) = verdict.identity() {
            storage.write(identity.to_string());
        }
        Ok(verdict)
    }

    pub fn logout(&self, storage: &mut dyn IdentityStorage) {
        storage.clear();
    }

    /// 读取会话身份；对应用户已不存在时清空会话
    pub async fn resolve_session(
        &self,
        scope: &mut RequestScope,
        storage: &mut dyn IdentityStorage,
    ) -> Result<Option<String>> {
        let Some(email) = storage.read() else {
            return Ok(None);
        };
        match scope
            .cache
            .get_or_load(self.store.as_ref(), &email)
            .await?
        {
            Some(_) => Ok(Some(email)),
            None => {
                info!("clearing stale session identity");
                storage.clear();
                Ok(None)
            }
        }
    }

    /// 当前用户：优先返回本请求已认证的用户，否则按会话 email 加载
    pub async fn current_user(
        &self,
        scope: &mut RequestScope,
        session_email: Option<&str>,
    ) -> Result<Option<User>> {
        if scope.current_user.is_none() {
            if let Some(email) = session_email.filter(|e| !e.is_empty()) {
                let user = scope
                    .cache
                    .get_or_load(self.store.as_ref(), email)
                    .await?;
                scope.current_user = user;
            }
        }
        Ok(scope.current_user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{default_roles, MemoryStore};
    use crate::user::cache::tests::CountingStore;
    use crate::user::session::MemoryIdentityStorage;
    use crate::user::{Role, UserStatus};
    use chrono::Utc;
    use std::sync::atomic::Ordering;

    fn config(header: bool) -> AuthConfig {
        AuthConfig {
            header_auth_enabled: header,
            bcrypt_cost: 4,
            ..AuthConfig::default()
        }
    }

    async fn user(email: &str, password: &str, status: UserStatus) -> User {
        User {
            id: format!("id-{}", email.replace(['@', '.'], "-")),
            email: email.to_string(),
            full_name: String::new(),
            password_hash: PasswordHasher::new(4).hash(password).await.unwrap(),
            status,
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

    async fn seeded(header: bool) -> (Arc<MemoryStore>, Authenticator) {
        let store = Arc::new(MemoryStore::with_roles(default_roles()));
        let mut active = user("a@example.com", "Secur1ty", UserStatus::Active).await;
        active.token = Some("active-token".into());
        let mut retired = user("r@example.com", "Secur1ty", UserStatus::Retired).await;
        retired.token = Some("retired-token".into());
        store.save(&active).await.unwrap();
        store.save(&retired).await.unwrap();
        let auth = Authenticator::new(store.clone(), &config(header));
        (store, auth)
    }

    #[tokio::test]
    async fn correct_password_succeeds_with_email_identity() {
        let (_, auth) = seeded(false).await;
        let mut scope = RequestScope::new();
        let verdict = auth
            .authenticate_by_password(&mut scope, "a@example.com", "Secur1ty")
            .await
            .unwrap();
        assert_eq!(verdict, AuthVerdict::Success("a@example.com".into()));
        assert_eq!(verdict.identity(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credential() {
        let (_, auth) = seeded(false).await;
        let mut scope = RequestScope::new();
        let verdict = auth
            .authenticate_by_password(&mut scope, "a@example.com", "wrong")
            .await
            .unwrap();
        assert_eq!(verdict, AuthVerdict::FailureInvalidCredential);
    }

    #[tokio::test]
    async fn unknown_email_is_identity_not_found() {
        let (_, auth) = seeded(false).await;
        let mut scope = RequestScope::new();
        for password in ["Secur1ty", "wrong", ""] {
            let verdict = auth
                .authenticate_by_password(&mut scope, "nobody@example.com", password)
                .await
                .unwrap();
            assert_eq!(verdict, AuthVerdict::FailureIdentityNotFound);
        }
    }

    #[tokio::test]
    async fn retired_user_never_succeeds() {
        let (_, auth) = seeded(false).await;
        let mut scope = RequestScope::new();
        for password in ["Secur1ty", "wrong"] {
            let verdict = auth
                .authenticate_by_password(&mut scope, "r@example.com", password)
                .await
                .unwrap();
            assert_eq!(verdict, AuthVerdict::FailureRetired);
        }
    }

    #[tokio::test]
    async fn failure_messages_are_uniform() {
        assert_eq!(AuthVerdict::FailureRetired.message(), INVALID_CREDENTIALS);
        assert_eq!(AuthVerdict::FailureIdentityNotFound.message(), INVALID_CREDENTIALS);
        assert_eq!(AuthVerdict::FailureInvalidCredential.message(), INVALID_CREDENTIALS);
        assert_ne!(
            AuthVerdict::FailureRetired.code(),
            AuthVerdict::FailureInvalidCredential.code()
        );
    }

    #[tokio::test]
    async fn header_auth_disabled_never_touches_store() {
        let store = Arc::new(CountingStore::new());
        let auth = Authenticator::new(store.clone(), &config(false));
        let mut scope = RequestScope::new();
        let verdict = auth
            .authenticate_by_token(&mut scope, Some("anything"))
            .await
            .unwrap();
        assert!(matches!(verdict, TokenVerdict::NotAttempted));
        assert_eq!(store.token_lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_token_is_not_attempted() {
        let (_, auth) = seeded(true).await;
        let mut scope = RequestScope::new();
        for token in [None, Some(""), Some("   ")] {
            let verdict = auth.authenticate_by_token(&mut scope, token).await.unwrap();
            assert!(!verdict.is_attempted());
        }
    }

    #[tokio::test]
    async fn valid_token_sets_current_user() {
        let (_, auth) = seeded(true).await;
        let mut scope = RequestScope::new();
        let verdict = auth
            .authenticate_by_token(&mut scope, Some("active-token"))
            .await
            .unwrap();
        assert_eq!(verdict.user().unwrap().email, "a@example.com");
        assert_eq!(scope.current_user().unwrap().email, "a@example.com");
    }

    #[tokio::test]
    async fn unknown_token_is_distinct_failure() {
        let (_, auth) = seeded(true).await;
        let mut scope = RequestScope::new();
        let verdict = auth
            .authenticate_by_token(&mut scope, Some("nope"))
            .await
            .unwrap();
        assert!(matches!(verdict, TokenVerdict::FailureInvalidToken));
        assert!(matches!(verdict.into_user(), Err(UserError::InvalidToken)));
        assert!(scope.current_user().is_none());
    }

    #[tokio::test]
    async fn retired_token_yields_no_session() {
        let (_, auth) = seeded(true).await;
        let mut scope = RequestScope::new();
        let verdict = auth
            .authenticate_by_token(&mut scope, Some("retired-token"))
            .await
            .unwrap();
        assert!(matches!(verdict, TokenVerdict::FailureRetired));
        assert!(verdict.into_user().unwrap().is_none());
        assert!(scope.current_user().is_none());
    }

    #[tokio::test]
    async fn header_lookup_is_case_insensitive() {
        let (_, auth) = seeded(true).await;
        let headers = [("Accept", "*/*"), ("x-auth-token", " active-token ")];
        assert_eq!(auth.token_from_headers(headers), Some("active-token"));
        assert_eq!(auth.token_from_headers([("X-Auth-Token", "")]), None);
        assert_eq!(auth.token_from_headers([("Authorization", "x")]), None);
    }

    #[tokio::test]
    async fn scope_cache_avoids_repeated_lookups() {
        let store = Arc::new(CountingStore::new());
        store
            .save(&user("a@example.com", "Secur1ty", UserStatus::Active).await)
            .await
            .unwrap();
        let auth = Authenticator::new(store.clone(), &config(false));

        let mut scope = RequestScope::new();
        auth.authenticate_by_password(&mut scope, "a@example.com", "wrong")
            .await
            .unwrap();
        auth.authenticate_by_password(&mut scope, "a@example.com", "Secur1ty")
            .await
            .unwrap();
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 1);

        let mut next = RequestScope::new();
        auth.authenticate_by_password(&mut next, "a@example.com", "Secur1ty")
            .await
            .unwrap();
        assert_eq!(store.email_lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn login_writes_identity_only_on_success() {
        let (_, auth) = seeded(false).await;
        let mut storage = MemoryIdentityStorage::new();

        let mut scope = RequestScope::new();
        auth.login(&mut scope, &mut storage, "a@example.com", "wrong")
            .await
            .unwrap();
        assert!(storage.is_empty());

        auth.login(&mut scope, &mut storage, "a@example.com", "Secur1ty")
            .await
            .unwrap();
        assert_eq!(storage.read().as_deref(), Some("a@example.com"));

        auth.logout(&mut storage);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn stale_session_is_cleared() {
        let (_, auth) = seeded(false).await;
        let mut storage = MemoryIdentityStorage::with_identity("gone@example.com");
        let mut scope = RequestScope::new();
        assert!(auth.resolve_session(&mut scope, &mut storage).await.unwrap().is_none());
        assert!(storage.is_empty());

        let mut storage = MemoryIdentityStorage::with_identity("a@example.com");
        let mut scope = RequestScope::new();
        assert_eq!(
            auth.resolve_session(&mut scope, &mut storage).await.unwrap().as_deref(),
            Some("a@example.com")
        );
    }

    #[tokio::test]
    async fn current_user_loads_from_session_email() {
        let (_, auth) = seeded(false).await;
        let mut scope = RequestScope::new();
        assert!(auth.current_user(&mut scope, None).await.unwrap().is_none());
        let user = auth
            .current_user(&mut scope, Some("a@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.email, "a@example.com");
        // 已记录后不再依赖会话 email
        assert!(auth.current_user(&mut scope, None).await.unwrap().is_some());
    }
}
