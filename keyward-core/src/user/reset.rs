//! 密码重置 token 生命周期：签发 -> 校验 -> 使用
//!
//! 同一用户并发的签发与使用没有互斥：后签发的 token 覆盖先前的，
//! 与签发并发的 consume 可能清掉用户刚收到的新 token。

use super::crypto::PasswordHasher;
use super::models::{PasswordResetToken, User};
use super::notify::{LogNotifier, Notifier, ResetNotice};
use super::password::check_password_policy;
use super::tokens::TokenGenerator;
use crate::clock::{Clock, SystemClock};
use crate::config::{AuthConfig, DEFAULT_RESET_TOKEN_TTL_SECS};
use crate::error::{Result, UserError};
use crate::store::CredentialStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use url::Url;

/// 一次签发的结果
#[derive(Debug, Clone)]
pub struct IssuedReset {
    pub token: String,
    pub reset_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PasswordResetManager {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenGenerator,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    reset_url_base: String,
}

fn ttl_from_config(ttl: std::time::Duration) -> Duration {
    Duration::from_std(ttl).unwrap_or_else(|_| {
        warn!(ttl_secs = ttl.as_secs(), "reset token ttl out of range; using default");
        Duration::seconds(DEFAULT_RESET_TOKEN_TTL_SECS as i64)
    })
}

impl PasswordResetManager {
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        let ttl = ttl_from_config(config.reset_token_ttl);
        Self {
            store,
            hasher: PasswordHasher::new(config.bcrypt_cost),
            tokens: TokenGenerator::new(config.bearer_token_bytes),
            notifier: Arc::new(LogNotifier),
            clock: Arc::new(SystemClock),
            ttl,
            reset_url_base: config.reset_url_base.clone(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `{base}/set-password/{token}`
    fn reset_url(&self, token: &str) -> Result<String> {
        let mut url = Url::parse(&self.reset_url_base).map_err(|e| {
            UserError::PolicyViolation(format!("invalid reset url base: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| UserError::PolicyViolation("reset url base cannot be a base".into()))?
            .pop_if_empty()
            .push("set-password")
            .push(token);
        Ok(url.to_string())
    }

    /// 过期判定：已过时间严格大于 TTL 才算过期，恰好等于 TTL 仍然有效
    fn is_fresh(&self, reset: &PasswordResetToken) -> bool {
        self.clock.now() - reset.created_at <= self.ttl
    }

    /// 为用户签发新 token（覆盖旧 token）、持久化并发送通知
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue(&self, mut user: User) -> Result<IssuedReset> {
        let token = self.tokens.reset_token();
        let reset_url = self.reset_url(&token)?;
        let created_at = self.clock.now();

        user.password_reset = Some(PasswordResetToken {
            token: token.clone(),
            created_at,
        });
        self.store.save(&user).await?;
        info!("password reset token issued");

        let notice = ResetNotice::new(&user.email, &reset_url);
        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(error = %e, "failed to deliver password reset notice");
        }

        Ok(IssuedReset {
            token,
            reset_url,
            created_at,
        })
    }

    /// 按 email 请求重置；用户不存在返回 None（调用方不应对外暴露差异）
    #[instrument(skip(self))]
    pub async fn request_reset(&self, email: &str) -> Result<Option<IssuedReset>> {
        match self.store.find_by_email(email).await? {
            Some(user) => Ok(Some(self.issue(user).await?)),
            None => {
                info!("password reset requested for unknown email");
                Ok(None)
            }
        }
    }

    async fn find_fresh(&self, token: &str) -> Result<Option<User>> {
        if token.is_empty() {
            return Ok(None);
        }
        let Some(user) = self.store.find_by_password_reset_token(token).await? else {
            return Ok(None);
        };
        match &user.password_reset {
            Some(reset) if self.is_fresh(reset) => Ok(Some(user)),
            Some(_) => {
                info!(user_id = %user.id, "password reset token expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// 校验 token 是否存在且未过期
    #[instrument(skip(self, token))]
    pub async fn validate(&self, token: &str) -> Result<bool> {
        Ok(self.find_fresh(token).await?.is_some())
    }

    /// 使用 token 设置新密码。token 无效或过期返回 false 且不做任何修改。
    #[instrument(skip(self, token, new_password))]
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<bool> {
        check_password_policy(new_password)?;

        let Some(mut user) = self.find_fresh(token).await? else {
            return Ok(false);
        };

        user.password_hash = self.hasher.hash(new_password).await?;
        user.password_reset = None;
        user.updated_at = Some(self.clock.now());
        self.store.save(&user).await?;

        info!(user_id = %user.id, "password reset via token");
        Ok(true)
    }
}
