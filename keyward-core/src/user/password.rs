//! 密码管理：长度策略、校验、修改密码

use super::models::*;
use super::UserManager;
use crate::error::{Result, UserError};
use chrono::Utc;
use tracing::{info, instrument};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 64;

/// 密码长度必须在 6..=64 字节之间
pub(crate) fn check_password_policy(password: &str) -> Result<()> {
    let len = password.len();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(UserError::PolicyViolation(format!(
            "password must be between {} and {} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl UserManager {
    /// 校验密码是否与用户当前密码一致
    pub async fn validate_password(&self, user: &User, password: &str) -> Result<bool> {
        self.hasher.verify(password, &user.password_hash).await
    }

    /// 修改用户密码，可选择强制修改（管理员操作）。
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        id: &str,
        current_password: Option<&str>,
        new_password: &str,
        force: bool,
    ) -> Result<User> {
        let mut user = self.get_user(id).await?;

        check_password_policy(new_password)?;
        // 校验旧密码（非强制模式）
        if !force {
            let current = current_password
                .ok_or_else(|| UserError::Unauthorized("current password required".into()))?;
            if !self.validate_password(&user, current).await? {
                return Err(UserError::Unauthorized("current password is incorrect".into()));
            }
        }

        user.password_hash = self.hasher.hash(new_password).await?;
        user.updated_at = Some(Utc::now());
        self.store.save(&user).await?;

        info!(user_id = %user.id, "password changed");
        Ok(user)
    }
}
