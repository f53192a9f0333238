//! 用户数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fmt;

/// 用户状态（序列化为整数：1 = 活跃，2 = 已停用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum UserStatus {
    Active,
    Retired,
}

impl UserStatus {
    pub fn is_retired(self) -> bool {
        self == UserStatus::Retired
    }
}

impl From<UserStatus> for u8 {
    fn from(status: UserStatus) -> Self {
        match status {
            UserStatus::Active => 1,
            UserStatus::Retired => 2,
        }
    }
}

impl TryFrom<u8> for UserStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(UserStatus::Active),
            2 => Ok(UserStatus::Retired),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => f.write_str("active"),
            UserStatus::Retired => f.write_str("retired"),
        }
    }
}

/// 角色（由外部维护，被引用后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// 密码重置 token 与其创建时间，二者总是成对出现
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub token: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for PasswordResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetToken")
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// 用户账户（存储模型，包含密码哈希）
#[skip_serializing_none]
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户唯一 ID (UUID)
    pub id: String,
    /// 邮箱（唯一，用于登录）
    pub email: String,
    /// 显示名称
    #[serde(default)]
    pub full_name: String,
    /// bcrypt 哈希后的密码
    pub password_hash: String,
    pub status: UserStatus,
    pub role: Role,
    /// Header 认证使用的 bearer token
    pub token: Option<String>,
    /// 待使用的密码重置 token
    pub password_reset: Option<PasswordResetToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        !self.status.is_retired()
    }

    pub fn role_name(&self) -> &str {
        &self.role.name
    }

    pub fn reset_token(&self) -> Option<&str> {
        self.password_reset.as_ref().map(|r| r.token.as_str())
    }
}

// 手动实现 Debug，避免哈希与 token 出现在日志中
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password_hash", &"<redacted>")
            .field("status", &self.status)
            .field("role", &self.role)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("password_reset", &self.password_reset)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// 创建用户请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role_id: i64,
    pub status: UserStatus,
}

/// 更新用户请求（不含密码，密码修改走 change_password）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role_id: i64,
    pub status: UserStatus,
}

/// 用户列表项（不含敏感信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub status: UserStatus,
    pub role: String,
    pub has_token: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            status: user.status,
            role: user.role.name,
            has_token: user.token.is_some(),
            created_at: user.created_at,
        }
    }
}
