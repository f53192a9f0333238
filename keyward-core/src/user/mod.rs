//! 用户管理与认证模块

mod auth;
mod cache;
mod crypto;
mod manager;
mod models;
mod notify;
mod password;
mod reset;
mod session;
mod tokens;

pub use auth::{AuthVerdict, Authenticator, RequestScope, TokenVerdict, INVALID_CREDENTIALS};
pub use cache::IdentityCache;
pub use crypto::PasswordHasher;
pub use manager::{UserManager, ADMIN_EMAIL, ADMIN_NAME, ADMIN_PASSWORD, ADMIN_ROLE_ID};
pub use models::{
    CreateUserRequest, PasswordResetToken, Role, UpdateUserRequest, User, UserStatus,
    UserSummary,
};
pub use notify::{LogNotifier, Notifier, ResetNotice};
pub use password::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
pub use reset::{IssuedReset, PasswordResetManager};
pub use session::{DisabledIdentityStorage, IdentityStorage, MemoryIdentityStorage};
pub use tokens::{TokenGenerator, RESET_TOKEN_LEN};
