//! Core library for user management: credential store contract, password hashing,
//! bearer and reset tokens, the authentication decision engine, and the password reset lifecycle.

mod clock;
mod config;
mod error;
pub mod store;
pub mod user;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AuthConfig;
pub use error::{Result, UserError};
pub use store::{BoundedStore, CredentialStore, FileStore, MemoryStore};
pub use user::{
    AuthVerdict, Authenticator, CreateUserRequest, IssuedReset, PasswordResetManager,
    RequestScope, Role, TokenVerdict, UpdateUserRequest, User, UserManager, UserStatus,
    UserSummary,
};
