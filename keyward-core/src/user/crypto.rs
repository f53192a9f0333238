//! 密码加密工具

use crate::error::{Result, UserError};
use bcrypt::{hash, verify, DEFAULT_COST};

/// bcrypt 哈希器，cost 来自配置
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// 异步哈希密码（在阻塞线程中执行 bcrypt）
    pub async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash(&password, cost))
            .await
            .map_err(|e| UserError::Other(format!("spawn_blocking failed: {}", e)))?
            .map_err(|e| UserError::Hash(format!("bcrypt hash failed: {}", e)))
    }

    /// 异步验证密码（在阻塞线程中执行 bcrypt）
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify(&password, &hash))
            .await
            .map_err(|e| UserError::Other(format!("spawn_blocking failed: {}", e)))?
            .map_err(|e| UserError::Hash(format!("bcrypt verify failed: {}", e)))
    }
}
