//! Bearer token 与密码重置 token 生成

use crate::config::DEFAULT_BEARER_TOKEN_BYTES;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// 重置 token 长度
pub const RESET_TOKEN_LEN: usize = 32;
const RESET_TOKEN_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
    bearer_bytes: usize,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_BEARER_TOKEN_BYTES)
    }
}

impl TokenGenerator {
    pub fn new(bearer_bytes: usize) -> Self {
        Self { bearer_bytes }
    }

    /// 生成 bearer token：OsRng 随机字节的 hex 编码
    pub fn bearer_token(&self) -> String {
        let mut bytes = vec![0u8; self.bearer_bytes];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// 生成 32 位小写字母数字重置 token
    pub fn reset_token(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..RESET_TOKEN_LEN)
            .map(|_| RESET_TOKEN_CHARSET[rng.gen_range(0..RESET_TOKEN_CHARSET.len())] as char)
            .collect()
    }
}
