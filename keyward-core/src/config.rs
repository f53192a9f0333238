//! 认证模块配置

use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_HEADER_NAME: &str = "X-Auth-Token";
pub const DEFAULT_RESET_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_BEARER_TOKEN_BYTES: usize = 16;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RESET_URL_BASE: &str = "http://localhost";

/// 认证与凭据生命周期配置
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// 是否启用 header token 认证
    pub header_auth_enabled: bool,
    /// 携带 bearer token 的 header 名称
    pub header_name: String,
    /// 密码重置 token 有效期
    pub reset_token_ttl: Duration,
    /// bearer token 随机字节数（hex 编码后长度翻倍）
    pub bearer_token_bytes: usize,
    /// bcrypt cost
    pub bcrypt_cost: u32,
    /// 单次存储调用超时
    pub store_timeout: Duration,
    /// 重置链接前缀，例如 https://example.com
    pub reset_url_base: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header_auth_enabled: false,
            header_name: DEFAULT_HEADER_NAME.to_string(),
            reset_token_ttl: Duration::from_secs(DEFAULT_RESET_TOKEN_TTL_SECS),
            bearer_token_bytes: DEFAULT_BEARER_TOKEN_BYTES,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            reset_url_base: DEFAULT_RESET_URL_BASE.to_string(),
        }
    }
}

impl AuthConfig {
    /// 从 KW_* 环境变量读取配置，缺失或非法的值回退到默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let header_auth_enabled = env::var("KW_HEADER_AUTH")
            .ok()
            .map(|s| parse_flag(&s))
            .unwrap_or(defaults.header_auth_enabled);

        let header_name = env::var("KW_HEADER_NAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.header_name);

        let reset_token_ttl = parse_var::<u64>("KW_RESET_TOKEN_TTL")
            .map(Duration::from_secs)
            .unwrap_or(defaults.reset_token_ttl);

        let bearer_token_bytes = parse_var::<usize>("KW_BEARER_TOKEN_BYTES")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.bearer_token_bytes);

        let bcrypt_cost = parse_var::<u32>("KW_BCRYPT_COST")
            .filter(|c| (4..=31).contains(c))
            .unwrap_or(defaults.bcrypt_cost);

        let store_timeout = parse_var::<u64>("KW_STORE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);

        let reset_url_base = env::var("KW_RESET_URL_BASE")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.reset_url_base);

        Self {
            header_auth_enabled,
            header_name,
            reset_token_ttl,
            bearer_token_bytes,
            bcrypt_cost,
            store_timeout,
            reset_url_base,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable config value");
            None
        }
    }
}
