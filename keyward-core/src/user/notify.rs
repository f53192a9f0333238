//! 密码重置通知

use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// 重置邮件内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetNotice {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl ResetNotice {
    pub fn new(to: &str, reset_url: &str) -> Self {
        let body = format!(
            "Please follow the link below to reset your password:\n{reset_url}\n\
             If you haven't asked to reset your password, please ignore this message.\n"
        );
        Self {
            to: to.to_string(),
            subject: "Password Reset".to_string(),
            body,
        }
    }
}

/// 通知发送方。调用方不等待投递结果，失败不会回滚 token。
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &ResetNotice) -> Result<()>;
}

/// 只写日志的通知实现（不记录链接本身）
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &ResetNotice) -> Result<()> {
        info!(email = %notice.to, subject = %notice.subject, "password reset notice dispatched");
        Ok(())
    }
}
