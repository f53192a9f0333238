//! 密码重置操作

use super::output::print_json;
use super::prompt::password_or_prompt;
use super::ui::{print_error, print_info, print_kv, print_success};
use super::OutputFormat;
use keyward_core::UserManager;

/// 申请重置。提示语不区分邮箱是否注册；这是管理员工具，
/// 邮箱已注册时额外输出重置链接（JSON 中未注册为 `null`）。
pub async fn request(
    manager: &UserManager,
    email: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let issued = manager.resets().request_reset(email).await?;

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "requested": true,
            "reset_url": issued.as_ref().map(|r| r.reset_url.as_str()),
        }))?,
        OutputFormat::Table => {
            print_info("If the address is registered, a reset link has been sent.");
            if let Some(issued) = &issued {
                print_kv("Reset URL", &issued.reset_url);
                print_kv(
                    "Issued",
                    &issued.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                );
            }
        }
    }
    Ok(())
}

/// 校验重置 token
pub async fn validate(
    manager: &UserManager,
    token: &str,
    output: OutputFormat,
) -> anyhow::Result<bool> {
    let valid = manager.resets().validate(token).await?;
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "valid": valid }))?,
        OutputFormat::Table => {
            if valid {
                print_success("Reset token is valid");
            } else {
                print_error("Reset token is invalid or expired");
            }
        }
    }
    Ok(valid)
}

/// 使用重置 token 设置新密码
pub async fn consume(
    manager: &UserManager,
    token: &str,
    password: Option<String>,
    output: OutputFormat,
) -> anyhow::Result<bool> {
    let password = password_or_prompt(password, "New password", true)?;
    let changed = manager.resets().consume(token, &password).await?;
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "changed": changed }))?,
        OutputFormat::Table => {
            if changed {
                print_success("Password has been reset");
            } else {
                print_error("Reset token is invalid or expired");
            }
        }
    }
    Ok(changed)
}
