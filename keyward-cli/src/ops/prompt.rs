//! 交互式密码输入

use dialoguer::{theme::ColorfulTheme, Password};

/// 未通过参数提供密码时交互式读取；`confirm` 为 true 时要求输入两次。
/// 长度策略由 core 校验。
pub fn password_or_prompt(
    provided: Option<String>,
    prompt: &str,
    confirm: bool,
) -> anyhow::Result<String> {
    if let Some(password) = provided {
        return Ok(password);
    }
    let theme = ColorfulTheme::default();
    let mut input = Password::with_theme(&theme).with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok(input.interact()?)
}
