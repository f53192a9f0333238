//! 登录校验与 bearer token 操作

use super::output::print_json;
use super::prompt::password_or_prompt;
use super::ui::{
    print_error, print_hint, print_kv, print_success, print_table_header, print_table_row,
    print_warning,
};
use super::OutputFormat;
use keyward_core::{RequestScope, TokenVerdict, UserManager};

/// 用邮箱和密码尝试登录，输出判定结果
pub async fn login(
    manager: &UserManager,
    email: &str,
    password: Option<String>,
    output: OutputFormat,
) -> anyhow::Result<bool> {
    let password = password_or_prompt(password, "Password", false)?;
    let mut scope = RequestScope::new();
    let verdict = manager
        .authenticator()
        .authenticate_by_password(&mut scope, email, &password)
        .await?;

    match output {
        OutputFormat::Json => {
            let message = (!verdict.is_success()).then(|| verdict.message());
            print_json(&serde_json::json!({
                "success": verdict.is_success(),
                "code": verdict.code(),
                "message": message,
            }))?
        }
        OutputFormat::Table => {
            if let Some(identity) = verdict.identity() {
                print_success(&format!("Authenticated as {identity}"));
            } else {
                print_error(verdict.message());
            }
        }
    }
    Ok(verdict.is_success())
}

/// 为用户签发新的 bearer token
pub async fn issue_token(
    manager: &UserManager,
    id: &str,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let user = manager.get_user(id).await?;
    let token = manager.generate_token();
    let user = manager.update_token(user, token).await?;
    let token = user.token.as_deref().unwrap_or_default();

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": user.id, "token": token }))?,
        OutputFormat::Table => {
            print_success(&format!("Issued token for {}", user.email));
            print_kv("Token", token);
            print_hint("The token is shown once; store it somewhere safe");
        }
    }
    Ok(())
}

/// 为所有用户重新生成 token
pub async fn regenerate_tokens(manager: &UserManager, output: OutputFormat) -> anyhow::Result<()> {
    let users = manager.regenerate_tokens().await?;

    match output {
        OutputFormat::Json => {
            let rows: Vec<_> = users
                .iter()
                .map(|u| serde_json::json!({ "id": u.id, "email": u.email, "token": u.token }))
                .collect();
            print_json(&rows)?;
        }
        OutputFormat::Table => {
            print_success(&format!("Regenerated tokens for {} users", users.len()));
            print_table_header(&[("EMAIL", 28), ("TOKEN", 32)]);
            for user in &users {
                print_table_row(&[
                    (user.email.as_str(), 28),
                    (user.token.as_deref().unwrap_or("-"), 32),
                ]);
            }
            println!();
        }
    }
    Ok(())
}

/// 按 header 认证的规则校验一个 token
pub async fn check_token(
    manager: &UserManager,
    token: &str,
    output: OutputFormat,
) -> anyhow::Result<bool> {
    let auth = manager.authenticator();
    let mut scope = RequestScope::new();
    let verdict = auth.authenticate_by_token(&mut scope, Some(token)).await?;

    let code = match &verdict {
        TokenVerdict::NotAttempted => "not_attempted",
        TokenVerdict::Success(_) => "success",
        TokenVerdict::FailureRetired => "retired",
        TokenVerdict::FailureInvalidToken => "invalid_token",
    };
    let accepted = matches!(verdict, TokenVerdict::Success(_));

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "code": code,
            "email": verdict.user().map(|u| u.email.as_str()),
        }))?,
        OutputFormat::Table => match &verdict {
            TokenVerdict::NotAttempted => {
                print_warning("Token was not checked");
                if !auth.header_auth_enabled() {
                    print_hint("Header authentication is disabled; set KW_HEADER_AUTH=true");
                }
            }
            TokenVerdict::Success(user) => {
                print_success(&format!("Token belongs to {}", user.email));
                print_kv("Header", auth.header_name());
            }
            TokenVerdict::FailureRetired => print_error("Token belongs to a retired user"),
            TokenVerdict::FailureInvalidToken => print_error("Invalid user token"),
        },
    }
    Ok(accepted)
}
