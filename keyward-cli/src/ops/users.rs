//! 用户管理 CLI 操作

use super::output::print_json;
use super::prompt::password_or_prompt;
use super::ui::{
    format_status, print_empty, print_header, print_hint, print_kv, print_section,
    print_success, print_table_header, print_table_row,
};
use super::OutputFormat;
use keyward_core::{
    CreateUserRequest, UpdateUserRequest, User, UserManager, UserStatus, UserSummary,
};

fn print_user_detail(user: &User) {
    print_kv("ID", &user.id);
    print_kv("Email", &user.email);
    print_kv("Name", &user.full_name);
    print_kv("Status", &format_status(user.status));
    print_kv("Role", user.role_name());
    print_kv("Token", if user.token.is_some() { "set" } else { "-" });
    print_kv(
        "Reset",
        if user.password_reset.is_some() { "pending" } else { "-" },
    );
    print_kv("Created", &user.created_at.format("%Y-%m-%d %H:%M:%S").to_string());
}

/// 存储中没有用户时创建默认管理员
pub async fn init(manager: &UserManager, output: OutputFormat) -> anyhow::Result<()> {
    let created = manager.create_admin_user_if_not_exists().await?;
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "admin_created": created }))?,
        OutputFormat::Table => {
            if created {
                print_success(&format!(
                    "Created admin user {}",
                    keyward_core::user::ADMIN_EMAIL
                ));
                print_hint("Change the default password with `keyward user passwd <id>`");
            } else {
                print_success("Users already exist; nothing to do");
            }
        }
    }
    Ok(())
}

/// 列出所有用户
pub async fn list_users(manager: &UserManager, output: OutputFormat) -> anyhow::Result<()> {
    let users: Vec<UserSummary> = manager
        .list_users()
        .await?
        .into_iter()
        .map(UserSummary::from)
        .collect();

    match output {
        OutputFormat::Json => print_json(&users)?,
        OutputFormat::Table => {
            print_header("👥 用户列表");
            if users.is_empty() {
                print_empty("No users yet. Run `keyward init` to create the admin user.");
                return Ok(());
            }
            let columns = [("ID", 36), ("EMAIL", 28), ("ROLE", 10), ("STATUS", 10)];
            print_table_header(&columns);
            for user in &users {
                let status = user.status.to_string();
                print_table_row(&[
                    (user.id.as_str(), 36),
                    (user.email.as_str(), 28),
                    (user.role.as_str(), 10),
                    (status.as_str(), 10),
                ]);
            }
            println!();
        }
    }
    Ok(())
}

/// 获取用户详情
pub async fn get_user(manager: &UserManager, id: &str, output: OutputFormat) -> anyhow::Result<()> {
    let user = manager.get_user(id).await?;
    match output {
        OutputFormat::Json => print_json(&UserSummary::from(user))?,
        OutputFormat::Table => {
            print_section("用户详情");
            print_user_detail(&user);
        }
    }
    Ok(())
}

/// 创建用户
pub async fn add_user(
    manager: &UserManager,
    email: String,
    full_name: String,
    role_id: i64,
    status: UserStatus,
    password: Option<String>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let password = password_or_prompt(password, "Password", true)?;
    let user = manager
        .add_user(CreateUserRequest {
            email,
            full_name,
            password,
            role_id,
            status,
        })
        .await?;

    match output {
        OutputFormat::Json => print_json(&UserSummary::from(user))?,
        OutputFormat::Table => {
            print_success("用户创建成功");
            print_user_detail(&user);
        }
    }
    Ok(())
}

/// 更新用户：未提供的字段保持不变
pub async fn update_user(
    manager: &UserManager,
    id: &str,
    email: Option<String>,
    full_name: Option<String>,
    role_id: Option<i64>,
    status: Option<UserStatus>,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let current = manager.get_user(id).await?;
    let req = UpdateUserRequest {
        email: email.unwrap_or(current.email),
        full_name: full_name.unwrap_or(current.full_name),
        role_id: role_id.unwrap_or(current.role.id),
        status: status.unwrap_or(current.status),
    };
    let user = manager.update_user(id, req).await?;

    match output {
        OutputFormat::Json => print_json(&UserSummary::from(user))?,
        OutputFormat::Table => {
            print_success("用户更新成功");
            print_user_detail(&user);
        }
    }
    Ok(())
}

/// 修改密码
pub async fn change_password(
    manager: &UserManager,
    id: &str,
    current: Option<String>,
    new_password: Option<String>,
    force: bool,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let current = if force {
        None
    } else {
        Some(password_or_prompt(current, "Current password", false)?)
    };
    let new_password = password_or_prompt(new_password, "New password", true)?;
    let user = manager
        .change_password(id, current.as_deref(), &new_password, force)
        .await?;

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": user.id, "changed": true }))?,
        OutputFormat::Table => print_success(&format!("Password changed for {}", user.email)),
    }
    Ok(())
}

/// 列出角色
pub async fn list_roles(manager: &UserManager, output: OutputFormat) -> anyhow::Result<()> {
    let roles = manager.list_roles().await?;
    match output {
        OutputFormat::Json => print_json(&roles)?,
        OutputFormat::Table => {
            print_section("角色");
            print_table_header(&[("ID", 6), ("NAME", 20)]);
            for role in &roles {
                let id = role.id.to_string();
                print_table_row(&[(id.as_str(), 6), (role.name.as_str(), 20)]);
            }
            println!();
        }
    }
    Ok(())
}
