mod ops;

use clap::{Parser, Subcommand, ValueEnum};
use keyward_core::{AuthConfig, FileStore, UserManager, UserStatus};
use ops::{auth, reset, users, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Local administration CLI for the Keyward user store.
#[derive(Parser)]
#[command(
    name = "keyward",
    author,
    version,
    about = "Manage users, tokens and password resets"
)]
struct Cli {
    /// 数据目录
    #[arg(long, env = "KW_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 存储为空时创建默认管理员
    Init,
    /// 校验邮箱和密码
    Login {
        email: String,
        /// 密码（省略时交互输入）
        #[arg(long, short)]
        password: Option<String>,
    },

    /// 用户管理命令
    #[command(subcommand)]
    User(UserCommands),

    /// 角色命令
    #[command(subcommand)]
    Role(RoleCommands),

    /// Bearer token 命令
    #[command(subcommand)]
    Token(TokenCommands),

    /// 密码重置命令
    #[command(subcommand)]
    Reset(ResetCommands),
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Active,
    Retired,
}

impl From<StatusArg> for UserStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => UserStatus::Active,
            StatusArg::Retired => UserStatus::Retired,
        }
    }
}

#[derive(Subcommand)]
enum UserCommands {
    /// 列出所有用户
    List,
    /// 获取用户详情
    Get {
        /// 用户 ID
        id: String,
    },
    /// 创建用户
    Add {
        #[arg(long, short)]
        email: String,
        #[arg(long, short = 'n')]
        name: String,
        /// 角色 ID
        #[arg(long, short, default_value_t = 1)]
        role: i64,
        #[arg(long, value_enum, default_value = "active")]
        status: StatusArg,
        /// 密码（省略时交互输入）
        #[arg(long, short)]
        password: Option<String>,
    },
    /// 更新用户，未提供的字段保持不变
    Update {
        /// 用户 ID
        id: String,
        #[arg(long, short)]
        email: Option<String>,
        #[arg(long, short = 'n')]
        name: Option<String>,
        #[arg(long, short)]
        role: Option<i64>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// 修改用户密码
    Passwd {
        /// 用户 ID
        id: String,
        /// 新密码
        #[arg(long, short)]
        password: Option<String>,
        /// 当前密码
        #[arg(long)]
        current: Option<String>,
        /// 跳过当前密码校验（管理员操作）
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum RoleCommands {
    /// 列出角色
    List,
}

#[derive(Subcommand)]
enum TokenCommands {
    /// 为用户签发新 token
    Issue {
        /// 用户 ID
        id: String,
    },
    /// 为所有用户重新生成 token
    Regenerate,
    /// 校验 token
    Check { token: String },
}

#[derive(Subcommand)]
enum ResetCommands {
    /// 申请密码重置
    Request { email: String },
    /// 校验重置 token
    Validate { token: String },
    /// 使用重置 token 设置新密码
    Consume {
        token: String,
        /// 新密码（省略时交互输入）
        #[arg(long, short)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载 .env 文件（如果存在），忽略错误
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let config = AuthConfig::from_env();
    debug!(data_dir = %cli.data_dir.display(), "opening file store");
    let store = FileStore::open(&cli.data_dir).await?;
    let manager = UserManager::new(Arc::new(store), &config);
    let output = cli.output;

    let ok = match cli.command {
        Commands::Init => {
            users::init(&manager, output).await?;
            true
        }
        Commands::Login { email, password } => {
            auth::login(&manager, &email, password, output).await?
        }

        Commands::User(user_cmd) => {
            match user_cmd {
                UserCommands::List => users::list_users(&manager, output).await?,
                UserCommands::Get { id } => users::get_user(&manager, &id, output).await?,
                UserCommands::Add {
                    email,
                    name,
                    role,
                    status,
                    password,
                } => {
                    users::add_user(&manager, email, name, role, status.into(), password, output)
                        .await?
                }
                UserCommands::Update {
                    id,
                    email,
                    name,
                    role,
                    status,
                } => {
                    users::update_user(
                        &manager,
                        &id,
                        email,
                        name,
                        role,
                        status.map(Into::into),
                        output,
                    )
                    .await?
                }
                UserCommands::Passwd {
                    id,
                    password,
                    current,
                    force,
                } => {
                    users::change_password(&manager, &id, current, password, force, output)
                        .await?
                }
            }
            true
        }

        Commands::Role(RoleCommands::List) => {
            users::list_roles(&manager, output).await?;
            true
        }

        Commands::Token(token_cmd) => match token_cmd {
            TokenCommands::Issue { id } => {
                auth::issue_token(&manager, &id, output).await?;
                true
            }
            TokenCommands::Regenerate => {
                auth::regenerate_tokens(&manager, output).await?;
                true
            }
            TokenCommands::Check { token } => auth::check_token(&manager, &token, output).await?,
        },

        Commands::Reset(reset_cmd) => match reset_cmd {
            ResetCommands::Request { email } => {
                reset::request(&manager, &email, output).await?;
                true
            }
            ResetCommands::Validate { token } => reset::validate(&manager, &token, output).await?,
            ResetCommands::Consume { token, password } => {
                reset::consume(&manager, &token, password, output).await?
            }
        },
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing() {
    // 日志写 stderr，stdout 只留命令输出
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
