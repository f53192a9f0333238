//! 基于 JSON 文件的凭据存储：每个用户一个文件，外加 email/token 索引

use super::{default_roles, CredentialStore};
use crate::error::{Result, UserError};
use crate::user::{Role, User};
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// 二级索引：字段值 -> 用户 ID
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    #[serde(default)]
    emails: HashMap<String, String>,
    #[serde(default)]
    tokens: HashMap<String, String>,
    #[serde(default)]
    reset_tokens: HashMap<String, String>,
}

impl StoreIndex {
    fn from_users(users: &[User]) -> Self {
        let mut index = Self::default();
        for user in users {
            index.insert_user(user);
        }
        index
    }

    fn remove_user(&mut self, id: &str) {
        self.emails.retain(|_, uid| uid != id);
        self.tokens.retain(|_, uid| uid != id);
        self.reset_tokens.retain(|_, uid| uid != id);
    }

    fn insert_user(&mut self, user: &User) {
        self.emails.insert(user.email.clone(), user.id.clone());
        if let Some(token) = &user.token {
            self.tokens.insert(token.clone(), user.id.clone());
        }
        if let Some(reset) = user.reset_token() {
            self.reset_tokens.insert(reset.to_string(), user.id.clone());
        }
    }

    fn replace_user(&mut self, user: &User) {
        self.remove_user(&user.id);
        self.insert_user(user);
    }
}

#[derive(Clone, Copy)]
enum IndexKind {
    Email,
    Token,
    ResetToken,
}

impl IndexKind {
    fn map(self, index: &StoreIndex) -> &HashMap<String, String> {
        match self {
            IndexKind::Email => &index.emails,
            IndexKind::Token => &index.tokens,
            IndexKind::ResetToken => &index.reset_tokens,
        }
    }

    fn matches(self, user: &User, value: &str) -> bool {
        match self {
            IndexKind::Email => user.email == value,
            IndexKind::Token => secret_eq(user.token.as_deref(), value),
            IndexKind::ResetToken => secret_eq(user.reset_token(), value),
        }
    }
}

fn secret_eq(stored: Option<&str>, presented: &str) -> bool {
    stored
        .map(|s| bool::from(s.as_bytes().ct_eq(presented.as_bytes())))
        .unwrap_or(false)
}

/// 文件存储
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    /// 串行化同一进程内的写入与索引更新
    write_lock: Mutex<()>,
}

impl FileStore {
    /// 打开存储目录，必要时创建目录并写入默认角色
    pub async fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let store = Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        store.ensure_dirs().await?;
        Ok(store)
    }

    async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.users_dir()).await?;
        let roles_path = self.roles_path();
        if !tokio::fs::try_exists(&roles_path).await.unwrap_or(false) {
            let data = serde_json::to_vec_pretty(&default_roles())?;
            write_atomic(&roles_path, &data).await?;
        }
        Ok(())
    }

    fn users_dir(&self) -> PathBuf {
        self.data_dir.join("users")
    }

    fn index_path(&self) -> PathBuf {
        self.users_dir().join("index.json")
    }

    fn roles_path(&self) -> PathBuf {
        self.data_dir.join("roles.json")
    }

    fn user_path(&self, id: &str) -> PathBuf {
        self.users_dir().join(format!("{}.json", id))
    }

    /// ID 只允许字母数字、`-` 和 `_`，防止路径穿越
    fn valid_id(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// 读取索引；文件缺失或无法解析时返回 None
    async fn load_index(&self) -> Option<StoreIndex> {
        match tokio::fs::read(self.index_path()).await {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(index) => Some(index),
                Err(e) => {
                    warn!(error = %e, "user index is corrupt; falling back to scan");
                    None
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, "user index is unreadable; falling back to scan");
                }
                None
            }
        }
    }

    /// 当前索引；不可用时扫描目录重建。调用方需持有 write_lock。
    async fn index_or_rebuild(&self) -> Result<StoreIndex> {
        match self.load_index().await {
            Some(index) => Ok(index),
            None => Ok(StoreIndex::from_users(&self.scan_users().await?)),
        }
    }

    async fn save_index(&self, index: &StoreIndex) -> Result<()> {
        let data = serde_json::to_vec_pretty(index)?;
        write_atomic(&self.index_path(), &data).await
    }

    async fn read_user(&self, id: &str) -> Result<Option<User>> {
        if !Self::valid_id(id) {
            return Ok(None);
        }
        let path = self.user_path(id);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn encode_user(user: &User) -> Result<Vec<u8>> {
        if !Self::valid_id(&user.id) {
            return Err(UserError::PolicyViolation(format!("invalid user id: {}", user.id)));
        }
        Ok(serde_json::to_vec_pretty(user)?)
    }

    async fn write_user(&self, user: &User) -> Result<()> {
        let data = Self::encode_user(user)?;
        write_atomic(&self.user_path(&user.id), &data).await
    }

    /// 读取目录中全部用户文件（跳过 index.json 与无法解析的文件）
    async fn scan_users(&self) -> Result<Vec<User>> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(self.users_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.file_stem().map(|s| s == "index").unwrap_or(false) {
                continue;
            }
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                paths.push(path);
            }
        }

        let reads = paths.into_iter().map(|path| async move {
            let data = tokio::fs::read(&path).await.ok()?;
            match serde_json::from_slice::<User>(&data) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable user file");
                    None
                }
            }
        });
        let mut users: Vec<User> = join_all(reads).await.into_iter().flatten().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    /// 索引可用时以索引为准，未命中直接返回 None。
    /// 只有索引缺失、损坏或命中的用户字段已不匹配时才扫描目录并重建索引。
    async fn lookup(&self, kind: IndexKind, value: &str) -> Result<Option<User>> {
        if let Some(index) = self.load_index().await {
            let Some(id) = kind.map(&index).get(value) else {
                return Ok(None);
            };
            if let Some(user) = self.read_user(id).await? {
                if kind.matches(&user, value) {
                    return Ok(Some(user));
                }
            }
            debug!("user index entry is stale");
        }

        let _guard = self.write_lock.lock().await;
        let users = self.scan_users().await?;
        let found = users.iter().find(|u| kind.matches(u, value)).cloned();
        debug!("rebuilding user index");
        self.save_index(&StoreIndex::from_users(&users)).await?;
        Ok(found)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// 先写临时文件再 rename，避免读到半截文件
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        self.read_user(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.lookup(IndexKind::Email, email).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<User>> {
        self.lookup(IndexKind::Token, token).await
    }

    async fn find_by_password_reset_token(&self, token: &str) -> Result<Option<User>> {
        self.lookup(IndexKind::ResetToken, token).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.scan_users().await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn save(&self, user: &User) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut index = self.index_or_rebuild().await?;
        self.write_user(user).await?;
        index.replace_user(user);
        self.save_index(&index).await
    }

    /// 全部用户先编码并写入临时文件，都成功后才逐个 rename
    #[instrument(skip(self, users), fields(count = users.len()))]
    async fn persist_batch(&self, users: &[User]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let encoded = users
            .iter()
            .map(|user| Ok((self.user_path(&user.id), Self::encode_user(user)?)))
            .collect::<Result<Vec<_>>>()?;
        let mut index = self.index_or_rebuild().await?;

        let mut staged: Vec<(PathBuf, &PathBuf)> = Vec::with_capacity(encoded.len());
        for (path, data) in &encoded {
            let tmp = tmp_path(path);
            let written = tokio::fs::write(&tmp, data).await;
            staged.push((tmp, path));
            if let Err(e) = written {
                for (tmp, _) in &staged {
                    let _ = tokio::fs::remove_file(tmp).await;
                }
                return Err(e.into());
            }
        }
        for (tmp, path) in &staged {
            tokio::fs::rename(tmp, path).await?;
        }

        for user in users {
            index.replace_user(user);
        }
        self.save_index(&index).await
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        Ok(self
            .list_roles()
            .await?
            .into_iter()
            .find(|r| r.id == role_id))
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        match tokio::fs::read(self.roles_path()).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
