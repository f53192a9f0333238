//! 会话身份存储契约

/// 保存已登录用户身份（email）的外部存储，例如 session。
pub trait IdentityStorage: Send {
    fn read(&self) -> Option<String>;
    fn write(&mut self, identity: String);
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.read().is_none()
    }
}

/// 内存实现
#[derive(Debug, Default, Clone)]
pub struct MemoryIdentityStorage {
    identity: Option<String>,
}

impl MemoryIdentityStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
        }
    }
}

impl IdentityStorage for MemoryIdentityStorage {
    fn read(&self) -> Option<String> {
        self.identity.clone()
    }

    fn write(&mut self, identity: String) {
        self.identity = Some(identity);
    }

    fn clear(&mut self) {
        self.identity = None;
    }
}

/// 禁用会话：只走 header token 的机器客户端使用，什么都不保存
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledIdentityStorage;

impl IdentityStorage for DisabledIdentityStorage {
    fn read(&self) -> Option<String> {
        None
    }

    fn write(&mut self, _identity: String) {}

    fn clear(&mut self) {}
}
