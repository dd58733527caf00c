//! 存储协作方模块
//!
//! 定义认证核心所依赖的用户存储与 token 存储能力，并提供内存实现。
//!
//! 持久化引擎不属于本 crate：生产环境应为数据库等后端实现
//! [`UserStore`] 与 [`TokenStore`]。内存实现用于开发和测试。
//!
//! ## 约定
//!
//! - 每个方法都可以被并发调用
//! - `add_token` 返回后，随后的 `find_token` 必须能找到该 token
//! - 同一主体并发登录产生的多个 token 不是冲突，都应被接受

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result, StorageError};
use crate::token::SessionToken;

/// 用户记录
///
/// 由外部存储拥有，核心只把它当作不可变的查询结果。
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// 用户 ID
    pub id: String,

    /// 用户名
    pub name: String,

    /// 密钥（格式对核心不透明，由 [`SecretVerifier`](crate::identity::SecretVerifier) 解释）
    #[serde(default)]
    pub secret: String,

    /// 其他资料字段
    #[serde(flatten)]
    pub profile: HashMap<String, serde_json::Value>,
}

impl User {
    /// 创建新的用户记录
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            secret: secret.into(),
            profile: HashMap::new(),
        }
    }

    /// 去掉密钥后的副本，用于返回给调用方
    pub fn without_secret(&self) -> Self {
        Self {
            secret: String::new(),
            ..self.clone()
        }
    }

    /// 设置资料字段
    pub fn with_profile<V: Serialize>(mut self, key: impl Into<String>, value: V) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.profile.insert(key.into(), json_value);
        }
        self
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

/// 用户部分匹配查询
///
/// 所有为 `Some` 的字段都匹配时，用户才算命中。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// 按 ID 匹配
    pub id: Option<String>,
    /// 按用户名匹配
    pub name: Option<String>,
}

impl UserQuery {
    /// 按用户名查询
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// 按 ID 查询
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    /// 检查用户是否匹配
    pub fn matches(&self, user: &User) -> bool {
        self.id.as_deref().is_none_or(|id| id == user.id)
            && self.name.as_deref().is_none_or(|name| name == user.name)
    }
}

/// 用户存储 trait
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 插入或更新用户（按 ID）
    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// 查找第一个匹配的用户
    async fn find_user(&self, query: &UserQuery) -> Result<Option<User>>;

    /// 查找所有匹配的用户
    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>>;

    /// 删除用户
    async fn remove_user(&self, user: &User) -> Result<()>;

    /// 检查存储是否可用
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Token 存储 trait
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 保存 token
    ///
    /// 同一主体可以同时持有多个 token；相同 token 字符串重复保存时后写覆盖。
    async fn add_token(&self, token: &SessionToken) -> Result<()>;

    /// 按不透明 token 字符串查找
    async fn find_token(&self, token: &str) -> Result<Option<SessionToken>>;

    /// 删除 token
    async fn remove_token(&self, token: &SessionToken) -> Result<()>;

    /// 检查存储是否可用
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn lock_poisoned() -> Error {
    Error::Storage(StorageError::OperationFailed("lock poisoned".into()))
}

/// 内存用户存储
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始用户创建
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();
        Self {
            users: RwLock::new(users),
        }
    }

    /// 用户总数
    pub fn count(&self) -> Result<usize> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;
        Ok(users.len())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn upsert_user(&self, user: &User) -> Result<()> {
        if user.id.is_empty() {
            return Err(Error::Storage(StorageError::OperationFailed(
                "user id cannot be empty".into(),
            )));
        }
        let mut users = self.users.write().map_err(|_| lock_poisoned())?;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, query: &UserQuery) -> Result<Option<User>> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;

        if let Some(id) = query.id.as_deref() {
            return Ok(users.get(id).filter(|u| query.matches(u)).cloned());
        }

        Ok(users.values().find(|u| query.matches(u)).cloned())
    }

    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        let users = self.users.read().map_err(|_| lock_poisoned())?;
        Ok(users.values().filter(|u| query.matches(u)).cloned().collect())
    }

    async fn remove_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().map_err(|_| lock_poisoned())?;
        users.remove(&user.id);
        Ok(())
    }
}

/// 内存 token 存储
///
/// 按不透明 token 字符串索引。每次 [`add_token`](TokenStore::add_token)
/// 写入前会先丢弃已过期的记录，刷新产生的旧 token 不会无限累积。
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<String, SessionToken>>,
}

impl InMemoryTokenStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// token 总数
    pub fn count(&self) -> Result<usize> {
        let tokens = self.tokens.read().map_err(|_| lock_poisoned())?;
        Ok(tokens.len())
    }

    /// 获取某个主体的所有 token
    pub fn tokens_for_subject(&self, subject_id: &str) -> Result<Vec<SessionToken>> {
        let tokens = self.tokens.read().map_err(|_| lock_poisoned())?;
        Ok(tokens
            .values()
            .filter(|t| t.data.subject_id == subject_id)
            .cloned()
            .collect())
    }

    /// 清理过期的 token
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut tokens = self.tokens.write().map_err(|_| lock_poisoned())?;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired());
        Ok(before - tokens.len())
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn add_token(&self, token: &SessionToken) -> Result<()> {
        let now = chrono::Utc::now();
        let mut tokens = self.tokens.write().map_err(|_| lock_poisoned())?;
        tokens.retain(|_, t| !t.is_expired_at(now));
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<SessionToken>> {
        let tokens = self.tokens.read().map_err(|_| lock_poisoned())?;
        Ok(tokens.get(token).cloned())
    }

    async fn remove_token(&self, token: &SessionToken) -> Result<()> {
        let mut tokens = self.tokens.write().map_err(|_| lock_poisoned())?;
        tokens.remove(&token.token);
        Ok(())
    }
}
