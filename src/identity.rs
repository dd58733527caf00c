//! 身份校验模块
//!
//! - [`ServerIdentityProvider`]: 按名称校验受信任后端服务器的密钥，
//!   每个服务器持有独立密钥，单个服务泄露不会波及其他服务
//! - [`SecretVerifier`]: 将登录时提交的密钥与存储中的用户密钥比对，
//!   密钥的存储格式（明文、哈希等）由实现决定
//!
//! ```rust
//! use authgate::identity::{ServerIdentityProvider, StaticServerIdentities};
//!
//! let servers = StaticServerIdentities::new()
//!     .with_server("uploader", "uploader-secret")
//!     .with_server("billing", "billing-secret");
//!
//! assert!(servers.verify("uploader", "uploader-secret"));
//! assert!(!servers.verify("billing", "uploader-secret"));
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::random::constant_time_compare_str;

/// 未知服务器名时参与比较的占位密钥
const DUMMY_SECRET: &str = "authgate-unknown-server-placeholder-secret";

/// 服务器身份提供者
///
/// 实现此 trait 可以接入外部的身份配置源。
pub trait ServerIdentityProvider: Send + Sync {
    /// 校验服务器名与密钥是否匹配
    fn verify(&self, server_name: &str, server_secret: &str) -> bool;
}

/// 基于静态映射的服务器身份
#[derive(Clone, Default)]
pub struct StaticServerIdentities {
    servers: HashMap<String, String>,
}

impl StaticServerIdentities {
    /// 创建空的身份表
    pub fn new() -> Self {
        Self::default()
    }

    /// 从名称到密钥的映射创建
    pub fn from_map(servers: HashMap<String, String>) -> Self {
        Self { servers }
    }

    /// 添加一个服务器身份
    pub fn with_server(mut self, name: impl Into<String>, secret: impl Into<String>) -> Self {
        self.servers.insert(name.into(), secret.into());
        self
    }

    /// 已配置的服务器数量
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// 是否未配置任何服务器
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

impl fmt::Debug for StaticServerIdentities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.servers.keys().collect();
        names.sort();
        f.debug_struct("StaticServerIdentities")
            .field("servers", &names)
            .finish()
    }
}

impl ServerIdentityProvider for StaticServerIdentities {
    fn verify(&self, server_name: &str, server_secret: &str) -> bool {
        match self.servers.get(server_name) {
            Some(expected) => constant_time_compare_str(server_secret, expected),
            None => {
                // 未知名称同样执行一次比较
                let _ = constant_time_compare_str(server_secret, DUMMY_SECRET);
                false
            }
        }
    }
}

/// 用户密钥校验器
pub trait SecretVerifier: Send + Sync {
    /// 校验提交的密钥与存储的密钥是否匹配
    fn verify(&self, presented: &str, stored: &str) -> bool;
}

/// 常量时间相等比较
///
/// 适用于存储中保存的是可直接比较的密钥（或调用方已预先哈希的值）。
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantTimeSecretVerifier;

impl SecretVerifier for ConstantTimeSecretVerifier {
    fn verify(&self, presented: &str, stored: &str) -> bool {
        constant_time_compare_str(presented, stored)
    }
}
