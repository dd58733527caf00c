//! 认证服务配置模块
//!
//! [`AuthConfig`] 支持 serde 反序列化，嵌入方可以从任意格式
//! （TOML、JSON、环境变量等）加载，再调用 [`AuthConfig::validate`] 校验。
//!
//! ```rust
//! use authgate::config::AuthConfig;
//! use chrono::Duration;
//!
//! let config = AuthConfig::new()
//!     .with_signing_secret("my-secret-key-at-least-32-bytes!")
//!     .with_server("uploader", "uploader-secret")
//!     .with_user_duration(Duration::minutes(30));
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.policy().user_duration, Duration::minutes(30));
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ConfigError, Error, Result};
use crate::identity::StaticServerIdentities;
use crate::token::SessionPolicy;
use crate::token::policy::{
    DEFAULT_LONG_TERM_DURATION, DEFAULT_REFRESH_DURATION, DEFAULT_SERVER_DURATION,
    DEFAULT_USER_DURATION, LONG_DURATION_THRESHOLD, seconds,
};

/// 签名密钥的最小长度（字节）
pub const MIN_SECRET_LENGTH: usize = 32;

/// 任意有效期的上限（10 年）
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 86400;

/// 认证服务配置
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token 签名密钥，至少 32 字节
    pub signing_secret: String,

    /// 用户登录 token 有效期（秒）
    pub user_duration_secs: u64,

    /// 服务器登录 token 有效期（秒）
    pub server_duration_secs: u64,

    /// 刷新后 token 有效期（秒）
    pub refresh_duration_secs: u64,

    /// 长期登录 token 有效期（秒）
    pub long_term_duration_secs: u64,

    /// 超过此有效期的用户 token 刷新时原样返回（秒）
    pub long_duration_threshold_secs: u64,

    /// 服务器名到服务器密钥的映射
    pub servers: HashMap<String, String>,

    /// 长期登录所需的密钥，未设置时禁用长期登录
    pub long_term_key: Option<String>,

    /// 是否要求 token 仍存在于 token 存储中（支持撤销）
    pub require_stored_token: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            user_duration_secs: seconds(DEFAULT_USER_DURATION),
            server_duration_secs: seconds(DEFAULT_SERVER_DURATION),
            refresh_duration_secs: seconds(DEFAULT_REFRESH_DURATION),
            long_term_duration_secs: seconds(DEFAULT_LONG_TERM_DURATION),
            long_duration_threshold_secs: seconds(LONG_DURATION_THRESHOLD),
            servers: HashMap::new(),
            long_term_key: None,
            require_stored_token: false,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut servers: Vec<&String> = self.servers.keys().collect();
        servers.sort();
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"<redacted>")
            .field("user_duration_secs", &self.user_duration_secs)
            .field("server_duration_secs", &self.server_duration_secs)
            .field("refresh_duration_secs", &self.refresh_duration_secs)
            .field("long_term_duration_secs", &self.long_term_duration_secs)
            .field(
                "long_duration_threshold_secs",
                &self.long_duration_threshold_secs,
            )
            .field("servers", &servers)
            .field("long_term_key", &self.long_term_key.as_ref().map(|_| "<redacted>"))
            .field("require_stored_token", &self.require_stored_token)
            .finish()
    }
}

impl AuthConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置签名密钥
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = secret.into();
        self
    }

    /// 设置用户 token 有效期
    pub fn with_user_duration(mut self, duration: Duration) -> Self {
        self.user_duration_secs = seconds(duration);
        self
    }

    /// 设置服务器 token 有效期
    pub fn with_server_duration(mut self, duration: Duration) -> Self {
        self.server_duration_secs = seconds(duration);
        self
    }

    /// 设置刷新后 token 有效期
    pub fn with_refresh_duration(mut self, duration: Duration) -> Self {
        self.refresh_duration_secs = seconds(duration);
        self
    }

    /// 设置长期 token 有效期
    pub fn with_long_term_duration(mut self, duration: Duration) -> Self {
        self.long_term_duration_secs = seconds(duration);
        self
    }

    /// 设置长期 token 阈值
    pub fn with_long_duration_threshold(mut self, threshold: Duration) -> Self {
        self.long_duration_threshold_secs = seconds(threshold);
        self
    }

    /// 添加一个服务器身份
    pub fn with_server(mut self, name: impl Into<String>, secret: impl Into<String>) -> Self {
        self.servers.insert(name.into(), secret.into());
        self
    }

    /// 设置长期登录密钥
    pub fn with_long_term_key(mut self, key: impl Into<String>) -> Self {
        self.long_term_key = Some(key.into());
        self
    }

    /// 设置是否要求 token 存在于存储中
    pub fn with_required_stored_token(mut self, enabled: bool) -> Self {
        self.require_stored_token = enabled;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.signing_secret.is_empty() {
            return Err(ConfigError::MissingRequired("signing_secret".into()).into());
        }
        if self.signing_secret.len() < MIN_SECRET_LENGTH {
            return Err(invalid(
                "signing_secret",
                format!("must be at least {} bytes", MIN_SECRET_LENGTH),
            ));
        }

        let durations = [
            ("user_duration_secs", self.user_duration_secs),
            ("server_duration_secs", self.server_duration_secs),
            ("refresh_duration_secs", self.refresh_duration_secs),
            ("long_term_duration_secs", self.long_term_duration_secs),
            (
                "long_duration_threshold_secs",
                self.long_duration_threshold_secs,
            ),
        ];
        for (key, secs) in durations {
            if secs == 0 {
                return Err(invalid(key, "must be positive".into()));
            }
            if secs > MAX_DURATION_SECS {
                return Err(invalid(
                    key,
                    format!("must not exceed {} seconds", MAX_DURATION_SECS),
                ));
            }
        }

        for (name, secret) in &self.servers {
            if name.is_empty() {
                return Err(invalid("servers", "server name cannot be empty".into()));
            }
            if secret.is_empty() {
                return Err(invalid(
                    "servers",
                    format!("secret for server '{}' cannot be empty", name),
                ));
            }
        }

        if self.long_term_key.as_deref() == Some("") {
            return Err(invalid("long_term_key", "cannot be empty".into()));
        }

        Ok(())
    }

    /// 由配置推导 session 策略
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy::new()
            .with_user_duration(duration(self.user_duration_secs))
            .with_server_duration(duration(self.server_duration_secs))
            .with_refresh_duration(duration(self.refresh_duration_secs))
            .with_long_term_duration(duration(self.long_term_duration_secs))
            .with_long_duration_threshold(duration(self.long_duration_threshold_secs))
    }

    /// 由配置构建静态服务器身份表
    pub fn server_identities(&self) -> StaticServerIdentities {
        StaticServerIdentities::from_map(self.servers.clone())
    }
}

fn invalid(key: &str, message: String) -> Error {
    Error::Config(ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    })
}

fn duration(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
