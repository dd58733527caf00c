//! # AuthGate
//!
//! 一个面向后端服务的无状态 Session 认证库。
//!
//! ## 功能特性
//!
//! - **用户登录**: 从 `Basic` 认证头解析凭据，校验后签发 Session Token
//! - **服务器登录**: 受信任的后端服务以服务器名与独立密钥换取服务器角色 token
//! - **Session 刷新**: 短期 token 以续期窗口重新签发，长期 token 原样返回
//! - **授权检查**: 验证签名与过期时间，可要求服务器角色
//! - **登出与撤销**: 可选地要求 token 仍存在于 token 存储中
//! - **用户资料**: 创建用户，凭 token 查询与更新用户资料
//! - **可插拔存储**: 通过 [`UserStore`] / [`TokenStore`] trait 接入任意后端
//!
//! Token 格式为 `base64url(JSON 声明) "." base64url(HMAC-SHA256)`，
//! 验证只依赖签名密钥，服务实例之间无需共享 session 状态。
//!
//! ## 登录示例
//!
//! ```rust
//! use authgate::{AuthConfig, AuthService, Credential, InMemoryTokenStore, InMemoryUserStore, User};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let users = Arc::new(InMemoryUserStore::with_users([
//!     User::new("u1", "alice", "correct-secret"),
//! ]));
//! let config = AuthConfig::new()
//!     .with_signing_secret("my-secret-key-at-least-32-bytes!")
//!     .with_server("uploader", "uploader-secret");
//! let service = AuthService::new(config, users, Arc::new(InMemoryTokenStore::new())).unwrap();
//!
//! // 用户登录
//! let header = Credential::new("alice", "correct-secret").to_authorization();
//! let login = service.login(&header).await.unwrap();
//!
//! // 刷新：1 小时的用户 token 会被重新签发
//! let refreshed = service.refresh_session(&login.token.token).await.unwrap();
//! assert!(refreshed.is_reissued());
//!
//! // 服务器登录后可以访问要求服务器角色的接口
//! let server = service.server_login("uploader", "uploader-secret").await.unwrap();
//! assert!(service.authorize(&server.token, true).await.is_ok());
//! assert!(service.authorize(&login.token.token, true).await.is_err());
//! # });
//! ```
//!
//! ## Token 示例
//!
//! ```rust
//! use authgate::token::{TokenCodec, TokenData};
//!
//! let codec = TokenCodec::new(b"my-secret-key-at-least-32-bytes!");
//! let token = codec.create(TokenData::user("u1", 3600)).unwrap();
//!
//! let parsed = codec.parse_and_verify(&token.token).unwrap();
//! assert_eq!(parsed.subject_id(), "u1");
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod identity;
pub mod random;
pub mod service;
pub mod store;
pub mod token;

/// 传输层使用的请求头名称
///
/// 本库不处理 HTTP，嵌入方按这些名称读取请求头后调用 [`AuthService`]。
pub mod headers {
    /// 携带 Session Token 的请求头
    pub const SESSION_TOKEN: &str = "x-session-token";

    /// 服务器登录时携带服务器名的请求头
    pub const SERVER_NAME: &str = "x-server-name";

    /// 服务器登录时携带服务器密钥的请求头
    pub const SERVER_SECRET: &str = "x-server-secret";

    /// 用户登录时携带 `Basic` 凭据的请求头
    pub const AUTHORIZATION: &str = "authorization";
}

pub use error::{Error, Result, StatusClass};

// ============================================================================
// 服务与配置导出
// ============================================================================

pub use config::AuthConfig;
pub use service::{
    AuthService, LoginRequest, LoginResponse, Refreshed, ServerLoginRequest, UserDetail,
};

// ============================================================================
// 凭据与身份导出
// ============================================================================

pub use credential::{Credential, extract_credential};
pub use identity::{
    ConstantTimeSecretVerifier, SecretVerifier, ServerIdentityProvider, StaticServerIdentities,
};

// ============================================================================
// 存储导出
// ============================================================================

pub use store::{InMemoryTokenStore, InMemoryUserStore, TokenStore, User, UserQuery, UserStore};

// ============================================================================
// Token 相关导出
// ============================================================================

pub use token::{RenewDecision, SessionPolicy, SessionToken, TokenCodec, TokenData};

// ============================================================================
// 随机数生成函数导出
// ============================================================================

pub use random::{
    constant_time_compare, constant_time_compare_str, generate_random_bytes, generate_random_hex,
};
