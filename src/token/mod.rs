//! Token 模块
//!
//! 提供 Session Token 的签名编解码与续期策略。
//!
//! ## 子模块
//!
//! - **codec**: Token 的创建、签名、解析与验证
//! - **policy**: 有效期、角色与刷新决策
//!
//! ## 示例
//!
//! ```rust
//! use authgate::token::{RenewDecision, SessionPolicy, TokenCodec};
//!
//! let codec = TokenCodec::new(b"my-secret-key-at-least-32-bytes!");
//! let policy = SessionPolicy::default();
//!
//! let token = codec.create(policy.user_token("u1")).unwrap();
//! assert!(codec.verify(&token));
//!
//! // 刷新：短期用户 token 会重新签发
//! if let RenewDecision::Reissue(data) = policy.should_renew(&token.data) {
//!     let renewed = codec.create(data).unwrap();
//!     assert!(renewed.expires_at > token.expires_at);
//! }
//! ```

pub mod codec;
pub mod policy;

pub use codec::{SessionToken, TokenCodec, TokenData};
pub use policy::{
    DEFAULT_LONG_TERM_DURATION, DEFAULT_REFRESH_DURATION, DEFAULT_SERVER_DURATION,
    DEFAULT_USER_DURATION, LONG_DURATION_THRESHOLD, RenewDecision, SessionPolicy,
};
