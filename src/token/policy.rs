//! Session 策略模块
//!
//! 决定签发时的有效期与角色，以及刷新时是重新签发还是原样返回。
//!
//! ## 刷新规则
//!
//! - 用户 token 的总有效期超过 [`LONG_DURATION_THRESHOLD`] 时视为长期授权
//!   （例如“记住我”），刷新时原样返回，不会被无限延长
//! - 其他 token（包括所有服务器 token）刷新时以 `refresh_duration`
//!   重新签发，主体与角色保持不变
//!
//! ```rust
//! use authgate::token::{RenewDecision, SessionPolicy};
//!
//! let policy = SessionPolicy::default();
//!
//! let short = policy.user_token("u1");
//! assert!(matches!(policy.should_renew(&short), RenewDecision::Reissue(_)));
//!
//! let long = policy.long_term_user_token("u1");
//! assert_eq!(policy.should_renew(&long), RenewDecision::PassThrough);
//! ```

use chrono::Duration;

use crate::token::codec::TokenData;

/// 长期 token 的阈值（2 小时）
pub const LONG_DURATION_THRESHOLD: Duration = Duration::hours(2);

/// 默认用户 token 有效期（1 小时）
pub const DEFAULT_USER_DURATION: Duration = Duration::hours(1);

/// 默认服务器 token 有效期（1 小时）
pub const DEFAULT_SERVER_DURATION: Duration = Duration::hours(1);

/// 默认续期窗口（10000 秒，约 2.8 小时）
pub const DEFAULT_REFRESH_DURATION: Duration = Duration::seconds(10_000);

/// 默认长期 token 有效期（30 天）
pub const DEFAULT_LONG_TERM_DURATION: Duration = Duration::days(30);

/// 刷新决策
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewDecision {
    /// 原样返回现有 token
    PassThrough,
    /// 使用新的 token 数据重新签发
    Reissue(TokenData),
}

/// Session 策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// 用户登录签发的有效期
    pub user_duration: Duration,

    /// 服务器登录签发的有效期
    pub server_duration: Duration,

    /// 刷新时重新签发的有效期
    pub refresh_duration: Duration,

    /// 长期登录签发的有效期
    pub long_term_duration: Duration,

    /// 超过此有效期的用户 token 不再续期
    pub long_duration_threshold: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            user_duration: DEFAULT_USER_DURATION,
            server_duration: DEFAULT_SERVER_DURATION,
            refresh_duration: DEFAULT_REFRESH_DURATION,
            long_term_duration: DEFAULT_LONG_TERM_DURATION,
            long_duration_threshold: LONG_DURATION_THRESHOLD,
        }
    }
}

impl SessionPolicy {
    /// 创建默认策略
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置用户 token 有效期
    pub fn with_user_duration(mut self, duration: Duration) -> Self {
        self.user_duration = duration;
        self
    }

    /// 设置服务器 token 有效期
    pub fn with_server_duration(mut self, duration: Duration) -> Self {
        self.server_duration = duration;
        self
    }

    /// 设置续期窗口
    pub fn with_refresh_duration(mut self, duration: Duration) -> Self {
        self.refresh_duration = duration;
        self
    }

    /// 设置长期 token 有效期
    pub fn with_long_term_duration(mut self, duration: Duration) -> Self {
        self.long_term_duration = duration;
        self
    }

    /// 设置长期 token 阈值
    pub fn with_long_duration_threshold(mut self, threshold: Duration) -> Self {
        self.long_duration_threshold = threshold;
        self
    }

    /// 用户登录的 token 数据
    pub fn user_token(&self, user_id: impl Into<String>) -> TokenData {
        TokenData::user(user_id, seconds(self.user_duration))
    }

    /// 长期用户登录的 token 数据
    pub fn long_term_user_token(&self, user_id: impl Into<String>) -> TokenData {
        TokenData::user(user_id, seconds(self.long_term_duration))
    }

    /// 服务器登录的 token 数据
    pub fn server_token(&self, server_name: impl Into<String>) -> TokenData {
        TokenData::server(server_name, seconds(self.server_duration))
    }

    /// 决定已验证的 token 在刷新时的处理方式
    pub fn should_renew(&self, existing: &TokenData) -> RenewDecision {
        if !existing.is_server && existing.duration_seconds > seconds(self.long_duration_threshold)
        {
            return RenewDecision::PassThrough;
        }

        RenewDecision::Reissue(TokenData::new(
            existing.subject_id.clone(),
            existing.is_server,
            seconds(self.refresh_duration),
        ))
    }
}

// 负值按 0 处理，之后由编解码器拒绝
pub(crate) fn seconds(duration: Duration) -> u64 {
    u64::try_from(duration.num_seconds()).unwrap_or(0)
}
