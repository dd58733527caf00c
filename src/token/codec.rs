//! Session Token 编解码模块
//!
//! 负责 Session Token 的创建、签名、解析与验证。
//!
//! ## Token 格式
//!
//! Token 由两部分组成，使用 `.` 分隔：
//! - 规范化载荷（JSON，base64url 编码，无填充）
//! - 载荷的 HMAC-SHA256 签名（base64url 编码，无填充）
//!
//! 载荷字段顺序固定为 `sub`、`srv`、`dur`、`jti`、`iat`、`exp`，
//! 签名同时绑定 token 数据与过期时间，修改任意字段都会使验证失败。
//!
//! ## 示例
//!
//! ```rust
//! use authgate::token::{TokenCodec, TokenData};
//!
//! let codec = TokenCodec::new(b"my-secret-key-at-least-32-bytes!");
//! let token = codec.create(TokenData::user("u1", 3600)).unwrap();
//!
//! // 传输后重新解析，再单独验证
//! let parsed = TokenCodec::parse(&token.token).unwrap();
//! assert!(codec.verify(&parsed));
//! assert_eq!(parsed.data.subject_id, "u1");
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

use crate::error::{CryptoError, Error, Result, TokenError};
use crate::random::{constant_time_compare, generate_random_hex};

type HmacSha256 = Hmac<Sha256>;

/// Token ID 的随机字节数
const TOKEN_ID_BYTES: usize = 16;

/// Token 携带的语义声明
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenData {
    /// 主体：用户 ID，或服务器声明的名称
    pub subject_id: String,

    /// 是否为受信任的后端服务器身份
    pub is_server: bool,

    /// 有效期（秒），必须大于 0
    pub duration_seconds: u64,
}

impl TokenData {
    /// 创建新的 token 数据
    pub fn new(subject_id: impl Into<String>, is_server: bool, duration_seconds: u64) -> Self {
        Self {
            subject_id: subject_id.into(),
            is_server,
            duration_seconds,
        }
    }

    /// 用户 token 数据
    pub fn user(user_id: impl Into<String>, duration_seconds: u64) -> Self {
        Self::new(user_id, false, duration_seconds)
    }

    /// 服务器 token 数据
    pub fn server(server_name: impl Into<String>, duration_seconds: u64) -> Self {
        Self::new(server_name, true, duration_seconds)
    }

    fn duration(&self) -> Result<Duration> {
        if self.duration_seconds == 0 {
            return Err(Error::Token(TokenError::InvalidClaim(
                "duration must be positive".into(),
            )));
        }

        i64::try_from(self.duration_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                Error::Token(TokenError::InvalidClaim("duration out of range".into()))
            })
    }
}

/// 已签名的 Session Token
///
/// 由 [`TokenCodec::create`] 创建或由 [`TokenCodec::parse`] 解析得到，
/// 创建后不应修改。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// 可传输的不透明 token 字符串
    pub token: String,

    /// Token 数据
    pub data: TokenData,

    /// Token ID（随机，用于日志与区分同一秒内签发的 token）
    pub token_id: String,

    /// 签发时间
    pub issued_at: DateTime<Utc>,

    /// 过期时间（签发时间 + 有效期）
    pub expires_at: DateTime<Utc>,

    /// 载荷签名
    pub signature: Vec<u8>,
}

impl SessionToken {
    /// 检查 token 是否已过期
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// 检查 token 在指定时间是否已过期
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// 获取剩余有效时间（秒）
    pub fn time_to_live(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }

    /// Token 的主体
    pub fn subject_id(&self) -> &str {
        &self.data.subject_id
    }

    /// 是否为服务器 token
    pub fn is_server(&self) -> bool {
        self.data.is_server
    }
}

// token 字符串本身就是凭据，调试输出中不打印
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token_id", &self.token_id)
            .field("data", &self.data)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// 规范化载荷
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Claims {
    sub: String,
    srv: bool,
    dur: u64,
    jti: String,
    iat: i64,
    exp: i64,
}

impl Claims {
    fn from_token(token: &SessionToken) -> Self {
        Self::new(
            &token.data,
            &token.token_id,
            token.issued_at,
            token.expires_at,
        )
    }

    fn new(
        data: &TokenData,
        token_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: data.subject_id.clone(),
            srv: data.is_server,
            dur: data.duration_seconds,
            jti: token_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            Error::Token(TokenError::EncodingFailed(format!(
                "failed to serialize token payload: {}",
                e
            )))
        })
    }

    /// 转换为 token，拒绝时间戳和有效期不一致的载荷
    fn into_token(self, token: String, signature: Vec<u8>) -> Option<SessionToken> {
        if self.dur == 0 {
            return None;
        }
        let issued_at = DateTime::from_timestamp(self.iat, 0)?;
        let expires_at = DateTime::from_timestamp(self.exp, 0)?;
        let dur = i64::try_from(self.dur).ok()?;
        if self.exp.checked_sub(self.iat)? != dur {
            return None;
        }

        Some(SessionToken {
            token,
            data: TokenData {
                subject_id: self.sub,
                is_server: self.srv,
                duration_seconds: self.dur,
            },
            token_id: self.jti,
            issued_at,
            expires_at,
            signature,
        })
    }
}

/// Session Token 编解码器
///
/// 持有共享签名密钥，无可变状态，可在任意多个任务间并发使用。
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// 使用签名密钥创建编解码器
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// 创建并签名新的 token
    ///
    /// # 错误
    ///
    /// 有效期为 0 或超出范围时返回 [`TokenError::InvalidClaim`]
    pub fn create(&self, data: TokenData) -> Result<SessionToken> {
        self.create_at(data, Utc::now())
    }

    /// 以指定时间为签发时间创建 token
    pub fn create_at(&self, data: TokenData, now: DateTime<Utc>) -> Result<SessionToken> {
        let duration = data.duration()?;

        // 载荷只保留秒级精度，签发时间同样截断到秒
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0)
            .ok_or_else(|| Error::internal("issue time out of range"))?;
        let expires_at = issued_at.checked_add_signed(duration).ok_or_else(|| {
            Error::Token(TokenError::InvalidClaim("expiry out of range".into()))
        })?;

        let token_id = generate_random_hex(TOKEN_ID_BYTES)?;
        let payload = Claims::new(&data, &token_id, issued_at, expires_at).to_bytes()?;
        let signature = self.sign(&payload)?;

        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(&signature)
        );

        Ok(SessionToken {
            token,
            data,
            token_id,
            issued_at,
            expires_at,
            signature,
        })
    }

    /// 解析传输形式的 token，不验证签名
    ///
    /// 空输入或格式错误时返回 `None`，调用方必须另行调用 [`verify`](Self::verify)。
    pub fn parse(value: &str) -> Option<SessionToken> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }

        let (payload_b64, signature_b64) = value.split_once('.')?;
        if signature_b64.contains('.') {
            return None;
        }

        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
        let claims: Claims = serde_json::from_slice(&payload).ok()?;

        // 只接受规范编码，签名覆盖的字节与传输的字节必须一致
        if serde_json::to_vec(&claims).ok()? != payload {
            return None;
        }

        claims.into_token(value.to_string(), signature)
    }

    /// 验证 token 的签名与有效期
    ///
    /// 签名不匹配、编码失败或已过期时返回 `false`，从不返回错误。
    pub fn verify(&self, token: &SessionToken) -> bool {
        self.verify_at(token, Utc::now())
    }

    /// 以指定时间验证 token
    pub fn verify_at(&self, token: &SessionToken, now: DateTime<Utc>) -> bool {
        let payload = match Claims::from_token(token).to_bytes() {
            Ok(payload) => payload,
            Err(_) => return false,
        };
        let expected = match self.sign(&payload) {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        if !constant_time_compare(&expected, &token.signature) {
            tracing::debug!(token_id = %token.token_id, "token signature mismatch");
            return false;
        }

        if token.is_expired_at(now) {
            tracing::debug!(token_id = %token.token_id, "token expired");
            return false;
        }

        true
    }

    /// 解析并验证 token
    pub fn parse_and_verify(&self, value: &str) -> Option<SessionToken> {
        let token = Self::parse(value)?;
        self.verify(&token).then_some(token)
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
