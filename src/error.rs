//! 错误类型
//!
//! 提供 authgate 中所有操作的错误类型定义，以及错误到对外状态类别的映射。
//!
//! 认证相关的失败（凭据不匹配、签名无效、过期、角色不足）一律折叠为
//! [`Error::Unauthorized`]，不向调用方透露具体是哪一项检查失败；
//! 存储协作方的失败则保持为独立的 [`Error::Storage`]。

use std::fmt;

/// authgate 的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// authgate 的错误类型
#[derive(Debug)]
pub enum Error {
    /// 请求输入缺失或格式错误
    BadRequest(ValidationError),

    /// 认证失败
    Unauthorized,

    /// 存储错误
    Storage(StorageError),

    /// Token 相关错误
    Token(TokenError),

    /// 配置错误
    Config(ConfigError),

    /// 加密错误
    Crypto(CryptoError),

    /// 内部错误
    Internal(String),
}

impl Error {
    /// 创建一个内部错误
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// 创建一个请求错误
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(ValidationError::Custom(msg.into()))
    }

    /// 创建一个存储操作错误
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(StorageError::OperationFailed(msg.into()))
    }

    /// 对外状态类别
    pub fn status_class(&self) -> StatusClass {
        match self {
            Error::BadRequest(_) => StatusClass::BadRequest,
            Error::Unauthorized => StatusClass::Unauthorized,
            Error::Storage(_) => StatusClass::StoreError,
            Error::Token(_) | Error::Config(_) | Error::Crypto(_) | Error::Internal(_) => {
                StatusClass::Internal
            }
        }
    }

    /// 调用方是否可以重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// 是否为认证失败
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

/// 对外状态类别
///
/// 与传输层无关，每个操作的失败最终都会折叠为其中之一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 输入缺失或格式错误
    BadRequest,
    /// 认证或授权失败
    Unauthorized,
    /// 存储协作方失败
    StoreError,
    /// 不应发生的内部错误
    Internal,
}

impl StatusClass {
    /// 对应的 HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::Unauthorized => 401,
            StatusClass::StoreError => 503,
            StatusClass::Internal => 500,
        }
    }
}

/// 请求验证相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 字段为空
    EmptyField(String),
    /// 认证头无法解码
    MalformedCredentials(String),
    /// 请求体无法解析
    MalformedBody(String),
    /// 自定义验证错误
    Custom(String),
}

/// Token 相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token 编码失败
    EncodingFailed(String),
    /// 无效的 claim 值
    InvalidClaim(String),
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 缺少必需的配置
    MissingRequired(String),
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 存储相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// 连接失败
    ConnectionFailed(String),
    /// 记录未找到
    NotFound(String),
    /// 记录已存在
    AlreadyExists(String),
    /// 操作失败
    OperationFailed(String),
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadRequest(e) => write!(f, "bad request: {}", e),
            Error::Unauthorized => write!(f, "unauthorized"),
            Error::Storage(e) => write!(f, "store error: {}", e),
            Error::Token(e) => write!(f, "token error: {}", e),
            Error::Config(e) => write!(f, "invalid config: {}", e),
            Error::Crypto(e) => write!(f, "crypto failure: {}", e),
            Error::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is required", field),
            ValidationError::MalformedCredentials(msg) => {
                write!(f, "malformed credentials: {}", msg)
            }
            ValidationError::MalformedBody(msg) => write!(f, "malformed request body: {}", msg),
            ValidationError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::EncodingFailed(msg) => write!(f, "cannot encode claims: {}", msg),
            TokenError::InvalidClaim(msg) => write!(f, "bad claim: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(key) => {
                write!(f, "{} must be set", key)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "{} {}", key, message)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed(msg) => write!(f, "store unreachable: {}", msg),
            StorageError::NotFound(item) => write!(f, "no such record: {}", item),
            StorageError::AlreadyExists(item) => write!(f, "duplicate record: {}", item),
            StorageError::OperationFailed(msg) => write!(f, "store operation failed: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "os random source failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "unusable signing key: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::BadRequest(e) => Some(e),
            Error::Storage(e) => Some(e),
            Error::Token(e) => Some(e),
            Error::Config(e) => Some(e),
            Error::Crypto(e) => Some(e),
            Error::Unauthorized | Error::Internal(_) => None,
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for TokenError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现
// ============================================================================

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::BadRequest(err)
    }
}

impl From<TokenError> for Error {
    fn from(err: TokenError) -> Self {
        Error::Token(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}
