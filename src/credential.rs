//! 登录凭据解析模块
//!
//! 从 `Authorization` 头中解码 HTTP Basic 风格的 `name:secret` 凭据。
//!
//! ```rust
//! use authgate::credential::{Credential, extract_credential};
//!
//! let header = Credential::new("alice", "correct-secret").to_authorization();
//! let credential = extract_credential(&header).unwrap();
//! assert_eq!(credential.name, "alice");
//!
//! // 缺失的认证头表示匿名，不是错误
//! assert!(extract_credential("").unwrap().is_empty());
//! ```

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use std::fmt;

use crate::error::{Result, ValidationError};

/// 默认的认证方案名
pub const BASIC_SCHEME: &str = "Basic";

const LENIENT: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// 登录凭据
///
/// 每次登录请求临时构造，不会被持久化。
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    /// 用户名
    pub name: String,
    /// 密钥
    pub secret: String,
}

impl Credential {
    /// 创建新的凭据
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }

    /// 用户名或密钥任一为空
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() || self.secret.is_empty()
    }

    /// 编码为 `Basic <base64(name:secret)>` 形式的认证头
    pub fn to_authorization(&self) -> String {
        let payload = format!("{}:{}", self.name, self.secret);
        format!("{} {}", BASIC_SCHEME, STANDARD_LENIENT.encode(payload))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// 从认证头中解析凭据
///
/// # 返回
///
/// - 认证头为空时返回空凭据，调用方应将其视为“未提供凭据”
/// - 否则解码 `<scheme> <base64(name:secret)>`，在第一个冒号处拆分
///
/// # 错误
///
/// 缺少方案或载荷、解码失败、非 UTF-8 或缺少冒号时返回
/// [`ValidationError::MalformedCredentials`]
pub fn extract_credential(header: &str) -> Result<Credential> {
    let header = header.trim();
    if header.is_empty() {
        return Ok(Credential::default());
    }

    let (scheme, payload) = header
        .split_once(char::is_whitespace)
        .ok_or_else(|| malformed("missing scheme or payload"))?;
    let payload = payload.trim();
    if scheme.is_empty() || payload.is_empty() {
        return Err(malformed("missing scheme or payload").into());
    }

    let decoded = STANDARD_LENIENT
        .decode(payload)
        .or_else(|_| URL_SAFE_LENIENT.decode(payload))
        .map_err(|_| malformed("payload is not valid base64"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed("payload is not UTF-8"))?;

    let (name, secret) = decoded
        .split_once(':')
        .ok_or_else(|| malformed("missing ':' separator"))?;

    Ok(Credential::new(name, secret))
}

fn malformed(msg: &str) -> ValidationError {
    ValidationError::MalformedCredentials(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};

    #[test]
    fn test_empty_header() {
        let credential = extract_credential("").unwrap();
        assert_eq!(credential, Credential::default());
        assert!(credential.is_empty());

        assert!(extract_credential("   ").unwrap().is_empty());
    }

    #[test]
    fn test_basic_header() {
        let header = format!("Basic {}", STANDARD.encode("alice:correct-secret"));
        let credential = extract_credential(&header).unwrap();

        assert_eq!(credential.name, "alice");
        assert_eq!(credential.secret, "correct-secret");
        assert!(!credential.is_empty());
    }

    #[test]
    fn test_splits_on_first_colon() {
        let header = format!("Basic {}", STANDARD.encode("alice:pa:ss:word"));
        let credential = extract_credential(&header).unwrap();

        assert_eq!(credential.name, "alice");
        assert_eq!(credential.secret, "pa:ss:word");
    }

    #[test]
    fn test_url_safe_and_unpadded_payloads() {
        // "??>" 在标准字母表中会编码出 '/'，URL 安全字母表中为 '_'
        let raw = "bob:??>";
        assert!(URL_SAFE.encode(raw).contains('_'));

        let url_safe = format!("Basic {}", URL_SAFE.encode(raw));
        assert_eq!(extract_credential(&url_safe).unwrap().secret, "??>");

        let unpadded = format!("Basic {}", URL_SAFE_NO_PAD.encode("bob:pw"));
        assert_eq!(extract_credential(&unpadded).unwrap().name, "bob");
    }

    #[test]
    fn test_empty_fields_are_not_errors() {
        let header = format!("Basic {}", STANDARD.encode(":secret"));
        let credential = extract_credential(&header).unwrap();

        assert!(credential.name.is_empty());
        assert!(credential.is_empty());
    }

    #[test]
    fn test_malformed_headers() {
        let cases = [
            "Basic".to_string(),
            "Basic    ".to_string(),
            "Basic %%%not-base64%%%".to_string(),
            format!("Basic {}", STANDARD.encode("no-colon-here")),
            format!("Basic {}", STANDARD.encode([0xff, 0xfe, b':', 0x00])),
        ];

        for header in cases {
            let result = extract_credential(&header);
            assert!(
                matches!(
                    result,
                    Err(Error::BadRequest(ValidationError::MalformedCredentials(_)))
                ),
                "header {:?} should be malformed",
                header
            );
        }
    }

    #[test]
    fn test_to_authorization_roundtrip() {
        let credential = Credential::new("alice", "s3cr:et");
        let header = credential.to_authorization();

        assert!(header.starts_with("Basic "));
        assert_eq!(extract_credential(&header).unwrap(), credential);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", Credential::new("alice", "hunter2"));
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
