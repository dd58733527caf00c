//! 随机数与常量时间比较
//!
//! Token ID 来自操作系统的 CSPRNG；密钥与签名一律用 [`subtle`] 比较，
//! 耗时不随第一个不同字节的位置变化。

use rand::{TryRngCore, rngs::OsRng};
use std::fmt::Write;
use subtle::ConstantTimeEq;

use crate::error::{CryptoError, Result};

/// 从 OS 随机源读取 `length` 个字节
///
/// ```rust
/// let nonce = authgate::random::generate_random_bytes(16).unwrap();
/// assert_eq!(nonce.len(), 16);
/// ```
pub fn generate_random_bytes(length: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CryptoError::RngFailed(e.to_string()))?;
    Ok(buf)
}

/// 生成 `byte_length` 字节随机数的小写十六进制表示
pub fn generate_random_hex(byte_length: usize) -> Result<String> {
    Ok(to_hex(&generate_random_bytes(byte_length)?))
}

/// 常量时间比较字节切片，长度不同直接视为不等
///
/// ```rust
/// use authgate::random::constant_time_compare;
///
/// let signature = [7u8; 32];
/// assert!(constant_time_compare(&signature, &[7u8; 32]));
/// assert!(!constant_time_compare(&signature, &[7u8; 31]));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    bool::from(a.ct_eq(b))
}

/// [`constant_time_compare`] 的字符串版本
pub fn constant_time_compare_str(a: &str, b: &str) -> bool {
    constant_time_compare(a.as_bytes(), b.as_bytes())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
}
