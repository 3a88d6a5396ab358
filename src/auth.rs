//! 认证模块
//!
//! 校验触发请求携带的 Bearer 共享密钥

use sha2::{Digest, Sha256};

/// 认证头部名称
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// 校验触发凭证
///
/// 只有在 `supplied` 与 `Bearer <configured_secret>` 完全一致时返回 true。
/// 未配置密钥（或密钥为空）时一律拒绝。比较在 SHA-256 摘要上进行，
/// 耗时不随第一个不同字节的位置变化。
///
/// # 参数
/// * `supplied` - 请求中的 Authorization 头部值
/// * `configured_secret` - 预先配置的共享密钥
pub fn authorize(supplied: Option<&str>, configured_secret: Option<&str>) -> bool {
    let secret = match configured_secret {
        Some(secret) if !secret.is_empty() => secret,
        _ => return false,
    };
    let supplied = match supplied {
        Some(value) => value,
        None => return false,
    };

    let expected = Sha256::digest(format!("Bearer {}", secret).as_bytes());
    let actual = Sha256::digest(supplied.as_bytes());

    expected
        .iter()
        .zip(actual.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
