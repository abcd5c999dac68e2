use super::Key;

/// 限流窗口键的命名空间
pub const RATE_LIMIT_NAMESPACE: &str = "rate_limit";

/// 生成限流窗口键：命名空间 + 调用方身份 + 动作
pub fn rate_limit_key(subject: &str, action: &str) -> Key {
    Key::builder(RATE_LIMIT_NAMESPACE)
        .part(subject)
        .part(action)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key_layout() {
        let key = rate_limit_key("10.0.0.1", "search");
        assert_eq!(key.as_str(), "rate_limit:10.0.0.1:search");
    }

    #[test]
    fn test_ipv6_subject_is_escaped() {
        let key = rate_limit_key("::1", "api");
        assert_eq!(key.as_str(), "rate_limit:\\:\\:1:api");
        assert_ne!(key, rate_limit_key(":", ":1:api"));
    }
}
