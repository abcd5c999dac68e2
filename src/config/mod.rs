use std::env;
use std::time::Duration;

use crate::cache::models::{CacheTtl, FailurePolicy, RateLimit};
use crate::error::ConfigError;
use crate::gate::{CallSiteClass, ClassLimits};

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub redis_connect_timeout_ms: u64,
    pub redis_operation_timeout_ms: u64,
    pub cache_key_prefix: String,
    pub cache_default_ttl: CacheTtl,
    pub rate_limit_enabled: bool,
    pub rate_limit_failure_policy: FailurePolicy,
    pub rate_limits: ClassLimits,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意键值来源解析配置，`from_env` 的纯函数版本
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let mut rate_limits = ClassLimits::default();
        for class in CallSiteClass::ALL {
            let name = format!("RATE_LIMIT_{}", class.as_str().to_ascii_uppercase());
            if let Some(raw) = lookup(&name) {
                rate_limits.set(class, parse_rate_limit(&name, &raw)?);
            }
        }

        let fail_open = parse_bool("RATE_LIMIT_FAIL_OPEN", &var("RATE_LIMIT_FAIL_OPEN", "true"))?;

        Ok(Config {
            redis_url: lookup("REDIS_URL").ok_or_else(|| ConfigError::Missing("REDIS_URL".into()))?,
            server_host: var("SERVER_HOST", "0.0.0.0"),
            server_port: parse_num("SERVER_PORT", &var("SERVER_PORT", "3000"))?,
            api_base_uri: var("API_BASE_URI", "/api/v1"),
            redis_connect_timeout_ms: parse_positive(
                "REDIS_CONNECT_TIMEOUT_MS",
                &var("REDIS_CONNECT_TIMEOUT_MS", "5000"),
            )?,
            redis_operation_timeout_ms: parse_positive(
                "REDIS_OPERATION_TIMEOUT_MS",
                &var("REDIS_OPERATION_TIMEOUT_MS", "5000"),
            )?,
            cache_key_prefix: var("CACHE_KEY_PREFIX", "bizfindr_"),
            cache_default_ttl: CacheTtl::from_secs(parse_num(
                "CACHE_DEFAULT_TTL",
                &var("CACHE_DEFAULT_TTL", "300"),
            )?)?,
            rate_limit_enabled: parse_bool("RATE_LIMIT_ENABLED", &var("RATE_LIMIT_ENABLED", "true"))?,
            rate_limit_failure_policy: if fail_open {
                FailurePolicy::Open
            } else {
                FailurePolicy::Closed
            },
            rate_limits,
        })
    }

    pub fn redis_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_connect_timeout_ms)
    }

    pub fn redis_operation_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_operation_timeout_ms)
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn parse_positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match parse_num::<u64>(name, value)? {
        0 => Err(ConfigError::NonPositive { field: name }),
        n => Ok(n),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

/// `limit/period_secs`，例如 `10/60`
fn parse_rate_limit(name: &str, value: &str) -> Result<RateLimit, ConfigError> {
    let (limit, period) = value.split_once('/').ok_or_else(|| invalid(name, value))?;
    RateLimit::per_secs(parse_num(name, limit)?, parse_num(name, period)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("REDIS_URL", "redis://localhost:6379/0")])).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.api_base_uri, "/api/v1");
        assert_eq!(config.cache_key_prefix, "bizfindr_");
        assert_eq!(config.cache_default_ttl, CacheTtl::from_secs(300).unwrap());
        assert!(config.rate_limit_enabled);
        assert_eq!(config.rate_limit_failure_policy, FailurePolicy::Open);
        assert_eq!(config.rate_limits, ClassLimits::default());
        assert_eq!(config.redis_connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_redis_url() {
        assert_eq!(
            Config::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("REDIS_URL".into())
        );
    }

    #[test]
    fn test_class_limits_and_toggles() {
        let config = Config::from_lookup(lookup(&[
            ("REDIS_URL", "redis://r:6379/1"),
            ("RATE_LIMIT_AUTH", "5/30"),
            ("RATE_LIMIT_SEARCH", " 20 / 60 "),
            ("RATE_LIMIT_FAIL_OPEN", "false"),
            ("RATE_LIMIT_ENABLED", "0"),
        ]))
        .unwrap();
        assert_eq!(config.rate_limits.auth, RateLimit::per_secs(5, 30).unwrap());
        assert_eq!(config.rate_limits.search, RateLimit::per_secs(20, 60).unwrap());
        assert_eq!(config.rate_limits.api.limit(), 100);
        assert_eq!(config.rate_limit_failure_policy, FailurePolicy::Closed);
        assert!(!config.rate_limit_enabled);
    }

    #[test]
    fn test_non_positive_values_are_rejected() {
        let base = [("REDIS_URL", "redis://r")];
        let with = |extra: (&'static str, &'static str)| {
            let mut vars = base.to_vec();
            vars.push(extra);
            Config::from_lookup(lookup(&vars)).unwrap_err()
        };

        assert_eq!(
            with(("RATE_LIMIT_API", "0/60")),
            ConfigError::NonPositive { field: "limit" }
        );
        assert_eq!(
            with(("RATE_LIMIT_API", "10/0")),
            ConfigError::NonPositive { field: "period" }
        );
        assert_eq!(
            with(("CACHE_DEFAULT_TTL", "0")),
            ConfigError::NonPositive { field: "ttl" }
        );
        assert_eq!(
            with(("REDIS_CONNECT_TIMEOUT_MS", "0")),
            ConfigError::NonPositive { field: "REDIS_CONNECT_TIMEOUT_MS" }
        );
        assert!(matches!(
            with(("RATE_LIMIT_PUBLIC", "lots")),
            ConfigError::Invalid { .. }
        ));
    }
}
