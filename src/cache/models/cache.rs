use std::time::Duration;

use crate::error::ConfigError;

/// 缓存过期时间，构造时保证为正
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl(Duration);

impl CacheTtl {
    pub fn new(ttl: Duration) -> Result<Self, ConfigError> {
        if ttl.as_secs() == 0 {
            return Err(ConfigError::NonPositive { field: "ttl" });
        }
        Ok(Self(ttl))
    }

    pub fn from_secs(secs: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}
