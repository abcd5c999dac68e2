use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// 限流阈值：周期内最多允许 `limit` 次请求
///
/// 运行时只能通过 [`RateLimit::new`] 构造，非正的 limit/period 在启动时就被拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    limit: u32,
    period: Duration,
}

impl RateLimit {
    pub fn new(limit: u32, period: Duration) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::NonPositive { field: "limit" });
        }
        if period.as_secs() == 0 {
            return Err(ConfigError::NonPositive { field: "period" });
        }
        Ok(Self { limit, period })
    }

    /// 编译期常量用的构造，零值会在编译时报错
    pub(crate) const fn fixed(limit: u32, period_secs: u64) -> Self {
        assert!(limit > 0 && period_secs > 0);
        Self {
            limit,
            period: Duration::from_secs(period_secs),
        }
    }

    pub fn per_secs(limit: u32, period_secs: u64) -> Result<Self, ConfigError> {
        Self::new(limit, Duration::from_secs(period_secs))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn period_secs(&self) -> i64 {
        self.period.as_secs() as i64
    }
}

/// 存储不可用时的放行策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 放行
    #[default]
    Open,
    /// 拒绝
    Closed,
}

/// 一次准入检查的结果，不持久化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64, // Unix timestamp
}

impl AdmissionDecision {
    /// 未经过存储判定直接放行（限流关闭或存储故障时 fail open）
    pub fn unchecked() -> Self {
        Self {
            admitted: true,
            limit: 0,
            remaining: 0,
            reset_at: 0,
        }
    }

    /// 是否带有可用的窗口信息
    pub fn is_metered(&self) -> bool {
        self.limit > 0
    }

    /// 距离窗口重置的秒数，不小于 0
    pub fn retry_after(&self, now: i64) -> i64 {
        (self.reset_at - now).max(0)
    }

    /// 响应元数据；未计量的决定不产生任何头
    pub fn headers(&self, now: i64) -> HashMap<&'static str, String> {
        let mut headers = HashMap::new();
        if !self.is_metered() {
            return headers;
        }
        headers.insert(HEADER_LIMIT, self.limit.to_string());
        headers.insert(HEADER_REMAINING, self.remaining.to_string());
        headers.insert(HEADER_RESET, self.reset_at.to_string());
        if !self.admitted {
            headers.insert(HEADER_RETRY_AFTER, self.retry_after(now).to_string());
        }
        headers
    }
}
