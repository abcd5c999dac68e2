use std::sync::Arc;

use uuid::Uuid;

use crate::cache::keys::Key;
use crate::cache::models::rate_limit::{AdmissionDecision, FailurePolicy, RateLimit};
use crate::clock::Clock;
use crate::store::{AtomicCounterStore, WindowEntry};

/// 滑动窗口限流（sliding-window log）
///
/// 每个键对应存储里的一个有序集合，成员是请求时间戳。一次检查在单个事务里
/// 完成清理、写入、刷新过期时间和计数，并发调用方之间不会出现先读后写的竞争。
/// 被拒绝的请求同样会写入窗口。限流器自身不保存可变状态。
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn AtomicCounterStore>,
    clock: Arc<dyn Clock>,
    failure_policy: FailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn AtomicCounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            failure_policy: FailurePolicy::Open,
        }
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// 对 `key` 做一次准入检查
    pub async fn admit(&self, key: &Key, limit: &RateLimit) -> AdmissionDecision {
        let now = self.clock.now();
        let reset_at = now + limit.period_secs();
        let member = format!("{}-{}", now, Uuid::new_v4());
        let entry = WindowEntry {
            now,
            window_start: now - limit.period_secs(),
            member: &member,
            ttl: limit.period(),
        };

        match self.store.record_in_window(key.as_str(), entry).await {
            Ok(count) => {
                let max = u64::from(limit.limit());
                let decision = AdmissionDecision {
                    admitted: count <= max,
                    limit: limit.limit(),
                    remaining: max.saturating_sub(count) as u32,
                    reset_at,
                };
                tracing::debug!(
                    key = %key,
                    count,
                    admitted = decision.admitted,
                    remaining = decision.remaining,
                    "Rate limit checked"
                );
                decision
            }
            Err(e) => {
                tracing::error!(
                    key = %key,
                    op = "record_in_window",
                    error = %e,
                    policy = ?self.failure_policy,
                    "Rate limit store unavailable"
                );
                match self.failure_policy {
                    FailurePolicy::Open => AdmissionDecision::unchecked(),
                    FailurePolicy::Closed => AdmissionDecision {
                        admitted: false,
                        limit: limit.limit(),
                        remaining: 0,
                        reset_at,
                    },
                }
            }
        }
    }
}
