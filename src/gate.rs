//! 调用点策略
//!
//! 只有这里知道当前服务的是哪个调用点：先按调用点查出 `{limit, period}` 和缓存 TTL，
//! 先做准入再查缓存，被拒绝的调用不会碰到缓存，也不会执行计算。

use std::collections::HashMap;
use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use crate::cache::keys::{Key, rate_limit_key};
use crate::cache::models::{AdmissionDecision, CacheTtl, RateLimit};
use crate::cache::operations::{CacheAside, RateLimiter};
use crate::error::GateError;

/// 调用点类别，每类有自己的限额
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallSiteClass {
    Auth,
    Api,
    Search,
    Public,
}

impl CallSiteClass {
    pub const ALL: [CallSiteClass; 4] = [
        CallSiteClass::Auth,
        CallSiteClass::Api,
        CallSiteClass::Search,
        CallSiteClass::Public,
    ];

    /// 按端点名或路径归类：`auth` 优先于 `search`，`search` 优先于 `api`，其余为公开
    pub fn classify(endpoint: &str) -> Self {
        let endpoint = endpoint.to_ascii_lowercase();
        if endpoint.contains("auth") {
            CallSiteClass::Auth
        } else if endpoint.contains("search") {
            CallSiteClass::Search
        } else if endpoint.contains("api") {
            CallSiteClass::Api
        } else {
            CallSiteClass::Public
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallSiteClass::Auth => "auth",
            CallSiteClass::Api => "api",
            CallSiteClass::Search => "search",
            CallSiteClass::Public => "public",
        }
    }
}

/// 各类别的限额
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLimits {
    pub auth: RateLimit,
    pub api: RateLimit,
    pub search: RateLimit,
    pub public: RateLimit,
}

impl Default for ClassLimits {
    fn default() -> Self {
        Self {
            auth: RateLimit::fixed(10, 60),
            api: RateLimit::fixed(100, 60),
            search: RateLimit::fixed(30, 60),
            public: RateLimit::fixed(60, 60),
        }
    }
}

impl ClassLimits {
    pub fn get(&self, class: CallSiteClass) -> RateLimit {
        match class {
            CallSiteClass::Auth => self.auth,
            CallSiteClass::Api => self.api,
            CallSiteClass::Search => self.search,
            CallSiteClass::Public => self.public,
        }
    }

    pub fn set(&mut self, class: CallSiteClass, limit: RateLimit) {
        match class {
            CallSiteClass::Auth => self.auth = limit,
            CallSiteClass::Api => self.api = limit,
            CallSiteClass::Search => self.search = limit,
            CallSiteClass::Public => self.public = limit,
        }
    }
}

/// 单个调用点的策略，`ttl` 为 `None` 时结果不缓存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSitePolicy {
    pub limit: RateLimit,
    pub ttl: Option<CacheTtl>,
}

/// 被放行的调用结果，附带放行它的准入决策
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted<T> {
    pub value: T,
    pub decision: AdmissionDecision,
}

pub struct Gate {
    limiter: RateLimiter,
    cache: CacheAside,
    class_limits: ClassLimits,
    call_sites: HashMap<String, CallSitePolicy>,
    enabled: bool,
}

impl Gate {
    pub fn new(limiter: RateLimiter, cache: CacheAside, class_limits: ClassLimits) -> Self {
        Self {
            limiter,
            cache,
            class_limits,
            call_sites: HashMap::new(),
            enabled: true,
        }
    }

    /// 关闭限流后所有调用直接放行，不访问存储
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 为调用点指定策略，覆盖类别默认值
    pub fn with_call_site(mut self, call_site: impl Into<String>, policy: CallSitePolicy) -> Self {
        self.call_sites.insert(call_site.into(), policy);
        self
    }

    pub fn policy(&self, call_site: &str) -> CallSitePolicy {
        self.call_sites
            .get(call_site)
            .copied()
            .unwrap_or_else(|| CallSitePolicy {
                limit: self.class_limits.get(CallSiteClass::classify(call_site)),
                ttl: Some(self.cache.default_ttl()),
            })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    pub fn now(&self) -> i64 {
        self.limiter.now()
    }

    /// 只做准入，缓存由调用方自己处理
    pub async fn admit(&self, call_site: &str, subject: &str) -> AdmissionDecision {
        let policy = self.policy(call_site);
        self.admit_with(call_site, subject, &policy.limit).await
    }

    /// 先准入，再按 `args` 读缓存，未命中时执行 `compute` 并回填
    pub async fn call<T, E, F, Fut>(
        &self,
        call_site: &str,
        subject: &str,
        args: &Key,
        compute: F,
    ) -> Result<Admitted<T>, GateError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let policy = self.policy(call_site);
        let decision = self.admit_with(call_site, subject, &policy.limit).await;
        if !decision.admitted {
            return Err(GateError::RateLimited(decision));
        }

        let value = match policy.ttl {
            Some(ttl) => self.cache.get_or_compute(args, ttl, compute).await,
            None => compute().await,
        }
        .map_err(GateError::Compute)?;

        Ok(Admitted { value, decision })
    }

    async fn admit_with(&self, call_site: &str, subject: &str, limit: &RateLimit) -> AdmissionDecision {
        if !self.enabled {
            return AdmissionDecision::unchecked();
        }
        let key = rate_limit_key(subject, call_site);
        let decision = self.limiter.admit(&key, limit).await;
        if !decision.admitted {
            tracing::info!(call_site, subject, reset_at = decision.reset_at, "Request rate limited");
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{AtomicCounterStore, MemoryStore};

    fn gate_at(start: i64) -> (Gate, Arc<MemoryStore>) {
        let clock = Arc::new(ManualClock::new(start));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let limiter = RateLimiter::new(store.clone(), clock);
        let cache = CacheAside::new(store.clone(), CacheTtl::from_secs(300).unwrap());
        (Gate::new(limiter, cache, ClassLimits::default()), store)
    }

    #[test]
    fn test_classify_endpoints() {
        assert_eq!(CallSiteClass::classify("/api/v1/auth/login.post"), CallSiteClass::Auth);
        assert_eq!(CallSiteClass::classify("/api/v1/businesses/search.get"), CallSiteClass::Search);
        assert_eq!(CallSiteClass::classify("/api/v1/businesses.get"), CallSiteClass::Api);
        assert_eq!(CallSiteClass::classify("/health.get"), CallSiteClass::Public);
        assert_eq!(CallSiteClass::classify("AUTH_REFRESH"), CallSiteClass::Auth);
    }

    #[test]
    fn test_default_class_limits() {
        let limits = ClassLimits::default();
        assert_eq!(limits.get(CallSiteClass::Auth).limit(), 10);
        assert_eq!(limits.get(CallSiteClass::Api).limit(), 100);
        assert_eq!(limits.get(CallSiteClass::Search).limit(), 30);
        assert_eq!(limits.get(CallSiteClass::Public).limit(), 60);
        for class in CallSiteClass::ALL {
            assert_eq!(limits.get(class).period_secs(), 60);
        }
    }

    #[test]
    fn test_registered_policy_overrides_class() {
        let (gate, _) = gate_at(0);
        let pinned = CallSitePolicy {
            limit: RateLimit::per_secs(2, 10).unwrap(),
            ttl: None,
        };
        let gate = gate.with_call_site("search_businesses", pinned);

        assert_eq!(gate.policy("search_businesses"), pinned);
        let fallback = gate.policy("search_owners");
        assert_eq!(fallback.limit.limit(), 30);
        assert_eq!(fallback.ttl, Some(CacheTtl::from_secs(300).unwrap()));
    }

    #[tokio::test]
    async fn test_denied_call_never_reaches_cache_or_compute() {
        let (gate, store) = gate_at(0);
        let gate = gate.with_call_site(
            "lookup",
            CallSitePolicy {
                limit: RateLimit::per_secs(1, 60).unwrap(),
                ttl: Some(CacheTtl::from_secs(60).unwrap()),
            },
        );
        let args = Key::builder("lookup").part("other").build();

        let first = gate
            .call("lookup", "10.0.0.1", &args, || async { Ok::<_, String>(1u32) })
            .await
            .unwrap();
        assert_eq!(first.value, 1);
        assert_eq!(first.decision.remaining, 0);

        store.delete(&[args.as_str().to_string()]).await.unwrap();
        let ran = AtomicBool::new(false);
        let denied = gate
            .call("lookup", "10.0.0.1", &args, || async {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, String>(2u32)
            })
            .await;
        assert!(matches!(denied, Err(GateError::RateLimited(d)) if !d.admitted));
        assert!(!ran.load(Ordering::SeqCst));
        assert!(store.get(args.as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_gate_admits_without_store() {
        let (gate, store) = gate_at(0);
        let gate = gate.with_enabled(false);
        store.set_unavailable(true);

        for _ in 0..20 {
            let decision = gate.admit("/api/v1/auth/login", "1.2.3.4").await;
            assert_eq!(decision, AdmissionDecision::unchecked());
        }
    }

    #[tokio::test]
    async fn test_uncached_call_site_always_computes() {
        let (gate, store) = gate_at(0);
        let gate = gate.with_call_site(
            "fresh",
            CallSitePolicy {
                limit: RateLimit::per_secs(10, 60).unwrap(),
                ttl: None,
            },
        );
        let args = Key::builder("fresh").build();
        for expected in [1u32, 2] {
            let out = gate
                .call("fresh", "me", &args, || async move { Ok::<_, String>(expected) })
                .await
                .unwrap();
            assert_eq!(out.value, expected);
        }
        assert!(store.get(args.as_str()).await.unwrap().is_none());
    }
}
