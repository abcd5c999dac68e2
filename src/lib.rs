use std::sync::Arc;

use config::Config;
use store::AtomicCounterStore;

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod middleware;
pub mod routes;
pub mod store;
pub mod utils;

pub use cache::{AdmissionDecision, CacheAside, CacheTtl, FailurePolicy, Key, RateLimit, RateLimiter};
pub use error::{ConfigError, GateError, StoreError};
pub use gate::{Admitted, CallSiteClass, CallSitePolicy, ClassLimits, Gate};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub gate: Arc<Gate>,
    pub store: Arc<dyn AtomicCounterStore>,
}

impl AppState {
    /// 按配置组装限流器、缓存和 Gate，存储由调用方创建并注入
    pub fn build(config: Config, store: Arc<dyn AtomicCounterStore>, clock: Arc<dyn clock::Clock>) -> Self {
        let limiter = RateLimiter::new(store.clone(), clock)
            .with_failure_policy(config.rate_limit_failure_policy);
        let cache = CacheAside::new(store.clone(), config.cache_default_ttl);
        let gate = Gate::new(limiter, cache, config.rate_limits)
            .with_enabled(config.rate_limit_enabled);

        Self {
            config,
            gate: Arc::new(gate),
            store,
        }
    }
}
