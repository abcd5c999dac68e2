// 缓存模块
// 包含键构建、限流/缓存数据结构和操作逻辑

pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型和函数，方便其他模块使用
pub use keys::{Key, KeyBuilder, rate_limit_key};
pub use models::{AdmissionDecision, CacheTtl, FailurePolicy, RateLimit};
pub use operations::{CacheAside, RateLimiter};
