/// 缓存操作
/// 限流和旁路缓存都只依赖存储抽象和键构建
pub mod aside;
pub mod rate_limit;

// 重新导出常用操作
pub use aside::CacheAside;
pub use rate_limit::RateLimiter;
