/// 缓存数据模型
/// 缓存过期时间、限流阈值与准入决定
pub mod cache;
pub mod rate_limit;

// 重新导出常用类型
pub use cache::CacheTtl;
pub use rate_limit::*;
