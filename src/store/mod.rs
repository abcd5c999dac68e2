//! 底层键值存储
//!
//! 限流器和缓存都只通过 [`AtomicCounterStore`] 访问存储，同一个键上的修改只在存储里串行化。
//! 各组件持有启动时创建的同一个 `Arc<dyn AtomicCounterStore>`。
//!
//! ## 键布局
//!
//! ```text
//! {namespace}rate_limit:{subject}:{action}   → 请求时间戳有序集合
//! {namespace}{cache prefix}:{args...}        → 序列化后的结果 (SETEX)
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// 写入滑动窗口的一条记录
#[derive(Debug, Clone, Copy)]
pub struct WindowEntry<'a> {
    /// 新成员的分数，Unix 秒
    pub now: i64,
    /// 分数小于等于此值的成员在计数前被清理
    pub window_start: i64,
    /// 唯一成员标识，同一秒内的请求都会被计数
    pub member: &'a str,
    /// 每次写入都会刷新的过期时间
    pub ttl: Duration,
}

#[async_trait]
pub trait AtomicCounterStore: Send + Sync {
    /// 原子地清理过期成员、写入 `entry`、刷新过期时间，并返回当前成员数
    async fn record_in_window(&self, key: &str, entry: WindowEntry<'_>) -> Result<u64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// 删除给定的键，返回实际存在的个数
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// 以 `prefix` 开头的所有键，空前缀列出整个命名空间
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// TTL 取整秒，至少为 1：`EXPIRE key 0` 会直接删除键
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
