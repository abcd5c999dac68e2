use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::cache::keys::Key;
use crate::cache::models::CacheTtl;
use crate::store::AtomicCounterStore;

/// 旁路缓存
///
/// 先查存储，命中直接返回；未命中（或反序列化失败）时执行计算并回填。
/// 存储故障只会让调用变慢，不会让调用失败。
///
/// 同一个键的并发未命中会各自执行一次计算，最后写入的覆盖前面的，
/// 所以只适合包装幂等、无副作用的读操作。
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn AtomicCounterStore>,
    default_ttl: CacheTtl,
}

impl CacheAside {
    pub fn new(store: Arc<dyn AtomicCounterStore>, default_ttl: CacheTtl) -> Self {
        Self { store, default_ttl }
    }

    pub fn default_ttl(&self) -> CacheTtl {
        self.default_ttl
    }

    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &Key,
        ttl: CacheTtl,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.lookup(key).await {
            return Ok(hit);
        }

        let value = compute().await?;
        self.fill(key, ttl, &value).await;
        Ok(value)
    }

    /// `unless` 返回 true 时绕过缓存，既不读也不写
    pub async fn get_or_compute_unless<T, E, F, Fut, U>(
        &self,
        key: &Key,
        ttl: CacheTtl,
        unless: U,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        U: FnOnce() -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if unless() {
            tracing::debug!(key = %key, "Cache bypassed");
            return compute().await;
        }
        self.get_or_compute(key, ttl, compute).await
    }

    /// 删除所有以 `prefix` 开头的键，返回删除数量
    ///
    /// 扫描和删除之间不是原子的，期间写入的键可能留下来，由 TTL 兜底。
    pub async fn invalidate(&self, prefix: &Key) -> u64 {
        self.delete_matching(prefix.as_str(), "invalidate").await
    }

    /// 清空存储所在的整个命名空间，仅用于运维和测试
    pub async fn clear(&self) -> u64 {
        let deleted = self.delete_matching("", "clear").await;
        tracing::info!(deleted, "Cache cleared");
        deleted
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &Key) -> Option<T> {
        let raw = match self.store.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key = %key, op = "get", error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, op = "deserialize", error = %e, "Discarding cached payload");
                None
            }
        }
    }

    async fn fill<T: Serialize>(&self, key: &Key, ttl: CacheTtl, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %key, op = "serialize", error = %e, "Result not cacheable");
                return;
            }
        };
        if let Err(e) = self.store.set(key.as_str(), &json, ttl.duration()).await {
            tracing::warn!(key = %key, op = "set", error = %e, "Cache write failed");
        }
    }

    async fn delete_matching(&self, prefix: &str, op: &'static str) -> u64 {
        let keys = match self.store.scan_prefix(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(prefix, op, error = %e, "Cache scan failed");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match self.store.delete(&keys).await {
            Ok(deleted) => {
                tracing::debug!(prefix, op, deleted, "Invalidated cache keys");
                deleted
            }
            Err(e) => {
                tracing::error!(prefix, op, error = %e, "Cache delete failed");
                0
            }
        }
    }
}
