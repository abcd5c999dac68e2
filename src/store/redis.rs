use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client as RedisClient,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use tokio::sync::OnceCell;
use tokio::time::timeout;

use super::{AtomicCounterStore, WindowEntry, ttl_secs};
use crate::error::StoreError;

/// 建立连接的默认超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// 单次命令的默认超时
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

const SCAN_BATCH: usize = 200;

/// Redis 实现
///
/// 首次使用时建立一个共享的 `ConnectionManager`，断线后由它自动重连；
/// 所有克隆共享同一条多路复用连接，调用方之间不加本地锁。
pub struct RedisStore {
    client: RedisClient,
    namespace: String,
    connect_timeout: Duration,
    operation_timeout: Duration,
    conn: OnceCell<ConnectionManager>,
}

impl RedisStore {
    pub fn new(client: RedisClient, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            conn: OnceCell::new(),
        }
    }

    /// 从连接串创建，只解析地址，不会连接
    pub fn open(url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = RedisClient::open(url)?;
        Ok(Self::new(client, namespace))
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, operation_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.operation_timeout = operation_timeout;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                // 首次连接不重试：连接被拒绝时立即失败，下次调用再重新尝试
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(0)
                    .set_connection_timeout(self.connect_timeout);
                match timeout(
                    self.connect_timeout,
                    ConnectionManager::new_with_config(self.client.clone(), config),
                )
                .await
                {
                    Ok(Ok(conn)) => {
                        tracing::debug!(namespace = %self.namespace, "Redis connection established");
                        Ok(conn)
                    }
                    Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
                    Err(_) => Err(StoreError::Timeout { op: "connect" }),
                }
            })
            .await?;
        Ok(conn.clone())
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() => {
                Err(StoreError::Unavailable(e.to_string()))
            }
            Ok(Err(e)) => Err(StoreError::Command(e)),
            Err(_) => Err(StoreError::Timeout { op }),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    fn scan_pattern(&self, prefix: &str) -> String {
        let mut pattern = String::with_capacity(self.namespace.len() + prefix.len() + 1);
        for c in self.namespace.chars().chain(prefix.chars()) {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('*');
        pattern
    }
}

#[async_trait]
impl AtomicCounterStore for RedisStore {
    async fn record_in_window(&self, key: &str, entry: WindowEntry<'_>) -> Result<u64, StoreError> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;

        // MULTI/EXEC：清理过期成员、写入本次请求、刷新过期时间、计数
        let (count,) = self
            .run("record_in_window", async {
                let result: redis::RedisResult<(u64,)> = redis::pipe()
                    .atomic()
                    .zrembyscore(&key, "-inf", entry.window_start)
                    .ignore()
                    .zadd(&key, entry.member, entry.now)
                    .ignore()
                    .expire(&key, ttl_secs(entry.ttl) as i64)
                    .ignore()
                    .zcard(&key)
                    .query_async(&mut conn)
                    .await;
                result
            })
            .await?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run("get", async { conn.get(&key).await }).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let key = self.namespaced(key);
        let mut conn = self.connection().await?;
        self.run("set", async { conn.set_ex(&key, value, ttl_secs(ttl)).await })
            .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = keys.iter().map(|k| self.namespaced(k)).collect();
        let mut conn = self.connection().await?;
        self.run("delete", async { conn.del(&keys).await }).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let pattern = self.scan_pattern(prefix);
        let mut conn = self.connection().await?;

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .run("scan", async {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await
                })
                .await?;
            keys.extend(
                batch
                    .into_iter()
                    .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_string)),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = self
            .run("ping", async { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}
