use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{AtomicCounterStore, WindowEntry, ttl_secs};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;

#[derive(Debug)]
enum Data {
    Window(Vec<(i64, String)>),
    Value(String),
}

#[derive(Debug)]
struct Slot {
    data: Data,
    expires_at: i64,
}

/// 进程内实现
///
/// 与 Redis 实现语义一致：一把锁串行化同一时刻的所有变更，过期时间按注入的时钟计算。
/// 可以模拟后端不可达，用来验证限流和缓存的降级行为。
pub struct MemoryStore {
    slots: Mutex<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    /// 模拟存储不可达，之后的所有操作都返回 `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 当前未过期的键数量
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .values()
            .filter(|slot| slot.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn expires_at(&self, ttl: Duration) -> i64 {
        self.clock.now() + ttl_secs(ttl) as i64
    }
}

fn purge_expired(slots: &mut HashMap<String, Slot>, key: &str, now: i64) {
    if slots.get(key).is_some_and(|slot| slot.expires_at <= now) {
        slots.remove(key);
    }
}

#[async_trait]
impl AtomicCounterStore for MemoryStore {
    async fn record_in_window(&self, key: &str, entry: WindowEntry<'_>) -> Result<u64, StoreError> {
        self.check()?;
        let now = self.clock.now();
        let expires_at = self.expires_at(entry.ttl);

        let mut slots = self.lock();
        purge_expired(&mut slots, key, now);

        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            data: Data::Window(Vec::new()),
            expires_at,
        });
        // 同名键上存着普通值时，和 Redis 一样报 WRONGTYPE
        let Data::Window(members) = &mut slot.data else {
            return Err(StoreError::Command(redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "WRONGTYPE Operation against a key holding the wrong kind of value",
            ))));
        };
        members.retain(|(score, _)| *score > entry.window_start);
        members.push((entry.now, entry.member.to_string()));
        slot.expires_at = expires_at;
        Ok(members.len() as u64)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let now = self.clock.now();
        let mut slots = self.lock();
        purge_expired(&mut slots, key, now);
        Ok(slots.get(key).and_then(|slot| match &slot.data {
            Data::Value(value) => Some(value.clone()),
            Data::Window(_) => None,
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        let expires_at = self.expires_at(ttl);
        self.lock().insert(
            key.to_string(),
            Slot {
                data: Data::Value(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.check()?;
        let now = self.clock.now();
        let mut slots = self.lock();
        let mut deleted = 0;
        for key in keys {
            if let Some(slot) = slots.remove(key) {
                if slot.expires_at > now {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.check()?;
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .lock()
            .iter()
            .filter(|(key, slot)| slot.expires_at > now && key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
