//! 发现结果缓存 - 基础设施层
//!
//! TTL + LRU 的键值存储。所有操作都是全函数：未命中、过期都不是错误。
//!
//! - 过期条目在访问时惰性删除，同时由后台清扫任务定期清除
//! - 容量已满时写入新键，先淘汰最久未访问的条目
//! - 条目写入后不可变，只有访问计数和访问时间会更新

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::DiscoveryResult;

pub use crate::models::normalize_key;

/// 默认 TTL：1 小时
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
/// 默认清扫间隔：5 分钟
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// 默认容量
pub const DEFAULT_MAX_SIZE: usize = 100;
/// TTL 上限：10 年
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
/// 清扫间隔下限
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: DiscoveryResult,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
    deadline: Instant,
    /// 单调递增的访问序号，用于 LRU
    access_seq: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// 单个条目的统计信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryStats {
    pub key: String,
    pub access_count: u64,
    pub expired: bool,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// 缓存统计
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub entries: Vec<CacheEntryStats>,
}

impl CacheStats {
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    seq: u64,
}

impl Inner {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// 缓存存储
///
/// 内部由一把互斥锁串行化 store / evict / 清扫，可安全地在多个任务间共享。
#[derive(Debug)]
pub struct CacheStore {
    inner: Mutex<Inner>,
    max_size: usize,
    default_ttl: Duration,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

impl CacheStore {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_size: max_size.max(1),
            default_ttl: default_ttl.min(MAX_TTL),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 写入（覆盖）一个条目；容量已满且为新键时先淘汰最久未访问的条目
    pub fn store(&self, key: &str, result: DiscoveryResult, ttl: Option<Duration>) {
        let key = normalize_key(key);
        let ttl = ttl.unwrap_or(self.default_ttl).min(MAX_TTL);
        let now = Utc::now();
        let started = Instant::now();
        let (deadline, ttl) = match started.checked_add(ttl) {
            Some(deadline) => (deadline, ttl),
            None => (started + DEFAULT_TTL, DEFAULT_TTL),
        };
        // expires_at 与 deadline 使用同一个 ttl
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_size {
            let victim = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.access_seq)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                debug!("缓存已满，淘汰最久未访问的条目: {}", victim);
                inner.entries.remove(&victim);
            }
        }

        let access_seq = inner.next_seq();
        inner.entries.insert(
            key,
            CacheEntry {
                result,
                cached_at: now,
                expires_at,
                access_count: 0,
                last_accessed: now,
                deadline,
                access_seq,
            },
        );
    }

    /// 读取；过期条目被删除并视为未命中
    pub fn get(&self, key: &str) -> Option<DiscoveryResult> {
        let key = normalize_key(key);
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = inner.entries.get(&key)?.is_expired(now);
        if expired {
            debug!("缓存条目已过期: {}", key);
            inner.entries.remove(&key);
            return None;
        }

        let access_seq = inner.next_seq();
        let entry = inner.entries.get_mut(&key)?;
        entry.access_count += 1;
        entry.last_accessed = Utc::now();
        entry.access_seq = access_seq;
        Some(entry.result.clone())
    }

    /// 是否存在未过期的条目；不更新访问记录
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .get(&normalize_key(key))
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// 删除一个条目，返回是否存在
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.remove(&normalize_key(key)).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清除所有过期条目，返回清除数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        before - inner.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let inner = self.lock();
        let mut entries: Vec<CacheEntryStats> = inner
            .entries
            .iter()
            .map(|(key, entry)| CacheEntryStats {
                key: key.clone(),
                access_count: entry.access_count,
                expired: entry.is_expired(now),
                cached_at: entry.cached_at,
                expires_at: entry.expires_at,
                last_accessed: entry.last_accessed,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            size: inner.entries.len(),
            max_size: self.max_size,
            entries,
        }
    }

    /// 启动后台清扫任务，`cancel` 被触发时退出
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("缓存清扫任务已停止");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            info!("🧹 清除了 {} 个过期缓存条目", purged);
                        }
                    }
                }
            }
        })
    }
}
