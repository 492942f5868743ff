use crate::domain::model::{LookupResult, Module};
use crate::domain::phone::PhoneNumber;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;

/// 快取鍵：號碼 + 模組 + 來源，不同模組的結果不會互相覆蓋
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub number: String,
    pub module: Module,
    pub source: String,
}

impl CacheKey {
    pub fn new(number: &PhoneNumber, module: Module, source: &str) -> Self {
        Self {
            number: number.format(),
            module,
            source: source.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: LookupResult,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

/// 記憶體內的查詢結果快取，過期項目在讀取時才移除
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<LookupResult> {
        let now = Instant::now();
        {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // 等寫鎖期間可能已被新的 put 覆蓋
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
            tracing::debug!("💾 Cache entry expired: {} {} via {}", key.number, key.module, key.source);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: CacheKey, value: LookupResult, ttl: Duration) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
            },
        );
    }

    /// 清掉所有過期項目，回傳移除數量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
