use crate::utils::error::{Result, TracerError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 60;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// 成功取得的請求額度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePermit {
    pub source: String,
    pub remaining: u32,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
    limit: u32,
}

/// 固定視窗、非阻塞的每來源限流器。
///
/// 額度用完時 `try_acquire` 立即回傳 `RateLimited`，由呼叫端決定要不要換來源。
/// 每個來源各自一把鎖，外層的表只在第一次見到來源時才需要寫鎖。
#[derive(Debug)]
pub struct RateLimiter {
    default_limit: u32,
    window: Duration,
    overrides: HashMap<String, u32>,
    windows: RwLock<HashMap<String, Arc<Mutex<Window>>>>,
}

impl RateLimiter {
    pub fn new(default_limit: u32, window: Duration) -> Self {
        Self {
            default_limit,
            window,
            overrides: HashMap::new(),
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn per_minute(default_limit: u32) -> Self {
        Self::new(default_limit, DEFAULT_WINDOW)
    }

    pub fn with_source_limit(mut self, source: impl Into<String>, limit: u32) -> Self {
        self.overrides.insert(source.into(), limit);
        self
    }

    pub fn limit_for(&self, source: &str) -> u32 {
        self.overrides
            .get(source)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn try_acquire(&self, source: &str) -> Result<RatePermit> {
        let window = self.window_for(source);
        let mut window = window.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();
        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.window {
            window.started = now;
            window.used = 0;
        }

        if window.used >= window.limit {
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(window.started));
            tracing::debug!(
                "⏳ {}: rate limit reached ({} per {:?}), retry after {:?}",
                source,
                window.limit,
                self.window,
                retry_after
            );
            return Err(TracerError::RateLimited {
                source_id: source.to_string(),
                retry_after,
            });
        }

        window.used += 1;
        Ok(RatePermit {
            source: source.to_string(),
            remaining: window.limit - window.used,
        })
    }

    fn window_for(&self, source: &str) -> Arc<Mutex<Window>> {
        {
            let windows = self
                .windows
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(window) = windows.get(source) {
                return Arc::clone(window);
            }
        }

        let mut windows = self
            .windows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let limit = self.limit_for(source);
        Arc::clone(windows.entry(source.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(Window {
                started: Instant::now(),
                used: 0,
                limit,
            }))
        }))
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REQUESTS_PER_WINDOW, DEFAULT_WINDOW)
    }
}
