use crate::core::cache::{CacheKey, LookupCache};
use crate::core::rate_limiter::RateLimiter;
use crate::core::registry::SourceRegistry;
use crate::domain::model::{AggregatedReport, Module, ModuleReport, SourceFailure};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::SourceClient;
use crate::utils::error::{ErrorCategory, Result, TracerError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    /// 單次來源呼叫的上限
    pub request_timeout: Duration,
    /// 整個查詢（所有模組）的上限
    pub query_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// 多來源查詢彙整器。
///
/// 每個模組一個 task，依註冊順序嘗試候選來源：先查快取，再向限流器取額度，
/// 最後才呼叫來源。單一來源的錯誤只會記錄在該模組內，不會中斷其他模組。
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    limiter: Arc<RateLimiter>,
    cache: Option<Arc<LookupCache>>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, limiter: Arc<RateLimiter>, settings: AggregatorSettings) -> Self {
        Self {
            registry: Arc::new(registry),
            limiter,
            cache: None,
            settings,
        }
    }

    pub fn with_cache(mut self, cache: Arc<LookupCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<LookupCache>> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    pub async fn query(&self, number: &PhoneNumber, modules: &[Module]) -> Result<AggregatedReport> {
        let requested: BTreeSet<Module> = modules.iter().copied().collect();

        if requested.is_empty() {
            return Err(TracerError::ConfigError {
                message: "no modules requested".to_string(),
            });
        }
        if !requested.iter().any(|module| self.registry.has_sources(*module)) {
            return Err(TracerError::ConfigError {
                message: format!(
                    "no sources configured for any requested module ({})",
                    requested
                        .iter()
                        .map(Module::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        tracing::info!(
            "🚀 Tracing {} (modules: {})",
            number,
            requested
                .iter()
                .map(Module::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let deadline = Instant::now() + self.settings.query_timeout;
        let mut reports = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for module in requested.iter().copied() {
            let candidates = self.registry.candidates(module).to_vec();
            if candidates.is_empty() {
                tracing::warn!("⚠️ No source configured for module '{}'", module);
                reports.insert(
                    module,
                    ModuleReport::failed(
                        module,
                        vec![SourceFailure {
                            module,
                            source: None,
                            category: ErrorCategory::Configuration,
                            message: format!("no source configured for module '{}'", module),
                        }],
                    ),
                );
                continue;
            }

            let task = ModuleTask {
                module,
                number: number.clone(),
                candidates,
                limiter: Arc::clone(&self.limiter),
                cache: self.cache.clone(),
                request_timeout: self.settings.request_timeout,
                query_timeout: self.settings.query_timeout,
                deadline,
                cache_ttl: self.settings.cache_ttl,
            };

            tasks.spawn(task.run());
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    reports.insert(report.module, report);
                }
                Err(e) => tracing::error!("❌ Module task aborted: {}", e),
            }
        }

        // 沒有回報的 task（panic）也要在報告裡出現
        for module in requested {
            reports.entry(module).or_insert_with(|| {
                ModuleReport::failed(
                    module,
                    vec![SourceFailure {
                        module,
                        source: None,
                        category: ErrorCategory::SourceUnavailable,
                        message: "lookup task aborted".to_string(),
                    }],
                )
            });
        }

        let report = AggregatedReport::assemble(number.clone(), reports);
        if report.success {
            tracing::info!("✅ {}: all {} modules succeeded", number, report.modules.len());
        } else {
            tracing::warn!(
                "⚠️ {}: {} of {} modules failed",
                number,
                report.modules.values().filter(|m| !m.success()).count(),
                report.modules.len()
            );
        }
        Ok(report)
    }
}

struct ModuleTask {
    module: Module,
    number: PhoneNumber,
    candidates: Vec<Arc<dyn SourceClient>>,
    limiter: Arc<RateLimiter>,
    cache: Option<Arc<LookupCache>>,
    request_timeout: Duration,
    query_timeout: Duration,
    /// 整個查詢的截止時間，逾時後保留已收集的失敗紀錄
    deadline: Instant,
    cache_ttl: Duration,
}

impl ModuleTask {
    async fn run(self) -> ModuleReport {
        let mut errors = Vec::new();

        for client in &self.candidates {
            let source = client.id();
            let key = CacheKey::new(&self.number, self.module, source);

            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&key) {
                    tracing::debug!("💾 {}: cache hit for {} via {}", self.number, self.module, source);
                    return ModuleReport::succeeded(self.module, hit, true, errors);
                }
            }

            if let Err(e) = self.limiter.try_acquire(source) {
                tracing::warn!("⏳ {}: {}", self.module, e);
                errors.push(SourceFailure::from_error(self.module, Some(source), &e));
                continue;
            }

            if Instant::now() >= self.deadline {
                return self.query_timed_out(errors);
            }

            tracing::debug!("📡 {}: looking up {} via {}", self.module, self.number, source);
            let call_deadline = self.deadline.min(Instant::now() + self.request_timeout);
            let remaining = call_deadline.saturating_duration_since(Instant::now());
            let outcome = match tokio::time::timeout_at(call_deadline, client.lookup(&self.number, remaining)).await {
                Ok(outcome) => outcome,
                Err(_) if Instant::now() >= self.deadline => return self.query_timed_out(errors),
                Err(_) => Err(TracerError::Timeout {
                    scope: format!("source '{}'", source),
                    after: self.request_timeout,
                }),
            };

            match outcome {
                Ok(result) if result.status.is_usable() => {
                    if let Some(cache) = &self.cache {
                        cache.put(key, result.clone(), self.cache_ttl);
                    }
                    tracing::info!("✅ {}: resolved by {}", self.module, source);
                    return ModuleReport::succeeded(self.module, result, false, errors);
                }
                Ok(_) => {
                    tracing::warn!("⚠️ {}: {} reported a failed lookup", self.module, source);
                    errors.push(SourceFailure {
                        module: self.module,
                        source: Some(source.to_string()),
                        category: ErrorCategory::SourceUnavailable,
                        message: format!("source '{}' reported a failed lookup", source),
                    });
                }
                Err(e) => {
                    if e.category() == ErrorCategory::Auth {
                        tracing::error!("🔑 {}: {}", self.module, e);
                    } else {
                        tracing::warn!("❌ {}: {}", self.module, e);
                    }
                    errors.push(SourceFailure::from_error(self.module, Some(source), &e));
                }
            }
        }

        ModuleReport::failed(self.module, errors)
    }

    fn query_timed_out(&self, mut errors: Vec<SourceFailure>) -> ModuleReport {
        tracing::warn!("⏱️ Module '{}' did not finish before the query deadline", self.module);
        let error = TracerError::Timeout {
            scope: "query".to_string(),
            after: self.query_timeout,
        };
        errors.push(SourceFailure::from_error(self.module, None, &error));
        ModuleReport::failed(self.module, errors)
    }
}
