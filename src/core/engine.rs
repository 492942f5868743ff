use crate::adapters::build_registry;
use crate::config::AppConfig;
use crate::core::aggregator::{Aggregator, AggregatorSettings};
use crate::core::cache::LookupCache;
use crate::core::exporter::{self, ExportFormat};
use crate::core::rate_limiter::RateLimiter;
use crate::domain::model::{AggregatedReport, Module};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TracerError};
use std::path::Path;
use std::sync::Arc;

/// 結果輸出位置與格式
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub formats: Vec<ExportFormat>,
    pub output: Option<String>,
    pub output_dir: String,
    pub save_to_file: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            formats: vec![ExportFormat::Json],
            output: None,
            output_dir: "./results".to_string(),
            save_to_file: false,
        }
    }
}

impl From<&AppConfig> for OutputOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            formats: config.formats.clone(),
            output: config.output.clone(),
            output_dir: config.output_dir.clone(),
            save_to_file: config.save_to_file,
        }
    }
}

/// 批次檔中無法解析的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedInput {
    pub line: usize,
    pub input: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<AggregatedReport>,
    pub rejected: Vec<RejectedInput>,
}

impl BatchSummary {
    /// 沒有被拒絕的輸入，且每份報告都成功
    pub fn success(&self) -> bool {
        self.rejected.is_empty() && self.reports.iter().all(|report| report.success)
    }
}

/// 要輸出的內容
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Single(&'a AggregatedReport),
    Batch(&'a [AggregatedReport]),
}

pub struct TraceEngine<S: Storage> {
    aggregator: Aggregator,
    storage: S,
    output: OutputOptions,
}

impl<S: Storage> TraceEngine<S> {
    pub fn new(aggregator: Aggregator, storage: S, output: OutputOptions) -> Self {
        Self {
            aggregator,
            storage,
            output,
        }
    }

    /// 依執行設定組出來源、限流器與快取
    pub fn from_config(config: &AppConfig, storage: S) -> Result<Self> {
        let mut registry = build_registry(&config.sources)?;
        if !config.source_filter.is_empty() {
            let known = registry.source_names();
            for name in config.source_filter.iter().filter(|name| !known.contains(*name)) {
                tracing::warn!("⚠️ Unknown source in --sources: {}", name);
            }
            registry = registry.restrict_to(&config.source_filter);
        }
        tracing::debug!("🔌 Source registry: {:?}", registry);

        let limiter = config
            .sources
            .iter()
            .filter_map(|source| source.rate_limit.map(|limit| (&source.name, limit)))
            .fold(
                RateLimiter::new(config.rate_limit, config.rate_window),
                |limiter, (name, limit)| limiter.with_source_limit(name, limit),
            );

        let settings = AggregatorSettings {
            request_timeout: config.request_timeout,
            query_timeout: config.query_timeout,
            cache_ttl: config.cache_ttl,
        };

        let mut aggregator = Aggregator::new(registry, Arc::new(limiter), settings);
        if config.cache_enabled {
            aggregator = aggregator.with_cache(Arc::new(LookupCache::new()));
        }

        Ok(Self::new(aggregator, storage, OutputOptions::from(config)))
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// 解析單一號碼並查詢
    pub async fn trace(&self, raw: &str, modules: &[Module]) -> Result<AggregatedReport> {
        let number = PhoneNumber::parse(raw)?;
        self.aggregator.query(&number, modules).await
    }

    /// 依序處理批次內容：每行一個號碼，略過空行與 `#` 註解
    pub async fn trace_batch(&self, contents: &str, modules: &[Module]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for (index, line) in contents.lines().enumerate() {
            let input = line.trim();
            if input.is_empty() || input.starts_with('#') {
                continue;
            }

            let number = match PhoneNumber::parse(input) {
                Ok(number) => number,
                Err(e) => {
                    tracing::warn!("⚠️ Line {}: skipping '{}': {}", index + 1, input, e);
                    summary.rejected.push(RejectedInput {
                        line: index + 1,
                        input: input.to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let report = self.aggregator.query(&number, modules).await?;
            summary.reports.push(report);

            if let Some(cache) = self.aggregator.cache() {
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!("🧹 Purged {} expired cache entries", purged);
                }
            }
        }

        tracing::info!(
            "📦 Batch finished: {} traced, {} rejected",
            summary.reports.len(),
            summary.rejected.len()
        );
        Ok(summary)
    }

    /// 透過 Storage 讀取批次檔再處理
    pub async fn trace_batch_file(&self, path: &str, modules: &[Module]) -> Result<BatchSummary> {
        tracing::info!("📂 Reading batch file: {}", path);
        let data = self.storage.read_file(path).await?;
        let contents = String::from_utf8(data).map_err(|e| {
            TracerError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        self.trace_batch(&contents, modules).await
    }

    /// 依輸出設定寫檔或印到 stdout，回傳寫入的路徑
    pub async fn deliver(&self, payload: Payload<'_>) -> Result<Vec<String>> {
        let mut written = Vec::new();

        for format in &self.output.formats {
            let content = match payload {
                Payload::Single(report) => exporter::export(report, *format)?,
                Payload::Batch(reports) => exporter::export_batch(reports, *format)?,
            };

            match self.destination(payload, *format) {
                Some(path) => {
                    self.storage.write_file(&path, content.as_bytes()).await?;
                    tracing::info!("💾 Saved {} report to: {}", format, path);
                    written.push(path);
                }
                None => println!("{}", content),
            }
        }

        Ok(written)
    }

    fn destination(&self, payload: Payload<'_>, format: ExportFormat) -> Option<String> {
        if let Some(output) = &self.output.output {
            if self.output.formats.len() == 1 {
                return Some(output.clone());
            }
            return Some(
                Path::new(output)
                    .with_extension(format.extension())
                    .to_string_lossy()
                    .into_owned(),
            );
        }

        if !self.output.save_to_file {
            return None;
        }

        let stem = match payload {
            Payload::Single(report) => report.phone_number.digits(),
            Payload::Batch(_) => "batch".to_string(),
        };
        Some(
            Path::new(&self.output.output_dir)
                .join(format!("{}.{}", stem, format.extension()))
                .to_string_lossy()
                .into_owned(),
        )
    }
}
