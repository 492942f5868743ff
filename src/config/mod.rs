pub mod cli;
pub mod toml_config;

use crate::core::exporter::ExportFormat;
use crate::domain::model::Module;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::time::Duration;
use toml_config::{SourceDefinition, TomlConfig};

#[cfg(feature = "cli")]
use clap::Parser;

/// 啟動後不再變動的執行設定（設定檔 + 命令列覆蓋）
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub modules: Vec<Module>,
    pub source_filter: Vec<String>,
    pub formats: Vec<ExportFormat>,
    pub output: Option<String>,
    pub output_dir: String,
    pub save_to_file: bool,
    pub query_timeout: Duration,
    pub request_timeout: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub verbose: bool,
    pub sources: Vec<SourceDefinition>,
}

impl AppConfig {
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        config.validate()?;
        let settings = &config.settings;

        Ok(Self {
            modules: config.default_modules()?,
            source_filter: Vec::new(),
            formats: vec![config.default_format()?],
            output: None,
            output_dir: settings.output_dir.clone(),
            save_to_file: settings.save_to_file,
            query_timeout: Duration::from_secs(settings.timeout),
            request_timeout: Duration::from_secs(settings.request_timeout.unwrap_or(settings.timeout)),
            rate_limit: settings.rate_limit,
            rate_window: Duration::from_secs(settings.rate_window_secs),
            cache_enabled: settings.cache_enabled,
            cache_ttl: Duration::from_secs(settings.cache_ttl),
            verbose: settings.verbose,
            sources: config.effective_sources(),
        })
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("timeout", self.query_timeout.as_secs(), 1)?;
        if self.modules.is_empty() {
            return Err(crate::utils::error::TracerError::MissingConfigError {
                field: "modules".to_string(),
            });
        }
        if let Some(output) = &self.output {
            validation::validate_path("output", output)?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "phone-tracer")]
#[command(version)]
#[command(about = "PhoneTracer - OSINT tool for phone number intelligence")]
pub struct CliConfig {
    /// Phone number to trace (e.g. +14155552671)
    pub phone_number: Option<String>,

    /// Modules to run (carrier, geolocation, spam, validate, social)
    #[arg(short, long, value_delimiter = ',')]
    pub modules: Vec<String>,

    /// Restrict lookups to these source names
    #[arg(short, long, value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output formats (json, csv, html)
    #[arg(short = 'f', long = "output-format", alias = "format", value_delimiter = ',')]
    pub output_format: Vec<String>,

    /// Query timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Batch process from file (one phone number per line)
    #[arg(short, long)]
    pub batch: Option<String>,

    /// Disable the lookup cache
    #[arg(long)]
    pub no_cache: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 把命令列參數覆蓋到設定上
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if !self.modules.is_empty() {
            config.modules = self
                .modules
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<Module>>>()?;
        }
        if !self.output_format.is_empty() {
            config.formats = self
                .output_format
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<ExportFormat>>>()?;
        }
        if !self.sources.is_empty() {
            config.source_filter = self.sources.clone();
        }
        if let Some(timeout) = self.timeout {
            config.query_timeout = Duration::from_secs(timeout);
            config.request_timeout = config.request_timeout.min(config.query_timeout);
        }
        if self.output.is_some() {
            config.output = self.output.clone();
        }
        if self.no_cache {
            config.cache_enabled = false;
        }
        config.verbose |= self.verbose;
        config.validate()
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let toml = TomlConfig::from_toml_str("[settings]\ntimeout = 40\n").unwrap();
        let mut config = AppConfig::from_toml(&toml).unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(40));

        let cli = CliConfig::parse_from([
            "phone-tracer",
            "+14155552671",
            "--modules",
            "carrier,location",
            "--output-format",
            "json,html",
            "--timeout",
            "10",
            "--no-cache",
        ]);
        cli.apply(&mut config).unwrap();

        assert_eq!(config.modules, vec![Module::Carrier, Module::Geolocation]);
        assert_eq!(config.formats, vec![ExportFormat::Json, ExportFormat::Html]);
        assert_eq!(config.query_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let mut config = AppConfig::from_toml(&TomlConfig::default()).unwrap();
        let cli = CliConfig::parse_from(["phone-tracer", "+14155552671", "-f", "pdf"]);
        assert!(cli.apply(&mut config).is_err());
    }
}
