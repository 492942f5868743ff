use crate::core::exporter::ExportFormat;
use crate::domain::model::Module;
use crate::utils::error::{Result, TracerError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "phonetracer.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 整個查詢的逾時秒數
    pub timeout: u64,
    /// 單次來源呼叫的逾時秒數，未設定時與 `timeout` 相同
    pub request_timeout: Option<u64>,
    /// 每個來源每個視窗的請求上限
    pub rate_limit: u32,
    pub rate_window_secs: u64,
    pub cache_enabled: bool,
    pub cache_ttl: u64,
    pub default_format: String,
    pub default_modules: Vec<String>,
    pub verbose: bool,
    pub save_to_file: bool,
    pub output_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: 30,
            request_timeout: None,
            rate_limit: 60,
            rate_window_secs: 60,
            cache_enabled: true,
            cache_ttl: 3600,
            default_format: "json".to_string(),
            default_modules: Module::default_set()
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
            verbose: false,
            save_to_file: false,
            output_dir: "./results".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Http,
    Builtin,
}

/// `[[sources]]` 區塊；在檔案中的順序就是 fallback 優先順序
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub kind: SourceKind,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_key_param: Option<String>,
    pub api_key_header: Option<String>,
    pub number_param: Option<String>,
    pub rate_limit: Option<u32>,
    pub timeout: Option<u64>,
    pub enabled: Option<bool>,
    pub required: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
    pub parameters: Option<HashMap<String, String>>,
    pub field_mapping: Option<HashMap<String, String>>,
}

impl SourceDefinition {
    pub fn builtin(name: &str, module: Module) -> Self {
        Self {
            name: name.to_string(),
            module: module.as_str().to_string(),
            kind: SourceKind::Builtin,
            endpoint: None,
            api_key: None,
            api_key_param: None,
            api_key_header: None,
            number_param: None,
            rate_limit: None,
            timeout: None,
            enabled: Some(true),
            required: None,
            headers: None,
            parameters: None,
            field_mapping: None,
        }
    }

    pub fn module(&self) -> Result<Module> {
        self.module.parse()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// 是否需要 API key（有設定 key 的傳遞方式）
    pub fn uses_api_key(&self) -> bool {
        self.api_key_param.is_some() || self.api_key_header.is_some()
    }

    pub fn has_api_key(&self) -> bool {
        !validation::is_unresolved_secret(self.api_key.as_deref())
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TracerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TracerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 指定的檔案不存在時沿用預設值；沒指定時嘗試 `./phonetracer.toml`
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) if Path::new(path).exists() => {
                tracing::info!("📁 Loading configuration from: {}", path);
                Self::from_file(path)
            }
            Some(path) => {
                tracing::warn!("⚠️ Config file {} not found. Using defaults.", path);
                Ok(Self::default())
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                tracing::info!("📁 Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => {
                tracing::debug!("No configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// 替換環境變數 (例如 ${NUMVERIFY_API_KEY})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TracerError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 沒有設定任何來源時使用內建的離線來源
    pub fn effective_sources(&self) -> Vec<SourceDefinition> {
        if self.sources.is_empty() {
            vec![
                SourceDefinition::builtin("builtin-validator", Module::Validate),
                SourceDefinition::builtin("builtin-social", Module::Social),
            ]
        } else {
            self.sources.clone()
        }
    }

    pub fn default_modules(&self) -> Result<Vec<Module>> {
        self.settings
            .default_modules
            .iter()
            .map(|name| name.parse())
            .collect()
    }

    pub fn default_format(&self) -> Result<ExportFormat> {
        self.settings.default_format.parse()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_positive_number("settings.timeout", self.settings.timeout, 1)?;
        if let Some(request_timeout) = self.settings.request_timeout {
            validation::validate_positive_number("settings.request_timeout", request_timeout, 1)?;
        }
        validation::validate_positive_number(
            "settings.rate_limit",
            u64::from(self.settings.rate_limit),
            1,
        )?;
        validation::validate_positive_number(
            "settings.rate_window_secs",
            self.settings.rate_window_secs,
            1,
        )?;
        validation::validate_path("settings.output_dir", &self.settings.output_dir)?;
        self.default_format()?;
        self.default_modules()?;

        let mut names = HashSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let field = |name: &str| format!("sources[{}].{}", index, name);

            validation::validate_non_empty_string(&field("name"), &source.name)?;
            if !names.insert(source.name.as_str()) {
                return Err(TracerError::InvalidConfigValueError {
                    field: field("name"),
                    value: source.name.clone(),
                    reason: "Duplicate source name".to_string(),
                });
            }
            source.module()?;

            if source.kind == SourceKind::Http {
                let endpoint = source.endpoint.as_deref().ok_or_else(|| {
                    TracerError::MissingConfigError {
                        field: field("endpoint"),
                    }
                })?;
                validation::validate_url(&field("endpoint"), endpoint)?;
            }
            if let Some(rate_limit) = source.rate_limit {
                validation::validate_positive_number(&field("rate_limit"), u64::from(rate_limit), 1)?;
            }
            if let Some(timeout) = source.timeout {
                validation::validate_positive_number(&field("timeout"), timeout, 1)?;
            }
            if source.is_enabled() && source.is_required() && !source.has_api_key() {
                return Err(TracerError::MissingConfigError {
                    field: field("api_key"),
                });
            }
        }

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
