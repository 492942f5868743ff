use crate::domain::phone::PhoneNumber;
use crate::utils::error::{ErrorCategory, TracerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 呼叫端可以要求的查詢能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Module {
    Carrier,
    Geolocation,
    Spam,
    Validate,
    Social,
}

impl Module {
    pub const ALL: [Module; 5] = [
        Module::Carrier,
        Module::Geolocation,
        Module::Spam,
        Module::Validate,
        Module::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Carrier => "carrier",
            Module::Geolocation => "geolocation",
            Module::Spam => "spam",
            Module::Validate => "validate",
            Module::Social => "social",
        }
    }

    pub fn default_set() -> Vec<Module> {
        vec![Module::Validate, Module::Carrier, Module::Geolocation]
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = TracerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carrier" => Ok(Module::Carrier),
            "geolocation" | "location" | "geo" => Ok(Module::Geolocation),
            "spam" => Ok(Module::Spam),
            "validate" | "validator" => Ok(Module::Validate),
            "social" | "social_media" => Ok(Module::Social),
            other => Err(TracerError::InvalidConfigValueError {
                field: "modules".to_string(),
                value: other.to_string(),
                reason: "Unknown module. Valid modules: carrier, geolocation, spam, validate, social"
                    .to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupStatus {
    Success,
    Partial,
    Failed,
}

impl LookupStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, LookupStatus::Success | LookupStatus::Partial)
    }
}

/// 單一來源對單一號碼的正規化查詢結果，建立後不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub source: String,
    pub module: Module,
    pub status: LookupStatus,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl LookupResult {
    pub fn new(
        source: impl Into<String>,
        module: Module,
        status: LookupStatus,
        fields: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            source: source.into(),
            module,
            status,
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

/// 某個候選來源失敗的紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub module: Module,
    pub source: Option<String>,
    pub category: ErrorCategory,
    pub message: String,
}

impl SourceFailure {
    pub fn from_error(module: Module, source: Option<&str>, error: &TracerError) -> Self {
        Self {
            module,
            source: source.map(str::to_string),
            category: error.category(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleReport {
    pub module: Module,
    pub status: LookupStatus,
    pub source: Option<String>,
    pub from_cache: bool,
    pub result: Option<LookupResult>,
    pub errors: Vec<SourceFailure>,
}

impl ModuleReport {
    pub fn succeeded(module: Module, result: LookupResult, from_cache: bool, errors: Vec<SourceFailure>) -> Self {
        Self {
            module,
            status: result.status,
            source: Some(result.source.clone()),
            from_cache,
            result: Some(result),
            errors,
        }
    }

    pub fn failed(module: Module, errors: Vec<SourceFailure>) -> Self {
        Self {
            module,
            status: LookupStatus::Failed,
            source: None,
            from_cache: false,
            result: None,
            errors,
        }
    }

    pub fn success(&self) -> bool {
        self.result.is_some() && self.status.is_usable()
    }
}

/// 一次查詢的彙整報告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub phone_number: PhoneNumber,
    pub queried_at: DateTime<Utc>,
    pub modules: BTreeMap<Module, ModuleReport>,
    pub success: bool,
    pub errors: Vec<SourceFailure>,
}

impl AggregatedReport {
    /// 由各模組結果組出報告；`success` 只有在每個模組都成功時才為 true
    pub fn assemble(phone_number: PhoneNumber, modules: BTreeMap<Module, ModuleReport>) -> Self {
        let success = !modules.is_empty() && modules.values().all(ModuleReport::success);
        let errors = modules
            .values()
            .flat_map(|report| report.errors.iter().cloned())
            .collect();

        Self {
            phone_number,
            queried_at: Utc::now(),
            modules,
            success,
            errors,
        }
    }

    pub fn module(&self, module: Module) -> Option<&ModuleReport> {
        self.modules.get(&module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_aliases() {
        assert_eq!("validator".parse::<Module>().unwrap(), Module::Validate);
        assert_eq!("Location".parse::<Module>().unwrap(), Module::Geolocation);
        assert_eq!("social_media".parse::<Module>().unwrap(), Module::Social);
        assert!("whois".parse::<Module>().is_err());
    }

    #[test]
    fn test_report_success_requires_every_module() {
        let number = PhoneNumber::parse("+14155552671").unwrap();
        let ok = LookupResult::new("mock", Module::Carrier, LookupStatus::Success, BTreeMap::new());

        let mut modules = BTreeMap::new();
        modules.insert(
            Module::Carrier,
            ModuleReport::succeeded(Module::Carrier, ok, false, vec![]),
        );
        let error = TracerError::SourceUnavailable {
            source_id: "spamdb".to_string(),
            reason: "HTTP 503".to_string(),
        };
        modules.insert(
            Module::Spam,
            ModuleReport::failed(
                Module::Spam,
                vec![SourceFailure::from_error(Module::Spam, Some("spamdb"), &error)],
            ),
        );

        let report = AggregatedReport::assemble(number, modules);
        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].category, ErrorCategory::SourceUnavailable);
        assert!(report.module(Module::Carrier).unwrap().success());
    }
}
