use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("Invalid phone number '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },

    #[error("Authentication failed for source '{source_id}': {message}")]
    AuthError { source_id: String, message: String },

    #[error("Rate limit exceeded for source '{source_id}', retry after {retry_after:?}")]
    RateLimited {
        source_id: String,
        retry_after: Duration,
    },

    #[error("Timed out after {after:?} waiting for {scope}")]
    Timeout { scope: String, after: Duration },

    #[error("Source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("Malformed response from source '{source_id}': {reason}")]
    MalformedResponse { source_id: String, reason: String },

    #[error("Unsupported export format: {format}")]
    UnsupportedFormat { format: String },

    #[error("HTTP client error: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

/// 錯誤分類，會被寫入報告中每個模組的失敗紀錄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidFormat,
    Auth,
    RateLimited,
    Timeout,
    SourceUnavailable,
    MalformedResponse,
    UnsupportedFormat,
    Configuration,
    Io,
    Serialization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 根據錯誤嚴重程度決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 輸出或重試錯誤
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 設定錯誤
        }
    }
}

impl TracerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TracerError::InvalidFormat { .. } => ErrorCategory::InvalidFormat,
            TracerError::AuthError { .. } => ErrorCategory::Auth,
            TracerError::RateLimited { .. } => ErrorCategory::RateLimited,
            TracerError::Timeout { .. } => ErrorCategory::Timeout,
            TracerError::SourceUnavailable { .. } => ErrorCategory::SourceUnavailable,
            TracerError::MalformedResponse { .. } => ErrorCategory::MalformedResponse,
            TracerError::UnsupportedFormat { .. } => ErrorCategory::UnsupportedFormat,
            TracerError::ApiError(e) if e.is_timeout() => ErrorCategory::Timeout,
            TracerError::ApiError(e) if e.is_decode() => ErrorCategory::MalformedResponse,
            TracerError::ApiError(_) => ErrorCategory::SourceUnavailable,
            TracerError::CsvError(_) | TracerError::SerializationError(_) => {
                ErrorCategory::Serialization
            }
            TracerError::IoError(_) => ErrorCategory::Io,
            TracerError::ConfigError { .. }
            | TracerError::ConfigValidationError { .. }
            | TracerError::InvalidConfigValueError { .. }
            | TracerError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::RateLimited | ErrorCategory::Timeout => ErrorSeverity::Medium,
            ErrorCategory::SourceUnavailable | ErrorCategory::MalformedResponse => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Io | ErrorCategory::Serialization => ErrorSeverity::Medium,
            ErrorCategory::InvalidFormat | ErrorCategory::Auth => ErrorSeverity::High,
            ErrorCategory::UnsupportedFormat | ErrorCategory::Configuration => {
                ErrorSeverity::Critical
            }
        }
    }

    /// 給使用者的修復建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::InvalidFormat => {
                "Use international format with a country code, e.g. +14155552671"
            }
            ErrorCategory::Auth => "Check the API key configured for this source",
            ErrorCategory::RateLimited => "Wait for the rate window to reset or raise rate_limit",
            ErrorCategory::Timeout => "Increase --timeout or check network connectivity",
            ErrorCategory::SourceUnavailable => "The source may be down; try again later",
            ErrorCategory::MalformedResponse => {
                "The source changed its response format; check field_mapping"
            }
            ErrorCategory::UnsupportedFormat => "Use one of: json, csv, html",
            ErrorCategory::Configuration => "Fix the configuration file and try again",
            ErrorCategory::Io => "Check that the path exists and is writable",
            ErrorCategory::Serialization => "Report this issue with the failing input",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TracerError::InvalidFormat { input, .. } => {
                format!("'{}' is not a valid international phone number", input)
            }
            TracerError::UnsupportedFormat { format } => {
                format!("Export format '{}' is not supported", format)
            }
            TracerError::MissingConfigError { field } => {
                format!("Missing configuration value: {}", field)
            }
            other => other.to_string(),
        }
    }

    /// 來源相關錯誤對應的來源名稱
    pub fn source_id(&self) -> Option<&str> {
        match self {
            TracerError::AuthError { source_id, .. }
            | TracerError::RateLimited { source_id, .. }
            | TracerError::SourceUnavailable { source_id, .. }
            | TracerError::MalformedResponse { source_id, .. } => Some(source_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TracerError>;
