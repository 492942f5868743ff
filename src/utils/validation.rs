use crate::utils::error::{Result, TracerError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(TracerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(TracerError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(TracerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(TracerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(TracerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(TracerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TracerError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// 檢查 API key 是否存在且沒有殘留未替換的 `${VAR}`
pub fn is_unresolved_secret(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.trim().is_empty() || (v.contains("${") && v.contains('}')),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("sources[0].endpoint", "https://example.com").is_ok());
        assert!(validate_url("sources[0].endpoint", "http://example.com").is_ok());
        assert!(validate_url("sources[0].endpoint", "").is_err());
        assert!(validate_url("sources[0].endpoint", "invalid-url").is_err());
        assert!(validate_url("sources[0].endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("settings.rate_limit", 60, 1).is_ok());
        assert!(validate_positive_number("settings.rate_limit", 0, 1).is_err());
    }

    #[test]
    fn test_unresolved_secret() {
        assert!(is_unresolved_secret(None));
        assert!(is_unresolved_secret(Some("  ")));
        assert!(is_unresolved_secret(Some("${NUMVERIFY_KEY}")));
        assert!(!is_unresolved_secret(Some("abc123")));
    }
}
