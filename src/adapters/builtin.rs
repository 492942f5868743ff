use crate::domain::model::{LookupResult, LookupStatus, Module};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::SourceClient;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// 平台名稱、偵測方式、可信度與說明
const PLATFORMS: [(&str, &str, &str, &str); 10] = [
    ("WhatsApp", "API check", "low", "Requires WhatsApp Business API or third-party service"),
    ("Telegram", "Telegram API", "low", "Requires Telegram API credentials"),
    ("Signal", "Limited detection", "very-low", "Signal prioritizes privacy - limited detection possible"),
    ("Viber", "Manual verification required", "very-low", "Viber requires manual verification or account access"),
    ("Facebook", "Manual verification required", "very-low", "Facebook requires manual verification or account access"),
    ("Instagram", "Manual verification required", "very-low", "Instagram requires manual verification or account access"),
    ("Twitter/X", "Manual verification required", "very-low", "Twitter/X requires manual verification or account access"),
    ("Snapchat", "Manual verification required", "very-low", "Snapchat requires manual verification or account access"),
    ("TikTok", "Manual verification required", "very-low", "TikTok requires manual verification or account access"),
    ("LinkedIn", "Manual verification required", "very-low", "LinkedIn requires manual verification or account access"),
];

/// 離線驗證：用內建的編號計畫資料判斷，不呼叫任何外部服務
#[derive(Debug, Clone)]
pub struct LocalValidator {
    name: String,
}

impl LocalValidator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl SourceClient for LocalValidator {
    fn id(&self) -> &str {
        &self.name
    }

    fn module(&self) -> Module {
        Module::Validate
    }

    async fn lookup(&self, number: &PhoneNumber, _timeout: Duration) -> Result<LookupResult> {
        // 依 libphonenumber 的編號計畫判斷；解析失敗代表號碼長度或國碼不可能成立
        let parsed = phonenumber::parse(None, number.format()).ok();
        let valid = parsed.as_ref().map(phonenumber::is_valid).unwrap_or(false);
        let region = parsed
            .as_ref()
            .and_then(|n| n.country().id())
            .map(|id| format!("{:?}", id))
            .or_else(|| number.region_hint().map(str::to_string));

        tracing::debug!(
            "🔎 Numbering plan check for {}: possible={}, valid={}",
            number,
            parsed.is_some(),
            valid
        );

        let mut fields = BTreeMap::new();
        fields.insert("valid".to_string(), Value::Bool(valid));
        fields.insert("possible".to_string(), Value::Bool(parsed.is_some()));
        fields.insert("country_code".to_string(), json!(number.country_code()));
        fields.insert("national_number".to_string(), json!(number.national_number()));
        fields.insert("e164".to_string(), json!(number.format()));
        if let Some(region) = region {
            fields.insert("region".to_string(), json!(region));
        }

        Ok(LookupResult::new(&self.name, Module::Validate, LookupStatus::Success, fields))
    }
}

/// 社群平台註冊檢查。沒有平台憑證無法確認，所以結果一律是 partial
#[derive(Debug, Clone)]
pub struct SocialProbe {
    name: String,
}

impl SocialProbe {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl SourceClient for SocialProbe {
    fn id(&self) -> &str {
        &self.name
    }

    fn module(&self) -> Module {
        Module::Social
    }

    async fn lookup(&self, number: &PhoneNumber, _timeout: Duration) -> Result<LookupResult> {
        tracing::debug!("🔎 Checking social platforms for {}", number);

        let details: serde_json::Map<String, Value> = PLATFORMS
            .iter()
            .map(|(platform, method, confidence, note)| {
                (
                    platform.to_string(),
                    json!({
                        "registered": false,
                        "method": method,
                        "confidence": confidence,
                        "note": note,
                    }),
                )
            })
            .collect();

        let mut fields = BTreeMap::new();
        fields.insert(
            "platforms_checked".to_string(),
            json!(PLATFORMS.iter().map(|(platform, ..)| *platform).collect::<Vec<_>>()),
        );
        fields.insert("platforms_found".to_string(), json!([]));
        fields.insert("details".to_string(), Value::Object(details));

        Ok(LookupResult::new(&self.name, Module::Social, LookupStatus::Partial, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_validator_reports_parsed_parts() {
        let validator = LocalValidator::new("builtin-validator");
        let number = PhoneNumber::parse("+1 201-555-0123").unwrap();

        let result = validator.lookup(&number, Duration::from_secs(1)).await.unwrap();

        assert_eq!(result.status, LookupStatus::Success);
        assert_eq!(result.field("valid"), Some(&json!(true)));
        assert_eq!(result.field("possible"), Some(&json!(true)));
        assert_eq!(result.field("country_code"), Some(&json!(1)));
        assert_eq!(result.field("national_number"), Some(&json!("2015550123")));
        assert_eq!(result.field("e164"), Some(&json!("+12015550123")));
        assert_eq!(result.field("region"), Some(&json!("US")));
    }

    #[tokio::test]
    async fn test_well_formed_but_unassigned_number_is_not_valid() {
        let validator = LocalValidator::new("builtin-validator");
        // Passes the digit-count parser but no NANP area code starts with 0
        let number = PhoneNumber::parse("+10000000000").unwrap();

        let result = validator.lookup(&number, Duration::from_secs(1)).await.unwrap();

        assert_eq!(result.status, LookupStatus::Success);
        assert_eq!(result.field("valid"), Some(&json!(false)));
        assert_eq!(result.field("e164"), Some(&json!("+10000000000")));
    }

    #[tokio::test]
    async fn test_social_probe_is_partial_and_lists_platforms() {
        let probe = SocialProbe::new("builtin-social");
        let number = PhoneNumber::parse("+14155552671").unwrap();

        let result = probe.lookup(&number, Duration::from_secs(1)).await.unwrap();

        assert_eq!(result.module, Module::Social);
        assert_eq!(result.status, LookupStatus::Partial);
        assert_eq!(result.field("platforms_checked").unwrap().as_array().unwrap().len(), 10);
        assert_eq!(result.field("platforms_found"), Some(&json!([])));
        assert_eq!(
            result.field("details").unwrap()["Signal"]["confidence"],
            json!("very-low")
        );
    }
}
