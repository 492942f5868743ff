use super::{normalize, FieldSpec, Presence};
use crate::adapters::http::HttpSource;
use crate::config::toml_config::SourceDefinition;
use crate::domain::model::{LookupResult, Module};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::SourceClient;
use crate::utils::error::{Result, TracerError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const FIELDS: [FieldSpec; 5] = [
    FieldSpec::new("valid", &["is_valid", "valid_number"], Presence::Required),
    FieldSpec::new("country", &["country.code", "country_code"], Presence::Expected),
    FieldSpec::new("country_code", &["country.prefix", "country_prefix", "calling_code"], Presence::Optional),
    FieldSpec::new(
        "international_format",
        &["format.international", "e164_format"],
        Presence::Optional,
    ),
    FieldSpec::new("line_type", &["type"], Presence::Optional),
];

/// 號碼有效性查詢（numverify / abstractapi 類型的服務）
#[derive(Debug, Clone)]
pub struct ValidatorClient {
    http: HttpSource,
}

impl ValidatorClient {
    pub fn from_definition(definition: &SourceDefinition, client: Client) -> Result<Self> {
        Ok(Self {
            http: HttpSource::from_definition(definition, client)?,
        })
    }

    fn coerce_valid(&self, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(valid) => Ok(*valid),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(TracerError::MalformedResponse {
                source_id: self.id().to_string(),
                reason: format!("'valid' must be a boolean, got {}", other),
            }),
        }
    }
}

#[async_trait]
impl SourceClient for ValidatorClient {
    fn id(&self) -> &str {
        self.http.name()
    }

    fn module(&self) -> Module {
        Module::Validate
    }

    async fn lookup(&self, number: &PhoneNumber, timeout: Duration) -> Result<LookupResult> {
        let payload = self.http.fetch(number, timeout).await?;
        let (mut fields, status) = normalize(self.id(), &payload, &FIELDS)?;

        if let Some(value) = fields.get("valid") {
            let valid = self.coerce_valid(value)?;
            fields.insert("valid".to_string(), Value::Bool(valid));
        }

        Ok(LookupResult::new(self.id(), Module::Validate, status, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::TomlConfig;
    use crate::domain::model::LookupStatus;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ValidatorClient {
        let config = TomlConfig::from_toml_str(&format!(
            r#"
[[sources]]
name = "numverify"
module = "validate"
endpoint = "{}"
api_key = "nv-key"
api_key_param = "access_key"
"#,
            server.url("/api/validate")
        ))
        .unwrap();
        ValidatorClient::from_definition(&config.sources[0], Client::new()).unwrap()
    }

    #[tokio::test]
    async fn test_minimal_valid_response_is_success() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/validate")
                .query_param("number", "+14155552671")
                .query_param("access_key", "nv-key");
            then.status(200).json_body(json!({"valid": true, "country": "US"}));
        });

        let number = PhoneNumber::parse("+14155552671").unwrap();
        let result = client_for(&server)
            .lookup(&number, Duration::from_secs(5))
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(result.status, LookupStatus::Success);
        assert_eq!(result.field("valid"), Some(&json!(true)));
        assert_eq!(result.field("country"), Some(&json!("US")));
    }

    #[tokio::test]
    async fn test_numverify_shape_and_string_bool() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/validate");
            then.status(200).json_body(json!({
                "valid": "false",
                "country_code": "GB",
                "country_prefix": "+44",
                "line_type": "mobile"
            }));
        });

        let number = PhoneNumber::parse("+447911123456").unwrap();
        let result = client_for(&server)
            .lookup(&number, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.field("valid"), Some(&json!(false)));
        assert_eq!(result.field("country"), Some(&json!("GB")));
        assert_eq!(result.field("country_code"), Some(&json!("+44")));
        assert_eq!(result.field("line_type"), Some(&json!("mobile")));
    }

    #[tokio::test]
    async fn test_non_boolean_valid_is_malformed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/validate");
            then.status(200).json_body(json!({"valid": 3, "country": "US"}));
        });

        let number = PhoneNumber::parse("+14155552671").unwrap();
        let err = client_for(&server)
            .lookup(&number, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TracerError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_invalid_access_key_envelope() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/validate");
            then.status(200).json_body(json!({
                "success": false,
                "error": {"code": 101, "type": "invalid_access_key"}
            }));
        });

        let number = PhoneNumber::parse("+14155552671").unwrap();
        let err = client_for(&server)
            .lookup(&number, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TracerError::AuthError { ref source_id, .. } if source_id == "numverify"));
    }
}
