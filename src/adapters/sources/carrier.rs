use super::{normalize, FieldSpec, Presence};
use crate::adapters::http::HttpSource;
use crate::config::toml_config::SourceDefinition;
use crate::domain::model::{LookupResult, Module};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::SourceClient;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const FIELDS: [FieldSpec; 4] = [
    FieldSpec::new("carrier", &["carrier.name", "carrier_name", "operator"], Presence::Required),
    FieldSpec::new("line_type", &["type", "line_type_intelligence.type"], Presence::Expected),
    FieldSpec::new("mcc", &["carrier.mcc", "mobile_country_code"], Presence::Optional),
    FieldSpec::new("mnc", &["carrier.mnc", "mobile_network_code"], Presence::Optional),
];

/// 電信業者與線路類型查詢
#[derive(Debug, Clone)]
pub struct CarrierClient {
    http: HttpSource,
}

impl CarrierClient {
    pub fn from_definition(definition: &SourceDefinition, client: Client) -> Result<Self> {
        Ok(Self {
            http: HttpSource::from_definition(definition, client)?,
        })
    }
}

#[async_trait]
impl SourceClient for CarrierClient {
    fn id(&self) -> &str {
        self.http.name()
    }

    fn module(&self) -> Module {
        Module::Carrier
    }

    async fn lookup(&self, number: &PhoneNumber, timeout: Duration) -> Result<LookupResult> {
        let payload = self.http.fetch(number, timeout).await?;
        let (fields, status) = normalize(self.id(), &payload, &FIELDS)?;
        Ok(LookupResult::new(self.id(), Module::Carrier, status, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::toml_config::TomlConfig;
    use crate::domain::model::LookupStatus;
    use crate::utils::error::TracerError;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> CarrierClient {
        let config = TomlConfig::from_toml_str(&format!(
            r#"
[[sources]]
name = "abstract-carrier"
module = "carrier"
endpoint = "{}"
api_key = "test-key"
api_key_param = "api_key"
number_param = "phone"
"#,
            server.url("/v1/")
        ))
        .unwrap();
        CarrierClient::from_definition(&config.sources[0], Client::new()).unwrap()
    }

    #[tokio::test]
    async fn test_carrier_lookup_normalizes_fields() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/")
                .query_param("phone", "+14155552671")
                .query_param("api_key", "test-key");
            then.status(200).json_body(json!({
                "phone": "14155552671",
                "valid": true,
                "carrier": "AT&T Mobility LLC",
                "type": "mobile"
            }));
        });

        let client = client_for(&server);
        let number = PhoneNumber::parse("+1 (415) 555-2671").unwrap();
        let result = client.lookup(&number, Duration::from_secs(5)).await.unwrap();

        api_mock.assert();
        assert_eq!(result.source, "abstract-carrier");
        assert_eq!(result.module, Module::Carrier);
        assert_eq!(result.status, LookupStatus::Success);
        assert_eq!(result.field("carrier"), Some(&json!("AT&T Mobility LLC")));
        assert_eq!(result.field("line_type"), Some(&json!("mobile")));
        assert!(result.field("mcc").is_none());
    }

    #[tokio::test]
    async fn test_missing_line_type_is_partial() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/");
            then.status(200)
                .json_body(json!({"carrier": {"name": "Vodafone", "mcc": "262", "mnc": "02"}}));
        });

        let number = PhoneNumber::parse("+4915123456789").unwrap();
        let result = client_for(&server)
            .lookup(&number, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(result.status, LookupStatus::Partial);
        assert_eq!(result.field("carrier"), Some(&json!("Vodafone")));
        assert_eq!(result.field("mcc"), Some(&json!("262")));
    }

    #[tokio::test]
    async fn test_missing_carrier_is_malformed() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/");
            then.status(200).json_body(json!({"type": "landline"}));
        });

        let number = PhoneNumber::parse("+14155552671").unwrap();
        let err = client_for(&server)
            .lookup(&number, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TracerError::MalformedResponse { .. }));
    }
}
