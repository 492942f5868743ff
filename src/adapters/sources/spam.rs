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

const FIELDS: [FieldSpec; 3] = [
    FieldSpec::new("score", &["spam_score", "fraud_score", "risk_score"], Presence::Required),
    FieldSpec::new("reports", &["report_count", "total_reports"], Presence::Expected),
    FieldSpec::new("categories", &["tags"], Presence::Optional),
];

/// 依分數（0-100）給出風險等級
pub fn risk_level(score: f64) -> &'static str {
    if score < 30.0 {
        "low"
    } else if score < 70.0 {
        "medium"
    } else {
        "high"
    }
}

/// 垃圾電話 / 詐騙回報查詢
#[derive(Debug, Clone)]
pub struct SpamCheckClient {
    http: HttpSource,
}

impl SpamCheckClient {
    pub fn from_definition(definition: &SourceDefinition, client: Client) -> Result<Self> {
        Ok(Self {
            http: HttpSource::from_definition(definition, client)?,
        })
    }

    fn parse_score(&self, value: &Value) -> Result<f64> {
        let score = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        score
            .filter(|score| (0.0..=100.0).contains(score))
            .ok_or_else(|| TracerError::MalformedResponse {
                source_id: self.id().to_string(),
                reason: format!("spam score {} is not a number between 0 and 100", value),
            })
    }
}

#[async_trait]
impl SourceClient for SpamCheckClient {
    fn id(&self) -> &str {
        self.http.name()
    }

    fn module(&self) -> Module {
        Module::Spam
    }

    async fn lookup(&self, number: &PhoneNumber, timeout: Duration) -> Result<LookupResult> {
        let payload = self.http.fetch(number, timeout).await?;
        let (mut fields, status) = normalize(self.id(), &payload, &FIELDS)?;

        let score = fields
            .get("score")
            .map(|value| self.parse_score(value))
            .transpose()?
            .unwrap_or_default();
        fields.insert("score".to_string(), Value::from(score));
        fields.insert("risk_level".to_string(), Value::from(risk_level(score)));

        Ok(LookupResult::new(self.id(), Module::Spam, status, fields))
    }
}
