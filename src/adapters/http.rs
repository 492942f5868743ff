use crate::config::toml_config::SourceDefinition;
use crate::domain::phone::PhoneNumber;
use crate::utils::error::{Result, TracerError};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// 所有 HTTP 來源共用的請求與錯誤轉換邏輯
#[derive(Debug, Clone)]
pub struct HttpSource {
    name: String,
    endpoint: String,
    api_key: Option<String>,
    api_key_param: Option<String>,
    api_key_header: Option<String>,
    number_param: String,
    headers: HashMap<String, String>,
    parameters: HashMap<String, String>,
    field_mapping: HashMap<String, String>,
    timeout: Option<Duration>,
    client: Client,
}

impl HttpSource {
    pub fn from_definition(definition: &SourceDefinition, client: Client) -> Result<Self> {
        let endpoint = definition
            .endpoint
            .clone()
            .ok_or_else(|| TracerError::MissingConfigError {
                field: format!("sources.{}.endpoint", definition.name),
            })?;

        Ok(Self {
            name: definition.name.clone(),
            endpoint,
            api_key: definition.has_api_key().then(|| definition.api_key.clone()).flatten(),
            api_key_param: definition.api_key_param.clone(),
            api_key_header: definition.api_key_header.clone(),
            number_param: definition
                .number_param
                .clone()
                .unwrap_or_else(|| "number".to_string()),
            headers: definition.headers.clone().unwrap_or_default(),
            parameters: definition.parameters.clone().unwrap_or_default(),
            field_mapping: definition.field_mapping.clone().unwrap_or_default(),
            timeout: definition.timeout.map(Duration::from_secs),
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 呼叫來源並回傳（已套用 field_mapping 的）JSON 物件
    pub async fn fetch(&self, number: &PhoneNumber, timeout: Duration) -> Result<Map<String, Value>> {
        let uses_key = self.api_key_param.is_some() || self.api_key_header.is_some();
        if uses_key && self.api_key.is_none() {
            return Err(TracerError::AuthError {
                source_id: self.name.clone(),
                message: "API key is not configured".to_string(),
            });
        }

        let endpoint = self.build_endpoint(number);
        let mut request = self.client.get(&endpoint);

        if !self.endpoint.contains("{number}") && !self.endpoint.contains("{e164}") {
            request = request.query(&[(self.number_param.as_str(), number.format())]);
        }

        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        for (key, value) in &self.parameters {
            request = request.query(&[(key, value)]);
        }

        if let Some(api_key) = &self.api_key {
            if let Some(param) = &self.api_key_param {
                request = request.query(&[(param, api_key)]);
            }
            if let Some(header) = &self.api_key_header {
                request = request.header(header, api_key);
            }
        }

        let timeout = self.timeout.map_or(timeout, |own| own.min(timeout));
        request = request.timeout(timeout);

        tracing::debug!("📡 {}: Making API request to: {}", self.name, endpoint);

        let response = request.send().await.map_err(|e| self.transport_error(e, timeout))?;
        let status = response.status();
        tracing::debug!("📡 {}: API response status: {}", self.name, status);

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(self.status_error(status, retry_after));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e, timeout))?;
        let payload: Value = serde_json::from_str(&body).map_err(|e| TracerError::MalformedResponse {
            source_id: self.name.clone(),
            reason: format!("invalid JSON: {}", e),
        })?;

        let Value::Object(object) = payload else {
            return Err(TracerError::MalformedResponse {
                source_id: self.name.clone(),
                reason: "expected a JSON object".to_string(),
            });
        };

        if let Some(error) = self.envelope_error(&object) {
            return Err(error);
        }

        Ok(self.apply_field_mapping(object))
    }

    fn build_endpoint(&self, number: &PhoneNumber) -> String {
        self.endpoint
            .replace("{number}", &number.digits())
            .replace("{e164}", &number.format())
    }

    fn apply_field_mapping(&self, object: Map<String, Value>) -> Map<String, Value> {
        if self.field_mapping.is_empty() {
            return object;
        }

        object
            .into_iter()
            .map(|(original_key, value)| {
                let mapped_key = self
                    .field_mapping
                    .get(&original_key)
                    .cloned()
                    .unwrap_or(original_key);
                (mapped_key, value)
            })
            .collect()
    }

    fn transport_error(&self, error: reqwest::Error, timeout: Duration) -> TracerError {
        if error.is_timeout() {
            TracerError::Timeout {
                scope: format!("source '{}'", self.name),
                after: timeout,
            }
        } else if error.is_decode() {
            TracerError::MalformedResponse {
                source_id: self.name.clone(),
                reason: error.to_string(),
            }
        } else {
            TracerError::SourceUnavailable {
                source_id: self.name.clone(),
                reason: error.to_string(),
            }
        }
    }

    fn status_error(&self, status: StatusCode, retry_after: Option<Duration>) -> TracerError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TracerError::AuthError {
                source_id: self.name.clone(),
                message: format!("HTTP {}", status),
            },
            StatusCode::TOO_MANY_REQUESTS => TracerError::RateLimited {
                source_id: self.name.clone(),
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            },
            _ => TracerError::SourceUnavailable {
                source_id: self.name.clone(),
                reason: format!("HTTP {}", status),
            },
        }
    }

    /// 轉換 `{"success": false, "error": {...}}` 形式的錯誤回應
    fn envelope_error(&self, object: &Map<String, Value>) -> Option<TracerError> {
        let failed = object.get("success") == Some(&Value::Bool(false));
        let error = object.get("error").filter(|e| match e {
            Value::Object(_) => true,
            Value::String(s) => !s.trim().is_empty(),
            Value::Bool(flag) => *flag,
            _ => false,
        });
        if !failed && error.is_none() {
            return None;
        }

        let code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_i64);
        let detail = error
            .and_then(|e| {
                e.get("info")
                    .or_else(|| e.get("message"))
                    .or_else(|| e.get("type"))
                    .and_then(Value::as_str)
                    .or_else(|| e.as_str())
            })
            .unwrap_or("source reported an error")
            .to_string();
        let kind = error
            .and_then(|e| e.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_ascii_lowercase();

        let is_auth = matches!(code, Some(101) | Some(102))
            || kind.contains("access_key")
            || kind.contains("api_key")
            || kind.contains("unauthorized");
        let is_limit = matches!(code, Some(104) | Some(106))
            || kind.contains("limit")
            || kind.contains("quota");

        Some(if is_auth {
            TracerError::AuthError {
                source_id: self.name.clone(),
                message: detail,
            }
        } else if is_limit {
            TracerError::RateLimited {
                source_id: self.name.clone(),
                retry_after: DEFAULT_RETRY_AFTER,
            }
        } else {
            TracerError::SourceUnavailable {
                source_id: self.name.clone(),
                reason: detail,
            }
        })
    }
}
