use anyhow::Result;
use httpmock::prelude::*;
use phone_tracer::config::toml_config::TomlConfig;
use phone_tracer::utils::error::ErrorCategory;
use phone_tracer::{
    AppConfig, ExportFormat, LocalStorage, LookupStatus, Module, Payload, TraceEngine, TracerError,
};
use serde_json::json;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn engine_for(config_toml: &str, temp_dir: &TempDir) -> Result<(AppConfig, TraceEngine<LocalStorage>)> {
    let toml = TomlConfig::from_toml_str(config_toml)?;
    let config = AppConfig::from_toml(&toml)?;
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let engine = TraceEngine::from_config(&config, storage)?;
    Ok((config, engine))
}

#[tokio::test]
async fn test_validate_module_end_to_end() -> Result<()> {
    let server = MockServer::start();
    let validate_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/validate")
            .query_param("number", "+14155552671")
            .query_param("access_key", "test-key");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"valid": true, "country": "US"}));
    });

    let temp_dir = TempDir::new()?;
    let (_, engine) = engine_for(
        &format!(
            r#"
[settings]
default_modules = ["validate"]

[[sources]]
name = "numverify"
module = "validate"
endpoint = "{}"
api_key = "test-key"
api_key_param = "access_key"
"#,
            server.url("/api/validate")
        ),
        &temp_dir,
    )?;

    let report = engine.trace("+14155552671", &[Module::Validate]).await?;

    validate_mock.assert();
    assert!(report.success);
    assert!(report.errors.is_empty());
    let validate = report.module(Module::Validate).unwrap();
    assert_eq!(validate.status, LookupStatus::Success);
    assert_eq!(validate.source.as_deref(), Some("numverify"));
    assert!(!validate.from_cache);

    // second query is answered from the cache
    let again = engine.trace("+1 415 555 2671", &[Module::Validate]).await?;
    validate_mock.assert_hits(1);
    assert!(again.module(Module::Validate).unwrap().from_cache);

    Ok(())
}

#[tokio::test]
async fn test_partial_failure_keeps_other_modules() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/carrier");
        then.status(200)
            .json_body(json!({"carrier": "T-Mobile", "line_type": "mobile"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/spam");
        then.status(503);
    });

    let temp_dir = TempDir::new()?;
    let (_, engine) = engine_for(
        &format!(
            r#"
[[sources]]
name = "carrier-api"
module = "carrier"
endpoint = "{}"

[[sources]]
name = "spamdb"
module = "spam"
endpoint = "{}"
"#,
            server.url("/carrier"),
            server.url("/spam")
        ),
        &temp_dir,
    )?;

    let report = engine
        .trace("+14155552671", &[Module::Carrier, Module::Spam])
        .await?;

    assert!(!report.success);
    assert_eq!(report.modules.len(), 2);
    assert!(report.module(Module::Carrier).unwrap().success());

    let spam = report.module(Module::Spam).unwrap();
    assert_eq!(spam.status, LookupStatus::Failed);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].category, ErrorCategory::SourceUnavailable);
    assert_eq!(report.errors[0].source.as_deref(), Some("spamdb"));

    Ok(())
}

#[tokio::test]
async fn test_fallback_to_next_source_after_auth_failure() -> Result<()> {
    let server = MockServer::start();
    let primary = server.mock(|when, then| {
        when.method(GET).path("/primary");
        then.status(401);
    });
    let secondary = server.mock(|when, then| {
        when.method(GET).path("/secondary");
        then.status(200).json_body(json!({
            "country": {"code": "DE", "name": "Germany"},
            "location": {"city": "Berlin"}
        }));
    });

    let temp_dir = TempDir::new()?;
    let (_, engine) = engine_for(
        &format!(
            r#"
[[sources]]
name = "geo-primary"
module = "geolocation"
endpoint = "{}"

[[sources]]
name = "geo-secondary"
module = "geolocation"
endpoint = "{}"
"#,
            server.url("/primary"),
            server.url("/secondary")
        ),
        &temp_dir,
    )?;

    let report = engine.trace("+49 30 1234567", &[Module::Geolocation]).await?;

    primary.assert_hits(1);
    secondary.assert_hits(1);
    assert!(report.success);
    let geo = report.module(Module::Geolocation).unwrap();
    assert_eq!(geo.source.as_deref(), Some("geo-secondary"));
    assert_eq!(geo.errors.len(), 1);
    assert_eq!(geo.errors[0].category, ErrorCategory::Auth);
    assert_eq!(
        geo.result.as_ref().unwrap().field("city"),
        Some(&json!("Berlin"))
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_optional_key_fails_without_network() -> Result<()> {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/carrier");
        then.status(200).json_body(json!({"carrier": "AT&T"}));
    });

    let temp_dir = TempDir::new()?;
    let (_, engine) = engine_for(
        &format!(
            r#"
[[sources]]
name = "keyed-carrier"
module = "carrier"
endpoint = "{}"
api_key = "${{PHONE_TRACER_TEST_KEY_THAT_IS_NEVER_SET}}"
api_key_param = "api_key"
"#,
            server.url("/carrier")
        ),
        &temp_dir,
    )?;

    let report = engine.trace("+14155552671", &[Module::Carrier]).await?;

    api_mock.assert_hits(0);
    assert!(!report.success);
    assert_eq!(report.errors[0].category, ErrorCategory::Auth);
    Ok(())
}

#[tokio::test]
async fn test_invalid_input_and_unconfigured_modules() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let (_, engine) = engine_for("", &temp_dir)?;

    let invalid = engine.trace("12345", &[Module::Validate]).await;
    assert_err!(&invalid);
    assert!(matches!(invalid, Err(TracerError::InvalidFormat { .. })));

    // default sources only serve validate and social
    let fatal = engine.trace("+14155552671", &[Module::Spam]).await;
    assert!(matches!(fatal, Err(TracerError::ConfigError { .. })));

    let report = assert_ok!(engine.trace("+14155552671", &[Module::Validate, Module::Social]).await);
    assert!(report.success);
    Ok(())
}

#[tokio::test]
async fn test_batch_run_writes_single_document() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/spam");
        then.status(200).json_body(json!({"score": 72, "reports": 9}));
    });

    let temp_dir = TempDir::new()?;
    std::fs::write(
        temp_dir.path().join("numbers.txt"),
        "# suspicious callers\n+14155552671\n\n555-CALL-NOW\n+442079460958\n",
    )?;

    let (config, engine) = engine_for(
        &format!(
            r#"
[settings]
default_format = "csv"
save_to_file = true
output_dir = "reports"

[[sources]]
name = "spamdb"
module = "spam"
endpoint = "{}"
"#,
            server.url("/spam")
        ),
        &temp_dir,
    )?;
    assert_eq!(config.formats, vec![ExportFormat::Csv]);

    let summary = engine.trace_batch_file("numbers.txt", &[Module::Spam]).await?;
    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.rejected.len(), 1);
    assert_eq!(summary.rejected[0].line, 4);
    assert!(!summary.success());

    let written = engine.deliver(Payload::Batch(&summary.reports)).await?;
    assert_eq!(written.len(), 1);

    let csv_text = std::fs::read_to_string(temp_dir.path().join("reports/batch.csv"))?;
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;
    assert!(rows.iter().any(|row| &row[0] == "+14155552671" && &row[5] == "risk_level" && &row[6] == "high"));
    assert!(rows.iter().any(|row| &row[0] == "+442079460958"));

    Ok(())
}
