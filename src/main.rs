use clap::{CommandFactory, Parser};
use phone_tracer::config::toml_config::{TomlConfig, DEFAULT_CONFIG_FILE};
use phone_tracer::utils::error::TracerError;
use phone_tracer::utils::logger;
use phone_tracer::{AppConfig, CliConfig, LocalStorage, Payload, TraceEngine};
use std::path::Path;

const BANNER: &str = r#"
    ╔═══════════════════════════════════════════════╗
    ║          PhoneTracer                          ║
    ║   OSINT Tool for Phone Number Intelligence    ║
    ╚═══════════════════════════════════════════════╝
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 設定要先載入，`settings.verbose` 才能影響日誌等級；此時錯誤只能印到 stderr
    let config = load_config(&cli).unwrap_or_else(|e| fail(&e));

    // 初始化日誌
    logger::init_cli_logger(config.verbose, cli.log_json);
    eprintln!("{}", BANNER);

    match cli.config.as_deref() {
        Some(path) if !Path::new(path).exists() => {
            tracing::warn!("⚠️ Config file {} not found. Using defaults.", path)
        }
        Some(path) => tracing::info!("📁 Loaded configuration from: {}", path),
        None => tracing::debug!("No --config given, using ./{} or defaults", DEFAULT_CONFIG_FILE),
    }
    tracing::debug!("Effective config: {:?}", config);

    if cli.phone_number.is_none() && cli.batch.is_none() {
        CliConfig::command().print_help()?;
        std::process::exit(1);
    }

    let storage = LocalStorage::new(".".to_string());
    let engine = TraceEngine::from_config(&config, storage).unwrap_or_else(|e| fail(&e));

    let outcome = tokio::select! {
        outcome = run(&cli, &config, &engine) => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n[!] Operation cancelled by user");
            std::process::exit(130);
        }
    };

    match outcome {
        Ok(true) => {
            tracing::info!("✅ Trace completed successfully");
            eprintln!("\n[✓] Operation completed successfully");
            Ok(())
        }
        Ok(false) => {
            tracing::warn!("⚠️ Trace finished with failures");
            eprintln!("\n[!] Operation finished with failures; see the report for details");
            std::process::exit(1);
        }
        Err(e) => fail(&e),
    }
}

/// 讀設定檔、套用命令列覆蓋並驗證
fn load_config(cli: &CliConfig) -> phone_tracer::Result<AppConfig> {
    let toml = TomlConfig::load(cli.config.as_deref())?;
    let mut config = AppConfig::from_toml(&toml)?;
    cli.apply(&mut config)?;
    Ok(config)
}

async fn run(
    cli: &CliConfig,
    config: &AppConfig,
    engine: &TraceEngine<LocalStorage>,
) -> phone_tracer::Result<bool> {
    if let Some(batch) = &cli.batch {
        let summary = engine.trace_batch_file(batch, &config.modules).await?;
        for rejected in &summary.rejected {
            eprintln!(
                "[✗] Line {}: '{}' rejected: {}",
                rejected.line, rejected.input, rejected.reason
            );
        }
        engine.deliver(Payload::Batch(&summary.reports)).await?;
        return Ok(summary.success());
    }

    let raw = cli.phone_number.as_deref().unwrap_or_default();
    eprintln!("[*] Processing: {}", raw);
    let report = engine.trace(raw, &config.modules).await?;
    engine.deliver(Payload::Single(&report)).await?;
    Ok(report.success)
}

fn fail(error: &TracerError) -> ! {
    tracing::error!(
        "❌ Trace failed: {} (Category: {:?}, Severity: {:?})",
        error,
        error.category(),
        error.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());

    eprintln!("❌ {}", error.user_friendly_message());
    eprintln!("💡 {}", error.recovery_suggestion());

    std::process::exit(error.severity().exit_code())
}
