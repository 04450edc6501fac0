use clap::Parser;
use scci_etl::core::dataset::summarize_dataset;
use scci_etl::core::report::{kpi_trend, list_routes, route_kpis, route_telemetry};
use scci_etl::core::{ConfigProvider, Storage};
use scci_etl::utils::error::ErrorSeverity;
use scci_etl::utils::{logger, validation::{self, Validate}};
use scci_etl::{CliConfig, Command, EtlEngine, EtlError, KpiPipeline, LocalStorage, TomlConfig};
use std::path::Path;

/// Exit code when the requested route or route/week has no movement data.
const EXIT_NOT_FOUND: i32 = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // TOML 配置優先於命令列選項
    let toml_config = match &cli.config {
        Some(path) => match TomlConfig::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path, e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(1);
            }
        },
        None => None,
    };

    // 初始化日誌
    let verbose = cli.verbose || toml_config.as_ref().is_some_and(|c| c.verbose_logging());
    let json_logs = cli.json_logs || toml_config.as_ref().is_some_and(|c| c.json_logs());
    if json_logs {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Starting scci");
    if verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let command = cli.command.clone();
    let outcome = match toml_config {
        Some(config) => {
            tracing::info!("📁 Using configuration '{}'", config.pipeline.name);
            execute(config, command).await
        }
        None => execute(cli, command).await,
    };

    match outcome {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!(
                "❌ scci failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), EtlError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute<C>(config: C, command: Command) -> Result<i32, EtlError>
where
    C: ConfigProvider + Validate,
{
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        return Err(e);
    }

    let storage = LocalStorage::default();

    match command {
        Command::Run => {
            let engine = EtlEngine::new(KpiPipeline::new(storage, config));
            let output_path = engine.run().await?;
            println!("✅ KPI summary written to: {}", output_path);
        }
        Command::Kpis { route, week } => {
            validation::validate_non_empty_string("route", &route)?;
            validation::validate_non_empty_string("week", &week)?;

            let pipeline = KpiPipeline::new(storage, config);
            let (movements, performances) = pipeline.load_payloads().await?;
            match route_kpis(&movements, &performances, &route, &week, pipeline.precision())? {
                Some(report) => print_json(&report)?,
                None => {
                    tracing::warn!("No movement data for route {} week {}", route, week);
                    eprintln!("❌ No movement data for route '{}' week '{}'", route, week);
                    return Ok(EXIT_NOT_FOUND);
                }
            }
        }
        Command::Trend { route, weeks } => {
            validation::validate_non_empty_string("route", &route)?;

            let pipeline = KpiPipeline::new(storage, config);
            let (movements, _) = pipeline.load_payloads().await?;
            let trend = kpi_trend(&movements, &route, &weeks, pipeline.precision())?;
            tracing::info!("📈 {} weeks for route {}", trend.len(), route);
            print_json(&trend)?;
        }
        Command::Routes => {
            let pipeline = KpiPipeline::new(storage, config);
            let (movements, _) = pipeline.load_payloads().await?;
            print_json(&list_routes(&movements))?;
        }
        Command::Telemetry { route } => {
            validation::validate_non_empty_string("route", &route)?;

            let pipeline = KpiPipeline::new(storage, config);
            let (movements, _) = pipeline.load_payloads().await?;
            match route_telemetry(&movements, &route) {
                Some(telemetry) => {
                    tracing::info!("🗺️ {} telemetry points for route {}", telemetry.telemetry.len(), route);
                    print_json(&telemetry)?;
                }
                None => {
                    tracing::warn!("Route {} not found", route);
                    eprintln!("❌ Route '{}' not found", route);
                    return Ok(EXIT_NOT_FOUND);
                }
            }
        }
        Command::Inspect { file, sample } => {
            let bytes = storage.read_file(&file).await?;
            let summary = summarize_dataset(Path::new(&file), &bytes, sample)?;
            tracing::info!("🔍 {} has {} rows", summary.path, summary.row_count);
            print_json(&summary)?;
        }
    }

    Ok(0)
}
