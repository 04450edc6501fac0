use anyhow::Result;
use scci_etl::core::pipeline::{PAYLOADS_JSON, SUMMARY_CSV, SUMMARY_JSON};
use scci_etl::core::report::{kpi_trend, list_routes, route_kpis, route_telemetry};
use scci_etl::{CliConfig, Command, EtlEngine, KpiPipeline, LocalStorage, Precision, TomlConfig};
use tempfile::TempDir;

const MOVEMENTS_CSV: &str = "\
route_code,week,available,loaded,used,total,avg_stop_duration,trips_over_five,total_trips,latitude,longitude,event_timestamp,origin_county,destination_county
LA-PHX,1,80,100,45,100,12.5,30,120,34.05,-118.24,2024-01-01T08:00:00Z,06037,04013
LA-PHX,2,90,0,50,100,10,0,0,34.05,-118.24,2024-01-08T08:00:00Z,06037,04013
SD-TUS,1,1,3,2,3,5,1,4,32.71,-117.16,2024-01-01T09:00:00Z,06073,04019
";

const PERFORMANCE_JSONL: &str = r#"{"routeCode": "LA-PHX", "week": "1", "performanceVariation": -0.0732}
{"routeCode": "SD-TUS", "week": "1", "performanceVariation": 0.015}
"#;

fn write_datasets(dir: &TempDir) -> Result<()> {
    std::fs::write(dir.path().join("moves.csv"), MOVEMENTS_CSV)?;
    std::fs::write(dir.path().join("perf.jsonl"), PERFORMANCE_JSONL)?;
    Ok(())
}

fn cli_config(data_dir: &TempDir, output_dir: &TempDir) -> CliConfig {
    CliConfig {
        config: None,
        data_dir: data_dir.path().to_string_lossy().into_owned(),
        movement_file: "moves.csv".to_string(),
        performance_file: "perf.jsonl".to_string(),
        output_path: output_dir.path().to_string_lossy().into_owned(),
        precision: 4,
        limit: None,
        output_formats: vec!["csv".to_string(), "json".to_string()],
        json_logs: false,
        verbose: false,
        command: Command::Run,
    }
}

#[tokio::test]
async fn test_end_to_end_pipeline_writes_summary() -> Result<()> {
    let data_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    write_datasets(&data_dir)?;

    let pipeline = KpiPipeline::new(LocalStorage::default(), cli_config(&data_dir, &output_dir));
    let engine = EtlEngine::new(pipeline);
    let output_path = engine.run().await?;

    assert_eq!(output_path, output_dir.path().to_string_lossy());

    let csv = std::fs::read_to_string(output_dir.path().join(SUMMARY_CSV))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "route_code,week,sdei,sdcui,sii,rpi");
    assert_eq!(lines[1], "LA-PHX,1,0.8,0.45,3.125,-0.0732");
    assert_eq!(lines[2], "LA-PHX,2,N/A,0.5,N/A,N/A");
    assert_eq!(lines[3], "SD-TUS,1,0.3333,0.6667,1.25,0.015");

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.path().join(SUMMARY_JSON))?)?;
    assert_eq!(summary["reports"].as_array().map(Vec::len), Some(3));
    assert_eq!(summary["reports"][1]["sdei"], serde_json::Value::Null);
    assert!(summary["generated_at"].is_string());

    let payloads: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output_dir.path().join(PAYLOADS_JSON))?)?;
    assert_eq!(payloads["movements"][2]["origin_county"], "06073");
    assert!(payloads["movements"][0].get("mode").is_none());
    assert_eq!(payloads["performances"][0]["route_code"], "LA-PHX");

    Ok(())
}

#[tokio::test]
async fn test_missing_movement_dataset_fails() -> Result<()> {
    let data_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;

    let pipeline = KpiPipeline::new(LocalStorage::default(), cli_config(&data_dir, &output_dir));
    let err = EtlEngine::new(pipeline).run().await.unwrap_err();

    assert!(matches!(err, scci_etl::EtlError::DatasetNotFound { .. }));
    assert!(!output_dir.path().join(SUMMARY_CSV).exists());
    Ok(())
}

#[tokio::test]
async fn test_route_queries_over_loaded_payloads() -> Result<()> {
    let data_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    write_datasets(&data_dir)?;

    let pipeline = KpiPipeline::new(LocalStorage::default(), cli_config(&data_dir, &output_dir));
    let (movements, performances) = pipeline.load_payloads().await?;

    let report = route_kpis(&movements, &performances, "SD-TUS", "1", Precision::default())?
        .expect("SD-TUS week 1 exists");
    assert_eq!(report.kpis.sii, Some(1.25));
    assert_eq!(report.kpis.rpi, Some(0.015));

    assert!(route_kpis(&movements, &performances, "SD-TUS", "2", Precision::default())?.is_none());

    let trend = kpi_trend(&movements, "LA-PHX", &[], Precision::new(2))?;
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[0].sdei, Some(0.8));
    assert_eq!(trend[1].sdcui, Some(0.5));

    let routes = list_routes(&movements);
    let codes: Vec<&str> = routes.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["LA-PHX", "SD-TUS"]);
    assert_eq!(routes[0].weeks, vec!["1", "2"]);
    assert_eq!(routes[0].destination, Some(serde_json::json!("04013")));

    let telemetry = route_telemetry(&movements, "LA-PHX").expect("LA-PHX has telemetry");
    assert_eq!(telemetry.route.origin, Some(serde_json::json!("06037")));
    let stamps: Vec<_> = telemetry
        .telemetry
        .iter()
        .map(|p| p.event_timestamp.clone())
        .collect();
    assert_eq!(
        stamps,
        vec![
            serde_json::json!("2024-01-01T08:00:00Z"),
            serde_json::json!("2024-01-08T08:00:00Z")
        ]
    );
    assert_eq!(telemetry.telemetry[0].longitude, serde_json::json!(-118.24));

    Ok(())
}

#[tokio::test]
async fn test_toml_config_drives_pipeline() -> Result<()> {
    let data_dir = TempDir::new()?;
    let output_dir = TempDir::new()?;
    write_datasets(&data_dir)?;

    let config_content = format!(
        r#"
[pipeline]
name = "weekly"

[datasets]
data_dir = "{}"
movement = "moves.csv"
performance = "perf.jsonl"
limit = 1

[kpi]
precision = 2

[load]
output_path = "{}"
output_formats = ["csv"]
"#,
        data_dir.path().to_string_lossy().replace('\\', "/"),
        output_dir.path().to_string_lossy().replace('\\', "/")
    );
    let config_path = data_dir.path().join("scci.toml");
    tokio::fs::write(&config_path, config_content).await?;

    let config = TomlConfig::from_file(&config_path)?;
    let engine = EtlEngine::new(KpiPipeline::new(LocalStorage::default(), config));
    engine.run().await?;

    let csv = std::fs::read_to_string(output_dir.path().join(SUMMARY_CSV))?;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["route_code,week,sdei,sdcui,sii,rpi", "LA-PHX,1,0.8,0.45,3.12,-0.07"]);
    assert!(!output_dir.path().join(SUMMARY_JSON).exists());

    Ok(())
}
