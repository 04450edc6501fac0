use crate::core::dataset::{load_dataset, DatasetPaths};
use crate::core::kpi::Precision;
use crate::core::normalize::{
    normalize_movement, normalize_performance, NormalizedMovementPayload, NormalizedPerformancePayload,
};
use crate::core::report::{build_reports, value_text, RouteKpiReport};
use crate::core::{ConfigProvider, DatasetRows, Pipeline, Storage, TransformResult};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use std::path::Path;

pub const SUMMARY_CSV: &str = "kpi_summary.csv";
pub const SUMMARY_JSON: &str = "kpi_summary.json";
pub const PAYLOADS_JSON: &str = "payloads.json";

/// Marker written in place of an undefined KPI.
pub const UNDEFINED_MARKER: &str = "N/A";

pub struct KpiPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> KpiPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn precision(&self) -> Precision {
        Precision::new(self.config.precision())
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    /// Extracts both datasets and normalizes them, without computing reports.
    pub async fn load_payloads(
        &self,
    ) -> Result<(Vec<NormalizedMovementPayload>, Vec<NormalizedPerformancePayload>)> {
        let rows = self.extract().await?;
        Ok(normalize_rows(&rows))
    }
}

pub fn normalize_rows(
    data: &DatasetRows,
) -> (Vec<NormalizedMovementPayload>, Vec<NormalizedPerformancePayload>) {
    (
        data.movements.iter().map(normalize_movement).collect(),
        data.performances.iter().map(normalize_performance).collect(),
    )
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    generated_at: String,
    precision: u32,
    reports: &'a [RouteKpiReport],
}

#[derive(Serialize)]
struct PayloadDocument<'a> {
    movements: &'a [NormalizedMovementPayload],
    performances: &'a [NormalizedPerformancePayload],
}

pub fn format_kpi(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => UNDEFINED_MARKER.to_string(),
    }
}

/// `route_code,week,sdei,sdcui,sii,rpi`, one line per report.
pub fn render_csv(reports: &[RouteKpiReport]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["route_code", "week", "sdei", "sdcui", "sii", "rpi"])?;

    for report in reports {
        let mut line = vec![
            value_text(&report.route_code).unwrap_or_default(),
            value_text(&report.week).unwrap_or_default(),
        ];
        line.extend(report.kpis.entries().iter().map(|(_, v)| format_kpi(*v)));
        writer.write_record(&line)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
        message: format!("CSV output is not UTF-8: {}", e),
    })
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for KpiPipeline<S, C> {
    async fn extract(&self) -> Result<DatasetRows> {
        let paths = DatasetPaths::new(self.config.movement_file(), self.config.performance_file())
            .resolve(self.config.data_dir());
        let limit = self.config.row_limit();

        let movements = load_dataset(&self.storage, &paths.movement, limit).await?;

        // 沒有績效資料時 RPI 皆為未定義，其餘指標照常計算
        let performances = match load_dataset(&self.storage, &paths.performance, limit).await {
            Ok(rows) => rows,
            Err(EtlError::DatasetNotFound { path }) => {
                tracing::warn!("⚠️ Performance dataset not found at {}, RPI will be undefined", path);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            "Extracted {} movement rows and {} performance rows",
            movements.len(),
            performances.len()
        );

        Ok(DatasetRows {
            movements,
            performances,
        })
    }

    async fn transform(&self, data: DatasetRows) -> Result<TransformResult> {
        let (movements, performances) = normalize_rows(&data);

        let missing_routes = movements
            .iter()
            .filter(|m| value_text(&m.route_code).is_none())
            .count();
        if missing_routes > 0 {
            tracing::warn!("⚠️ {} movement rows have no route code", missing_routes);
        }

        let precision = self.precision();
        let reports = build_reports(&movements, &performances, precision)?;

        let csv_output = render_csv(&reports)?;
        let json_output = serde_json::to_string_pretty(&SummaryDocument {
            generated_at: chrono::Utc::now().to_rfc3339(),
            precision: precision.digits(),
            reports: &reports,
        })?;

        Ok(TransformResult {
            movements,
            performances,
            reports,
            csv_output,
            json_output,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        for format in self.config.output_formats() {
            let (name, body) = match format.as_str() {
                "csv" => (SUMMARY_CSV, &result.csv_output),
                "json" => (SUMMARY_JSON, &result.json_output),
                other => {
                    return Err(EtlError::InvalidConfigValueError {
                        field: "output_formats".to_string(),
                        value: other.to_string(),
                        reason: "Unsupported format. Valid formats: csv, json".to_string(),
                    })
                }
            };
            let path = self.output_file(name);
            tracing::debug!("Writing {} ({} bytes)", path, body.len());
            self.storage.write_file(&path, body.as_bytes()).await?;
        }

        let payloads = serde_json::to_string_pretty(&PayloadDocument {
            movements: &result.movements,
            performances: &result.performances,
        })?;
        let path = self.output_file(PAYLOADS_JSON);
        self.storage.write_file(&path, payloads.as_bytes()).await?;

        Ok(self.config.output_path().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kpi::KpiResult;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn put(&self, path: &str, data: &str) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.as_bytes().to_vec());
        }

        async fn get_file(&self, path: &str) -> Option<String> {
            let files = self.files.lock().await;
            files
                .get(path)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files
                .get(path)
                .cloned()
                .ok_or_else(|| EtlError::DatasetNotFound {
                    path: path.to_string(),
                })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        output_formats: Vec<String>,
        precision: u32,
        row_limit: Option<usize>,
    }

    impl MockConfig {
        fn new() -> Self {
            Self {
                output_formats: vec!["csv".to_string(), "json".to_string()],
                precision: 4,
                row_limit: None,
            }
        }
    }

    impl ConfigProvider for MockConfig {
        fn data_dir(&self) -> &str {
            "data"
        }

        fn movement_file(&self) -> &str {
            "moves.csv"
        }

        fn performance_file(&self) -> &str {
            "perf.json"
        }

        fn output_path(&self) -> &str {
            "out"
        }

        fn precision(&self) -> u32 {
            self.precision
        }

        fn output_formats(&self) -> &[String] {
            &self.output_formats
        }

        fn row_limit(&self) -> Option<usize> {
            self.row_limit
        }
    }

    const MOVES: &str = "routeCode,week,available,loaded,used,total,avgStopDuration,tripsOverFive,totalTrips,origin_county\n\
LA-PHX,7,80,100,45,100,12.5,30,120,06037\n\
SD-TUS,8,10,0,,,,,,06073\n";

    const PERF: &str = r#"[{"routeCode": "LA-PHX", "week": "7", "performanceVariation": -0.0732}]"#;

    async fn seeded_storage() -> MockStorage {
        let storage = MockStorage::new();
        storage.put("data/moves.csv", MOVES).await;
        storage.put("data/perf.json", PERF).await;
        storage
    }

    #[tokio::test]
    async fn test_extract_reads_both_datasets() {
        let pipeline = KpiPipeline::new(seeded_storage().await, MockConfig::new());
        let rows = pipeline.extract().await.unwrap();

        assert_eq!(rows.movements.len(), 2);
        assert_eq!(rows.performances.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_respects_row_limit() {
        let mut config = MockConfig::new();
        config.row_limit = Some(1);
        let pipeline = KpiPipeline::new(seeded_storage().await, config);

        let rows = pipeline.extract().await.unwrap();
        assert_eq!(rows.movements.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_missing_movement_dataset_fails() {
        let pipeline = KpiPipeline::new(MockStorage::new(), MockConfig::new());
        let err = pipeline.extract().await.unwrap_err();
        assert!(matches!(err, EtlError::DatasetNotFound { ref path } if path == "data/moves.csv"));
    }

    #[tokio::test]
    async fn test_extract_tolerates_missing_performance_dataset() {
        let storage = MockStorage::new();
        storage.put("data/moves.csv", MOVES).await;
        let pipeline = KpiPipeline::new(storage, MockConfig::new());

        let rows = pipeline.extract().await.unwrap();
        assert_eq!(rows.movements.len(), 2);
        assert!(rows.performances.is_empty());
    }

    #[tokio::test]
    async fn test_transform_computes_reports() {
        let pipeline = KpiPipeline::new(seeded_storage().await, MockConfig::new());
        let rows = pipeline.extract().await.unwrap();
        let result = pipeline.transform(rows).await.unwrap();

        assert_eq!(result.reports.len(), 2);
        assert_eq!(
            result.reports[0].kpis,
            KpiResult {
                sdei: Some(0.8),
                sdcui: Some(0.45),
                sii: Some(3.125),
                rpi: Some(-0.0732),
            }
        );
        assert!(result.reports[1].kpis.is_all_undefined());

        let lines: Vec<&str> = result.csv_output.lines().collect();
        assert_eq!(lines[0], "route_code,week,sdei,sdcui,sii,rpi");
        assert_eq!(lines[1], "LA-PHX,7,0.8,0.45,3.125,-0.0732");
        assert_eq!(lines[2], "SD-TUS,8,N/A,N/A,N/A,N/A");

        let doc: serde_json::Value = serde_json::from_str(&result.json_output).unwrap();
        assert_eq!(doc["precision"], 4);
        assert_eq!(doc["reports"][1]["sdei"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_load_writes_selected_formats() {
        let storage = seeded_storage().await;
        let mut config = MockConfig::new();
        config.output_formats = vec!["csv".to_string()];
        let pipeline = KpiPipeline::new(storage.clone(), config);

        let rows = pipeline.extract().await.unwrap();
        let result = pipeline.transform(rows).await.unwrap();
        let output = pipeline.load(result).await.unwrap();

        assert_eq!(output, "out");
        assert!(storage.get_file("out/kpi_summary.csv").await.is_some());
        assert!(storage.get_file("out/kpi_summary.json").await.is_none());

        let payloads = storage.get_file("out/payloads.json").await.unwrap();
        let doc: serde_json::Value = serde_json::from_str(&payloads).unwrap();
        assert_eq!(doc["movements"][0]["route_code"], "LA-PHX");
        assert_eq!(doc["movements"][0]["origin_county"], "06037");
        assert!(doc["movements"][0].get("mode").is_none());
        assert_eq!(doc["performances"][0]["performance_variation"], -0.0732);
    }

    #[test]
    fn test_render_csv_empty() {
        assert_eq!(render_csv(&[]).unwrap(), "route_code,week,sdei,sdcui,sii,rpi\n");
    }
}
