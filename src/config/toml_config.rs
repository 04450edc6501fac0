use crate::core::dataset::{DEFAULT_MOVEMENT_FILE, DEFAULT_PERFORMANCE_FILE};
use crate::core::kpi::DEFAULT_PRECISION;
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate, DATASET_EXTENSIONS, MAX_PRECISION};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub datasets: DatasetsConfig,
    pub kpi: Option<KpiConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetsConfig {
    pub data_dir: String,
    pub movement: Option<String>,
    pub performance: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiConfig {
    pub precision: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_path("datasets.data_dir", &self.datasets.data_dir)?;
        validation::validate_path("load.output_path", &self.load.output_path)?;

        let files = vec![
            self.movement_file().to_string(),
            self.performance_file().to_string(),
        ];
        validation::validate_file_extensions("datasets", &files, DATASET_EXTENSIONS)?;

        if let Some(limit) = self.datasets.limit {
            validation::validate_positive_number("datasets.limit", limit, 1)?;
        }

        validation::validate_range("kpi.precision", self.precision(), 0, MAX_PRECISION)?;
        validation::validate_output_formats("load.output_formats", &self.load.output_formats)?;

        Ok(())
    }

    /// debug / trace 等級視為詳細輸出
    pub fn verbose_logging(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_level.as_deref())
            .is_some_and(|level| matches!(level.to_ascii_lowercase().as_str(), "debug" | "trace"))
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn data_dir(&self) -> &str {
        &self.datasets.data_dir
    }

    fn movement_file(&self) -> &str {
        self.datasets
            .movement
            .as_deref()
            .unwrap_or(DEFAULT_MOVEMENT_FILE)
    }

    fn performance_file(&self) -> &str {
        self.datasets
            .performance
            .as_deref()
            .unwrap_or(DEFAULT_PERFORMANCE_FILE)
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn precision(&self) -> u32 {
        self.kpi
            .as_ref()
            .and_then(|k| k.precision)
            .unwrap_or(DEFAULT_PRECISION)
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn row_limit(&self) -> Option<usize> {
        self.datasets.limit
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
