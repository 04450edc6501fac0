use crate::core::dataset::{DEFAULT_MOVEMENT_FILE, DEFAULT_PERFORMANCE_FILE};
use crate::core::kpi::DEFAULT_PRECISION;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate, DATASET_EXTENSIONS, MAX_PRECISION};
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "scci")]
#[command(about = "Supply chain capacity KPIs from movement and route performance datasets")]
pub struct CliConfig {
    /// Load settings from a TOML file instead of the options below
    #[arg(long)]
    pub config: Option<String>,

    #[arg(long, default_value = "./data")]
    pub data_dir: String,

    #[arg(long, default_value = DEFAULT_MOVEMENT_FILE)]
    pub movement_file: String,

    #[arg(long, default_value = DEFAULT_PERFORMANCE_FILE)]
    pub performance_file: String,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, default_value_t = DEFAULT_PRECISION, help = "Decimal digits kept in KPI values")]
    pub precision: u32,

    #[arg(long, help = "Read at most this many rows from each dataset")]
    pub limit: Option<usize>,

    #[arg(long = "format", value_delimiter = ',', default_values = ["csv", "json"])]
    pub output_formats: Vec<String>,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the pipeline and write the KPI summary files
    Run,
    /// Print the KPIs of one route at one week as JSON
    Kpis {
        #[arg(long)]
        route: String,
        #[arg(long)]
        week: String,
    },
    /// Print the week-by-week KPI trend of one route
    Trend {
        #[arg(long)]
        route: String,
        /// Only these weeks (comma separated)
        #[arg(long, value_delimiter = ',')]
        weeks: Vec<String>,
    },
    /// List routes with their counties, mode and weeks
    Routes,
    /// Print a route's dimensions and its telemetry points, oldest first
    Telemetry {
        #[arg(long)]
        route: String,
    },
    /// Show the fields and first rows of a dataset file
    Inspect {
        file: String,
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },
}

impl ConfigProvider for CliConfig {
    fn data_dir(&self) -> &str {
        &self.data_dir
    }

    fn movement_file(&self) -> &str {
        &self.movement_file
    }

    fn performance_file(&self) -> &str {
        &self.performance_file
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn precision(&self) -> u32 {
        self.precision
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn row_limit(&self) -> Option<usize> {
        self.limit
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("data_dir", &self.data_dir)?;
        validation::validate_path("output_path", &self.output_path)?;
        validation::validate_file_extensions(
            "movement_file",
            std::slice::from_ref(&self.movement_file),
            DATASET_EXTENSIONS,
        )?;
        validation::validate_file_extensions(
            "performance_file",
            std::slice::from_ref(&self.performance_file),
            DATASET_EXTENSIONS,
        )?;
        validation::validate_range("precision", self.precision, 0, MAX_PRECISION)?;
        validation::validate_output_formats("format", &self.output_formats)?;
        if let Some(limit) = self.limit {
            validation::validate_positive_number("limit", limit, 1)?;
        }
        Ok(())
    }
}
