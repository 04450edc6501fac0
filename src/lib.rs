pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};
pub use config::{toml_config::TomlConfig, LocalStorage};

pub use core::kpi::{summarize, KpiInput, KpiResult, Precision};
pub use core::normalize::{normalize_movement, normalize_performance};
pub use core::{etl::EtlEngine, pipeline::KpiPipeline};
pub use domain::model::Record;
pub use utils::error::{EtlError, Result};
