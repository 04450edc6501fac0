use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data file not found: {path}")]
    DatasetNotFound { path: String },

    #[error("Unsupported dataset format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Field '{field}' holds a {kind}, which cannot be used as a number")]
    StructuralError { field: String, kind: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Data,
    Configuration,
    Integration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::IoError(_) | EtlError::DatasetNotFound { .. } => ErrorCategory::Io,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::UnsupportedFormat { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::StructuralError { .. } => ErrorCategory::Integration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 檔案可能稍後才產生，可重跑
            EtlError::DatasetNotFound { .. } => ErrorSeverity::Medium,
            EtlError::IoError(_) => ErrorSeverity::Critical,
            EtlError::StructuralError { .. } => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::DatasetNotFound { path } => format!(
                "Check that '{}' exists or point --data-dir at the directory holding the datasets",
                path
            ),
            EtlError::UnsupportedFormat { .. } => {
                "Convert the dataset to .csv, .json or .jsonl".to_string()
            }
            EtlError::CsvError(_) => "Make sure the CSV file has a header row and consistent columns".to_string(),
            EtlError::SerializationError(_) => "Validate the JSON dataset with a linter".to_string(),
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Review the configuration file or command line options".to_string()
            }
            EtlError::StructuralError { field, .. } => format!(
                "The upstream loader produced a nested value for '{}'; fix the dataset schema",
                field
            ),
            EtlError::IoError(_) => "Check file permissions and free disk space".to_string(),
            EtlError::ProcessingError { .. } => "Inspect the dataset with `scci inspect <file>`".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("Could not access a file: {}", self),
            ErrorCategory::Data => format!("The dataset could not be processed: {}", self),
            ErrorCategory::Configuration => format!("The configuration is invalid: {}", self),
            ErrorCategory::Integration => format!("Unexpected input shape: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
