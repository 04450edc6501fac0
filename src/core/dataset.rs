use crate::core::Storage;
use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_MOVEMENT_FILE: &str = "county_pair_move_data.csv";
pub const DEFAULT_PERFORMANCE_FILE: &str = "transearch_data_sample.csv";

/// Dataset file names, relative to a data directory unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub movement: String,
    pub performance: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDatasetPaths {
    pub movement: PathBuf,
    pub performance: PathBuf,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            movement: DEFAULT_MOVEMENT_FILE.to_string(),
            performance: DEFAULT_PERFORMANCE_FILE.to_string(),
        }
    }
}

impl DatasetPaths {
    pub fn new(movement: impl Into<String>, performance: impl Into<String>) -> Self {
        Self {
            movement: movement.into(),
            performance: performance.into(),
        }
    }

    pub fn resolve(&self, data_dir: impl AsRef<Path>) -> ResolvedDatasetPaths {
        // Path::join 遇到絕對路徑會直接取代
        ResolvedDatasetPaths {
            movement: data_dir.as_ref().join(&self.movement),
            performance: data_dir.as_ref().join(&self.performance),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    Csv,
    Json,
    JsonLines,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(DatasetFormat::Csv),
            Some("json") => Ok(DatasetFormat::Json),
            Some("jsonl") | Some("ndjson") => Ok(DatasetFormat::JsonLines),
            _ => Err(EtlError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub path: String,
    pub fields: Vec<String>,
    pub row_count: usize,
    pub sample: Vec<Record>,
}

/// Types a CSV cell: empty → null, then integer, float, boolean, text.
///
/// Digits with a leading zero (county FIPS codes such as `06037`) stay text.
pub fn parse_cell(cell: &str) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }

    let digits = cell.strip_prefix('-').unwrap_or(cell);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if !leading_zero {
        if let Ok(n) = cell.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Some(n) = cell
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(n);
        }
    }

    match cell {
        "true" | "TRUE" | "True" => Value::Bool(true),
        "false" | "FALSE" | "False" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn parse_csv(bytes: &[u8], limit: Option<usize>) -> Result<(Vec<String>, Vec<Record>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();

    for result in reader.records() {
        if limit.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let record = result?;
        let row: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.clone(), parse_cell(cell)))
            .collect();
        rows.push(row);
    }

    Ok((headers, rows))
}

fn into_object(value: Value, position: usize) -> Result<Map<String, Value>> {
    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(EtlError::ProcessingError {
            message: format!("Row {} is not a JSON object: {}", position + 1, other),
        }),
    }
}

fn parse_json(bytes: &[u8], format: DatasetFormat) -> Result<Vec<Map<String, Value>>> {
    match format {
        DatasetFormat::Json => match serde_json::from_slice::<Value>(bytes)? {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| into_object(item, i))
                .collect(),
            Value::Object(obj) => Ok(vec![obj]),
            other => Err(EtlError::ProcessingError {
                message: format!("Expected an array of objects, found: {}", other),
            }),
        },
        _ => {
            let text = std::str::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
                message: format!("JSON lines dataset is not UTF-8: {}", e),
            })?;
            text.lines()
                .filter(|line| !line.trim().is_empty())
                .enumerate()
                .map(|(i, line)| -> Result<Map<String, Value>> {
                    into_object(serde_json::from_str(line)?, i)
                })
                .collect()
        }
    }
}

fn parse_with_fields(
    bytes: &[u8],
    format: DatasetFormat,
    limit: Option<usize>,
) -> Result<(Vec<String>, Vec<Record>)> {
    if format == DatasetFormat::Csv {
        return parse_csv(bytes, limit);
    }

    let mut objects = parse_json(bytes, format)?;
    if let Some(max) = limit {
        objects.truncate(max);
    }

    let mut fields: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !fields.contains(key) {
                fields.push(key.clone());
            }
        }
    }

    Ok((fields, objects.into_iter().map(Record::from).collect()))
}

pub fn parse_rows(bytes: &[u8], format: DatasetFormat, limit: Option<usize>) -> Result<Vec<Record>> {
    parse_with_fields(bytes, format, limit).map(|(_, rows)| rows)
}

/// Field names, total row count and the first `sample_size` rows.
pub fn summarize_dataset(path: &Path, bytes: &[u8], sample_size: usize) -> Result<DatasetSummary> {
    let format = DatasetFormat::from_path(path)?;
    let (fields, mut rows) = parse_with_fields(bytes, format, None)?;
    let row_count = rows.len();
    rows.truncate(sample_size);

    Ok(DatasetSummary {
        path: path.display().to_string(),
        fields,
        row_count,
        sample: rows,
    })
}

/// Reads and parses one dataset through the storage port.
pub async fn load_dataset<S: Storage>(storage: &S, path: &Path, limit: Option<usize>) -> Result<Vec<Record>> {
    let format = DatasetFormat::from_path(path)?;
    let path_str = path.to_string_lossy();

    tracing::debug!("📂 Reading dataset {} as {:?}", path_str, format);
    let bytes = storage.read_file(&path_str).await?;
    let rows = parse_rows(&bytes, format, limit)?;
    tracing::debug!("📂 Parsed {} rows from {}", rows.len(), path_str);

    Ok(rows)
}
