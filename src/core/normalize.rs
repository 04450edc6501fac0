//! Row normalization into the canonical payload shapes.
//!
//! Source rows mix snake_case and camelCase column names. Each canonical key
//! reads the snake_case name first and falls back to the alternate name
//! through [`prefer_non_falsy`].

use crate::core::kpi::{coerce_number, KpiInput};
use crate::domain::model::Record;
use crate::utils::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `null`, `false`, numeric zero, `""`, `[]` and `{}`.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(obj) => obj.is_empty(),
    }
}

/// Returns `primary` when present and truthy, otherwise `fallback` as-is
/// (`Null` when absent).
///
/// A legitimate `0` under the primary name is replaced by the fallback.
/// Existing datasets depend on this, so it is kept; switching to "prefer
/// non-null" only needs the guard below changed.
pub fn prefer_non_falsy(primary: Option<&Value>, fallback: Option<&Value>) -> Value {
    match primary {
        Some(value) if !is_falsy(value) => value.clone(),
        _ => fallback.cloned().unwrap_or(Value::Null),
    }
}

fn resolve(row: &Record, key: &str, alternate: &str) -> Value {
    prefer_non_falsy(row.get(key), row.get(alternate))
}

fn copy(row: &Record, key: &str) -> Value {
    row.get(key).cloned().unwrap_or(Value::Null)
}

// 只要任一欄位名稱存在（不論值）就輸出該鍵
fn resolve_dimension(row: &Record, key: &str, alternate: &str) -> Option<Value> {
    if row.contains_key(key) || row.contains_key(alternate) {
        Some(resolve(row, key, alternate))
    } else {
        None
    }
}

// `null` 代表有收集但值未知，和缺少鍵要分開
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Canonical movement / telemetry payload.
///
/// `origin_county`, `destination_county` and `mode` are `None` when the
/// source dataset never collected that dimension; they are then left out of
/// the serialized payload instead of being written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMovementPayload {
    pub route_code: Value,
    pub week: Value,
    pub available: Value,
    pub loaded: Value,
    pub used: Value,
    pub total: Value,
    pub avg_stop_duration: Value,
    pub trips_over_five: Value,
    pub total_trips: Value,
    pub latitude: Value,
    pub longitude: Value,
    pub event_timestamp: Value,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub origin_county: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub destination_county: Option<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub mode: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPerformancePayload {
    pub route_code: Value,
    pub week: Value,
    pub performance_variation: Value,
}

pub fn normalize_movement(row: &Record) -> NormalizedMovementPayload {
    NormalizedMovementPayload {
        route_code: resolve(row, "route_code", "routeCode"),
        week: copy(row, "week"),
        available: copy(row, "available"),
        loaded: copy(row, "loaded"),
        used: copy(row, "used"),
        total: copy(row, "total"),
        avg_stop_duration: resolve(row, "avg_stop_duration", "avgStopDuration"),
        trips_over_five: resolve(row, "trips_over_five", "tripsOverFive"),
        total_trips: resolve(row, "total_trips", "totalTrips"),
        latitude: copy(row, "latitude"),
        longitude: copy(row, "longitude"),
        event_timestamp: resolve(row, "event_timestamp", "eventTimestamp"),
        origin_county: resolve_dimension(row, "origin_county", "originCounty"),
        destination_county: resolve_dimension(row, "destination_county", "destinationCounty"),
        mode: resolve_dimension(row, "mode", "transport_mode"),
    }
}

pub fn normalize_performance(row: &Record) -> NormalizedPerformancePayload {
    NormalizedPerformancePayload {
        route_code: resolve(row, "route_code", "routeCode"),
        week: copy(row, "week"),
        performance_variation: resolve(row, "performance_variation", "performanceVariation"),
    }
}

impl NormalizedMovementPayload {
    /// Flattens the payload back into a row keyed by canonical names.
    pub fn to_record(&self) -> Record {
        let mut record: Record = [
            ("route_code", self.route_code.clone()),
            ("week", self.week.clone()),
            ("available", self.available.clone()),
            ("loaded", self.loaded.clone()),
            ("used", self.used.clone()),
            ("total", self.total.clone()),
            ("avg_stop_duration", self.avg_stop_duration.clone()),
            ("trips_over_five", self.trips_over_five.clone()),
            ("total_trips", self.total_trips.clone()),
            ("latitude", self.latitude.clone()),
            ("longitude", self.longitude.clone()),
            ("event_timestamp", self.event_timestamp.clone()),
        ]
        .into_iter()
        .collect();

        let dimensions = [
            ("origin_county", &self.origin_county),
            ("destination_county", &self.destination_county),
            ("mode", &self.mode),
        ];
        for (key, value) in dimensions {
            if let Some(value) = value {
                record.data.insert(key.to_string(), value.clone());
            }
        }
        record
    }

    /// KPI inputs for this observation, with the performance variation taken
    /// from the matching performance payload when there is one.
    pub fn kpi_input(&self, performance: Option<&NormalizedPerformancePayload>) -> Result<KpiInput> {
        Ok(KpiInput {
            available: coerce_number("available", Some(&self.available))?,
            loaded: coerce_number("loaded", Some(&self.loaded))?,
            used: coerce_number("used", Some(&self.used))?,
            total: coerce_number("total", Some(&self.total))?,
            avg_stop_duration: coerce_number("avg_stop_duration", Some(&self.avg_stop_duration))?,
            trips_over_five: coerce_number("trips_over_five", Some(&self.trips_over_five))?,
            total_trips: coerce_number("total_trips", Some(&self.total_trips))?,
            performance_variation: match performance {
                Some(p) => coerce_number("performance_variation", Some(&p.performance_variation))?,
                None => None,
            },
        })
    }
}

impl NormalizedPerformancePayload {
    pub fn to_record(&self) -> Record {
        [
            ("route_code", self.route_code.clone()),
            ("week", self.week.clone()),
            ("performance_variation", self.performance_variation.clone()),
        ]
        .into_iter()
        .collect()
    }
}
