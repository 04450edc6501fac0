//! Capacity KPI formulas.
//!
//! Every metric returns `Option<f64>`: `None` means the value is undefined
//! (missing input, zero denominator, non-numeric input) and must never be
//! rendered as `0`.

use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_PRECISION: u32 = 4;

/// Number of decimal digits kept in every KPI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precision(u32);

impl Precision {
    pub const fn new(digits: u32) -> Self {
        Self(digits)
    }

    pub const fn digits(self) -> u32 {
        self.0
    }

    /// Rounds exact ties to even on the scaled value. Non-finite input has no
    /// rounded value.
    pub fn round(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }

        let factor = 10f64.powi(i32::try_from(self.0).unwrap_or(i32::MAX));
        let scaled = value * factor;
        if !factor.is_finite() || !scaled.is_finite() {
            // 位數超過 f64 能表示的範圍，原值已是最精確的結果
            return Some(value);
        }

        Some(scaled.round_ties_even() / factor)
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self(DEFAULT_PRECISION)
    }
}

impl From<u32> for Precision {
    fn from(digits: u32) -> Self {
        Self(digits)
    }
}

/// Division that never fails: a missing operand, a zero denominator or a
/// non-finite operand yields `None`.
pub fn safe_divide(
    numerator: Option<f64>,
    denominator: Option<f64>,
    precision: Precision,
) -> Option<f64> {
    let numerator = numerator.filter(|n| n.is_finite())?;
    let denominator = denominator.filter(|d| d.is_finite())?;
    if denominator == 0.0 {
        return None;
    }

    precision.round(numerator / denominator)
}

/// Supply-Demand Equilibrium Index: available / loaded.
pub fn sdei(available: Option<f64>, loaded: Option<f64>, precision: Precision) -> Option<f64> {
    safe_divide(available, loaded, precision)
}

/// Supply-Demand Capacity Utilization Index: used / total.
pub fn sdcui(used: Option<f64>, total: Option<f64>, precision: Precision) -> Option<f64> {
    safe_divide(used, total, precision)
}

/// Stop Intensity Index: avg stop duration × (trips over five minutes / total trips).
///
/// The stop ratio is rounded before it is multiplied.
pub fn sii(
    avg_stop_duration: Option<f64>,
    trips_over_five: Option<f64>,
    total_trips: Option<f64>,
    precision: Precision,
) -> Option<f64> {
    let stop_ratio = safe_divide(trips_over_five, total_trips, precision)?;
    let avg_stop_duration = avg_stop_duration.filter(|v| v.is_finite())?;

    precision.round(avg_stop_duration * stop_ratio)
}

/// Route Performance Index: the performance variation, rounded.
pub fn rpi(performance_variation: Option<f64>, precision: Precision) -> Option<f64> {
    performance_variation.and_then(|v| precision.round(v))
}

/// Raw observations for one route at one week.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiInput {
    pub available: Option<f64>,
    pub loaded: Option<f64>,
    pub used: Option<f64>,
    pub total: Option<f64>,
    pub avg_stop_duration: Option<f64>,
    pub trips_over_five: Option<f64>,
    pub total_trips: Option<f64>,
    pub performance_variation: Option<f64>,
}

impl KpiInput {
    /// Builds the typed input from a loosely typed row keyed by the
    /// canonical field names. Unknown keys are ignored.
    pub fn from_map(data: &HashMap<String, Value>) -> Result<Self> {
        let field = |name: &str| coerce_number(name, data.get(name));

        Ok(Self {
            available: field("available")?,
            loaded: field("loaded")?,
            used: field("used")?,
            total: field("total")?,
            avg_stop_duration: field("avg_stop_duration")?,
            trips_over_five: field("trips_over_five")?,
            total_trips: field("total_trips")?,
            performance_variation: field("performance_variation")?,
        })
    }

    pub fn from_record(record: &Record) -> Result<Self> {
        Self::from_map(&record.data)
    }
}

/// Coerces one loosely typed value into a number.
///
/// `Ok(None)` covers absence and failed coercion; arrays and objects are a
/// caller bug and come back as [`EtlError::StructuralError`].
pub fn coerce_number(field: &str, value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64().filter(|v| v.is_finite())),
        Some(Value::Bool(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Some(Value::String(s)) => Ok(s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())),
        Some(Value::Array(_)) => Err(EtlError::StructuralError {
            field: field.to_string(),
            kind: "array".to_string(),
        }),
        Some(Value::Object(_)) => Err(EtlError::StructuralError {
            field: field.to_string(),
            kind: "object".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiResult {
    pub sdei: Option<f64>,
    pub sdcui: Option<f64>,
    pub sii: Option<f64>,
    pub rpi: Option<f64>,
}

impl KpiResult {
    pub fn entries(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("sdei", self.sdei),
            ("sdcui", self.sdcui),
            ("sii", self.sii),
            ("rpi", self.rpi),
        ]
    }

    pub fn is_all_undefined(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }
}

/// Either shape accepted by [`summarize_source`].
#[derive(Debug, Clone, Copy)]
pub enum KpiSource<'a> {
    Mapping(&'a Record),
    Typed(KpiInput),
}

impl KpiSource<'_> {
    pub fn into_input(self) -> Result<KpiInput> {
        match self {
            KpiSource::Mapping(record) => KpiInput::from_record(record),
            KpiSource::Typed(input) => Ok(input),
        }
    }
}

impl<'a> From<&'a Record> for KpiSource<'a> {
    fn from(record: &'a Record) -> Self {
        KpiSource::Mapping(record)
    }
}

impl From<KpiInput> for KpiSource<'_> {
    fn from(input: KpiInput) -> Self {
        KpiSource::Typed(input)
    }
}

/// Computes all four KPIs. Each metric only sees its own inputs, so one
/// missing field never hides an unrelated metric.
pub fn summarize(input: &KpiInput, precision: Precision) -> KpiResult {
    KpiResult {
        sdei: sdei(input.available, input.loaded, precision),
        sdcui: sdcui(input.used, input.total, precision),
        sii: sii(
            input.avg_stop_duration,
            input.trips_over_five,
            input.total_trips,
            precision,
        ),
        rpi: rpi(input.performance_variation, precision),
    }
}

pub fn summarize_source<'a>(
    source: impl Into<KpiSource<'a>>,
    precision: Precision,
) -> Result<KpiResult> {
    let input = source.into().into_input()?;
    Ok(summarize(&input, precision))
}
