use crate::core::kpi::{self, KpiInput, KpiResult, Precision};
use crate::core::normalize::{NormalizedMovementPayload, NormalizedPerformancePayload};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// KPIs for one route at one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteKpiReport {
    pub route_code: Value,
    pub week: Value,
    #[serde(flatten)]
    pub kpis: KpiResult,
    pub raw: KpiInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub week: Value,
    pub sdei: Option<f64>,
    pub sdcui: Option<f64>,
    pub sii: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub code: String,
    pub origin: Option<Value>,
    pub destination: Option<Value>,
    pub mode: Option<Value>,
    pub weeks: Vec<String>,
}

/// Text form of a scalar cell; `None` for null, empty text and nested values.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn canonical_week(text: &str) -> String {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => n.to_string(),
        _ => text.to_string(),
    }
}

fn week_key(value: &Value) -> Option<String> {
    value_text(value).map(|text| canonical_week(&text))
}

/// Stored weeks may be text or numbers: `"7"`, `7` and `7.0` are the same week.
pub fn week_matches(value: &Value, wanted: &str) -> bool {
    week_key(value).is_some_and(|key| key == canonical_week(wanted))
}

fn route_matches(value: &Value, route: &str) -> bool {
    value_text(value).is_some_and(|code| code == route.trim())
}

#[derive(Debug)]
enum WeekKey {
    Number(f64),
    Text(String),
    Missing,
}

impl WeekKey {
    fn of(value: &Value) -> Self {
        let Some(text) = value_text(value) else {
            return WeekKey::Missing;
        };
        match text.parse::<f64>() {
            Ok(n) if n.is_finite() => WeekKey::Number(n),
            _ => WeekKey::Text(text),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            WeekKey::Number(_) => 0,
            WeekKey::Text(_) => 1,
            WeekKey::Missing => 2,
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        match (self, other) {
            (WeekKey::Number(a), WeekKey::Number(b)) => a.total_cmp(b),
            (WeekKey::Text(a), WeekKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Numeric weeks first in numeric order, then text weeks in text order, then
/// rows without a week.
pub fn compare_weeks(a: &Value, b: &Value) -> Ordering {
    WeekKey::of(a).order(&WeekKey::of(b))
}

/// Performance rows keyed by (route, week); the first row for a key wins.
pub struct PerformanceIndex<'a> {
    rows: HashMap<(String, String), &'a NormalizedPerformancePayload>,
}

impl<'a> PerformanceIndex<'a> {
    pub fn new(performances: &'a [NormalizedPerformancePayload]) -> Self {
        let mut rows = HashMap::new();
        for payload in performances {
            if let (Some(route), Some(week)) = (value_text(&payload.route_code), week_key(&payload.week)) {
                rows.entry((route, week)).or_insert(payload);
            }
        }
        Self { rows }
    }

    pub fn get(&self, route_code: &Value, week: &Value) -> Option<&'a NormalizedPerformancePayload> {
        let key = (value_text(route_code)?, week_key(week)?);
        self.rows.get(&key).copied()
    }
}

pub fn report_for(
    movement: &NormalizedMovementPayload,
    performance: Option<&NormalizedPerformancePayload>,
    precision: Precision,
) -> Result<RouteKpiReport> {
    let raw = movement.kpi_input(performance)?;
    Ok(RouteKpiReport {
        route_code: movement.route_code.clone(),
        week: movement.week.clone(),
        kpis: kpi::summarize(&raw, precision),
        raw,
    })
}

/// One report per movement row, in input order.
pub fn build_reports(
    movements: &[NormalizedMovementPayload],
    performances: &[NormalizedPerformancePayload],
    precision: Precision,
) -> Result<Vec<RouteKpiReport>> {
    let index = PerformanceIndex::new(performances);
    movements
        .iter()
        .map(|movement| {
            let performance = index.get(&movement.route_code, &movement.week);
            report_for(movement, performance, precision)
        })
        .collect()
}

/// KPIs for a single route/week, or `None` when no movement row exists for it.
pub fn route_kpis(
    movements: &[NormalizedMovementPayload],
    performances: &[NormalizedPerformancePayload],
    route: &str,
    week: &str,
    precision: Precision,
) -> Result<Option<RouteKpiReport>> {
    let Some(movement) = movements
        .iter()
        .find(|m| route_matches(&m.route_code, route) && week_matches(&m.week, week))
    else {
        return Ok(None);
    };

    let performance = performances
        .iter()
        .find(|p| route_matches(&p.route_code, route) && week_matches(&p.week, week));

    report_for(movement, performance, precision).map(Some)
}

/// Week-by-week SDEI / SDCUI / SII for one route. An empty `weeks` slice keeps
/// every week.
pub fn kpi_trend(
    movements: &[NormalizedMovementPayload],
    route: &str,
    weeks: &[String],
    precision: Precision,
) -> Result<Vec<TrendPoint>> {
    let mut selected: Vec<&NormalizedMovementPayload> = movements
        .iter()
        .filter(|m| route_matches(&m.route_code, route))
        .filter(|m| weeks.is_empty() || weeks.iter().any(|w| week_matches(&m.week, w)))
        .collect();
    selected.sort_by(|a, b| compare_weeks(&a.week, &b.week));

    selected
        .into_iter()
        .map(|movement| -> Result<TrendPoint> {
            let input = movement.kpi_input(None)?;
            let kpis = kpi::summarize(&input, precision);
            Ok(TrendPoint {
                week: movement.week.clone(),
                sdei: kpis.sdei,
                sdcui: kpis.sdcui,
                sii: kpis.sii,
            })
        })
        .collect()
}

// 同一路線的維度與週次彙整
struct RouteAccumulator {
    summary: RouteSummary,
    seen: HashSet<String>,
    weeks: Vec<Value>,
}

impl RouteAccumulator {
    fn new(code: String) -> Self {
        Self {
            summary: RouteSummary {
                code,
                origin: None,
                destination: None,
                mode: None,
                weeks: Vec::new(),
            },
            seen: HashSet::new(),
            weeks: Vec::new(),
        }
    }

    fn add(&mut self, movement: &NormalizedMovementPayload) {
        fill_dimension(&mut self.summary.origin, &movement.origin_county);
        fill_dimension(&mut self.summary.destination, &movement.destination_county);
        fill_dimension(&mut self.summary.mode, &movement.mode);

        if let Some(key) = week_key(&movement.week) {
            if self.seen.insert(key) {
                self.weeks.push(movement.week.clone());
            }
        }
    }

    fn finish(mut self) -> RouteSummary {
        self.weeks.sort_by(compare_weeks);
        self.summary.weeks = self.weeks.iter().filter_map(value_text).collect();
        self.summary
    }
}

/// Route catalogue sorted by route code. Rows without a route code are skipped.
pub fn list_routes(movements: &[NormalizedMovementPayload]) -> Vec<RouteSummary> {
    let mut routes: BTreeMap<String, RouteAccumulator> = BTreeMap::new();

    for movement in movements {
        let Some(code) = value_text(&movement.route_code) else {
            continue;
        };
        routes
            .entry(code.clone())
            .or_insert_with(|| RouteAccumulator::new(code))
            .add(movement);
    }

    routes.into_values().map(RouteAccumulator::finish).collect()
}

// 第一個非 null 的值為準
fn fill_dimension(slot: &mut Option<Value>, candidate: &Option<Value>) {
    let Some(value) = candidate else {
        return;
    };
    match slot {
        None => *slot = Some(value.clone()),
        Some(current) if current.is_null() && !value.is_null() => *slot = Some(value.clone()),
        _ => {}
    }
}

/// One recorded position of a vehicle on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub latitude: Value,
    pub longitude: Value,
    pub event_timestamp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTelemetry {
    pub route: RouteSummary,
    pub telemetry: Vec<TelemetryPoint>,
}

// RFC 3339 或 "YYYY-MM-DD HH:MM:SS" 依時間排序，其餘文字排在後面，缺值最後
fn timestamp_key(value: &Value) -> (u8, i64, String) {
    let Some(text) = value_text(value) else {
        return (2, 0, String::new());
    };

    let parsed = chrono::DateTime::parse_from_rfc3339(&text)
        .map(|ts| ts.timestamp_micros())
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S")
                .map(|ts| ts.and_utc().timestamp_micros())
        });

    match parsed {
        Ok(micros) => (0, micros, text),
        Err(_) => (1, 0, text),
    }
}

/// Route dimensions plus every telemetry point of the route, oldest first.
/// `None` when no movement row carries the route code.
pub fn route_telemetry(movements: &[NormalizedMovementPayload], route: &str) -> Option<RouteTelemetry> {
    let rows: Vec<&NormalizedMovementPayload> = movements
        .iter()
        .filter(|m| route_matches(&m.route_code, route))
        .collect();
    let first = rows.first()?;

    let mut accumulator = RouteAccumulator::new(value_text(&first.route_code)?);
    for movement in &rows {
        accumulator.add(movement);
    }

    let mut telemetry: Vec<TelemetryPoint> = rows
        .iter()
        .map(|m| TelemetryPoint {
            latitude: m.latitude.clone(),
            longitude: m.longitude.clone(),
            event_timestamp: m.event_timestamp.clone(),
        })
        .collect();
    telemetry.sort_by_cached_key(|point| timestamp_key(&point.event_timestamp));

    Some(RouteTelemetry {
        route: accumulator.finish(),
        telemetry,
    })
}
