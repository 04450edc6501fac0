use crate::core::normalize::{NormalizedMovementPayload, NormalizedPerformancePayload};
use crate::core::report::RouteKpiReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 一筆原始資料列，欄位命名可能是 snake_case 或 camelCase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(obj: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            data: obj.into_iter().collect(),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, serde_json::Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, serde_json::Value)>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Rows pulled from both datasets during extract.
#[derive(Debug, Clone, Default)]
pub struct DatasetRows {
    pub movements: Vec<Record>,
    pub performances: Vec<Record>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub movements: Vec<NormalizedMovementPayload>,
    pub performances: Vec<NormalizedPerformancePayload>,
    pub reports: Vec<RouteKpiReport>,
    pub csv_output: String,
    pub json_output: String,
}
