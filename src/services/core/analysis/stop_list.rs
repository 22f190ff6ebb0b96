//! Stop-list partition.
//!
//! Stop-list rows carry product ids and balances; names and groups are
//! resolved through the product index, then every entry lands in one of
//! four buckets: {bar, kitchen} x {full stop, limited}.

use crate::services::core::analysis::category_classifier::{CategoryClassifier, StationClass};
use crate::services::core::infrastructure::catalog_cache::ProductIndex;
use crate::types::StopListEntry;
use crate::utils::helpers::safe_parse_float;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBucket {
    /// Balance at or below zero: the item cannot be sold at all.
    FullStop,
    /// Positive balance: the item is quantity-limited.
    Limited,
}

#[derive(Debug, Clone)]
pub struct ClassifiedStopItem {
    pub name: String,
    pub group: String,
    pub balance: f64,
    pub station: StationClass,
    pub bucket: StopBucket,
}

#[derive(Debug, Clone, Default)]
pub struct StopListReport {
    pub items: Vec<ClassifiedStopItem>,
}

impl StopListReport {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn of(&self, station: StationClass, bucket: StopBucket) -> Vec<&ClassifiedStopItem> {
        self.items
            .iter()
            .filter(|item| item.station == station && item.bucket == bucket)
            .collect()
    }
}

/// Walks the `terminalGroupStopLists[].items[].items[]` envelope.
pub fn parse_stop_list(payload: &Value) -> Vec<StopListEntry> {
    let mut entries = Vec::new();
    let organizations = payload
        .get("terminalGroupStopLists")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for organization in &organizations {
        let terminal_groups = organization
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for terminal_group in &terminal_groups {
            let items = terminal_group
                .get("items")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for item in &items {
                let product_id = item
                    .get("productId")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let name = item
                    .get("productName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if product_id.is_empty() && name.is_empty() {
                    continue;
                }
                let balance = item
                    .get("balance")
                    .map(|b| safe_parse_float(b, 0.0))
                    .unwrap_or(0.0);
                entries.push(StopListEntry {
                    product_id,
                    name,
                    balance,
                });
            }
        }
    }
    entries
}

/// Resolves names/groups through the catalog and classifies every entry.
pub fn classify_stop_list(entries: &[StopListEntry], index: &ProductIndex) -> StopListReport {
    let items = entries
        .iter()
        .map(|entry| {
            let info = index.lookup(&entry.product_id);
            let name = if !entry.name.is_empty() {
                entry.name.clone()
            } else if let Some(info) = info {
                info.name.clone()
            } else {
                entry.product_id.clone()
            };
            let group = info.map(|i| i.group.clone()).unwrap_or_default();
            let bucket = if entry.balance <= 0.0 {
                StopBucket::FullStop
            } else {
                StopBucket::Limited
            };
            ClassifiedStopItem {
                station: CategoryClassifier::classify(&name, &group),
                name,
                group,
                balance: entry.balance,
                bucket,
            }
        })
        .collect();
    StopListReport { items }
}
