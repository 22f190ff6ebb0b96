//! Cloud order folding.
//!
//! Orders arrive in a nested envelope; items carry their money in whichever
//! of several fields this backend version felt like filling. Deleted orders
//! are dropped here, at ingestion, before any accumulator sees them.

use crate::types::{DishMetric, OrderItem, OrderRecord, PeriodTotals, Row, StaffMetric};
use crate::utils::helpers::safe_parse_float;
use serde_json::Value;
use std::collections::BTreeMap;

/// Position of the hour in an ISO-like timestamp: `2026-08-01T13:45:00`.
const HOUR_SLICE: (usize, usize) = (11, 13);

#[derive(Debug, Clone, Default)]
pub struct OrderMetrics {
    pub dishes: BTreeMap<String, DishMetric>,
    pub staff: BTreeMap<String, StaffMetric>,
    pub orders_by_hour: BTreeMap<u32, u64>,
    pub totals: PeriodTotals,
    pub excluded_deleted: u64,
}

#[derive(Debug, Default)]
pub struct OrderAggregator {
    dishes: BTreeMap<String, DishMetric>,
    staff: BTreeMap<String, StaffMetric>,
    orders_by_hour: BTreeMap<u32, u64>,
    revenue: f64,
    orders: u64,
    excluded_deleted: u64,
}

impl OrderAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unwraps the `ordersByOrganizations[].orders[]` envelope and ingests
    /// every order found. Returns how many orders were ingested.
    pub fn ingest_envelope(&mut self, payload: &Value) -> usize {
        let mut ingested = 0;
        let organizations = payload
            .get("ordersByOrganizations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_else(|| {
                // Some responses skip the per-organization level.
                payload
                    .get("orders")
                    .and_then(Value::as_array)
                    .map(|orders| vec![serde_json::json!({ "orders": orders })])
                    .unwrap_or_default()
            });

        for organization in &organizations {
            let orders = organization
                .get("orders")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for entry in &orders {
                if let Some(record) = Self::parse_order(entry) {
                    if record.is_deleted {
                        self.excluded_deleted += 1;
                        continue;
                    }
                    self.ingest_order(&record);
                    ingested += 1;
                }
            }
        }
        ingested
    }

    /// Parses one envelope entry. The order body may sit directly in the
    /// entry or under an inner `order` key.
    pub fn parse_order(entry: &Value) -> Option<OrderRecord> {
        let body = entry.get("order").unwrap_or(entry);
        if !body.is_object() {
            return None;
        }

        let id = string_at(entry, &["id"])
            .or_else(|| string_at(body, &["id", "number"]))
            .unwrap_or_default();

        let is_deleted = bool_at(entry, &["isDeleted", "deleted"])
            || bool_at(body, &["isDeleted", "deleted"]);

        let waiter = body
            .get("waiter")
            .map(|w| match w {
                Value::String(s) => s.clone(),
                other => string_at(other, &["name"]).unwrap_or_default(),
            })
            .unwrap_or_default();

        let created_at = string_at(body, &["whenCreated", "createdAt", "date"]).unwrap_or_default();

        let items = body
            .get("items")
            .and_then(Value::as_array)
            .map(|items| items.iter().map(Self::parse_item).collect())
            .unwrap_or_default();

        let sum = number_at(body, &["sum", "resultSum"]);

        Some(OrderRecord {
            id,
            items,
            sum,
            waiter,
            created_at,
            is_deleted,
        })
    }

    fn parse_item(value: &Value) -> OrderItem {
        let name = string_at(value, &["name"])
            .or_else(|| value.get("product").and_then(|p| string_at(p, &["name"])))
            .unwrap_or_default();
        let group = string_at(value, &["productGroupName", "groupName"]).unwrap_or_default();
        OrderItem {
            name,
            group,
            amount: number_at(value, &["amount", "quantity"]).max(0.0),
            price: number_at(value, &["price"]),
            cost: number_at(value, &["cost"]),
            result_sum: number_at(value, &["resultSum"]),
            sum: number_at(value, &["sum"]),
        }
    }

    /// Money for one line item: the first strictly positive of
    /// {cost, resultSum, sum, price×amount}.
    fn item_sum(item: &OrderItem) -> f64 {
        for candidate in [
            item.cost,
            item.result_sum,
            item.sum,
            item.price * item.amount,
        ] {
            if candidate > 0.0 {
                return candidate;
            }
        }
        0.0
    }

    /// Folds one non-deleted order into the accumulators.
    pub fn ingest_order(&mut self, order: &OrderRecord) {
        debug_assert!(!order.is_deleted, "deleted orders must not reach ingestion");

        let mut order_revenue = 0.0;
        for item in &order.items {
            let item_revenue = Self::item_sum(item);
            order_revenue += item_revenue;

            if !item.name.is_empty() {
                let qty = if item.amount > 0.0 { item.amount } else { 1.0 };
                let metric = self.dishes.entry(item.name.clone()).or_insert_with(|| {
                    DishMetric {
                        name: item.name.clone(),
                        group: item.group.clone(),
                        qty: 0.0,
                        revenue: 0.0,
                    }
                });
                metric.qty += qty;
                metric.revenue += item_revenue;
            }
        }

        // Items carried no usable money: fall back to the order-level sum.
        if order_revenue <= 0.0 {
            order_revenue = order.sum.max(0.0);
        }

        self.revenue += order_revenue;
        self.orders += 1;

        if !order.waiter.is_empty() {
            let staff = self
                .staff
                .entry(order.waiter.clone())
                .or_insert_with(|| StaffMetric {
                    name: order.waiter.clone(),
                    orders_count: 0,
                    revenue: 0.0,
                });
            staff.orders_count += 1;
            staff.revenue += order_revenue;
        }

        if let Some(hour) = extract_hour(&order.created_at) {
            *self.orders_by_hour.entry(hour).or_insert(0) += 1;
        }
    }

    pub fn finish(self) -> OrderMetrics {
        OrderMetrics {
            dishes: self.dishes,
            staff: self.staff,
            orders_by_hour: self.orders_by_hour,
            totals: PeriodTotals::from_parts(self.revenue, self.orders),
            excluded_deleted: self.excluded_deleted,
        }
    }

    pub fn excluded_deleted(&self) -> u64 {
        self.excluded_deleted
    }
}

/// Hour from the fixed position of an ISO-like timestamp; `None` when the
/// string is too short or not numeric there.
fn extract_hour(timestamp: &str) -> Option<u32> {
    let slice = timestamp.get(HOUR_SLICE.0..HOUR_SLICE.1)?;
    let hour: u32 = slice.parse().ok()?;
    (hour < 24).then_some(hour)
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(*key).and_then(Value::as_str) {
            if !s.trim().is_empty() {
                return Some(s.trim().to_string());
            }
        }
    }
    None
}

fn number_at(value: &Value, keys: &[&str]) -> f64 {
    for key in keys {
        if let Some(v) = value.get(*key) {
            let parsed = safe_parse_float(v, 0.0);
            if parsed != 0.0 {
                return parsed;
            }
        }
    }
    0.0
}

fn bool_at(value: &Value, keys: &[&str]) -> bool {
    keys.iter()
        .any(|key| value.get(*key).and_then(Value::as_bool).unwrap_or(false))
}
