// src/types.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One normalized backend row: column key -> scalar value.
///
/// Keys are whatever the backend returned (English API names or localized
/// display labels), never assumed canonical. `FieldResolver` maps them to
/// logical fields.
pub type Row = BTreeMap<String, serde_json::Value>;

/// Which upstream system a token, request or error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Cloud,
    OnPrem,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cloud => "cloud",
            BackendKind::OnPrem => "on_prem",
        }
    }
}

/// Low-level HTTP transport failures, wrapped into `RestoError` at the
/// service boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Immutable description of one OLAP sub-query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OlapQuerySpec {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub group_fields: Vec<String>,
    pub aggregate_fields: Vec<String>,
    pub report_type: String,
}

impl OlapQuerySpec {
    pub fn new(
        date_from: NaiveDate,
        date_to: NaiveDate,
        group_fields: &[&str],
        aggregate_fields: &[&str],
    ) -> Self {
        Self {
            date_from,
            date_to,
            group_fields: group_fields.iter().map(|s| s.to_string()).collect(),
            aggregate_fields: aggregate_fields.iter().map(|s| s.to_string()).collect(),
            report_type: "SALES".to_string(),
        }
    }

    /// Short identifier used in diagnostics and logs, e.g. `olap[DishName+DishGroup]`.
    pub fn label(&self) -> String {
        format!("olap[{}]", self.group_fields.join("+"))
    }
}

/// One line item of a cloud order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub group: String,
    pub amount: f64,
    pub price: f64,
    pub cost: f64,
    pub result_sum: f64,
    pub sum: f64,
}

/// A cloud order after envelope unwrapping.
///
/// Deleted orders must be dropped before they reach any accumulator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub items: Vec<OrderItem>,
    pub sum: f64,
    pub waiter: String,
    pub created_at: String,
    pub is_deleted: bool,
}

/// Accumulated sales of one dish.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DishMetric {
    pub name: String,
    pub group: String,
    pub qty: f64,
    pub revenue: f64,
}

/// Accumulated activity of one staff member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffMetric {
    pub name: String,
    pub orders_count: u64,
    pub revenue: f64,
}

impl StaffMetric {
    /// Average check for this staff member; zero orders yields zero.
    pub fn avg_check(&self) -> f64 {
        if self.orders_count == 0 {
            0.0
        } else {
            self.revenue / self.orders_count as f64
        }
    }
}

/// Canonical cross-source totals consumed by charts and diagnostics.
///
/// `avg_check` is always computed once over the totals, never averaged
/// per-order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub revenue: f64,
    pub orders: u64,
    pub avg_check: f64,
}

impl PeriodTotals {
    pub fn from_parts(revenue: f64, orders: u64) -> Self {
        let avg_check = if orders == 0 {
            0.0
        } else {
            revenue / orders as f64
        };
        Self {
            revenue,
            orders,
            avg_check,
        }
    }

    /// Merge totals from independent sources; the average check is
    /// recomputed over the combined sums.
    pub fn combine(&self, other: &PeriodTotals) -> PeriodTotals {
        PeriodTotals::from_parts(self.revenue + other.revenue, self.orders + other.orders)
    }
}

/// One stop-list entry as delivered by the cloud backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopListEntry {
    pub product_id: String,
    pub name: String,
    pub balance: f64,
}

/// Catalog record resolved through the product index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub group: String,
    pub price: Option<f64>,
}

/// Staff directory entry from the on-prem backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_totals_guards_zero_orders() {
        let totals = PeriodTotals::from_parts(0.0, 0);
        assert_eq!(totals.avg_check, 0.0);

        let totals = PeriodTotals::from_parts(1500.0, 3);
        assert_eq!(totals.avg_check, 500.0);
    }

    #[test]
    fn test_period_totals_combine_recomputes_avg() {
        let hall = PeriodTotals::from_parts(9000.0, 10);
        let delivery = PeriodTotals::from_parts(3000.0, 5);
        let combined = hall.combine(&delivery);
        assert_eq!(combined.revenue, 12000.0);
        assert_eq!(combined.orders, 15);
        assert_eq!(combined.avg_check, 800.0);
    }

    #[test]
    fn test_olap_spec_label() {
        let spec = OlapQuerySpec::new(
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap(),
            &["DishName", "DishGroup"],
            &["DishAmountInt"],
        );
        assert_eq!(spec.label(), "olap[DishName+DishGroup]");
        assert_eq!(spec.report_type, "SALES");
    }

    #[test]
    fn test_staff_metric_avg_check() {
        let staff = StaffMetric {
            name: "Анна".to_string(),
            orders_count: 0,
            revenue: 0.0,
        };
        assert_eq!(staff.avg_check(), 0.0);
    }
}
