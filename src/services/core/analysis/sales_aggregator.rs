//! On-prem OLAP row folding.
//!
//! The row sets arrive from separate narrow group-bys and stay separate:
//! summing each section is safe, joining them is not.

use crate::services::core::normalize::{FieldResolver, LogicalField};
use crate::services::core::planner::SalesRowSets;
use crate::types::{DishMetric, PeriodTotals, Row, StaffMetric};

#[derive(Debug, Clone, Default)]
pub struct DayStat {
    pub date: String,
    pub revenue: f64,
    pub gross_revenue: f64,
    pub qty: f64,
    pub orders: f64,
}

#[derive(Debug, Clone, Default)]
pub struct HourStat {
    pub hour: String,
    pub revenue: f64,
    pub qty: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SalesMetrics {
    pub totals: PeriodTotals,
    pub gross_revenue: f64,
    pub total_qty: f64,
    /// Per accounting day, ascending by date.
    pub days: Vec<DayStat>,
    /// Per staff member, descending by revenue.
    pub staff: Vec<StaffMetric>,
    /// Per opening hour, ascending by hour.
    pub hours: Vec<HourStat>,
    /// Per dish, descending by revenue.
    pub dishes: Vec<DishMetric>,
}

pub struct SalesAggregator;

impl SalesAggregator {
    pub fn aggregate(sets: &SalesRowSets) -> SalesMetrics {
        let mut metrics = SalesMetrics::default();

        let mut revenue = 0.0;
        let mut orders = 0.0;
        for row in &sets.day_rows {
            let stat = DayStat {
                date: FieldResolver::resolve_string(row, LogicalField::Date),
                revenue: FieldResolver::resolve_number(row, LogicalField::Revenue),
                gross_revenue: FieldResolver::resolve_number(row, LogicalField::GrossRevenue),
                qty: FieldResolver::resolve_number(row, LogicalField::Qty),
                orders: FieldResolver::resolve_number(row, LogicalField::Orders),
            };
            revenue += stat.revenue;
            orders += stat.orders;
            metrics.gross_revenue += stat.gross_revenue;
            metrics.total_qty += stat.qty;
            if !stat.date.is_empty() {
                metrics.days.push(stat);
            }
        }
        metrics.days.sort_by(|a, b| a.date.cmp(&b.date));
        metrics.totals = PeriodTotals::from_parts(revenue, orders.round().max(0.0) as u64);

        for row in &sets.waiter_rows {
            let name = FieldResolver::resolve_string(row, LogicalField::Waiter);
            if name.is_empty() {
                continue;
            }
            metrics.staff.push(StaffMetric {
                name,
                orders_count: FieldResolver::resolve_number(row, LogicalField::Orders)
                    .round()
                    .max(0.0) as u64,
                revenue: FieldResolver::resolve_number(row, LogicalField::Revenue),
            });
        }
        metrics
            .staff
            .sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

        for row in &sets.hour_rows {
            let hour = FieldResolver::resolve_string(row, LogicalField::Hour);
            if hour.is_empty() {
                continue;
            }
            metrics.hours.push(HourStat {
                hour,
                revenue: FieldResolver::resolve_number(row, LogicalField::Revenue),
                qty: FieldResolver::resolve_number(row, LogicalField::Qty),
            });
        }
        metrics.hours.sort_by(|a, b| {
            let na: u32 = a.hour.parse().unwrap_or(u32::MAX);
            let nb: u32 = b.hour.parse().unwrap_or(u32::MAX);
            na.cmp(&nb).then_with(|| a.hour.cmp(&b.hour))
        });

        for row in &sets.dish_rows {
            let name = FieldResolver::resolve_string(row, LogicalField::DishName);
            if name.is_empty() {
                continue;
            }
            metrics.dishes.push(DishMetric {
                name,
                group: FieldResolver::resolve_string(row, LogicalField::DishGroup),
                qty: FieldResolver::resolve_number(row, LogicalField::Qty),
                revenue: FieldResolver::resolve_number(row, LogicalField::Revenue),
            });
        }
        metrics
            .dishes
            .sort_by(|a, b| b.revenue.total_cmp(&a.revenue));

        metrics
    }

    /// Kitchen revenue per dish group, for the productivity calculator.
    /// Bar groups are filtered out by the classifier.
    pub fn kitchen_revenue_by_group(group_rows: &[Row]) -> Vec<(String, f64)> {
        let mut out = Vec::new();
        for row in group_rows {
            let group = FieldResolver::resolve_string(row, LogicalField::DishGroup);
            if group.is_empty() {
                continue;
            }
            if crate::services::core::analysis::CategoryClassifier::is_bar("", &group) {
                continue;
            }
            let revenue = {
                let discounted = FieldResolver::resolve_number(row, LogicalField::Revenue);
                if discounted > 0.0 {
                    discounted
                } else {
                    FieldResolver::resolve_number(row, LogicalField::GrossRevenue)
                }
            };
            out.push((group, revenue));
        }
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }
}
