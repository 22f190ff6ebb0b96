//! Pre-formatted report text.
//!
//! The command layer forwards these strings verbatim (and the LLM consumer
//! receives them as opaque context), so everything human-relevant has to be
//! in the text: per-source sections, inline failure notes for sources that
//! fell over, and the diagnostics footer.

use crate::services::core::analysis::category_classifier::StationClass;
use crate::services::core::analysis::order_aggregator::OrderMetrics;
use crate::services::core::analysis::productivity::ProductivityOutcome;
use crate::services::core::analysis::sales_aggregator::SalesMetrics;
use crate::services::core::analysis::stop_list::{StopBucket, StopListReport};
use crate::services::core::diagnostics::DiagnosticsReport;

/// Dishes listed in the top-dishes section.
const TOP_DISHES: usize = 30;

/// One source's contribution: metrics, or the reason it is absent.
pub type Section<'a, T> = Result<&'a T, &'a str>;

pub struct SalesReportInput<'a> {
    pub label: &'a str,
    pub date_from: &'a str,
    pub date_to: &'a str,
    pub hall: Section<'a, SalesMetrics>,
    pub delivery: Section<'a, OrderMetrics>,
    pub stop_list: Section<'a, StopListReport>,
    pub diagnostics: &'a DiagnosticsReport,
}

pub struct ReportGenerator;

impl ReportGenerator {
    pub fn sales_summary(input: &SalesReportInput<'_>) -> String {
        let mut out = vec![format!(
            "=== SALES {} ({} .. {}) ===",
            input.label, input.date_from, input.date_to
        )];

        out.push(String::new());
        out.push("-- hall --".to_string());
        match input.hall {
            Ok(hall) => Self::push_hall(&mut out, hall),
            Err(note) => out.push(format!("hall data unavailable: {}", note)),
        }

        out.push(String::new());
        out.push("-- delivery --".to_string());
        match input.delivery {
            Ok(delivery) => Self::push_delivery(&mut out, delivery),
            Err(note) => out.push(format!("delivery data unavailable: {}", note)),
        }

        out.push(String::new());
        match input.stop_list {
            Ok(report) => out.push(Self::stop_list_section(report)),
            Err(note) => out.push(format!("stop-list unavailable: {}", note)),
        }

        out.push(String::new());
        out.push(input.diagnostics.render());
        out.join("\n")
    }

    fn push_hall(out: &mut Vec<String>, hall: &SalesMetrics) {
        out.push(format!("revenue (discounted): {:.0}", hall.totals.revenue));
        out.push(format!("revenue (gross): {:.0}", hall.gross_revenue));
        out.push(format!("orders: {}", hall.totals.orders));
        out.push(format!("dishes sold: {:.0}", hall.total_qty));
        out.push(format!("avg check: {:.0}", hall.totals.avg_check));

        if !hall.days.is_empty() {
            out.push("by day:".to_string());
            for day in &hall.days {
                out.push(format!(
                    "  {} | {:.0} | {:.0} orders",
                    day.date, day.revenue, day.orders
                ));
            }
        }

        if !hall.staff.is_empty() {
            out.push("staff:".to_string());
            for staff in &hall.staff {
                out.push(format!(
                    "  {} | {:.0} | {} orders | avg check {:.0}",
                    staff.name,
                    staff.revenue,
                    staff.orders_count,
                    staff.avg_check()
                ));
            }
        }

        if !hall.hours.is_empty() {
            out.push("by hour:".to_string());
            for hour in &hall.hours {
                out.push(format!("  {}:00 | {:.0}", hour.hour, hour.revenue));
            }
        }

        if !hall.dishes.is_empty() {
            out.push(format!("top dishes (of {}):", hall.dishes.len()));
            for dish in hall.dishes.iter().take(TOP_DISHES) {
                out.push(format!(
                    "  {} | {:.0} pcs | {:.0} | {}",
                    dish.name, dish.qty, dish.revenue, dish.group
                ));
            }
        }
    }

    fn push_delivery(out: &mut Vec<String>, delivery: &OrderMetrics) {
        out.push(format!("revenue: {:.0}", delivery.totals.revenue));
        out.push(format!("orders: {}", delivery.totals.orders));
        out.push(format!("avg check: {:.0}", delivery.totals.avg_check));
        if delivery.excluded_deleted > 0 {
            out.push(format!(
                "deleted orders excluded: {}",
                delivery.excluded_deleted
            ));
        }

        if !delivery.orders_by_hour.is_empty() {
            out.push("orders by hour:".to_string());
            for (hour, count) in &delivery.orders_by_hour {
                out.push(format!("  {:02}:00 | {} orders", hour, count));
            }
        }

        if !delivery.dishes.is_empty() {
            let mut dishes: Vec<_> = delivery.dishes.values().collect();
            dishes.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
            out.push("top delivery dishes:".to_string());
            for dish in dishes.iter().take(TOP_DISHES) {
                out.push(format!(
                    "  {} | {:.0} pcs | {:.0}",
                    dish.name, dish.qty, dish.revenue
                ));
            }
        }
    }

    /// The stop-list section. An empty stop-list is good news, said so.
    pub fn stop_list_section(report: &StopListReport) -> String {
        if report.is_empty() {
            return "stop-list: empty, everything is available".to_string();
        }

        let mut out = vec![format!("stop-list ({} items):", report.items.len())];
        for (station, title) in [
            (StationClass::Kitchen, "kitchen"),
            (StationClass::Bar, "bar"),
        ] {
            let full = report.of(station, StopBucket::FullStop);
            let limited = report.of(station, StopBucket::Limited);
            if full.is_empty() && limited.is_empty() {
                continue;
            }
            out.push(format!("  {}:", title));
            for item in full {
                out.push(format!("    [out] {} ({})", item.name, item.group));
            }
            for item in limited {
                out.push(format!(
                    "    [low] {} ({}), {} left",
                    item.name, item.group, item.balance
                ));
            }
        }
        out.join("\n")
    }

    pub fn productivity_summary(
        label: &str,
        outcome: &ProductivityOutcome,
        diagnostics: &DiagnosticsReport,
    ) -> String {
        let mut out = vec![format!("=== KITCHEN PRODUCTIVITY {} ===", label)];

        match outcome {
            ProductivityOutcome::ConfigurationMissing { message } => {
                out.push(format!("not computed: {}", message));
            }
            ProductivityOutcome::Report(report) => {
                out.push(format!(
                    "cooks per shift: {} | shift wage: {:.0} (source: {}) | days: {}",
                    report.headcount, report.shift_wage, report.wage_source, report.days
                ));
                out.push(format!(
                    "kitchen revenue: {:.0} total, {:.0} per day, {:.0} per cook",
                    report.total_kitchen_revenue, report.daily_revenue, report.per_cook
                ));
                out.push(format!("daily payroll: {:.0}", report.daily_payroll));
                out.push(format!(
                    "coefficient: {:.2}, {}",
                    report.coefficient,
                    report.band.verdict()
                ));
                if !report.categories.is_empty() {
                    out.push("by category (per day):".to_string());
                    for category in &report.categories {
                        out.push(format!(
                            "  {}: {:.0} | {:.0} per cook | k={:.2}",
                            category.group,
                            category.daily_revenue,
                            category.per_cook,
                            category.coefficient
                        ));
                    }
                }
            }
        }

        out.push(String::new());
        out.push(diagnostics.render());
        out.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::core::analysis::productivity::{
        ProductivityCalculator, ProductivityConfig, WagePolicy, WageSource,
    };
    use crate::types::PeriodTotals;

    fn diagnostics() -> DiagnosticsReport {
        let mut diag = DiagnosticsReport::new();
        diag.record_attempt("olap[OpenDate.Typed]");
        diag.record_success("olap[OpenDate.Typed]", 7);
        diag
    }

    #[test]
    fn test_failed_sources_render_inline() {
        let delivery = OrderMetrics {
            totals: PeriodTotals::from_parts(3000.0, 6),
            ..Default::default()
        };
        let diag = diagnostics();
        let input = SalesReportInput {
            label: "last 7 days",
            date_from: "2026-08-01",
            date_to: "2026-08-07",
            hall: Err("connection failed"),
            delivery: Ok(&delivery),
            stop_list: Err("stop-list endpoint down"),
            diagnostics: &diag,
        };
        let text = ReportGenerator::sales_summary(&input);

        assert!(text.contains("hall data unavailable: connection failed"));
        assert!(text.contains("revenue: 3000"));
        assert!(text.contains("stop-list unavailable"));
        assert!(text.contains("--- diagnostics ---"));
    }

    #[test]
    fn test_empty_stop_list_is_positive_statement() {
        let report = StopListReport::default();
        let text = ReportGenerator::stop_list_section(&report);
        assert!(text.contains("everything is available"));
    }

    #[test]
    fn test_productivity_text_with_banding() {
        let config = ProductivityConfig {
            cooks_per_shift: 3,
            wage_policy: WagePolicy {
                sources: vec![WageSource::ManualAverage { per_shift: 3000.0 }],
            },
        };
        let outcome = ProductivityCalculator::calculate(
            &[("Супы".to_string(), 126000.0)],
            7,
            &config,
        );
        let text = ReportGenerator::productivity_summary("last 7 days", &outcome, &diagnostics());
        assert!(text.contains("coefficient: 2.00"));
        assert!(text.contains("good"));
        assert!(text.contains("Супы"));
    }

    #[test]
    fn test_missing_configuration_renders_instruction() {
        let outcome = ProductivityCalculator::calculate(
            &[("Супы".to_string(), 1000.0)],
            1,
            &ProductivityConfig::default(),
        );
        let text = ReportGenerator::productivity_summary("today", &outcome, &diagnostics());
        assert!(text.contains("not computed"));
        assert!(text.contains("cooks per shift"));
    }
}
