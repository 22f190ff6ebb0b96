//! Query decomposition against unreliable backends.
//!
//! Two strategies:
//!
//! * Cloud order collection splits any multi-day range into one request per
//!   day. The wide-range endpoint drops data without warning; a day at a
//!   time is the only granularity that has proven trustworthy. Days are
//!   fetched strictly in order with a politeness pause between them;
//!   parallelizing gets the account throttled.
//! * The on-prem OLAP server silently truncates wide multi-dimensional
//!   group-bys past an undocumented row threshold, so one wide query
//!   becomes several narrow ones (by day, by staff, by hour, by
//!   dish+group), each fetched and failed independently.

use crate::services::core::diagnostics::DiagnosticsReport;
use crate::services::core::infrastructure::retry_service::{RetryConfig, RetryService};
use crate::services::core::normalize::{ParsedRows, ResponseFormat};
use crate::types::{OlapQuerySpec, Row};
use crate::utils::time::PeriodRange;
use crate::utils::{Logger, RestoError, RestoResult};
use chrono::NaiveDate;
use std::future::Future;

// OLAP group-by dimensions
const GROUP_DATE: &str = "OpenDate.Typed";
const GROUP_WAITER: &str = "OrderWaiter.Name";
const GROUP_HOUR: &str = "HourOpen";
const GROUP_DISH: &str = "DishName";
const GROUP_DISH_GROUP: &str = "DishGroup";
const GROUP_COOK: &str = "Cooking.Name";

// OLAP aggregates
const AGG_REVENUE: &str = "DishDiscountSumInt";
const AGG_GROSS: &str = "DishSumInt";
const AGG_QTY: &str = "DishAmountInt";
const AGG_ORDERS: &str = "UniqOrderId.OrdersCount";

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub retry: RetryConfig,
    /// Pause between consecutive day requests (milliseconds).
    pub day_pause_ms: u64,
    /// Assumed server truncation threshold. A sub-query coming back with at
    /// least this many rows is flagged as possibly truncated.
    pub max_rows_per_query: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            day_pause_ms: 1_000,
            max_rows_per_query: 500,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> RestoResult<()> {
        self.retry.validate()?;
        if self.max_rows_per_query == 0 {
            return Err(RestoError::config_error(
                "max_rows_per_query must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Outcome of a multi-day collection: whatever arrived plus the days that
/// exhausted their retries.
#[derive(Debug)]
pub struct DayCollection<T> {
    pub collected: Vec<(NaiveDate, T)>,
    pub failed_days: Vec<(NaiveDate, String)>,
}

impl<T> DayCollection<T> {
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.collected.iter().map(|(_, v)| v)
    }
}

/// The independently-fetched row sets behind a sales report. Deliberately
/// never joined: each comes from a different group-by and re-joining them
/// would double count.
#[derive(Debug, Default)]
pub struct SalesRowSets {
    pub day_rows: Vec<Row>,
    pub waiter_rows: Vec<Row>,
    pub hour_rows: Vec<Row>,
    pub dish_rows: Vec<Row>,
}

/// Row sets behind a productivity report.
#[derive(Debug, Default)]
pub struct ProductivityRowSets {
    pub cook_rows: Vec<Row>,
    pub group_rows: Vec<Row>,
    pub group_day_rows: Vec<Row>,
    pub group_hour_rows: Vec<Row>,
    pub dish_rows: Vec<Row>,
    pub day_rows: Vec<Row>,
}

pub struct QueryPlanner {
    config: PlannerConfig,
    retry: RetryService,
    logger: Logger,
}

impl QueryPlanner {
    pub fn new(config: PlannerConfig) -> RestoResult<Self> {
        config.validate()?;
        let retry = RetryService::new(config.retry.clone())?;
        Ok(Self {
            config,
            retry,
            logger: Logger::named("planner"),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    // ── Cloud: one request per day ──────────────────────────────────────

    /// Collects `fetch(day, attempt)` for every day of the range, in order.
    /// Each day retries with backoff; a day that exhausts its retries is
    /// recorded and skipped, the rest continue.
    pub async fn collect_daily<T, F, Fut>(
        &self,
        range: &PeriodRange,
        diagnostics: &mut DiagnosticsReport,
        fetch: F,
    ) -> DayCollection<T>
    where
        F: Fn(NaiveDate, u32) -> Fut,
        Fut: Future<Output = RestoResult<T>>,
    {
        let days = range.days();
        let mut collected = Vec::new();
        let mut failed_days = Vec::new();

        for (index, day) in days.iter().enumerate() {
            let method = format!("orders[{}]", day.format("%Y-%m-%d"));
            diagnostics.record_attempt(&method);

            let result = self
                .retry
                .execute(&method, |e| !e.is_auth(), |attempt| fetch(*day, attempt))
                .await;

            match result {
                Ok(value) => {
                    diagnostics.record_success(&method, 1);
                    collected.push((*day, value));
                }
                Err(err) => {
                    self.logger
                        .warn(&format!("{}: giving up after retries: {}", method, err));
                    diagnostics.record_error(&method, &err.to_string());
                    failed_days.push((*day, err.to_string()));
                }
            }

            // Politeness pause, not a concurrency limit: days must stay
            // serialized to keep the upstream from throttling us.
            if index + 1 < days.len() && self.config.day_pause_ms > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(self.config.day_pause_ms))
                    .await;
            }
        }

        DayCollection {
            collected,
            failed_days,
        }
    }

    // ── On-prem: several narrow queries instead of one wide one ─────────

    /// The narrow sub-queries behind a sales report.
    pub fn sales_plan(range: &PeriodRange) -> Vec<OlapQuerySpec> {
        let all = [AGG_REVENUE, AGG_GROSS, AGG_QTY, AGG_ORDERS];
        vec![
            OlapQuerySpec::new(range.date_from, range.date_to, &[GROUP_DATE], &all),
            OlapQuerySpec::new(range.date_from, range.date_to, &[GROUP_WAITER], &all),
            OlapQuerySpec::new(range.date_from, range.date_to, &[GROUP_HOUR], &all),
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_DISH, GROUP_DISH_GROUP],
                &[AGG_REVENUE, AGG_GROSS, AGG_QTY],
            ),
        ]
    }

    /// The narrow sub-queries behind a productivity report.
    pub fn productivity_plan(range: &PeriodRange) -> Vec<OlapQuerySpec> {
        vec![
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_COOK],
                &[AGG_QTY, AGG_GROSS, AGG_REVENUE],
            ),
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_DISH_GROUP],
                &[AGG_QTY, AGG_GROSS, AGG_REVENUE],
            ),
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_DISH_GROUP, GROUP_DATE],
                &[AGG_QTY, AGG_GROSS],
            ),
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_DISH_GROUP, GROUP_HOUR],
                &[AGG_QTY, AGG_GROSS],
            ),
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_DISH, GROUP_DISH_GROUP],
                &[AGG_QTY, AGG_GROSS, AGG_REVENUE],
            ),
            OlapQuerySpec::new(
                range.date_from,
                range.date_to,
                &[GROUP_DATE],
                &[AGG_QTY, AGG_GROSS, AGG_REVENUE, AGG_ORDERS],
            ),
        ]
    }

    /// Runs the sales plan. Each sub-query is retried and failed on its
    /// own; an absent section never blocks the others.
    pub async fn run_sales_plan<F, Fut>(
        &self,
        range: &PeriodRange,
        diagnostics: &mut DiagnosticsReport,
        fetch: F,
    ) -> SalesRowSets
    where
        F: Fn(OlapQuerySpec, u32) -> Fut,
        Fut: Future<Output = RestoResult<ParsedRows>>,
    {
        let mut plan = Self::sales_plan(range).into_iter();
        let mut sets = SalesRowSets::default();
        // Plan order matches the struct fields.
        sets.day_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.waiter_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.hour_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.dish_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets
    }

    /// Runs the productivity plan.
    pub async fn run_productivity_plan<F, Fut>(
        &self,
        range: &PeriodRange,
        diagnostics: &mut DiagnosticsReport,
        fetch: F,
    ) -> ProductivityRowSets
    where
        F: Fn(OlapQuerySpec, u32) -> Fut,
        Fut: Future<Output = RestoResult<ParsedRows>>,
    {
        let mut plan = Self::productivity_plan(range).into_iter();
        let mut sets = ProductivityRowSets::default();
        sets.cook_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.group_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.group_day_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.group_hour_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.dish_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets.day_rows = self.run_spec(plan.next(), diagnostics, &fetch).await;
        sets
    }

    /// Runs one sub-query outside a plan (e.g. day totals for a chart).
    pub async fn run_single<F, Fut>(
        &self,
        spec: OlapQuerySpec,
        diagnostics: &mut DiagnosticsReport,
        fetch: F,
    ) -> Vec<Row>
    where
        F: Fn(OlapQuerySpec, u32) -> Fut,
        Fut: Future<Output = RestoResult<ParsedRows>>,
    {
        self.run_spec(Some(spec), diagnostics, &fetch).await
    }

    async fn run_spec<F, Fut>(
        &self,
        spec: Option<OlapQuerySpec>,
        diagnostics: &mut DiagnosticsReport,
        fetch: &F,
    ) -> Vec<Row>
    where
        F: Fn(OlapQuerySpec, u32) -> Fut,
        Fut: Future<Output = RestoResult<ParsedRows>>,
    {
        let Some(spec) = spec else {
            return Vec::new();
        };
        let method = spec.label();
        diagnostics.record_attempt(&method);

        let result = self
            .retry
            .execute(&method, |e| !e.is_auth(), |attempt| {
                fetch(spec.clone(), attempt)
            })
            .await;

        match result {
            Ok(parsed) => {
                diagnostics.record_success(&method, parsed.rows.len());
                if parsed.rows.len() >= self.config.max_rows_per_query {
                    diagnostics.record_error(
                        &method,
                        &format!(
                            "row count {} at the assumed truncation threshold {}, result may be incomplete",
                            parsed.rows.len(),
                            self.config.max_rows_per_query
                        ),
                    );
                }
                if parsed.format == ResponseFormat::Unrecognized {
                    if let Some(preview) = &parsed.raw_preview {
                        diagnostics
                            .record_error(&method, &format!("unrecognized payload, raw: {}", preview));
                    }
                }
                parsed.rows
            }
            Err(err) => {
                self.logger
                    .warn(&format!("{}: unavailable: {}", method, err));
                diagnostics.record_error(&method, &err.to_string());
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::core::normalize::ResponseNormalizer;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_planner() -> QueryPlanner {
        QueryPlanner::new(PlannerConfig {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 2,
                backoff_multiplier: 1.0,
                enable_jitter: false,
            },
            day_pause_ms: 0,
            max_rows_per_query: 500,
        })
        .unwrap()
    }

    fn range(from: (i32, u32, u32), to: (i32, u32, u32)) -> PeriodRange {
        PeriodRange::new(
            NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap(),
            "test",
        )
    }

    #[test]
    fn test_sales_plan_shape() {
        let plan = QueryPlanner::sales_plan(&range((2026, 8, 1), (2026, 8, 7)));
        assert_eq!(plan.len(), 4);
        // Every sub-query is narrow: at most two group-by dimensions.
        for spec in &plan {
            assert!(spec.group_fields.len() <= 2, "wide query in plan: {:?}", spec);
        }
        assert_eq!(plan[0].group_fields, vec!["OpenDate.Typed"]);
        assert_eq!(plan[3].group_fields, vec!["DishName", "DishGroup"]);
    }

    #[tokio::test]
    async fn test_collect_daily_splits_and_survives_partial_failure() {
        let planner = fast_planner();
        let mut diag = DiagnosticsReport::new();
        let bad_day = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();

        let result = planner
            .collect_daily(&range((2026, 8, 1), (2026, 8, 3)), &mut diag, |day, _attempt| {
                async move {
                    if day == bad_day {
                        Err(crate::utils::RestoError::network_error("day is down"))
                    } else {
                        Ok(day.format("%d").to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.collected.len(), 2);
        assert_eq!(result.failed_days.len(), 1);
        assert_eq!(result.failed_days[0].0, bad_day);
        assert!(diag.has_failures());
        assert_eq!(diag.methods_tried.len(), 3);
    }

    #[tokio::test]
    async fn test_collect_daily_retries_with_attempt_numbers() {
        let planner = fast_planner();
        let mut diag = DiagnosticsReport::new();
        let attempts_seen = AtomicU32::new(0);

        let result = planner
            .collect_daily(&range((2026, 8, 1), (2026, 8, 1)), &mut diag, |_day, attempt| {
                attempts_seen.store(attempt, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(crate::utils::RestoError::timeout_error("slow"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.collected.len(), 1);
        assert_eq!(result.collected[0].1, 3);
        assert_eq!(attempts_seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_sales_plan_isolates_section_failures() {
        let planner = fast_planner();
        let mut diag = DiagnosticsReport::new();

        let sets = planner
            .run_sales_plan(&range((2026, 8, 1), (2026, 8, 2)), &mut diag, |spec, _attempt| {
                async move {
                    if spec.group_fields == vec!["HourOpen".to_string()] {
                        Err(crate::utils::RestoError::network_error("hours are down"))
                    } else {
                        Ok(ResponseNormalizer::parse(
                            r#"{"data": [{"DishDiscountSumInt": 100}]}"#,
                        ))
                    }
                }
            })
            .await;

        assert_eq!(sets.day_rows.len(), 1);
        assert_eq!(sets.waiter_rows.len(), 1);
        assert!(sets.hour_rows.is_empty());
        assert_eq!(sets.dish_rows.len(), 1);
        assert!(diag.has_failures());
    }

    #[tokio::test]
    async fn test_threshold_row_count_is_flagged() {
        let planner = QueryPlanner::new(PlannerConfig {
            retry: RetryConfig {
                max_attempts: 1,
                base_delay_ms: 1,
                max_delay_ms: 1,
                backoff_multiplier: 1.0,
                enable_jitter: false,
            },
            day_pause_ms: 0,
            max_rows_per_query: 2,
        })
        .unwrap();
        let mut diag = DiagnosticsReport::new();

        planner
            .run_sales_plan(&range((2026, 8, 1), (2026, 8, 1)), &mut diag, |_spec, _attempt| {
                async {
                    Ok(ResponseNormalizer::parse(
                        r#"[{"a": 1}, {"a": 2}]"#,
                    ))
                }
            })
            .await;

        assert!(diag
            .errors
            .iter()
            .any(|e| e.contains("truncation threshold")));
    }
}
