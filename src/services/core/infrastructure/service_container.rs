//! The application context.
//!
//! One container built at startup holds both backend clients, the planner
//! and the catalog cache; everything downstream receives it by reference.
//! Tests swap the transports for fakes through `with_transports`.

use crate::services::core::analysis::order_aggregator::{OrderAggregator, OrderMetrics};
use crate::services::core::analysis::productivity::{
    ProductivityCalculator, ProductivityConfig, ProductivityOutcome, WagePolicy, WageSource,
};
use crate::services::core::analysis::report_generator::{ReportGenerator, SalesReportInput};
use crate::services::core::analysis::sales_aggregator::{SalesAggregator, SalesMetrics};
use crate::services::core::analysis::stop_list::{
    classify_stop_list, parse_stop_list, StopListReport,
};
use crate::services::core::backends::http::HttpTransport;
use crate::services::core::backends::{
    CloudClientConfig, CloudPosClient, OnPremPosClient, ReqwestTransport, ServerClientConfig,
};
use crate::services::core::diagnostics::DiagnosticsReport;
use crate::services::core::infrastructure::catalog_cache::{
    CatalogCache, CatalogCacheConfig, ProductIndex,
};
use crate::services::core::planner::{PlannerConfig, QueryPlanner, SalesRowSets};
use crate::types::PeriodTotals;
use crate::utils::time::{Period, PeriodRange};
use crate::utils::{Logger, RestoError, RestoResult};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct AppConfig {
    pub cloud: CloudClientConfig,
    pub server: Option<ServerClientConfig>,
    pub planner: PlannerConfig,
    pub catalog: CatalogCacheConfig,
    pub productivity: ProductivityConfig,
}

impl AppConfig {
    /// Reads the whole configuration from environment variables.
    pub fn from_env() -> RestoResult<Self> {
        let mut cloud = CloudClientConfig {
            api_login: env_string("CLOUD_API_LOGIN").unwrap_or_default(),
            ..Default::default()
        };
        if let Some(base_url) = env_string("CLOUD_BASE_URL") {
            cloud.base_url = base_url;
        }

        let server = match (
            env_string("POS_SERVER_LOGIN"),
            env_string("POS_SERVER_PASSWORD"),
        ) {
            (Some(login), Some(password)) => Some(ServerClientConfig {
                base_url: env_string("POS_SERVER_URL")
                    .unwrap_or_else(|| "https://localhost:443".to_string()),
                login,
                password: SecretString::new(password),
                ..Default::default()
            }),
            _ => None,
        };

        let mut planner = PlannerConfig::default();
        if let Some(max_rows) = env_parse::<usize>("OLAP_MAX_ROWS") {
            planner.max_rows_per_query = max_rows;
        }
        if let Some(pause) = env_parse::<u64>("DAY_PAUSE_MS") {
            planner.day_pause_ms = pause;
        }

        let mut catalog = CatalogCacheConfig::default();
        if let Some(ttl) = env_parse::<i64>("CATALOG_TTL_SECONDS") {
            catalog.ttl_seconds = ttl;
        }

        let config = Self {
            cloud,
            server,
            planner,
            catalog,
            productivity: ProductivityConfig {
                cooks_per_shift: env_parse::<u32>("COOKS_PER_SHIFT").unwrap_or(0),
                wage_policy: wage_policy_from_env(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RestoResult<()> {
        self.cloud.validate()?;
        if let Some(server) = &self.server {
            server.validate()?;
        }
        self.planner.validate()?;
        self.catalog.validate()?;
        self.productivity.validate()?;
        Ok(())
    }
}

/// Wage sources in the operator-configured priority order. No source is
/// assumed authoritative; the order itself is configuration.
fn wage_policy_from_env() -> WagePolicy {
    let shift_hours = env_parse::<f64>("COOK_SHIFT_HOURS").unwrap_or(12.0);
    let timesheet_rate = env_parse::<f64>("TIMESHEET_AVG_HOURLY_RATE").unwrap_or(0.0);
    let manual = env_parse::<f64>("COOK_WAGE_PER_SHIFT").unwrap_or(0.0);
    let fallback = env_parse::<f64>("COOK_WAGE_FALLBACK").unwrap_or(0.0);

    let order =
        env_string("WAGE_SOURCE_ORDER").unwrap_or_else(|| "timesheet,manual,fallback".to_string());
    let sources = order
        .split(',')
        .filter_map(|name| match name.trim() {
            "timesheet" => Some(WageSource::Timesheet {
                avg_hourly_rate: timesheet_rate,
                shift_hours,
            }),
            "manual" => Some(WageSource::ManualAverage { per_shift: manual }),
            "fallback" => Some(WageSource::StaticFallback {
                per_shift: fallback,
            }),
            _ => None,
        })
        .collect();
    WagePolicy { sources }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}

pub struct ServiceContainer {
    config: AppConfig,
    cloud: CloudPosClient,
    server: Option<OnPremPosClient>,
    planner: QueryPlanner,
    catalog: CatalogCache,
    logger: Logger,
}

impl ServiceContainer {
    pub fn from_env() -> RestoResult<Self> {
        Self::new(AppConfig::from_env()?)
    }

    pub fn new(config: AppConfig) -> RestoResult<Self> {
        let cloud_transport: Arc<dyn HttpTransport> = Arc::new(
            ReqwestTransport::new(Duration::from_secs(config.cloud.timeout_secs), false)
                .map_err(RestoError::from)?,
        );
        let server_transport: Option<Arc<dyn HttpTransport>> = match &config.server {
            Some(server) => Some(Arc::new(
                ReqwestTransport::new(
                    Duration::from_secs(server.timeout_secs),
                    server.accept_invalid_certs,
                )
                .map_err(RestoError::from)?,
            )),
            None => None,
        };
        Self::with_transports(config, cloud_transport, server_transport)
    }

    /// Test seam: same wiring, caller-provided transports.
    pub fn with_transports(
        config: AppConfig,
        cloud_transport: Arc<dyn HttpTransport>,
        server_transport: Option<Arc<dyn HttpTransport>>,
    ) -> RestoResult<Self> {
        let cloud = CloudPosClient::new(config.cloud.clone(), cloud_transport)?;
        let server = match (&config.server, server_transport) {
            (Some(server_config), Some(transport)) => {
                Some(OnPremPosClient::new(server_config.clone(), transport)?)
            }
            _ => None,
        };
        Ok(Self {
            planner: QueryPlanner::new(config.planner.clone())?,
            catalog: CatalogCache::new(config.catalog.clone())?,
            logger: Logger::named("container"),
            cloud,
            server,
            config,
        })
    }

    pub fn cloud(&self) -> &CloudPosClient {
        &self.cloud
    }

    pub fn server(&self) -> Option<&OnPremPosClient> {
        self.server.as_ref()
    }

    // ── catalog ─────────────────────────────────────────────────────────

    /// The product index, cached with TTL. Prefers the cloud nomenclature,
    /// falls back to the on-prem product list.
    pub async fn catalog_index(&self) -> RestoResult<Arc<ProductIndex>> {
        self.catalog
            .get_or_refresh(|| async move {
                match self.cloud.nomenclature().await {
                    Ok(payload) => Ok(ProductIndex::from_nomenclature(&payload)),
                    Err(err) => match &self.server {
                        Some(server) => {
                            self.logger.warn(&format!(
                                "nomenclature unavailable, using on-prem products: {}",
                                err
                            ));
                            let pairs = server.products().await?;
                            Ok(ProductIndex::from_pairs(pairs))
                        }
                        None => Err(err),
                    },
                }
            })
            .await
    }

    // ── report entry points ─────────────────────────────────────────────

    /// Combined hall + delivery + stop-list summary for a period.
    /// Cloud organization/auth resolution failures propagate; everything
    /// else degrades into its own section.
    pub async fn sales_report(&self, period: &Period) -> RestoResult<String> {
        self.sales_report_for_range(&period.resolve()).await
    }

    pub async fn sales_report_for_range(&self, range: &PeriodRange) -> RestoResult<String> {
        let mut diagnostics = DiagnosticsReport::new();

        // The one fatal prerequisite: without an organization nothing on
        // the cloud side can be asked at all.
        self.cloud.organization_id().await?;

        let stop_list = self.stop_list_data(&mut diagnostics).await;
        let delivery = self.delivery_metrics(range, &mut diagnostics).await;
        let hall = self.hall_metrics(range, &mut diagnostics).await;

        let date_from = range.date_from_str();
        let date_to = range.date_to_str();
        let input = SalesReportInput {
            label: &range.label,
            date_from: &date_from,
            date_to: &date_to,
            hall: hall.as_ref().map_err(|e| e.as_str()),
            delivery: Ok(&delivery),
            stop_list: stop_list.as_ref().map_err(|e| e.as_str()),
            diagnostics: &diagnostics,
        };
        Ok(ReportGenerator::sales_summary(&input))
    }

    /// Stop-list only, classified bar/kitchen and full-stop/limited.
    pub async fn stop_list_report(&self) -> RestoResult<String> {
        let mut diagnostics = DiagnosticsReport::new();
        let report = self
            .stop_list_data(&mut diagnostics)
            .await
            .map_err(|e| RestoError::api_error(e))?;
        Ok(ReportGenerator::stop_list_section(&report))
    }

    /// Kitchen productivity for a period. Needs the on-prem source.
    pub async fn productivity_report(&self, period: &Period) -> RestoResult<String> {
        let range = period.resolve();
        let mut diagnostics = DiagnosticsReport::new();

        let Some(server) = &self.server else {
            let outcome = ProductivityOutcome::ConfigurationMissing {
                message: "the on-prem source is not configured; productivity needs its OLAP data"
                    .to_string(),
            };
            return Ok(ReportGenerator::productivity_summary(
                &range.label,
                &outcome,
                &diagnostics,
            ));
        };

        let sets = self
            .planner
            .run_productivity_plan(&range, &mut diagnostics, |spec, attempt| async move {
                if attempt > 1 {
                    server.invalidate_token().await;
                }
                server.olap(&spec).await
            })
            .await;

        let kitchen = SalesAggregator::kitchen_revenue_by_group(&sets.group_rows);
        let days = if sets.day_rows.is_empty() {
            range.day_count()
        } else {
            sets.day_rows.len() as u32
        };
        let outcome = ProductivityCalculator::calculate(&kitchen, days, &self.config.productivity);
        Ok(ReportGenerator::productivity_summary(
            &range.label,
            &outcome,
            &diagnostics,
        ))
    }

    // ── chart consumer ──────────────────────────────────────────────────

    /// Combined delivery + hall totals for an arbitrary range.
    pub async fn period_totals(&self, range: &PeriodRange) -> RestoResult<PeriodTotals> {
        let mut diagnostics = DiagnosticsReport::new();
        self.cloud.organization_id().await?;

        let delivery = self.delivery_metrics(range, &mut diagnostics).await;
        let mut totals = delivery.totals;

        if let Some(server) = &self.server {
            let spec = QueryPlanner::sales_plan(range).remove(0);
            let day_rows = self
                .planner
                .run_single(spec, &mut diagnostics, |spec, attempt| async move {
                    if attempt > 1 {
                        server.invalidate_token().await;
                    }
                    server.olap(&spec).await
                })
                .await;
            let hall = SalesAggregator::aggregate(&SalesRowSets {
                day_rows,
                ..Default::default()
            });
            totals = totals.combine(&hall.totals);
        }

        if diagnostics.has_failures() {
            self.logger.warn(&format!(
                "period totals for {} are partial: {}",
                range.label,
                diagnostics.errors.join("; ")
            ));
        }
        Ok(totals)
    }

    /// Current period and its prior-year counterpart, fetched
    /// concurrently, since the two ranges are independent.
    pub async fn year_over_year(
        &self,
        period: &Period,
    ) -> RestoResult<(PeriodTotals, PeriodTotals)> {
        let range = period.resolve();
        let prior = range.prior_year();
        let (current, previous) =
            futures::join!(self.period_totals(&range), self.period_totals(&prior));
        Ok((current?, previous?))
    }

    /// Connection probe for both backends, as text.
    pub async fn connection_status(&self) -> String {
        let mut lines = Vec::new();
        match self.cloud.organization_id().await {
            Ok(id) => lines.push(format!("cloud: connected (organization {})", id)),
            Err(err) => lines.push(format!("cloud: unavailable ({})", err)),
        }
        match &self.server {
            Some(server) => match server.test_connection().await {
                Ok(()) => lines.push("on-prem: connected".to_string()),
                Err(err) => lines.push(format!("on-prem: unavailable ({})", err)),
            },
            None => lines.push("on-prem: not configured".to_string()),
        }
        lines.join("\n")
    }

    // ── per-source fetch helpers ────────────────────────────────────────

    async fn stop_list_data(
        &self,
        diagnostics: &mut DiagnosticsReport,
    ) -> Result<StopListReport, String> {
        diagnostics.record_attempt("stop_list");
        let payload = match self.cloud.stop_lists().await {
            Ok(payload) => payload,
            Err(err) => {
                diagnostics.record_error("stop_list", &err.to_string());
                return Err(err.to_string());
            }
        };
        let entries = parse_stop_list(&payload);
        diagnostics.record_success("stop_list", entries.len());

        // Unknown products still render (by raw id); the catalog just
        // makes them readable.
        let index = match self.catalog_index().await {
            Ok(index) => index,
            Err(err) => {
                diagnostics.record_error("catalog", &err.to_string());
                Arc::new(ProductIndex::new())
            }
        };
        Ok(classify_stop_list(&entries, &index))
    }

    async fn delivery_metrics(
        &self,
        range: &PeriodRange,
        diagnostics: &mut DiagnosticsReport,
    ) -> OrderMetrics {
        let collection = self
            .planner
            .collect_daily(range, diagnostics, |day, attempt| {
                self.cloud.orders_for_day(day, attempt)
            })
            .await;

        let mut aggregator = OrderAggregator::new();
        for payload in collection.values() {
            aggregator.ingest_envelope(payload);
        }
        diagnostics.note_deleted_orders(aggregator.excluded_deleted());
        aggregator.finish()
    }

    async fn hall_metrics(
        &self,
        range: &PeriodRange,
        diagnostics: &mut DiagnosticsReport,
    ) -> Result<SalesMetrics, String> {
        let Some(server) = &self.server else {
            return Err("on-prem source not configured".to_string());
        };

        let sets = self
            .planner
            .run_sales_plan(range, diagnostics, |spec, attempt| async move {
                if attempt > 1 {
                    server.invalidate_token().await;
                }
                server.olap(&spec).await
            })
            .await;
        Ok(SalesAggregator::aggregate(&sets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wage_policy_env_order() {
        std::env::set_var("TIMESHEET_AVG_HOURLY_RATE", "260");
        std::env::set_var("COOK_SHIFT_HOURS", "12");
        std::env::set_var("COOK_WAGE_PER_SHIFT", "3000");
        std::env::set_var("WAGE_SOURCE_ORDER", "manual,timesheet");

        let policy = wage_policy_from_env();
        assert_eq!(policy.sources.len(), 2);
        let (wage, source) = policy.resolve().unwrap();
        assert_eq!(source, "manual");
        assert_eq!(wage, 3000.0);

        std::env::remove_var("TIMESHEET_AVG_HOURLY_RATE");
        std::env::remove_var("COOK_SHIFT_HOURS");
        std::env::remove_var("COOK_WAGE_PER_SHIFT");
        std::env::remove_var("WAGE_SOURCE_ORDER");
    }

    #[test]
    fn test_config_requires_cloud_login() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let config = AppConfig {
            cloud: CloudClientConfig {
                api_login: "login".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
