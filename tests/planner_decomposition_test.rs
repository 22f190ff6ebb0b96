// The decomposition property: against a backend that silently truncates
// any result past N rows, the planner's narrow sub-queries must together
// reproduce what a single untruncated wide query would have returned — no
// loss, no duplication.

use async_trait::async_trait;
use chrono::NaiveDate;
use resto_edge::services::core::backends::http::{HttpResponse, HttpTransport};
use resto_edge::services::core::backends::{OnPremPosClient, ServerClientConfig};
use resto_edge::services::core::diagnostics::DiagnosticsReport;
use resto_edge::services::core::infrastructure::retry_service::RetryConfig;
use resto_edge::services::core::normalize::{FieldResolver, LogicalField};
use resto_edge::services::core::planner::{PlannerConfig, QueryPlanner};
use resto_edge::types::TransportError;
use resto_edge::utils::time::PeriodRange;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// One sold line: every dimension the OLAP group-bys can ask for.
#[derive(Clone)]
struct Fact {
    date: &'static str,
    waiter: &'static str,
    hour: &'static str,
    dish: &'static str,
    group: &'static str,
    revenue: f64,
    qty: f64,
}

fn dataset() -> Vec<Fact> {
    let mut facts = Vec::new();
    let dates = ["2026-08-01", "2026-08-02", "2026-08-03"];
    let waiters = ["Анна", "Борис", "Вера"];
    let hours = ["12", "13", "19"];
    let dishes = [
        ("Борщ", "Супы"),
        ("Паста", "Горячее"),
        ("Салат", "Салаты"),
        ("Мохито", "Бар"),
    ];
    // 3*3*3*4 = 108 facts; any wide group-by explodes past the threshold,
    // every narrow one stays under it.
    for (di, date) in dates.iter().copied().enumerate() {
        for (wi, waiter) in waiters.iter().copied().enumerate() {
            for (hi, hour) in hours.iter().copied().enumerate() {
                for (ki, (dish, group)) in dishes.iter().copied().enumerate() {
                    facts.push(Fact {
                        date,
                        waiter,
                        hour,
                        dish,
                        group,
                        revenue: 100.0 + (di + wi + hi + ki) as f64,
                        qty: 1.0,
                    });
                }
            }
        }
    }
    facts
}

/// Evaluates a group-by over the dataset and truncates past `max_rows` —
/// exactly what the real server does, minus the documentation.
struct TruncatingOlapServer {
    facts: Vec<Fact>,
    max_rows: usize,
    olap_calls: AtomicU32,
}

impl TruncatingOlapServer {
    fn new(max_rows: usize) -> Self {
        Self {
            facts: dataset(),
            max_rows,
            olap_calls: AtomicU32::new(0),
        }
    }

    fn evaluate(&self, group_fields: &[String]) -> Vec<Value> {
        let mut grouped: BTreeMap<Vec<String>, (f64, f64, u64)> = BTreeMap::new();
        for fact in &self.facts {
            let key: Vec<String> = group_fields
                .iter()
                .map(|field| match field.as_str() {
                    "OpenDate.Typed" => fact.date.to_string(),
                    "OrderWaiter.Name" => fact.waiter.to_string(),
                    "HourOpen" => fact.hour.to_string(),
                    "DishName" => fact.dish.to_string(),
                    "DishGroup" => fact.group.to_string(),
                    other => panic!("unexpected group field {}", other),
                })
                .collect();
            let entry = grouped.entry(key).or_insert((0.0, 0.0, 0));
            entry.0 += fact.revenue;
            entry.1 += fact.qty;
            entry.2 += 1;
        }

        let mut rows: Vec<Value> = grouped
            .into_iter()
            .map(|(key, (revenue, qty, orders))| {
                let mut row = serde_json::Map::new();
                for (field, value) in group_fields.iter().zip(key) {
                    row.insert(field.clone(), Value::String(value));
                }
                row.insert("DishDiscountSumInt".to_string(), json!(revenue));
                row.insert("DishSumInt".to_string(), json!(revenue));
                row.insert("DishAmountInt".to_string(), json!(qty));
                row.insert("UniqOrderId.OrdersCount".to_string(), json!(orders));
                Value::Object(row)
            })
            .collect();

        // Silent truncation.
        rows.truncate(self.max_rows);
        rows
    }
}

#[async_trait]
impl HttpTransport for TruncatingOlapServer {
    async fn get(
        &self,
        url: &str,
        _query: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError> {
        assert!(url.ends_with("/resto/api/auth"));
        Ok(HttpResponse {
            status: 200,
            body: "key".to_string(),
        })
    }

    async fn post_json(
        &self,
        _url: &str,
        _query: &[(&str, String)],
        body: &Value,
        _bearer: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        self.olap_calls.fetch_add(1, Ordering::SeqCst);
        let group_fields: Vec<String> = body["groupByRowFields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        let rows = self.evaluate(&group_fields);
        Ok(HttpResponse {
            status: 200,
            body: json!({ "data": rows }).to_string(),
        })
    }
}

fn client(transport: Arc<TruncatingOlapServer>) -> OnPremPosClient {
    OnPremPosClient::new(
        ServerClientConfig {
            base_url: "https://pos.local".to_string(),
            login: "admin".to_string(),
            password: SecretString::new("pw".to_string()),
            ..Default::default()
        },
        transport,
    )
    .unwrap()
}

fn planner(max_rows: usize) -> QueryPlanner {
    QueryPlanner::new(PlannerConfig {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
            enable_jitter: false,
        },
        day_pause_ms: 0,
        max_rows_per_query: max_rows,
    })
    .unwrap()
}

fn range() -> PeriodRange {
    PeriodRange::new(
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
        "test window",
    )
}

#[tokio::test]
async fn test_decomposed_union_reproduces_untruncated_dataset() {
    // Threshold of 30: the wide 4-dimension query (108 rows) would be cut
    // to 30, silently losing most of the data.
    let server = Arc::new(TruncatingOlapServer::new(30));
    let truncated_wide = server.evaluate(&[
        "OpenDate.Typed".to_string(),
        "OrderWaiter.Name".to_string(),
        "HourOpen".to_string(),
        "DishName".to_string(),
    ]);
    assert_eq!(truncated_wide.len(), 30, "the wide query really truncates");

    let true_total: f64 = dataset().iter().map(|f| f.revenue).sum();

    let client = client(server.clone());
    let planner = planner(30);
    let mut diagnostics = DiagnosticsReport::new();

    let sets = planner
        .run_sales_plan(&range(), &mut diagnostics, |spec, _attempt| {
            let client = &client;
            async move { client.olap(&spec).await }
        })
        .await;

    // No loss: every narrow section alone carries the full revenue.
    for (name, rows) in [
        ("day", &sets.day_rows),
        ("waiter", &sets.waiter_rows),
        ("hour", &sets.hour_rows),
    ] {
        let section_total: f64 = rows
            .iter()
            .map(|row| FieldResolver::resolve_number(row, LogicalField::Revenue))
            .sum();
        assert!(
            (section_total - true_total).abs() < 1e-6,
            "section '{}' lost data: {} != {}",
            name,
            section_total,
            true_total
        );
    }

    // No duplication: each dimension value appears exactly once.
    assert_eq!(sets.day_rows.len(), 3);
    assert_eq!(sets.waiter_rows.len(), 3);
    assert_eq!(sets.hour_rows.len(), 3);
    assert_eq!(sets.dish_rows.len(), 4);

    let dish_total: f64 = sets
        .dish_rows
        .iter()
        .map(|row| FieldResolver::resolve_number(row, LogicalField::Revenue))
        .sum();
    assert!((dish_total - true_total).abs() < 1e-6);

    assert!(!diagnostics.has_failures());
}

#[tokio::test]
async fn test_at_threshold_sections_are_flagged_in_diagnostics() {
    // Threshold of 3: the day/waiter/hour sections come back exactly at
    // the limit, which is indistinguishable from truncation and must be
    // called out.
    let server = Arc::new(TruncatingOlapServer::new(3));
    let client = client(server);
    let planner = planner(3);
    let mut diagnostics = DiagnosticsReport::new();

    planner
        .run_sales_plan(&range(), &mut diagnostics, |spec, _attempt| {
            let client = &client;
            async move { client.olap(&spec).await }
        })
        .await;

    assert!(diagnostics
        .errors
        .iter()
        .any(|e| e.contains("truncation threshold")));
}

/// Flaky transport: the first call of each endpoint fails, the retry
/// succeeds.
struct FlakyOlapServer {
    inner: TruncatingOlapServer,
    failures_left: AtomicU32,
}

#[async_trait]
impl HttpTransport for FlakyOlapServer {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError> {
        self.inner.get(url, query).await
    }

    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Ok(HttpResponse {
                status: 503,
                body: "upstream hiccup".to_string(),
            });
        }
        self.inner.post_json(url, query, body, bearer).await
    }
}

#[tokio::test]
async fn test_transient_failures_are_retried_not_fatal() {
    let transport = Arc::new(FlakyOlapServer {
        inner: TruncatingOlapServer::new(100),
        failures_left: AtomicU32::new(1),
    });
    let client = OnPremPosClient::new(
        ServerClientConfig {
            base_url: "https://pos.local".to_string(),
            login: "admin".to_string(),
            password: SecretString::new("pw".to_string()),
            ..Default::default()
        },
        transport,
    )
    .unwrap();
    let planner = planner(100);
    let mut diagnostics = DiagnosticsReport::new();

    let sets = planner
        .run_sales_plan(&range(), &mut diagnostics, |spec, _attempt| {
            let client = &client;
            async move { client.olap(&spec).await }
        })
        .await;

    // The first sub-query hit the hiccup, retried, and still delivered.
    assert_eq!(sets.day_rows.len(), 3);
    assert_eq!(sets.waiter_rows.len(), 3);
}
