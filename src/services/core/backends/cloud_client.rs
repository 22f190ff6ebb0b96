//! Cloud POS API client.
//!
//! Bearer-token REST/JSON. The login exchange issues a token that lives
//! about an hour; every request goes through `TokenManager` first. The
//! wide-range order endpoints are unreliable, so callers fetch orders one
//! day at a time through the planner.

use crate::services::core::auth::{AuthConfig, AuthExchange, IssuedToken, TokenManager};
use crate::services::core::backends::http::HttpTransport;
use crate::types::BackendKind;
use crate::utils::{Logger, RestoError, RestoResult};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
pub struct CloudClientConfig {
    pub base_url: String,
    pub api_login: String,
    pub timeout_secs: u64,
    /// Order statuses included in revenue collection.
    pub order_statuses: Vec<String>,
}

impl Default for CloudClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-ru.iiko.services".to_string(),
            api_login: String::new(),
            timeout_secs: 30,
            order_statuses: vec![
                "CookingCompleted".to_string(),
                "OnWay".to_string(),
                "Delivered".to_string(),
                "Closed".to_string(),
            ],
        }
    }
}

impl CloudClientConfig {
    pub fn validate(&self) -> RestoResult<()> {
        if self.api_login.trim().is_empty() {
            return Err(RestoError::config_error("cloud api_login is not set"));
        }
        Url::parse(&self.base_url)
            .map_err(|e| RestoError::config_error(format!("cloud base_url: {}", e)))?;
        if self.order_statuses.is_empty() {
            return Err(RestoError::config_error(
                "order_statuses must not be empty",
            ));
        }
        Ok(())
    }
}

/// The login exchange: POST the api login, receive a bearer token.
struct CloudAuthExchange {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    api_login: String,
}

#[async_trait]
impl AuthExchange for CloudAuthExchange {
    async fn authenticate(&self) -> RestoResult<IssuedToken> {
        let url = format!("{}/api/1/access_token", self.base_url);
        let body = json!({ "apiLogin": self.api_login });
        let response = self
            .transport
            .post_json(&url, &[], &body, None)
            .await
            .map_err(RestoError::from)?;

        if !response.is_success() {
            return Err(RestoError::auth_error(format!(
                "cloud auth rejected with status {}",
                response.status
            ))
            .with_status(response.status));
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|e| RestoError::auth_error(format!("cloud auth payload unreadable: {}", e)))?;
        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .ok_or_else(|| RestoError::auth_error("cloud auth payload carries no token"))?;

        Ok(IssuedToken {
            token: token.to_string(),
            ttl: Duration::minutes(60),
        })
    }
}

pub struct CloudPosClient {
    config: CloudClientConfig,
    transport: Arc<dyn HttpTransport>,
    auth: CloudAuthExchange,
    tokens: TokenManager,
    organization_id: Mutex<Option<String>>,
    logger: Logger,
}

impl CloudPosClient {
    pub fn new(config: CloudClientConfig, transport: Arc<dyn HttpTransport>) -> RestoResult<Self> {
        config.validate()?;
        let auth = CloudAuthExchange {
            transport: transport.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_login: config.api_login.clone(),
        };
        Ok(Self {
            tokens: TokenManager::new(BackendKind::Cloud, AuthConfig::cloud()),
            organization_id: Mutex::new(None),
            logger: Logger::named("cloud"),
            auth,
            config,
            transport,
        })
    }

    pub fn config(&self) -> &CloudClientConfig {
        &self.config
    }

    /// Drops the cached token; the next call re-authenticates. The planner
    /// calls this before retrying a failed day.
    pub async fn invalidate_token(&self) {
        self.tokens.invalidate().await;
    }

    /// Authenticated POST with one retry after an auth rejection.
    async fn post(&self, endpoint: &str, payload: Value) -> RestoResult<Value> {
        let url = format!("{}{}", self.auth.base_url, endpoint);
        let mut token = self.tokens.ensure_valid(&self.auth).await?;

        let mut response = self
            .transport
            .post_json(&url, &[], &payload, Some(&token))
            .await
            .map_err(RestoError::from)?;

        if response.is_auth_rejection() {
            self.logger
                .warn(&format!("{}: token rejected, re-authenticating", endpoint));
            self.tokens.invalidate().await;
            token = self.tokens.ensure_valid(&self.auth).await?;
            response = self
                .transport
                .post_json(&url, &[], &payload, Some(&token))
                .await
                .map_err(RestoError::from)?;
            if response.is_auth_rejection() {
                return Err(RestoError::auth_error(format!(
                    "{}: rejected twice with status {}",
                    endpoint, response.status
                ))
                .with_status(response.status));
            }
        }

        if !response.is_success() {
            return Err(RestoError::api_error(format!(
                "{} failed with status {}",
                endpoint, response.status
            ))
            .with_status(response.status)
            .with_method(endpoint));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            RestoError::parse_error(format!("{}: unreadable response: {}", endpoint, e))
                .with_method(endpoint)
        })
    }

    /// Resolves and caches the organization id. Failure here is fatal for
    /// the whole request: without an organization nothing else works.
    pub async fn organization_id(&self) -> RestoResult<String> {
        let mut cached = self.organization_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let payload = self
            .post(
                "/api/1/organizations",
                json!({ "returnAdditionalInfo": false, "includeDisabled": false }),
            )
            .await?;

        let organizations = payload
            .get("organizations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let first = organizations
            .first()
            .ok_or_else(|| RestoError::not_found("no organizations visible for this api login"))?;
        let id = first
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RestoError::parse_error("organization entry carries no id"))?
            .to_string();

        self.logger.info(&format!(
            "organization: {} ({})",
            first.get("name").and_then(Value::as_str).unwrap_or("n/a"),
            id
        ));
        *cached = Some(id.clone());
        Ok(id)
    }

    /// The full product/menu catalog.
    pub async fn nomenclature(&self) -> RestoResult<Value> {
        let org_id = self.organization_id().await?;
        self.post("/api/1/nomenclature", json!({ "organizationId": org_id }))
            .await
    }

    /// Current stop-list, nested per terminal group.
    pub async fn stop_lists(&self) -> RestoResult<Value> {
        let org_id = self.organization_id().await?;
        self.post("/api/1/stop_lists", json!({ "organizationIds": [org_id] }))
            .await
    }

    /// Delivery orders for one calendar day. On retry attempts the cached
    /// token is dropped first so a stale token cannot burn the whole retry
    /// budget.
    pub async fn orders_for_day(&self, day: NaiveDate, attempt: u32) -> RestoResult<Value> {
        if attempt > 1 {
            self.tokens.invalidate().await;
        }
        let org_id = self.organization_id().await?;
        let date = day.format("%Y-%m-%d").to_string();
        self.post(
            "/api/1/deliveries/by_delivery_date_and_status",
            json!({
                "organizationIds": [org_id],
                "deliveryDateFrom": date,
                "deliveryDateTo": date,
                "statuses": self.config.order_statuses,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::core::backends::http::HttpResponse;
    use crate::types::TransportError;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Answers auth with a fresh token and every other POST from a queue.
    struct FakeTransport {
        auth_calls: StdMutex<u32>,
        responses: StdMutex<VecDeque<HttpResponse>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                auth_calls: StdMutex::new(0),
                responses: StdMutex::new(responses.into()),
            }
        }

        fn ok(body: &str) -> HttpResponse {
            HttpResponse {
                status: 200,
                body: body.to_string(),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn get(
            &self,
            _url: &str,
            _query: &[(&str, String)],
        ) -> Result<HttpResponse, TransportError> {
            unreachable!("cloud client never issues GET")
        }

        async fn post_json(
            &self,
            url: &str,
            _query: &[(&str, String)],
            _body: &Value,
            _bearer: Option<&str>,
        ) -> Result<HttpResponse, TransportError> {
            if url.ends_with("/access_token") {
                let mut calls = self.auth_calls.lock().unwrap();
                *calls += 1;
                return Ok(Self::ok(&format!("{{\"token\": \"t{}\"}}", *calls)));
            }
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Self::ok("{}")))
        }
    }

    fn client(transport: Arc<FakeTransport>) -> CloudPosClient {
        let config = CloudClientConfig {
            api_login: "login".to_string(),
            ..Default::default()
        };
        CloudPosClient::new(config, transport).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(CloudClientConfig::default().validate().is_err());

        let config = CloudClientConfig {
            api_login: "x".to_string(),
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_organization_id_cached() {
        let transport = Arc::new(FakeTransport::new(vec![FakeTransport::ok(
            r#"{"organizations": [{"id": "org-1", "name": "Кафе"}]}"#,
        )]));
        let client = client(transport.clone());

        assert_eq!(client.organization_id().await.unwrap(), "org-1");
        // Second call must hit the cache, not the exhausted queue.
        assert_eq!(client.organization_id().await.unwrap(), "org-1");
    }

    #[tokio::test]
    async fn test_empty_organizations_is_fatal() {
        let transport = Arc::new(FakeTransport::new(vec![FakeTransport::ok(
            r#"{"organizations": []}"#,
        )]));
        let client = client(transport);
        let err = client.organization_id().await.unwrap_err();
        assert_eq!(err.kind, crate::utils::ErrorKind::NotFoundError);
    }

    #[tokio::test]
    async fn test_auth_rejection_refreshes_and_retries_once() {
        let transport = Arc::new(FakeTransport::new(vec![
            HttpResponse {
                status: 401,
                body: String::new(),
            },
            FakeTransport::ok(r#"{"organizations": [{"id": "org-1"}]}"#),
        ]));
        let client = client(transport.clone());

        assert_eq!(client.organization_id().await.unwrap(), "org-1");
        // One auth for the first call, one forced by the 401.
        assert_eq!(*transport.auth_calls.lock().unwrap(), 2);
    }
}
