//! On-prem POS server client.
//!
//! Session-key REST: auth is a GET carrying the login and a SHA-1 hex of
//! the password, every other call repeats the key as a query parameter.
//! Session keys live about ten minutes. The OLAP endpoint's response
//! encoding depends on the server version, so every body goes through the
//! normalizer untouched.

use crate::services::core::auth::{AuthConfig, AuthExchange, IssuedToken, TokenManager};
use crate::services::core::backends::http::HttpTransport;
use crate::services::core::normalize::{ParsedRows, ResponseNormalizer};
use crate::types::{BackendKind, Employee, OlapQuerySpec, ProductInfo};
use crate::utils::{Logger, RestoError, RestoResult};
use async_trait::async_trait;
use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use sha1::{Digest, Sha1};
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
pub struct ServerClientConfig {
    pub base_url: String,
    pub login: String,
    pub password: SecretString,
    pub timeout_secs: u64,
    /// Self-signed certificates are the norm on these installs.
    pub accept_invalid_certs: bool,
}

impl Default for ServerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:443".to_string(),
            login: String::new(),
            password: SecretString::new(String::new()),
            timeout_secs: 60,
            accept_invalid_certs: true,
        }
    }
}

impl ServerClientConfig {
    pub fn validate(&self) -> RestoResult<()> {
        if self.login.trim().is_empty() {
            return Err(RestoError::config_error("on-prem login is not set"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(RestoError::config_error("on-prem password is not set"));
        }
        Url::parse(&self.base_url)
            .map_err(|e| RestoError::config_error(format!("on-prem base_url: {}", e)))?;
        Ok(())
    }
}

/// GET /resto/api/auth with the hashed password; the body is the raw key,
/// sometimes wrapped in quotes.
struct ServerAuthExchange {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    login: String,
    password_hash: String,
}

#[async_trait]
impl AuthExchange for ServerAuthExchange {
    async fn authenticate(&self) -> RestoResult<IssuedToken> {
        let url = format!("{}/resto/api/auth", self.base_url);
        let query = [
            ("login", self.login.clone()),
            ("pass", self.password_hash.clone()),
        ];
        let response = self
            .transport
            .get(&url, &query)
            .await
            .map_err(RestoError::from)?;

        if !response.is_success() {
            return Err(RestoError::auth_error(format!(
                "on-prem auth rejected with status {}",
                response.status
            ))
            .with_status(response.status));
        }

        let token = response.body.trim().trim_matches('"').to_string();
        if token.is_empty() {
            return Err(RestoError::auth_error("on-prem auth returned an empty key"));
        }

        Ok(IssuedToken {
            token,
            ttl: Duration::minutes(10),
        })
    }
}

pub struct OnPremPosClient {
    transport: Arc<dyn HttpTransport>,
    auth: ServerAuthExchange,
    tokens: TokenManager,
    logger: Logger,
}

impl OnPremPosClient {
    pub fn new(config: ServerClientConfig, transport: Arc<dyn HttpTransport>) -> RestoResult<Self> {
        config.validate()?;
        let mut hasher = Sha1::new();
        hasher.update(config.password.expose_secret().as_bytes());
        let password_hash = hex::encode(hasher.finalize());

        let auth = ServerAuthExchange {
            transport: transport.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            login: config.login.clone(),
            password_hash,
        };
        Ok(Self {
            tokens: TokenManager::new(BackendKind::OnPrem, AuthConfig::on_prem()),
            logger: Logger::named("on_prem"),
            auth,
            transport,
        })
    }

    pub async fn invalidate_token(&self) {
        self.tokens.invalidate().await;
    }

    /// Connection probe: succeeds when the auth exchange does.
    pub async fn test_connection(&self) -> RestoResult<()> {
        self.tokens.ensure_valid(&self.auth).await.map(|_| ())
    }

    /// Authenticated GET returning the raw body; one retry after an auth
    /// rejection.
    async fn get_raw(&self, endpoint: &str, params: &[(&str, String)]) -> RestoResult<String> {
        let url = format!("{}{}", self.auth.base_url, endpoint);
        let mut key = self.tokens.ensure_valid(&self.auth).await?;
        let mut retried = false;

        loop {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("key", key.clone()));
            let response = self
                .transport
                .get(&url, &query)
                .await
                .map_err(RestoError::from)?;

            if response.is_auth_rejection() && !retried {
                self.logger
                    .warn(&format!("{}: session rejected, re-authenticating", endpoint));
                self.tokens.invalidate().await;
                key = self.tokens.ensure_valid(&self.auth).await?;
                retried = true;
                continue;
            }
            return Self::body_or_error(endpoint, response);
        }
    }

    /// Authenticated POST returning the raw body; one retry after an auth
    /// rejection.
    async fn post_raw(&self, endpoint: &str, body: &Value) -> RestoResult<String> {
        let url = format!("{}{}", self.auth.base_url, endpoint);
        let mut key = self.tokens.ensure_valid(&self.auth).await?;
        let mut retried = false;

        loop {
            let query = [("key", key.clone())];
            let response = self
                .transport
                .post_json(&url, &query, body, None)
                .await
                .map_err(RestoError::from)?;

            if response.is_auth_rejection() && !retried {
                self.logger
                    .warn(&format!("{}: session rejected, re-authenticating", endpoint));
                self.tokens.invalidate().await;
                key = self.tokens.ensure_valid(&self.auth).await?;
                retried = true;
                continue;
            }
            return Self::body_or_error(endpoint, response);
        }
    }

    fn body_or_error(
        endpoint: &str,
        response: crate::services::core::backends::http::HttpResponse,
    ) -> RestoResult<String> {
        if response.is_auth_rejection() {
            return Err(RestoError::auth_error(format!(
                "{}: session rejected twice",
                endpoint
            ))
            .with_status(response.status));
        }
        if !response.is_success() {
            return Err(RestoError::api_error(format!(
                "{} failed with status {}",
                endpoint, response.status
            ))
            .with_status(response.status)
            .with_method(endpoint));
        }
        Ok(response.body)
    }

    /// Runs one OLAP sub-query and normalizes whatever encoding comes back.
    pub async fn olap(&self, spec: &OlapQuerySpec) -> RestoResult<ParsedRows> {
        let body = json!({
            "reportType": spec.report_type,
            "buildSummary": "false",
            "groupByRowFields": spec.group_fields,
            "groupByColFields": [],
            "aggregateFields": spec.aggregate_fields,
            "filters": {
                "OpenDate.Typed": {
                    "filterType": "DateRange",
                    "periodType": "CUSTOM",
                    "from": spec.date_from.format("%Y-%m-%d").to_string(),
                    "to": spec.date_to.format("%Y-%m-%d").to_string(),
                    "includeLow": "true",
                    "includeHigh": "true",
                }
            }
        });

        let raw = self.post_raw("/resto/api/v2/reports/olap", &body).await?;
        let parsed = ResponseNormalizer::parse(&raw);
        self.logger.info(&format!(
            "{}: {} rows ({:?})",
            spec.label(),
            parsed.rows.len(),
            parsed.format
        ));
        Ok(parsed)
    }

    /// Product catalog keyed by every identifier the rows may carry
    /// (id, code, sku, num, article). Falls back to the legacy endpoint
    /// when the v2 list is unavailable.
    pub async fn products(&self) -> RestoResult<Vec<(Vec<String>, ProductInfo)>> {
        match self.get_raw("/resto/api/v2/entities/products/list", &[]).await {
            Ok(body) => Ok(Self::products_from_list(&body)),
            Err(err) => {
                self.logger
                    .warn(&format!("v2 products list unavailable: {}", err));
                // The legacy endpoint answers XML on old installs and JSON
                // on new ones; the normalizer copes with both.
                let body = self.get_raw("/resto/api/products", &[]).await?;
                Ok(Self::products_from_list(&body))
            }
        }
    }

    fn products_from_list(body: &str) -> Vec<(Vec<String>, ProductInfo)> {
        let parsed = ResponseNormalizer::parse(body);
        let mut out = Vec::new();
        for row in parsed.rows {
            let name = string_field(&row, &["name", "title"]);
            if name.is_empty() {
                continue;
            }
            let mut keys = Vec::new();
            for key_field in ["id", "code", "sku", "num", "article"] {
                let value = string_field(&row, &[key_field]);
                if !value.is_empty() {
                    keys.push(value);
                }
            }
            if keys.is_empty() {
                continue;
            }
            let group = string_field(&row, &["parentName", "group", "category"]);
            out.push((
                keys,
                ProductInfo {
                    name,
                    group,
                    price: None,
                },
            ));
        }
        out
    }

    /// Staff directory; deleted employees are dropped.
    pub async fn employees(&self) -> RestoResult<Vec<Employee>> {
        let body = self.get_raw("/resto/api/employees", &[]).await?;
        let parsed = ResponseNormalizer::parse(&body);
        let mut out = Vec::new();
        for row in parsed.rows {
            if string_field(&row, &["deleted"]) == "true" {
                continue;
            }
            let name = string_field(&row, &["name"]);
            if name.is_empty() {
                continue;
            }
            out.push(Employee {
                id: string_field(&row, &["id"]),
                name,
            });
        }
        Ok(out)
    }
}

fn string_field(row: &crate::types::Row, keys: &[&str]) -> String {
    for key in keys {
        match row.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.trim().to_string(),
            Some(Value::Number(n)) => return n.to_string(),
            _ => {}
        }
    }
    String::new()
}
