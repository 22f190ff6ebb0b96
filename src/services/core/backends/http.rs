//! HTTP transport seam.
//!
//! Both backend clients speak through this trait so tests can plug in fake
//! backends without a network. The production implementation is a thin
//! wrapper over `reqwest`.

use crate::types::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Auth rejections force a token clear and one retry at the call site.
    pub fn is_auth_rejection(&self) -> bool {
        self.status == 401 || self.status == 403
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError>;

    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// `accept_invalid_certs` is for on-prem installs behind self-signed
    /// certificates; the cloud transport must leave it off.
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    async fn post_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.post(url).query(query).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}
