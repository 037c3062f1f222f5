//! Fan-out of tenant state changes to the other gateway nodes.
use std::time::Duration;

use async_trait::async_trait;
use credential_store_sdk::PublicKeyRecord;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::domain::DOMAIN_HEADER;
use crate::error::GatewayError;

#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("invalid control plane url: {0}")]
    Url(String),
    #[error("control plane request failed: {0}")]
    Transport(String),
    #[error("control plane responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl From<ControlPlaneError> for GatewayError {
    fn from(err: ControlPlaneError) -> Self {
        Self::Upstream(err.to_string())
    }
}

/// Node-wide propagation of writes made through one node.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Install `record` as the tenant key on every node.
    ///
    /// # Errors
    /// Fails unless every node accepted the key.
    async fn publish_public_key(
        &self,
        tenant: &str,
        record: &PublicKeyRecord,
    ) -> Result<(), ControlPlaneError>;

    /// Drop a cached credential on every node.
    ///
    /// # Errors
    /// Fails when the broadcast could not be delivered.
    async fn invalidate_credential(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<(), ControlPlaneError>;
}

/// Control plane reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    http: reqwest::Client,
    base: Url,
}

impl HttpControlPlane {
    /// # Errors
    /// Returns [`ControlPlaneError::Url`] for an unparsable base URL and
    /// [`ControlPlaneError::Transport`] when the client cannot be built.
    pub fn new(base: &str, timeout: Duration) -> Result<Self, ControlPlaneError> {
        let base = Url::parse(base).map_err(|e| ControlPlaneError::Url(format!("{base}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        Ok(Self { http, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ControlPlaneError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ControlPlaneError::Url(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        tenant: &str,
        body: Option<&PublicKeyRecord>,
    ) -> Result<(), ControlPlaneError> {
        let mut req = self.http.request(method, url).header(DOMAIN_HEADER, tenant);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| ControlPlaneError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ControlPlaneError::Status { status, body })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn publish_public_key(
        &self,
        tenant: &str,
        record: &PublicKeyRecord,
    ) -> Result<(), ControlPlaneError> {
        let url = self.url(&["_public_key"])?;
        self.send(Method::PUT, url, tenant, Some(record)).await
    }

    async fn invalidate_credential(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<(), ControlPlaneError> {
        let url = self.url(&["_cache", "credentials", username])?;
        self.send(Method::DELETE, url, tenant, None).await
    }
}
