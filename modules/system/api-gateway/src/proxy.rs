//! Forwarding of authorized requests to the Elasticsearch cluster.
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, header};
use axum::response::{IntoResponse, Response};
use url::Url;

use crate::domain::DOMAIN_HEADER;
use crate::error::GatewayError;

/// Request headers never forwarded upstream.
static STRIPPED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::AUTHORIZATION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
];

/// Response headers recomputed or replaced by the gateway.
static STRIPPED_RESPONSE_HEADERS: [HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONNECTION,
];

#[derive(Debug, Clone)]
pub struct EsProxy {
    http: reqwest::Client,
    base: Url,
    basic_auth: Option<(String, Option<String>)>,
    body_limit: usize,
}

fn describe(error: &reqwest::Error) -> &'static str {
    if error.is_connect() {
        "connection refused or unreachable"
    } else if error.is_timeout() {
        "connection timed out"
    } else if error.is_body() {
        "response body error"
    } else {
        "network error"
    }
}

impl EsProxy {
    /// Credentials in the URL userinfo are sent as basic auth on every request.
    ///
    /// # Errors
    /// Fails on an unparsable URL or when the HTTP client cannot be built.
    pub fn new(
        cluster_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
        body_limit: usize,
    ) -> anyhow::Result<Self> {
        let mut base = Url::parse(cluster_url)
            .map_err(|e| anyhow::anyhow!("invalid es_cluster_url '{cluster_url}': {e}"))?;
        let basic_auth = if base.username().is_empty() {
            None
        } else {
            let auth = (
                base.username().to_owned(),
                base.password().map(str::to_owned),
            );
            if base.set_username("").is_err() || base.set_password(None).is_err() {
                anyhow::bail!("cannot strip credentials from es_cluster_url");
            }
            Some(auth)
        };
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            base,
            basic_auth,
            body_limit,
        })
    }

    fn target(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base.clone();
        let prefix = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{prefix}{path}"));
        url.set_query(query);
        url
    }

    fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
        let mut out = headers.clone();
        for name in &STRIPPED_REQUEST_HEADERS {
            out.remove(name);
        }
        out.remove(DOMAIN_HEADER);
        out
    }

    /// Forward `req` and relay the upstream response.
    ///
    /// # Errors
    /// [`GatewayError::Upstream`] when the cluster cannot be reached.
    pub async fn forward(&self, req: Request) -> Result<Response, GatewayError> {
        let (parts, body) = req.into_parts();
        let body = to_bytes(body, self.body_limit)
            .await
            .map_err(|e| GatewayError::bad_request(format!("failed to read request body: {e}")))?;
        let url = self.target(parts.uri.path(), parts.uri.query());

        let mut upstream = self
            .http
            .request(parts.method.clone(), url)
            .headers(Self::forwarded_headers(&parts.headers))
            .body(body);
        if let Some((user, pass)) = &self.basic_auth {
            upstream = upstream.basic_auth(user, pass.as_deref());
        }

        let resp = upstream.send().await.map_err(|e| {
            tracing::warn!(
                error = %e,
                method = %parts.method,
                path = parts.uri.path(),
                "upstream request failed"
            );
            GatewayError::Upstream(describe(&e).to_owned())
        })?;

        let status = resp.status();
        let mut headers = resp.headers().clone();
        for name in &STRIPPED_RESPONSE_HEADERS {
            headers.remove(name);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Upstream(describe(&e).to_owned()))?;

        let mut out = Response::new(Body::from(bytes));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

/// Router fallback relaying unmatched routes to the cluster.
pub async fn forward(State(proxy): State<Arc<EsProxy>>, req: Request) -> Response {
    match proxy.forward(req).await {
        Ok(resp) => resp,
        Err(err) => {
            err.log();
            err.into_response()
        }
    }
}
