//! HTTP access to the Elasticsearch indices holding credential records.

use credential_store_sdk::{RecordKind, StoreError};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::config::EsStoreConfig;

/// How a document write treats an existing document with the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// `_create`: fail with a conflict when the ID is taken.
    Create,
    /// `_doc`: insert or replace.
    Upsert,
}

#[derive(serde::Deserialize)]
struct GetResponse<T> {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<T>,
}

#[derive(serde::Deserialize)]
struct SearchResponse<T> {
    hits: Hits<T>,
}

#[derive(serde::Deserialize)]
struct Hits<T> {
    hits: Vec<Hit<T>>,
}

#[derive(serde::Deserialize)]
struct Hit<T> {
    #[serde(rename = "_source")]
    source: T,
}

/// Credential store over an Elasticsearch-compatible cluster.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    http: reqwest::Client,
    base: Url,
    basic_auth: Option<(String, Option<String>)>,
    cfg: EsStoreConfig,
}

impl ElasticsearchStore {
    /// Build the store and its HTTP client with bounded connect and total timeouts.
    ///
    /// # Errors
    /// Returns [`StoreError::Internal`] when the URL is invalid or the client cannot be built.
    pub fn new(cfg: EsStoreConfig) -> Result<Self, StoreError> {
        let mut base = Url::parse(&cfg.url)
            .map_err(|e| StoreError::Internal(format!("invalid store url '{}': {e}", cfg.url)))?;

        let basic_auth = if base.username().is_empty() {
            None
        } else {
            let user = base.username().to_owned();
            let pass = base.password().map(str::to_owned);
            // Userinfo moves to the Authorization header.
            if base.set_username("").is_err() || base.set_password(None).is_err() {
                return Err(StoreError::Internal(format!(
                    "cannot strip credentials from store url '{}'",
                    cfg.url
                )));
            }
            Some((user, pass))
        };

        let http = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| StoreError::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base,
            basic_auth,
            cfg,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EsStoreConfig {
        &self.cfg
    }

    /// Index holding records of `kind` for `tenant`.
    #[must_use]
    pub fn index_for(&self, kind: RecordKind, tenant: &str) -> String {
        let base = match kind {
            RecordKind::User => &self.cfg.users_index,
            RecordKind::Permission => &self.cfg.permissions_index,
            RecordKind::PublicKey => &self.cfg.public_key_index,
        };
        if self.cfg.multi_tenant {
            format!("{base}-{}", sanitize_tenant(tenant))
        } else {
            base.clone()
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Internal(format!("store url '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.basic_auth {
            Some((user, pass)) => req.basic_auth(user, pass.as_deref()),
            None => req,
        }
    }

    pub(crate) async fn get_doc<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        tenant: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        if !is_addressable(id) {
            tracing::debug!(%kind, id, "unaddressable document id");
            return Ok(None);
        }
        let index = self.index_for(kind, tenant);
        let url = self.url(&[&index, "_doc", id])?;
        let resp = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(send_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = ensure_success(resp, kind, id).await?;
        let body: GetResponse<T> = resp
            .json()
            .await
            .map_err(|e| StoreError::Internal(format!("undecodable {kind} '{id}': {e}")))?;
        Ok(if body.found { body.source } else { None })
    }

    pub(crate) async fn write_doc<T: Serialize + Sync>(
        &self,
        kind: RecordKind,
        tenant: &str,
        id: &str,
        doc: &T,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        if !is_addressable(id) {
            return Err(StoreError::Internal(format!("invalid {kind} id '{id}'")));
        }
        let index = self.index_for(kind, tenant);
        let endpoint = match mode {
            WriteMode::Create => "_create",
            WriteMode::Upsert => "_doc",
        };
        let mut url = self.url(&[&index, endpoint, id])?;
        url.query_pairs_mut().append_pair("refresh", "wait_for");

        let resp = self
            .request(Method::PUT, url)
            .json(doc)
            .send()
            .await
            .map_err(send_error)?;

        if resp.status() == StatusCode::CONFLICT && mode == WriteMode::Create {
            return Err(StoreError::conflict(kind, id));
        }
        ensure_success(resp, kind, id).await?;
        tracing::debug!(index = %index, id = %id, ?mode, "stored {kind}");
        Ok(())
    }

    pub(crate) async fn delete_doc(
        &self,
        kind: RecordKind,
        tenant: &str,
        id: &str,
    ) -> Result<(), StoreError> {
        if !is_addressable(id) {
            return Err(StoreError::not_found(kind, id));
        }
        let index = self.index_for(kind, tenant);
        let mut url = self.url(&[&index, "_doc", id])?;
        url.query_pairs_mut().append_pair("refresh", "wait_for");

        let resp = self
            .request(Method::DELETE, url)
            .send()
            .await
            .map_err(send_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(kind, id));
        }
        ensure_success(resp, kind, id).await?;
        Ok(())
    }

    /// Run a query against the tenant's index for `kind`; a missing index yields no hits.
    pub(crate) async fn search<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        tenant: &str,
        query: Value,
        size: usize,
    ) -> Result<Vec<T>, StoreError> {
        let index = self.index_for(kind, tenant);
        let url = self.url(&[&index, "_search"])?;

        let resp = self
            .request(Method::POST, url)
            .json(&json!({ "size": size, "query": query }))
            .send()
            .await
            .map_err(send_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let resp = ensure_success(resp, kind, &index).await?;
        let body: SearchResponse<T> = resp
            .json()
            .await
            .map_err(|e| StoreError::Internal(format!("undecodable {kind} search result: {e}")))?;
        Ok(body.hits.hits.into_iter().map(|h| h.source).collect())
    }

    pub(crate) fn max_list_size(&self) -> usize {
        self.cfg.max_list_size
    }
}

/// Whether `id` survives as a single URL path segment. Empty and dot segments do not.
fn is_addressable(id: &str) -> bool {
    !matches!(id, "" | "." | "..")
}

/// Lowercase the tenant and replace characters Elasticsearch rejects in index names.
fn sanitize_tenant(tenant: &str) -> String {
    tenant
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '.' | '-' | '_') => c,
            _ => '_',
        })
        .collect()
}

fn send_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() || e.is_connect() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Internal(e.to_string())
    }
}

async fn ensure_success(resp: Response, kind: RecordKind, key: &str) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::error!(%status, %kind, key, body = %body, "store request failed");
    if status.is_server_error() {
        Err(StoreError::Unavailable(format!("{status} for {kind} '{key}'")))
    } else {
        Err(StoreError::Internal(format!("{status} for {kind} '{key}': {body}")))
    }
}
