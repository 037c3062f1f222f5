//! Typed per-request context threaded through the middleware chain.
//!
//! Every slot is written at most once. Reading a slot that an earlier stage
//! should have filled returns [`ContextError::Missing`] instead of panicking.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use thiserror::Error;

use crate::query::RsQuery;
use crate::{Acl, Category, Credential, CredentialTag, Op, Permission, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKey {
    Domain,
    Category,
    Acl,
    Op,
    CredentialTag,
    User,
    Permission,
    Indices,
    Pipelines,
    RequestBodyBytes,
    StartTime,
    QueryId,
    RsQuery,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Domain => "domain",
            Self::Category => "category",
            Self::Acl => "acl",
            Self::Op => "op",
            Self::CredentialTag => "credential_tag",
            Self::User => "user",
            Self::Permission => "permission",
            Self::Indices => "indices",
            Self::Pipelines => "pipelines",
            Self::RequestBodyBytes => "request_body_bytes",
            Self::StartTime => "start_time",
            Self::QueryId => "queryid",
            Self::RsQuery => "rs_query",
        })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0} not found in request context")]
    Missing(ContextKey),
    #[error("{0} is already set in request context")]
    AlreadySet(ContextKey),
}

/// Tenant identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantDomain {
    raw: String,
    encrypted: Option<String>,
}

impl TenantDomain {
    #[must_use]
    pub fn new(raw: impl Into<String>, encrypted: Option<String>) -> Self {
        Self {
            raw: raw.into(),
            encrypted,
        }
    }

    /// The domain as sent by the client; keys backing-store records and caches.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Hex-encoded AES-CFB envelope of the raw domain, when encryption is configured.
    #[must_use]
    pub fn encrypted(&self) -> Option<&str> {
        self.encrypted.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    start_time: Instant,
    domain: Option<TenantDomain>,
    category: Option<Category>,
    acl: Option<Acl>,
    op: Option<Op>,
    credential: Option<Credential>,
    indices: Option<Arc<[String]>>,
    pipelines: Option<Arc<[String]>>,
    request_body: Option<Bytes>,
    query_id: Option<String>,
    rs_query: Option<Vec<RsQuery>>,
    applied_middlewares: Vec<&'static str>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, key: ContextKey) -> Result<(), ContextError> {
    if slot.is_some() {
        return Err(ContextError::AlreadySet(key));
    }
    *slot = Some(value);
    Ok(())
}

impl RequestContext {
    #[must_use]
    pub fn new(start_time: Instant) -> Self {
        Self {
            start_time,
            domain: None,
            category: None,
            acl: None,
            op: None,
            credential: None,
            indices: None,
            pipelines: None,
            request_body: None,
            query_id: None,
            rs_query: None,
            applied_middlewares: Vec::new(),
        }
    }

    #[must_use]
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// # Errors
    /// [`ContextError::Missing`] when the domain identifier has not run.
    pub fn domain(&self) -> Result<&TenantDomain, ContextError> {
        self.domain
            .as_ref()
            .ok_or(ContextError::Missing(ContextKey::Domain))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when a domain was attached before.
    pub fn set_domain(&mut self, domain: TenantDomain) -> Result<(), ContextError> {
        set_once(&mut self.domain, domain, ContextKey::Domain)
    }

    /// # Errors
    /// [`ContextError::Missing`] when the request was not classified.
    pub fn category(&self) -> Result<Category, ContextError> {
        self.category.ok_or(ContextError::Missing(ContextKey::Category))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when the category was set before.
    pub fn set_category(&mut self, category: Category) -> Result<(), ContextError> {
        set_once(&mut self.category, category, ContextKey::Category)
    }

    /// # Errors
    /// [`ContextError::Missing`] when the request was not classified.
    pub fn acl(&self) -> Result<Acl, ContextError> {
        self.acl.ok_or(ContextError::Missing(ContextKey::Acl))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when the ACL was set before.
    pub fn set_acl(&mut self, acl: Acl) -> Result<(), ContextError> {
        set_once(&mut self.acl, acl, ContextKey::Acl)
    }

    /// # Errors
    /// [`ContextError::Missing`] when the op classifier has not run.
    pub fn op(&self) -> Result<Op, ContextError> {
        self.op.ok_or(ContextError::Missing(ContextKey::Op))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when the op was set before.
    pub fn set_op(&mut self, op: Op) -> Result<(), ContextError> {
        set_once(&mut self.op, op, ContextKey::Op)
    }

    /// # Errors
    /// [`ContextError::Missing`] when the request has not been authenticated.
    pub fn credential(&self) -> Result<&Credential, ContextError> {
        self.credential
            .as_ref()
            .ok_or(ContextError::Missing(ContextKey::CredentialTag))
    }

    /// # Errors
    /// [`ContextError::Missing`] when the request has not been authenticated.
    pub fn credential_tag(&self) -> Result<CredentialTag, ContextError> {
        self.credential().map(Credential::tag)
    }

    /// # Errors
    /// [`ContextError::Missing`] unless a user authenticated the request.
    pub fn user(&self) -> Result<&User, ContextError> {
        self.credential
            .as_ref()
            .and_then(Credential::as_user)
            .ok_or(ContextError::Missing(ContextKey::User))
    }

    /// # Errors
    /// [`ContextError::Missing`] unless a permission authenticated the request.
    pub fn permission(&self) -> Result<&Permission, ContextError> {
        self.credential
            .as_ref()
            .and_then(Credential::as_permission)
            .ok_or(ContextError::Missing(ContextKey::Permission))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when a credential was attached before.
    pub fn set_credential(&mut self, credential: Credential) -> Result<(), ContextError> {
        set_once(&mut self.credential, credential, ContextKey::CredentialTag)
    }

    /// Target indices; empty means a cluster-level request.
    ///
    /// # Errors
    /// [`ContextError::Missing`] when the index classifier has not run.
    pub fn indices(&self) -> Result<&[String], ContextError> {
        self.indices
            .as_deref()
            .ok_or(ContextError::Missing(ContextKey::Indices))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when indices were set before.
    pub fn set_indices(&mut self, indices: Vec<String>) -> Result<(), ContextError> {
        set_once(&mut self.indices, indices.into(), ContextKey::Indices)
    }

    /// Target ingest pipelines; empty when the route addresses none.
    ///
    /// # Errors
    /// [`ContextError::Missing`] when the index classifier has not run.
    pub fn pipelines(&self) -> Result<&[String], ContextError> {
        self.pipelines
            .as_deref()
            .ok_or(ContextError::Missing(ContextKey::Pipelines))
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when pipelines were set before.
    pub fn set_pipelines(&mut self, pipelines: Vec<String>) -> Result<(), ContextError> {
        set_once(&mut self.pipelines, pipelines.into(), ContextKey::Pipelines)
    }

    #[must_use]
    pub fn request_body(&self) -> Option<&Bytes> {
        self.request_body.as_ref()
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when the body was captured before.
    pub fn set_request_body(&mut self, body: Bytes) -> Result<(), ContextError> {
        set_once(&mut self.request_body, body, ContextKey::RequestBodyBytes)
    }

    #[must_use]
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when the query id was set before.
    pub fn set_query_id(&mut self, id: String) -> Result<(), ContextError> {
        set_once(&mut self.query_id, id, ContextKey::QueryId)
    }

    #[must_use]
    pub fn rs_query(&self) -> &[RsQuery] {
        self.rs_query.as_deref().unwrap_or_default()
    }

    /// # Errors
    /// [`ContextError::AlreadySet`] when the queries were set before.
    pub fn set_rs_query(&mut self, queries: Vec<RsQuery>) -> Result<(), ContextError> {
        set_once(&mut self.rs_query, queries, ContextKey::RsQuery)
    }

    /// Names of the middlewares that ran, in order.
    #[must_use]
    pub fn applied_middlewares(&self) -> &[&'static str] {
        &self.applied_middlewares
    }

    pub fn record_middleware(&mut self, name: &'static str) {
        self.applied_middlewares.push(name);
    }
}
