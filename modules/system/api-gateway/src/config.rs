use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tenant used for every request when the gateway is not multi-tenant.
pub const DEFAULT_TENANT: &str = "default";

const MIN_SYNC_INTERVAL_SECS: u64 = 10;
const MAX_SYNC_INTERVAL_SECS: u64 = 3600;

/// Gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GatewayConfig {
    pub bind_addr: String,
    /// Base URL of the Elasticsearch-compatible cluster.
    pub es_cluster_url: String,
    pub users_es_index: String,
    pub permissions_es_index: String,
    pub public_key_es_index: String,
    /// Index implicitly readable by credentials holding the `suggestions` category.
    pub suggestions_meta_es_index: String,
    /// 16-byte AES key used to encrypt tenant names.
    pub domain_name_encryption_key: Option<String>,
    pub multi_tenant: bool,
    /// Substitutes an empty tenant header with a fixed test domain.
    pub dev_mode: bool,
    /// Serverless mode: Elasticsearch routes require an ES-compatible backend.
    pub sls_mode: bool,
    pub backend: Backend,
    /// Current billing tier. `None` disables plan gating.
    pub plan: Option<Plan>,

    pub appbase_id: Option<String>,
    pub arc_id: Option<String>,
    pub cluster_id: Option<String>,

    /// Explicit sync interval; clamped to 10..=3600 seconds.
    pub sync_interval_secs: Option<u64>,
    /// Base URL of the control-plane proxy fanning writes out to every node.
    pub control_plane_url: Option<String>,

    #[serde(default = "default_store_connect_timeout_ms")]
    pub store_connect_timeout_ms: u64,
    #[serde(default = "default_store_request_timeout_ms")]
    pub store_request_timeout_ms: u64,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_owned()
}

fn default_es_cluster_url() -> String {
    "http://localhost:9200".to_owned()
}

fn default_store_connect_timeout_ms() -> u64 {
    5_000
}

fn default_store_request_timeout_ms() -> u64 {
    30_000
}

fn default_body_limit_bytes() -> usize {
    16 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            es_cluster_url: default_es_cluster_url(),
            users_es_index: ".users".to_owned(),
            permissions_es_index: ".permissions".to_owned(),
            public_key_es_index: ".publickeys".to_owned(),
            suggestions_meta_es_index: ".suggestions".to_owned(),
            domain_name_encryption_key: None,
            multi_tenant: false,
            dev_mode: false,
            sls_mode: false,
            backend: Backend::default(),
            plan: None,
            appbase_id: None,
            arc_id: None,
            cluster_id: None,
            sync_interval_secs: None,
            control_plane_url: None,
            store_connect_timeout_ms: default_store_connect_timeout_ms(),
            store_request_timeout_ms: default_store_request_timeout_ms(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

impl GatewayConfig {
    /// Interval between cache sync passes.
    ///
    /// Defaults to one minute in multi-tenant mode and a day otherwise.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        match self.sync_interval_secs {
            Some(secs) => {
                Duration::from_secs(secs.clamp(MIN_SYNC_INTERVAL_SECS, MAX_SYNC_INTERVAL_SECS))
            }
            None if self.multi_tenant => Duration::from_secs(60),
            None => Duration::from_secs(24 * 60 * 60),
        }
    }

    #[must_use]
    pub fn store_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.store_connect_timeout_ms)
    }

    #[must_use]
    pub fn store_request_timeout(&self) -> Duration {
        Duration::from_millis(self.store_request_timeout_ms)
    }
}

/// Search engine the cluster behind the gateway runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Elasticsearch,
    OpenSearch,
    Solr,
    Zinc,
    MongoDb,
    System,
}

impl Backend {
    #[must_use]
    pub fn is_es_compatible(self) -> bool {
        matches!(self, Self::Elasticsearch | Self::OpenSearch)
    }
}

/// Billing tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Plan {
    Free,
    ArcBasic,
    ArcStandard,
    ArcEnterprise,
    HostedArcBasic,
    HostedArcStandard,
    HostedArcEnterprise,
}

impl Plan {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::ArcBasic => "arc-basic",
            Self::ArcStandard => "arc-standard",
            Self::ArcEnterprise => "arc-enterprise",
            Self::HostedArcBasic => "hosted-arc-basic",
            Self::HostedArcStandard => "hosted-arc-standard",
            Self::HostedArcEnterprise => "hosted-arc-enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
