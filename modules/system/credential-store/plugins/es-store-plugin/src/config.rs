//! Configuration for the Elasticsearch credential store.

use std::time::Duration;

use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EsStoreConfig {
    /// Cluster base URL; credentials in the userinfo part are sent as basic auth.
    pub url: String,

    pub users_index: String,
    pub permissions_index: String,
    pub public_key_index: String,

    /// Give every tenant its own indices.
    pub multi_tenant: bool,

    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,

    /// Upper bound on documents returned by list operations.
    pub max_list_size: usize,
}

impl Default for EsStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_owned(),
            users_index: ".users".to_owned(),
            permissions_index: ".permissions".to_owned(),
            public_key_index: ".publickeys".to_owned(),
            multi_tenant: false,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            max_list_size: 10_000,
        }
    }
}

impl EsStoreConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
