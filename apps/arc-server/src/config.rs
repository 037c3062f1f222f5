//! Server configuration: defaults, optional YAML file, then environment.
use std::path::Path;

use anyhow::{Context, Result};
use api_gateway::GatewayConfig;
use es_store_plugin::EsStoreConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;
use static_store_plugin::StaticStoreConfig;

/// Environment keys read without a prefix, mapped onto `gateway.<lower-cased key>`.
const GATEWAY_ENV_KEYS: &[&str] = &[
    "ES_CLUSTER_URL",
    "USERS_ES_INDEX",
    "PERMISSIONS_ES_INDEX",
    "DOMAIN_NAME_ENCRYPTION_KEY",
    "MULTI_TENANT",
    "SUGGESTIONS_META_ES_INDEX",
    "APPBASE_ID",
    "ARC_ID",
    "CLUSTER_ID",
];

/// Prefix for every other knob; `__` separates nested keys.
const ENV_PREFIX: &str = "ARC_";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub gateway: GatewayConfig,
    /// Serve credentials from memory instead of the cluster.
    pub static_store: Option<StaticStoreConfig>,
    /// Cap on records returned by list operations of the cluster store.
    pub max_list_size: Option<usize>,
}

impl ServerConfig {
    /// # Errors
    /// Fails when `path` does not exist or the merged sources do not deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            anyhow::ensure!(path.exists(), "config file {} not found", path.display());
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(
                Env::raw()
                    .only(GATEWAY_ENV_KEYS)
                    .map(|key| format!("gateway.{key}").into()),
            )
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["id"]).split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// Cluster store settings derived from the gateway settings.
    #[must_use]
    pub fn es_store(&self) -> EsStoreConfig {
        let defaults = EsStoreConfig::default();
        EsStoreConfig {
            url: self.gateway.es_cluster_url.clone(),
            users_index: self.gateway.users_es_index.clone(),
            permissions_index: self.gateway.permissions_es_index.clone(),
            public_key_index: self.gateway.public_key_es_index.clone(),
            multi_tenant: self.gateway.multi_tenant,
            connect_timeout_ms: self.gateway.store_connect_timeout_ms,
            request_timeout_ms: self.gateway.store_request_timeout_ms,
            max_list_size: self.max_list_size.unwrap_or(defaults.max_list_size),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    const CLEAN: [(&str, Option<&str>); 4] = [
        ("ES_CLUSTER_URL", None),
        ("MULTI_TENANT", None),
        ("ARC_ID", None),
        ("ARC_GATEWAY__BIND_ADDR", None),
    ];

    #[test]
    fn defaults_without_sources() {
        temp_env::with_vars(CLEAN, || {
            let cfg = ServerConfig::load(None).unwrap();
            assert_eq!(cfg.gateway.bind_addr, "0.0.0.0:8000");
            assert!(cfg.static_store.is_none());
            assert_eq!(cfg.es_store().max_list_size, 10_000);
        });
    }

    #[test]
    fn recognized_keys_and_prefixed_knobs_are_read() {
        temp_env::with_vars(
            [
                ("ES_CLUSTER_URL", Some("http://es.internal:9200")),
                ("MULTI_TENANT", Some("true")),
                ("ARC_ID", Some("arc-seven")),
                ("ARC_GATEWAY__BIND_ADDR", Some("127.0.0.1:9000")),
            ],
            || {
                let cfg = ServerConfig::load(None).unwrap();
                assert_eq!(cfg.gateway.es_cluster_url, "http://es.internal:9200");
                assert!(cfg.gateway.multi_tenant);
                assert_eq!(cfg.gateway.arc_id.as_deref(), Some("arc-seven"));
                assert_eq!(cfg.gateway.bind_addr, "127.0.0.1:9000");

                let store = cfg.es_store();
                assert_eq!(store.url, "http://es.internal:9200");
                assert!(store.multi_tenant);
            },
        );
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "gateway:\n  es_cluster_url: http://from-file:9200\n  users_es_index: .people\nstatic_store:\n  tenants: []"
        )
        .unwrap();

        temp_env::with_vars(
            [
                ("ES_CLUSTER_URL", Some("http://from-env:9200")),
                ("MULTI_TENANT", None),
                ("ARC_ID", None),
                ("ARC_GATEWAY__BIND_ADDR", None),
            ],
            || {
                let cfg = ServerConfig::load(Some(file.path())).unwrap();
                assert_eq!(cfg.gateway.es_cluster_url, "http://from-env:9200");
                assert_eq!(cfg.gateway.users_es_index, ".people");
                assert!(cfg.static_store.is_some());
            },
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        temp_env::with_vars(CLEAN, || {
            let err = ServerConfig::load(Some(Path::new("/nonexistent/arc.yaml"))).unwrap_err();
            assert!(err.to_string().contains("not found"));
        });
    }

    #[test]
    fn unknown_keys_are_rejected() {
        temp_env::with_vars(
            [
                ("ES_CLUSTER_URL", None),
                ("MULTI_TENANT", None),
                ("ARC_ID", None),
                ("ARC_GATEWAY__BIND_ADDR", None),
                ("ARC_BOGUS", Some("1")),
            ],
            || {
                assert!(ServerConfig::load(None).is_err());
            },
        );
    }
}
