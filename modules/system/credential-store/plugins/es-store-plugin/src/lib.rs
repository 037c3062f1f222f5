#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Elasticsearch Credential Store Plugin
//!
//! Stores each record kind in its own index with the natural key as the
//! document ID. In multi-tenant mode every tenant gets its own set of indices
//! (`<index>-<tenant>`). Mutations use `refresh=wait_for`.

pub mod config;
pub mod domain;

pub use config::EsStoreConfig;
pub use domain::service::ElasticsearchStore;
