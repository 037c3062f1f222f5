#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Multi-tenant authentication and authorization gateway.
//!
//! Sits in front of an Elasticsearch-compatible cluster: identifies the tenant,
//! classifies the request, authenticates it against cached credentials and
//! forwards what passes every check.

pub mod cache;
pub mod classify;
pub mod config;
pub mod control_plane;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod proxy;
pub mod public_keys;
pub mod sync;

pub use config::{Backend, DEFAULT_TENANT, GatewayConfig, Plan};
pub use domain::DOMAIN_HEADER;
pub use error::GatewayError;
pub use module::Gateway;
pub use sync::SyncEngine;
