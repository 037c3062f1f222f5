#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static Credential Store Plugin
//!
//! Keeps users, permissions and public keys in process memory. Intended for
//! development mode and tests; nothing survives a restart.
//!
//! ## Configuration
//!
//! ```yaml
//! static_store:
//!   tenants:
//!     - domain: "localhost"
//!       users:
//!         - username: "foo"
//!           password: "$2b$10$..."
//!           is_admin: true
//!       permissions: []
//! ```

pub mod config;
pub mod domain;

pub use config::{StaticStoreConfig, TenantSeed};
pub use domain::service::StaticStore;
