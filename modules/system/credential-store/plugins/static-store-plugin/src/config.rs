//! Configuration for the static credential store.

use arc_security::{Permission, User};
use credential_store_sdk::PublicKeyRecord;
use serde::Deserialize;

/// Plugin configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticStoreConfig {
    /// Records loaded at startup, per tenant.
    pub tenants: Vec<TenantSeed>,
}

/// Records seeded into one tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TenantSeed {
    pub domain: String,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub public_key: Option<PublicKeyRecord>,
}
