//! Per-tenant RSA public keys used to verify bearer tokens.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use credential_store_sdk::{DEFAULT_ROLE_KEY, PublicKeyRecord};
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("public key is not valid base64: {0}")]
    Encoding(String),
    #[error("public key is not an RSA PEM: {0}")]
    NotRsa(String),
}

/// Parsed verification key and the claim carrying the role.
#[derive(Clone)]
pub struct TenantKey {
    key: Arc<DecodingKey>,
    role_key: String,
}

impl fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantKey")
            .field("role_key", &self.role_key)
            .finish_non_exhaustive()
    }
}

impl TenantKey {
    /// Parse a stored record. The key is base64-encoded PEM; a raw PEM is also accepted.
    ///
    /// # Errors
    /// Returns [`KeyError`] when the key cannot be decoded or is not an RSA PEM.
    pub fn from_record(record: &PublicKeyRecord) -> Result<Self, KeyError> {
        let encoded = record.public_key.trim();
        let pem = if encoded.starts_with("-----BEGIN") {
            encoded.as_bytes().to_vec()
        } else {
            STANDARD
                .decode(encoded)
                .map_err(|e| KeyError::Encoding(e.to_string()))?
        };
        let key = DecodingKey::from_rsa_pem(&pem).map_err(|e| KeyError::NotRsa(e.to_string()))?;
        Ok(Self {
            key: Arc::new(key),
            role_key: record.role_key().to_owned(),
        })
    }

    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// Claim name holding the role; never empty.
    #[must_use]
    pub fn role_key(&self) -> &str {
        if self.role_key.is_empty() {
            DEFAULT_ROLE_KEY
        } else {
            &self.role_key
        }
    }
}

/// Registered keys by tenant.
#[derive(Debug, Default)]
pub struct PublicKeyRegistry {
    keys: RwLock<HashMap<String, TenantKey>>,
}

impl PublicKeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, tenant: &str) -> Option<TenantKey> {
        self.keys.read().get(tenant).cloned()
    }

    pub fn set(&self, tenant: &str, key: TenantKey) {
        self.keys.write().insert(tenant.to_owned(), key);
    }

    pub fn remove(&self, tenant: &str) -> bool {
        self.keys.write().remove(tenant).is_some()
    }

    #[must_use]
    pub fn tenants(&self) -> Vec<String> {
        self.keys.read().keys().cloned().collect()
    }
}
