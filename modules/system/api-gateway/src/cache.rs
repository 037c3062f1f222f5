//! Per-tenant credential and validated-password caches.
//!
//! Both caches are two-level maps `tenant -> username -> value` behind a
//! `parking_lot::Mutex` held only for the duration of a single operation.
//! Entries are keyed by the raw tenant name.
use std::collections::HashMap;
use std::sync::Arc;

use arc_security::Credential;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// Resolved users and permissions, shared by every request of the process.
#[derive(Debug, Default)]
pub struct CredentialCache {
    inner: Mutex<HashMap<String, HashMap<String, Credential>>>,
}

impl CredentialCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, tenant: &str, username: &str) -> Option<Credential> {
        self.inner
            .lock()
            .get(tenant)
            .and_then(|users| users.get(username))
            .cloned()
    }

    pub fn put(&self, tenant: &str, username: &str, credential: Credential) {
        self.inner
            .lock()
            .entry(tenant.to_owned())
            .or_default()
            .insert(username.to_owned(), credential);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, tenant: &str, username: &str) -> bool {
        let mut guard = self.inner.lock();
        let Some(users) = guard.get_mut(tenant) else {
            return false;
        };
        let removed = users.remove(username).is_some();
        if users.is_empty() {
            guard.remove(tenant);
        }
        removed
    }

    /// Copy of every credential cached for `tenant`.
    #[must_use]
    pub fn snapshot(&self, tenant: &str) -> Vec<Credential> {
        self.inner
            .lock()
            .get(tenant)
            .map(|users| users.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Tenants with at least one cached credential.
    #[must_use]
    pub fn tenants(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }
}

/// Passwords that already passed a bcrypt comparison.
///
/// Only a SHA-256 digest of the plaintext is retained.
#[derive(Debug, Default)]
pub struct PasswordCache {
    inner: Mutex<HashMap<String, HashMap<String, [u8; 32]>>>,
}

fn digest(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

impl PasswordCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, tenant: &str, username: &str, password: &str) {
        self.inner
            .lock()
            .entry(tenant.to_owned())
            .or_default()
            .insert(username.to_owned(), digest(password));
    }

    #[must_use]
    pub fn has(&self, tenant: &str, username: &str, password: &str) -> bool {
        let expected = digest(password);
        self.inner
            .lock()
            .get(tenant)
            .and_then(|users| users.get(username))
            .is_some_and(|d| *d == expected)
    }

    pub fn invalidate(&self, tenant: &str, username: &str) -> bool {
        let mut guard = self.inner.lock();
        let Some(users) = guard.get_mut(tenant) else {
            return false;
        };
        let removed = users.remove(username).is_some();
        if users.is_empty() {
            guard.remove(tenant);
        }
        removed
    }
}

/// Drops cached state for a credential that is about to change.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_credential(&self, tenant: &str, username: &str);
}

/// Invalidates both in-process caches.
#[derive(Debug, Clone)]
pub struct LocalInvalidator {
    credentials: Arc<CredentialCache>,
    passwords: Arc<PasswordCache>,
}

impl LocalInvalidator {
    #[must_use]
    pub fn new(credentials: Arc<CredentialCache>, passwords: Arc<PasswordCache>) -> Self {
        Self {
            credentials,
            passwords,
        }
    }
}

impl CacheInvalidator for LocalInvalidator {
    fn invalidate_credential(&self, tenant: &str, username: &str) {
        let cached = self.credentials.invalidate(tenant, username);
        let validated = self.passwords.invalidate(tenant, username);
        tracing::debug!(tenant, username, cached, validated, "credential invalidated");
    }
}
