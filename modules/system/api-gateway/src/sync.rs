//! Periodic reconciliation of the in-process caches with the credential store.
//!
//! Every tick each [`SyncScript`] runs once per known tenant. Scripts read the
//! store without holding any cache lock and swap entries one key at a time.
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use arc_security::{Credential, Permission, User};
use async_trait::async_trait;
use credential_store_sdk::{CredentialStore, StoreError};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::cache::{CredentialCache, PasswordCache};
use crate::public_keys::{PublicKeyRegistry, TenantKey};

/// One reconciler, scoped to a single record type.
#[async_trait]
pub trait SyncScript: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reconcile the caches of `tenant` with the store.
    ///
    /// # Errors
    /// Propagates store failures; the caches are left as they were.
    async fn sync(&self, store: &dyn CredentialStore, tenant: &str) -> Result<(), StoreError>;
}

/// Refreshes cached users, dropping the ones deleted from the store.
pub struct UserSync {
    credentials: Arc<CredentialCache>,
    passwords: Arc<PasswordCache>,
}

impl UserSync {
    #[must_use]
    pub fn new(credentials: Arc<CredentialCache>, passwords: Arc<PasswordCache>) -> Self {
        Self {
            credentials,
            passwords,
        }
    }

    /// Apply a store listing to the cached users of `tenant`.
    pub fn set_cache(&self, tenant: &str, users: Vec<User>) {
        let mut stored: HashMap<String, User> = users
            .into_iter()
            .map(|u| (u.username.clone(), u))
            .collect();

        for cached in self.credentials.snapshot(tenant) {
            let Credential::User(cached) = cached else {
                continue;
            };
            match stored.remove(&cached.username) {
                Some(fresh) => {
                    if fresh.password != cached.password {
                        self.passwords.invalidate(tenant, &cached.username);
                    }
                    self.credentials.put(tenant, &cached.username, fresh.into());
                }
                None => {
                    self.credentials.invalidate(tenant, &cached.username);
                    self.passwords.invalidate(tenant, &cached.username);
                }
            }
        }
    }
}

#[async_trait]
impl SyncScript for UserSync {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn sync(&self, store: &dyn CredentialStore, tenant: &str) -> Result<(), StoreError> {
        let users = store.list_users(tenant).await?;
        self.set_cache(tenant, users);
        Ok(())
    }
}

/// Refreshes cached permissions, dropping the ones deleted from the store.
pub struct PermissionSync {
    credentials: Arc<CredentialCache>,
}

impl PermissionSync {
    #[must_use]
    pub fn new(credentials: Arc<CredentialCache>) -> Self {
        Self { credentials }
    }

    pub fn set_cache(&self, tenant: &str, permissions: Vec<Permission>) {
        let mut stored: HashMap<String, Permission> = permissions
            .into_iter()
            .map(|p| (p.username.clone(), p))
            .collect();

        for cached in self.credentials.snapshot(tenant) {
            let Credential::Permission(cached) = cached else {
                continue;
            };
            match stored.remove(&cached.username) {
                Some(fresh) => self.credentials.put(tenant, &cached.username, fresh.into()),
                None => {
                    self.credentials.invalidate(tenant, &cached.username);
                }
            }
        }
    }
}

#[async_trait]
impl SyncScript for PermissionSync {
    fn name(&self) -> &'static str {
        "permissions"
    }

    async fn sync(&self, store: &dyn CredentialStore, tenant: &str) -> Result<(), StoreError> {
        let permissions = store.list_permissions(tenant).await?;
        self.set_cache(tenant, permissions);
        Ok(())
    }
}

/// Reloads the tenant's JWT verification key.
pub struct PublicKeySync {
    keys: Arc<PublicKeyRegistry>,
}

impl PublicKeySync {
    #[must_use]
    pub fn new(keys: Arc<PublicKeyRegistry>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl SyncScript for PublicKeySync {
    fn name(&self) -> &'static str {
        "public_key"
    }

    async fn sync(&self, store: &dyn CredentialStore, tenant: &str) -> Result<(), StoreError> {
        match store.read_public_key(tenant).await? {
            Some(record) => match TenantKey::from_record(&record) {
                Ok(key) => self.keys.set(tenant, key),
                Err(err) => {
                    tracing::warn!(tenant, error = %err, "stored public key is unusable");
                }
            },
            None => {
                self.keys.remove(tenant);
            }
        }
        Ok(())
    }
}

pub struct SyncEngine {
    store: Arc<dyn CredentialStore>,
    scripts: Vec<Arc<dyn SyncScript>>,
    interval: Duration,
    credentials: Arc<CredentialCache>,
    keys: Arc<PublicKeyRegistry>,
    default_tenant: String,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        scripts: Vec<Arc<dyn SyncScript>>,
        interval: Duration,
        credentials: Arc<CredentialCache>,
        keys: Arc<PublicKeyRegistry>,
        default_tenant: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scripts,
            interval,
            credentials,
            keys,
            default_tenant: default_tenant.into(),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tenants with cached state plus the default tenant.
    #[must_use]
    pub fn known_tenants(&self) -> BTreeSet<String> {
        let mut tenants: BTreeSet<String> = self.credentials.tenants().into_iter().collect();
        tenants.extend(self.keys.tenants());
        tenants.insert(self.default_tenant.clone());
        tenants
    }

    /// Run every script for every known tenant once. Failures are logged and skipped.
    pub async fn run_once(&self) {
        for tenant in self.known_tenants() {
            for script in &self.scripts {
                if let Err(err) = script.sync(self.store.as_ref(), &tenant).await {
                    tracing::warn!(
                        script = script.name(),
                        tenant = %tenant,
                        error = %err,
                        "cache sync failed; retrying next tick"
                    );
                }
            }
        }
    }

    /// Tick until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            scripts = self.scripts.len(),
            "starting cache sync"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; caches start empty.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!("cache sync stopped");
                    break;
                }
                _ = ticker.tick() => {
                    tracing::debug!("running cache sync");
                    self.run_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use credential_store_sdk::PublicKeyRecord;
    use static_store_plugin::StaticStore;

    fn caches() -> (Arc<CredentialCache>, Arc<PasswordCache>) {
        (Arc::new(CredentialCache::new()), Arc::new(PasswordCache::new()))
    }

    #[test]
    fn user_sync_replaces_and_evicts() {
        let (credentials, passwords) = caches();
        credentials.put("t", "kept", User::new("kept", "h1").into());
        credentials.put("t", "rotated", User::new("rotated", "h1").into());
        credentials.put("t", "gone", User::new("gone", "h1").into());
        passwords.put("t", "kept", "pw");
        passwords.put("t", "rotated", "pw");
        passwords.put("t", "gone", "pw");

        let mut kept = User::new("kept", "h1");
        kept.is_admin = true;
        let sync = UserSync::new(credentials.clone(), passwords.clone());
        sync.set_cache("t", vec![kept, User::new("rotated", "h2")]);

        assert!(credentials.get("t", "kept").unwrap().is_admin());
        assert!(passwords.has("t", "kept", "pw"));
        assert_eq!(credentials.get("t", "rotated").unwrap().password(), "h2");
        assert!(!passwords.has("t", "rotated", "pw"));
        assert!(credentials.get("t", "gone").is_none());
        assert!(!passwords.has("t", "gone", "pw"));
    }

    #[test]
    fn permission_sync_leaves_users_alone() {
        let (credentials, _) = caches();
        credentials.put("t", "u", User::new("u", "h").into());
        credentials.put("t", "p", Permission::new("p", "s", "u").into());

        PermissionSync::new(credentials.clone()).set_cache("t", Vec::new());

        assert!(credentials.get("t", "u").is_some());
        assert!(credentials.get("t", "p").is_none());
    }

    #[tokio::test]
    async fn run_once_covers_cached_tenants() {
        let (credentials, passwords) = caches();
        let keys = Arc::new(PublicKeyRegistry::new());
        let store = Arc::new(StaticStore::new());
        store.insert_permission("acme", Permission::new("p", "new-secret", "admin"));
        credentials.put("acme", "p", Permission::new("p", "old-secret", "admin").into());

        let engine = SyncEngine::new(
            store,
            vec![
                Arc::new(UserSync::new(credentials.clone(), passwords)),
                Arc::new(PermissionSync::new(credentials.clone())),
                Arc::new(PublicKeySync::new(keys.clone())),
            ],
            Duration::from_secs(60),
            credentials.clone(),
            keys,
            "default",
        );
        assert_eq!(
            engine.known_tenants().into_iter().collect::<Vec<_>>(),
            vec!["acme".to_owned(), "default".to_owned()]
        );

        engine.run_once().await;
        assert_eq!(credentials.get("acme", "p").unwrap().password(), "new-secret");
    }

    #[tokio::test]
    async fn unusable_public_key_is_skipped() {
        let keys = Arc::new(PublicKeyRegistry::new());
        let store = StaticStore::new();
        store.insert_public_key("t", PublicKeyRecord::new("bm90IGEga2V5", "role"));

        PublicKeySync::new(keys.clone())
            .sync(&store, "t")
            .await
            .unwrap();
        assert!(keys.get("t").is_none());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (credentials, _) = caches();
        let engine = Arc::new(SyncEngine::new(
            Arc::new(StaticStore::new()),
            Vec::new(),
            Duration::from_secs(10),
            credentials,
            Arc::new(PublicKeyRegistry::new()),
            "default",
        ));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(engine.run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
