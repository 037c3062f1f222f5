//! In-memory record storage for the static credential store.

use std::collections::{BTreeMap, HashMap};

use arc_security::{Permission, User};
use credential_store_sdk::{PublicKeyRecord, RecordKind, StoreError};
use parking_lot::RwLock;

use crate::config::StaticStoreConfig;

#[derive(Debug, Default)]
struct TenantRecords {
    users: BTreeMap<String, User>,
    permissions: BTreeMap<String, Permission>,
    public_key: Option<PublicKeyRecord>,
}

/// In-memory credential store.
///
/// Writes are visible to the next read as soon as the call returns.
#[derive(Debug, Default)]
pub struct StaticStore {
    tenants: RwLock<HashMap<String, TenantRecords>>,
}

impl StaticStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from configuration.
    #[must_use]
    pub fn from_config(cfg: &StaticStoreConfig) -> Self {
        let store = Self::new();
        for seed in &cfg.tenants {
            for user in &seed.users {
                let mut user = user.clone();
                user.normalize();
                store.insert_user(&seed.domain, user);
            }
            for permission in &seed.permissions {
                let mut permission = permission.clone();
                permission.normalize();
                store.insert_permission(&seed.domain, permission);
            }
            if let Some(record) = &seed.public_key {
                store.insert_public_key(&seed.domain, record.clone());
            }
        }
        tracing::debug!(tenants = cfg.tenants.len(), "static credential store seeded");
        store
    }

    /// Insert or replace a user.
    pub fn insert_user(&self, tenant: &str, user: User) {
        self.tenants
            .write()
            .entry(tenant.to_owned())
            .or_default()
            .users
            .insert(user.username.clone(), user);
    }

    /// Insert or replace a permission.
    pub fn insert_permission(&self, tenant: &str, permission: Permission) {
        self.tenants
            .write()
            .entry(tenant.to_owned())
            .or_default()
            .permissions
            .insert(permission.username.clone(), permission);
    }

    pub fn insert_public_key(&self, tenant: &str, record: PublicKeyRecord) {
        self.tenants
            .write()
            .entry(tenant.to_owned())
            .or_default()
            .public_key = Some(record.normalized());
    }

    pub(crate) fn user(&self, tenant: &str, username: &str) -> Option<User> {
        self.tenants
            .read()
            .get(tenant)
            .and_then(|t| t.users.get(username).cloned())
    }

    pub(crate) fn users(&self, tenant: &str) -> Vec<User> {
        self.tenants
            .read()
            .get(tenant)
            .map(|t| t.users.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn permission(&self, tenant: &str, username: &str) -> Option<Permission> {
        self.tenants
            .read()
            .get(tenant)
            .and_then(|t| t.permissions.get(username).cloned())
    }

    pub(crate) fn permissions(&self, tenant: &str) -> Vec<Permission> {
        self.tenants
            .read()
            .get(tenant)
            .map(|t| t.permissions.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn permissions_with_role(&self, tenant: &str, role: &str) -> Vec<Permission> {
        self.tenants
            .read()
            .get(tenant)
            .map(|t| {
                t.permissions
                    .values()
                    .filter(|p| p.role.as_deref() == Some(role))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn public_key(&self, tenant: &str) -> Option<PublicKeyRecord> {
        self.tenants
            .read()
            .get(tenant)
            .and_then(|t| t.public_key.clone())
    }

    pub(crate) fn create_user(&self, tenant: &str, user: &User) -> Result<(), StoreError> {
        let mut guard = self.tenants.write();
        let records = guard.entry(tenant.to_owned()).or_default();
        if records.users.contains_key(&user.username) {
            return Err(StoreError::conflict(RecordKind::User, &user.username));
        }
        records.users.insert(user.username.clone(), user.clone());
        Ok(())
    }

    pub(crate) fn delete_user(&self, tenant: &str, username: &str) -> Result<(), StoreError> {
        self.tenants
            .write()
            .get_mut(tenant)
            .and_then(|t| t.users.remove(username))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(RecordKind::User, username))
    }

    pub(crate) fn create_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError> {
        let mut guard = self.tenants.write();
        let records = guard.entry(tenant.to_owned()).or_default();
        if records.permissions.contains_key(&permission.username) {
            return Err(StoreError::conflict(
                RecordKind::Permission,
                &permission.username,
            ));
        }
        records
            .permissions
            .insert(permission.username.clone(), permission.clone());
        Ok(())
    }

    pub(crate) fn delete_permission(&self, tenant: &str, username: &str) -> Result<(), StoreError> {
        self.tenants
            .write()
            .get_mut(tenant)
            .and_then(|t| t.permissions.remove(username))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(RecordKind::Permission, username))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::TenantSeed;

    #[test]
    fn from_config_seeds_each_tenant() {
        let cfg = StaticStoreConfig {
            tenants: vec![TenantSeed {
                domain: "acme.io".to_owned(),
                users: vec![User::new("foo", "hash")],
                permissions: vec![Permission::new("key", "secret", "foo")],
                public_key: Some(PublicKeyRecord {
                    public_key: "pem".to_owned(),
                    role_key: String::new(),
                }),
            }],
        };
        let store = StaticStore::from_config(&cfg);

        assert!(store.user("acme.io", "foo").is_some());
        assert!(store.permission("acme.io", "key").is_some());
        assert_eq!(store.public_key("acme.io").unwrap().role_key, "role");
        assert!(store.user("other.io", "foo").is_none());
    }

    #[test]
    fn seeded_users_get_categories_from_actions() {
        let mut dev = User::new("dev", "hash");
        dev.allowed_actions = vec![arc_security::UserAction::Develop];
        let cfg = StaticStoreConfig {
            tenants: vec![TenantSeed {
                domain: "t".to_owned(),
                users: vec![dev],
                permissions: Vec::new(),
                public_key: None,
            }],
        };
        let store = StaticStore::from_config(&cfg);

        let dev = store.user("t", "dev").unwrap();
        assert!(dev.categories.contains(&arc_security::Category::Search));
        assert!(!dev.acls.is_empty());
    }

    #[test]
    fn create_twice_conflicts() {
        let store = StaticStore::new();
        let user = User::new("foo", "hash");
        store.create_user("t", &user).unwrap();
        assert!(matches!(
            store.create_user("t", &user),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = StaticStore::new();
        let err = store.delete_permission("t", "nope").unwrap_err();
        assert!(err.is_not_found());
    }
}
