//! `CredentialStore` implementation for the static store.

use arc_security::{Credential, Permission, User};
use async_trait::async_trait;
use credential_store_sdk::{CredentialStore, PublicKeyRecord, StoreError};

use super::service::StaticStore;

#[async_trait]
impl CredentialStore for StaticStore {
    async fn lookup_by_username(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        match (self.user(tenant, username), self.permission(tenant, username)) {
            (Some(_), Some(_)) => Err(StoreError::Integrity(format!(
                "username={username} exists as both user and permission"
            ))),
            (Some(user), None) => Ok(Some(Credential::from(user))),
            (None, Some(permission)) => Ok(Some(Credential::from(permission))),
            (None, None) => Ok(None),
        }
    }

    async fn lookup_by_role(
        &self,
        tenant: &str,
        role: &str,
    ) -> Result<Option<Permission>, StoreError> {
        let mut hits = self.permissions_with_role(tenant, role);
        if hits.len() > 1 {
            return Err(StoreError::Integrity(format!(
                "{} permissions share role={role}",
                hits.len()
            )));
        }
        Ok(hits.pop())
    }

    async fn exists_with_role(&self, tenant: &str, role: &str) -> Result<bool, StoreError> {
        Ok(!self.permissions_with_role(tenant, role).is_empty())
    }

    async fn read_public_key(&self, tenant: &str) -> Result<Option<PublicKeyRecord>, StoreError> {
        Ok(self.public_key(tenant))
    }

    async fn write_public_key(
        &self,
        tenant: &str,
        record: &PublicKeyRecord,
    ) -> Result<(), StoreError> {
        self.insert_public_key(tenant, record.clone());
        Ok(())
    }

    async fn get_user(&self, tenant: &str, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.user(tenant, username))
    }

    async fn list_users(&self, tenant: &str) -> Result<Vec<User>, StoreError> {
        Ok(self.users(tenant))
    }

    async fn create_user(&self, tenant: &str, user: &User) -> Result<(), StoreError> {
        StaticStore::create_user(self, tenant, user)
    }

    async fn update_user(&self, tenant: &str, user: &User) -> Result<(), StoreError> {
        self.insert_user(tenant, user.clone());
        Ok(())
    }

    async fn delete_user(&self, tenant: &str, username: &str) -> Result<(), StoreError> {
        StaticStore::delete_user(self, tenant, username)
    }

    async fn get_permission(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<Option<Permission>, StoreError> {
        Ok(self.permission(tenant, username))
    }

    async fn list_permissions(&self, tenant: &str) -> Result<Vec<Permission>, StoreError> {
        Ok(self.permissions(tenant))
    }

    async fn create_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError> {
        StaticStore::create_permission(self, tenant, permission)
    }

    async fn update_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError> {
        self.insert_permission(tenant, permission.clone());
        Ok(())
    }

    async fn delete_permission(&self, tenant: &str, username: &str) -> Result<(), StoreError> {
        StaticStore::delete_permission(self, tenant, username)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_by_username_distinguishes_variants() {
        let store = StaticStore::new();
        store.insert_user("t", User::new("foo", "hash"));
        store.insert_permission("t", Permission::new("key", "secret", "foo"));
        let plugin: &dyn CredentialStore = &store;

        let user = plugin.lookup_by_username("t", "foo").await.unwrap();
        assert!(matches!(user, Some(Credential::User(_))));
        let key = plugin.lookup_by_username("t", "key").await.unwrap();
        assert!(matches!(key, Some(Credential::Permission(_))));
        assert!(plugin.lookup_by_username("t", "nobody").await.unwrap().is_none());
        assert!(plugin.lookup_by_username("u", "foo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_an_integrity_failure() {
        let store = StaticStore::new();
        store.insert_user("t", User::new("dup", "hash"));
        store.insert_permission("t", Permission::new("dup", "secret", "foo"));

        let err = store.lookup_by_username("t", "dup").await.unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn role_lookup() {
        let store = StaticStore::new();
        let mut p = Permission::new("key", "secret", "foo");
        p.role = Some("admin".to_owned());
        store.insert_permission("t", p);

        assert!(store.exists_with_role("t", "admin").await.unwrap());
        assert!(!store.exists_with_role("t", "viewer").await.unwrap());
        let hit = store.lookup_by_role("t", "admin").await.unwrap().unwrap();
        assert_eq!(hit.username, "key");
    }
}
