//! `CredentialStore` implementation for the Elasticsearch store.

use arc_security::{Credential, Permission, User};
use async_trait::async_trait;
use credential_store_sdk::{
    CredentialStore, PUBLIC_KEY_DOC_ID, PublicKeyRecord, RecordKind, StoreError,
};
use serde_json::json;

use super::service::{ElasticsearchStore, WriteMode};

impl ElasticsearchStore {
    /// Permissions whose `role` equals `role` exactly.
    async fn permissions_with_role(
        &self,
        tenant: &str,
        role: &str,
    ) -> Result<Vec<Permission>, StoreError> {
        let query = json!({ "match": { "role": { "query": role, "operator": "and" } } });
        let hits: Vec<Permission> = self
            .search(RecordKind::Permission, tenant, query, self.max_list_size())
            .await?;
        Ok(hits
            .into_iter()
            .filter(|p| p.role.as_deref() == Some(role))
            .collect())
    }
}

#[async_trait]
impl CredentialStore for ElasticsearchStore {
    async fn lookup_by_username(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let (user, permission) = tokio::try_join!(
            self.get_user(tenant, username),
            self.get_permission(tenant, username)
        )?;
        match (user, permission) {
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
        let mut hits = self.permissions_with_role(tenant, role).await?;
        if hits.len() > 1 {
            return Err(StoreError::Integrity(format!(
                "{} permissions share role={role}",
                hits.len()
            )));
        }
        Ok(hits.pop())
    }

    async fn exists_with_role(&self, tenant: &str, role: &str) -> Result<bool, StoreError> {
        Ok(!self.permissions_with_role(tenant, role).await?.is_empty())
    }

    async fn read_public_key(&self, tenant: &str) -> Result<Option<PublicKeyRecord>, StoreError> {
        let record: Option<PublicKeyRecord> = self
            .get_doc(RecordKind::PublicKey, tenant, PUBLIC_KEY_DOC_ID)
            .await?;
        Ok(record.map(PublicKeyRecord::normalized))
    }

    async fn write_public_key(
        &self,
        tenant: &str,
        record: &PublicKeyRecord,
    ) -> Result<(), StoreError> {
        let record = record.clone().normalized();
        self.write_doc(
            RecordKind::PublicKey,
            tenant,
            PUBLIC_KEY_DOC_ID,
            &record,
            WriteMode::Upsert,
        )
        .await
    }

    async fn get_user(&self, tenant: &str, username: &str) -> Result<Option<User>, StoreError> {
        self.get_doc(RecordKind::User, tenant, username).await
    }

    async fn list_users(&self, tenant: &str) -> Result<Vec<User>, StoreError> {
        self.search(
            RecordKind::User,
            tenant,
            json!({ "match_all": {} }),
            self.max_list_size(),
        )
        .await
    }

    async fn create_user(&self, tenant: &str, user: &User) -> Result<(), StoreError> {
        self.write_doc(
            RecordKind::User,
            tenant,
            &user.username,
            user,
            WriteMode::Create,
        )
        .await
    }

    async fn update_user(&self, tenant: &str, user: &User) -> Result<(), StoreError> {
        self.write_doc(
            RecordKind::User,
            tenant,
            &user.username,
            user,
            WriteMode::Upsert,
        )
        .await
    }

    async fn delete_user(&self, tenant: &str, username: &str) -> Result<(), StoreError> {
        self.delete_doc(RecordKind::User, tenant, username).await
    }

    async fn get_permission(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<Option<Permission>, StoreError> {
        self.get_doc(RecordKind::Permission, tenant, username).await
    }

    async fn list_permissions(&self, tenant: &str) -> Result<Vec<Permission>, StoreError> {
        self.search(
            RecordKind::Permission,
            tenant,
            json!({ "match_all": {} }),
            self.max_list_size(),
        )
        .await
    }

    async fn create_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError> {
        self.write_doc(
            RecordKind::Permission,
            tenant,
            &permission.username,
            permission,
            WriteMode::Create,
        )
        .await
    }

    async fn update_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError> {
        self.write_doc(
            RecordKind::Permission,
            tenant,
            &permission.username,
            permission,
            WriteMode::Upsert,
        )
        .await
    }

    async fn delete_permission(&self, tenant: &str, username: &str) -> Result<(), StoreError> {
        self.delete_doc(RecordKind::Permission, tenant, username)
            .await
    }
}
