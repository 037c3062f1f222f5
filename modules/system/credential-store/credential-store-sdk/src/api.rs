//! Public API trait for the credential store.
//!
//! Every method is scoped by `tenant`, the raw domain of the request. Futures
//! are dropped when the originating request is cancelled, which abandons the
//! in-flight call.

use arc_security::{Credential, Permission, User};
use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::PublicKeyRecord;

/// Persistent storage of users, permissions and public keys.
///
/// Mutations become visible to the next read before they return
/// (`refresh=wait_for` semantics).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolve a username to either a user or a permission.
    ///
    /// # Errors
    ///
    /// - `Integrity` if the username exists as both a user and a permission
    /// - `Unavailable`/`Internal` on backend failures
    async fn lookup_by_username(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<Option<Credential>, StoreError>;

    /// Find the permission carrying `role`.
    ///
    /// # Errors
    ///
    /// - `Integrity` if more than one permission carries the role
    /// - `Unavailable`/`Internal` on backend failures
    async fn lookup_by_role(&self, tenant: &str, role: &str)
    -> Result<Option<Permission>, StoreError>;

    /// Whether any permission carries `role`.
    ///
    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn exists_with_role(&self, tenant: &str, role: &str) -> Result<bool, StoreError>;

    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn read_public_key(&self, tenant: &str) -> Result<Option<PublicKeyRecord>, StoreError>;

    /// Insert or replace the tenant's public key record.
    ///
    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn write_public_key(
        &self,
        tenant: &str,
        record: &PublicKeyRecord,
    ) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn get_user(&self, tenant: &str, username: &str) -> Result<Option<User>, StoreError>;

    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn list_users(&self, tenant: &str) -> Result<Vec<User>, StoreError>;

    /// # Errors
    ///
    /// `Conflict` if the username is taken.
    async fn create_user(&self, tenant: &str, user: &User) -> Result<(), StoreError>;

    /// Replace a user record.
    ///
    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn update_user(&self, tenant: &str, user: &User) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// `NotFound` if no such user exists.
    async fn delete_user(&self, tenant: &str, username: &str) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn get_permission(
        &self,
        tenant: &str,
        username: &str,
    ) -> Result<Option<Permission>, StoreError>;

    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn list_permissions(&self, tenant: &str) -> Result<Vec<Permission>, StoreError>;

    /// # Errors
    ///
    /// `Conflict` if the username is taken.
    async fn create_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError>;

    /// Replace a permission record.
    ///
    /// # Errors
    ///
    /// `Unavailable`/`Internal` on backend failures.
    async fn update_permission(
        &self,
        tenant: &str,
        permission: &Permission,
    ) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// `NotFound` if no such permission exists.
    async fn delete_permission(&self, tenant: &str, username: &str) -> Result<(), StoreError>;
}
