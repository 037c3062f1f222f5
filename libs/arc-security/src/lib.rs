#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Credential records, the category/ACL/operation taxonomy and the typed
//! request context shared by the gateway crates.

pub mod acl;
pub mod action;
pub mod category;
pub mod context;
pub mod credential;
pub mod error;
pub mod op;
pub mod pattern;
pub mod permission;
pub mod query;
pub mod user;

pub use acl::Acl;
pub use action::{UserAction, categories_for};
pub use category::{Category, acls_for};
pub use context::{ContextError, ContextKey, RequestContext, TenantDomain};
pub use credential::{Credential, CredentialTag};
pub use error::ModelError;
pub use op::Op;
pub use pattern::{CidrBlock, IndexPattern, RefererPattern};
pub use permission::{NEVER_EXPIRES, Permission, PermissionPatch};
pub use query::{QueryType, RsQuery, SortBy};
pub use user::{User, UserPatch};

/// Check that every ACL is authorized by at least one of `categories`.
///
/// # Errors
/// Returns [`ModelError::AclNotInCategories`] naming the first orphaned ACL.
pub fn ensure_acls_authorized(categories: &[Category], acls: &[Acl]) -> Result<(), ModelError> {
    let allowed = acls_for(categories);
    match acls.iter().find(|a| !allowed.contains(a)) {
        Some(acl) => Err(ModelError::AclNotInCategories {
            acl: *acl,
            categories: categories.to_vec(),
        }),
        None => Ok(()),
    }
}
