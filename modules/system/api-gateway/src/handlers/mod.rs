//! Administrative routes served by the gateway itself.
//!
//! Every write publishes a cache invalidation for the affected credential
//! before the response is returned.
use std::sync::Arc;

use arc_security::RequestContext;
use axum::Router;
use axum::routing::get;
use credential_store_sdk::CredentialStore;
use serde::de::DeserializeOwned;

use crate::cache::CacheInvalidator;
use crate::control_plane::ControlPlane;
use crate::error::{Ack, GatewayError};
use crate::public_keys::PublicKeyRegistry;

mod permissions;
mod public_key;
mod users;

/// Collaborators shared by the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn CredentialStore>,
    pub invalidator: Arc<dyn CacheInvalidator>,
    pub keys: Arc<PublicKeyRegistry>,
    pub control_plane: Option<Arc<dyn ControlPlane>>,
    /// bcrypt work factor for new and changed user passwords.
    pub bcrypt_cost: u32,
}

impl AdminState {
    /// Drop `username` from the local caches and, when configured, from every node.
    async fn invalidate(&self, tenant: &str, username: &str) {
        self.invalidator.invalidate_credential(tenant, username);
        if let Some(cp) = &self.control_plane
            && let Err(err) = cp.invalidate_credential(tenant, username).await
        {
            tracing::warn!(tenant, username, error = %err, "control plane invalidation failed");
        }
    }
}

/// Raw tenant name of the request.
fn tenant(ctx: &RequestContext) -> Result<&str, GatewayError> {
    Ok(ctx.domain()?.raw())
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::bad_request(format!("invalid body: {e}")))
}

async fn root() -> Ack {
    Ack::ok("You're good to go!")
}

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(root))
        .route(
            "/_public_key",
            get(public_key::read_public_key).put(public_key::write_public_key),
        )
        .route("/_permission", axum::routing::post(permissions::create_permission))
        .route(
            "/_permission/{username}",
            get(permissions::get_permission)
                .patch(permissions::update_permission)
                .delete(permissions::delete_permission),
        )
        .route("/_permissions", get(permissions::list_permissions))
        .route("/user/_permissions", get(permissions::list_owned_permissions))
        .route("/{index}/_permissions", get(permissions::list_index_permissions))
        .route(
            "/_role/{name}",
            get(permissions::get_role)
                .post(permissions::create_role)
                .patch(permissions::update_role)
                .delete(permissions::delete_role),
        )
        .route("/_user", get(users::current_user).post(users::create_user))
        .route(
            "/_user/{username}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/_users", get(users::list_users))
        .with_state(state)
}
