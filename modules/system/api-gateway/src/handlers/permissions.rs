use arc_security::{Permission, PermissionPatch, RequestContext};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use credential_store_sdk::{RecordKind, StoreError};

use super::{AdminState, parse_body, tenant};
use crate::error::{Ack, GatewayError};

const KEY_LEN: usize = 9;
const SECRET_LEN: usize = 36;

fn role_taken(role: &str) -> GatewayError {
    GatewayError::bad_request(format!("permission with role={role} already exists"))
}

async fn ensure_role_free(state: &AdminState, tenant: &str, role: &str) -> Result<(), GatewayError> {
    if state.store.exists_with_role(tenant, role).await? {
        return Err(role_taken(role));
    }
    Ok(())
}

/// A permission with random credentials owned by the caller, scoped by `patch`.
fn new_permission(ctx: &RequestContext, patch: PermissionPatch) -> Result<Permission, GatewayError> {
    let creator = ctx.credential()?.username().to_owned();
    let mut permission = Permission::new(
        nanoid::nanoid!(KEY_LEN),
        nanoid::nanoid!(SECRET_LEN),
        creator,
    );
    patch.apply(&mut permission)?;
    Ok(permission)
}

async fn load(state: &AdminState, tenant: &str, username: &str) -> Result<Permission, GatewayError> {
    state
        .store
        .get_permission(tenant, username)
        .await?
        .ok_or_else(|| StoreError::not_found(RecordKind::Permission, username).into())
}

async fn load_role(state: &AdminState, tenant: &str, role: &str) -> Result<Permission, GatewayError> {
    state
        .store
        .lookup_by_role(tenant, role)
        .await?
        .ok_or_else(|| GatewayError::NotFound(format!("permission with role={role} not found")))
}

/// Apply `patch`, keeping roles unique.
async fn patch_permission(
    state: &AdminState,
    tenant: &str,
    mut permission: Permission,
    patch: PermissionPatch,
) -> Result<Permission, GatewayError> {
    if let Some(role) = patch.role.as_deref()
        && permission.role.as_deref() != Some(role)
    {
        ensure_role_free(state, tenant, role).await?;
    }
    patch.apply(&mut permission)?;
    state.store.update_permission(tenant, &permission).await?;
    state.invalidate(tenant, &permission.username).await;
    Ok(permission)
}

pub(super) async fn create_permission(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<Permission>), GatewayError> {
    let tenant = tenant(&ctx)?;
    let patch: PermissionPatch = if body.is_empty() {
        PermissionPatch::default()
    } else {
        parse_body(&body)?
    };
    if let Some(role) = patch.role.as_deref() {
        ensure_role_free(&state, tenant, role).await?;
    }
    let permission = new_permission(&ctx, patch)?;
    state.store.create_permission(tenant, &permission).await?;
    tracing::info!(tenant, username = %permission.username, "permission created");
    Ok((StatusCode::CREATED, Json(permission)))
}

pub(super) async fn get_permission(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(username): Path<String>,
) -> Result<Json<Permission>, GatewayError> {
    Ok(Json(load(&state, tenant(&ctx)?, &username).await?))
}

pub(super) async fn update_permission(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<Json<Permission>, GatewayError> {
    let tenant = tenant(&ctx)?;
    let patch: PermissionPatch = parse_body(&body)?;
    let permission = load(&state, tenant, &username).await?;
    Ok(Json(patch_permission(&state, tenant, permission, patch).await?))
}

pub(super) async fn delete_permission(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(username): Path<String>,
) -> Result<Ack, GatewayError> {
    let tenant = tenant(&ctx)?;
    state.store.delete_permission(tenant, &username).await?;
    state.invalidate(tenant, &username).await;
    Ok(Ack::ok(format!("permission with username={username} deleted")))
}

pub(super) async fn list_permissions(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Permission>>, GatewayError> {
    Ok(Json(state.store.list_permissions(tenant(&ctx)?).await?))
}

/// Permissions owned by the caller.
pub(super) async fn list_owned_permissions(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Permission>>, GatewayError> {
    let owner = ctx.credential()?.username();
    let mut permissions = state.store.list_permissions(tenant(&ctx)?).await?;
    permissions.retain(|p| p.owner == owner);
    Ok(Json(permissions))
}

/// Permissions whose index patterns admit `index`.
pub(super) async fn list_index_permissions(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(index): Path<String>,
) -> Result<Json<Vec<Permission>>, GatewayError> {
    let mut permissions = state.store.list_permissions(tenant(&ctx)?).await?;
    permissions.retain(|p| p.can_access_index(&index));
    Ok(Json(permissions))
}

pub(super) async fn create_role(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<Permission>), GatewayError> {
    let tenant = tenant(&ctx)?;
    let mut patch: PermissionPatch = if body.is_empty() {
        PermissionPatch::default()
    } else {
        parse_body(&body)?
    };
    ensure_role_free(&state, tenant, &name).await?;
    patch.role = Some(name);
    let permission = new_permission(&ctx, patch)?;
    state.store.create_permission(tenant, &permission).await?;
    tracing::info!(tenant, role = ?permission.role, "role created");
    Ok((StatusCode::CREATED, Json(permission)))
}

pub(super) async fn get_role(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
) -> Result<Json<Permission>, GatewayError> {
    Ok(Json(load_role(&state, tenant(&ctx)?, &name).await?))
}

pub(super) async fn update_role(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Permission>, GatewayError> {
    let tenant = tenant(&ctx)?;
    let patch: PermissionPatch = parse_body(&body)?;
    let permission = load_role(&state, tenant, &name).await?;
    Ok(Json(patch_permission(&state, tenant, permission, patch).await?))
}

pub(super) async fn delete_role(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(name): Path<String>,
) -> Result<Ack, GatewayError> {
    let tenant = tenant(&ctx)?;
    let permission = load_role(&state, tenant, &name).await?;
    state.store.delete_permission(tenant, &permission.username).await?;
    state.invalidate(tenant, &permission.username).await;
    Ok(Ack::ok(format!("permission with role={name} deleted")))
}
