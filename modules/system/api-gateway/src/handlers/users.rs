use arc_security::{Acl, Category, IndexPattern, Op, RequestContext, User, UserAction, UserPatch};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use credential_store_sdk::{RecordKind, StoreError};
use serde::Deserialize;
use serde_json::Value;

use super::{AdminState, parse_body, tenant};
use crate::error::{Ack, GatewayError};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewUser {
    username: String,
    password: String,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    allowed_actions: Vec<UserAction>,
    categories: Option<Vec<Category>>,
    acls: Option<Vec<Acl>>,
    ops: Option<Vec<Op>>,
    indices: Option<Vec<IndexPattern>>,
    email: Option<String>,
}

/// The user as returned to clients: everything but the password hash.
fn view(user: &User) -> Result<Json<Value>, GatewayError> {
    let mut value = serde_json::to_value(user)
        .map_err(|e| GatewayError::internal(format!("failed to encode user: {e}")))?;
    if let Some(fields) = value.as_object_mut() {
        fields.remove("password");
    }
    Ok(Json(value))
}

async fn hash_password(password: String, cost: u32) -> Result<String, GatewayError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| GatewayError::internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| GatewayError::internal(format!("failed to hash password: {e}")))
}

async fn load(state: &AdminState, tenant: &str, username: &str) -> Result<User, GatewayError> {
    state
        .store
        .get_user(tenant, username)
        .await?
        .ok_or_else(|| StoreError::not_found(RecordKind::User, username).into())
}

/// The authenticated user.
pub(super) async fn current_user(
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Value>, GatewayError> {
    match ctx.credential()?.as_user() {
        Some(user) => view(user),
        None => Err(GatewayError::NotFound(
            "request was authenticated with a permission, not a user".to_owned(),
        )),
    }
}

pub(super) async fn create_user(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), GatewayError> {
    let tenant = tenant(&ctx)?;
    let req: NewUser = parse_body(&body)?;
    if req.password.is_empty() {
        return Err(GatewayError::bad_request("password must not be empty"));
    }

    let hash = hash_password(req.password, state.bcrypt_cost).await?;
    let mut user = User::new(req.username, hash);
    UserPatch {
        is_admin: Some(req.is_admin),
        allowed_actions: Some(req.allowed_actions),
        categories: req.categories,
        acls: req.acls,
        ops: req.ops,
        indices: req.indices,
        email: req.email,
        ..UserPatch::default()
    }
    .apply(&mut user)?;

    state.store.create_user(tenant, &user).await?;
    tracing::info!(tenant, username = %user.username, "user created");
    Ok((StatusCode::CREATED, view(&user)?))
}

pub(super) async fn get_user(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(username): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    view(&load(&state, tenant(&ctx)?, &username).await?)
}

pub(super) async fn list_users(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<Value>>, GatewayError> {
    let users = state.store.list_users(tenant(&ctx)?).await?;
    let views = users
        .iter()
        .map(|u| view(u).map(|Json(v)| v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(views))
}

pub(super) async fn update_user(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, GatewayError> {
    let tenant = tenant(&ctx)?;
    let mut patch: UserPatch = parse_body(&body)?;
    let mut user = load(&state, tenant, &username).await?;
    let password_changed = patch.changes_password();
    if let Some(password) = patch.password.take() {
        patch.password = Some(hash_password(password, state.bcrypt_cost).await?);
    }
    patch.apply(&mut user)?;

    state.store.update_user(tenant, &user).await?;
    state.invalidate(tenant, &username).await;
    tracing::info!(tenant, username = %username, password_changed, "user updated");
    view(&user)
}

pub(super) async fn delete_user(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    Path(username): Path<String>,
) -> Result<Ack, GatewayError> {
    let tenant = tenant(&ctx)?;
    state.store.delete_user(tenant, &username).await?;
    state.invalidate(tenant, &username).await;
    Ok(Ack::ok(format!("user with username={username} deleted")))
}
