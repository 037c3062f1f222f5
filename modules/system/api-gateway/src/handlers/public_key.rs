use arc_security::RequestContext;
use axum::Extension;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use credential_store_sdk::PublicKeyRecord;

use super::{AdminState, parse_body, tenant};
use crate::error::{Ack, GatewayError};
use crate::public_keys::TenantKey;

pub(super) async fn read_public_key(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<PublicKeyRecord>, GatewayError> {
    let tenant = tenant(&ctx)?;
    state
        .store
        .read_public_key(tenant)
        .await?
        .map(|record| Json(record.normalized()))
        .ok_or_else(|| GatewayError::NotFound("public key not found".to_owned()))
}

/// Validate, persist and install the tenant key.
///
/// With a control plane the key is installed locally only after every node accepted it.
pub(super) async fn write_public_key(
    State(state): State<AdminState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> Result<Ack, GatewayError> {
    let tenant = tenant(&ctx)?;
    let record = parse_body::<PublicKeyRecord>(&body)?.normalized();
    let key = TenantKey::from_record(&record)
        .map_err(|e| GatewayError::bad_request(e.to_string()))?;

    state.store.write_public_key(tenant, &record).await?;
    if let Some(cp) = &state.control_plane {
        cp.publish_public_key(tenant, &record).await?;
    }
    state.keys.set(tenant, key);

    tracing::info!(tenant, role_key = record.role_key(), "public key updated");
    Ok(Ack::ok("Public key saved successfully."))
}
