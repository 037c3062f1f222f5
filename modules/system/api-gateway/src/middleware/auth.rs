//! Authentication middleware.
//!
//! Resolves the credential presented by the request, verifies its secret and
//! authorizes its category. Basic credentials resolve to a user or a
//! permission by username; bearer tokens resolve to the permission holding
//! the role named in the token.
use std::sync::Arc;

use arc_security::{Category, Credential};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use credential_store_sdk::{CredentialStore, DEFAULT_ROLE_KEY, StoreError};
use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};

use super::{context, context_mut, reject};
use crate::cache::{CacheInvalidator, CredentialCache, PasswordCache};
use crate::classify::Classified;
use crate::error::GatewayError;
use crate::public_keys::{PublicKeyRegistry, TenantKey};

/// Rejection for bearer tokens against a tenant without a public key.
pub const NO_PUBLIC_KEY: &str = "No Public Key Registered";

const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(Clone)]
pub struct AuthState {
    pub store: Arc<dyn CredentialStore>,
    pub credentials: Arc<CredentialCache>,
    pub passwords: Arc<PasswordCache>,
    pub keys: Arc<PublicKeyRegistry>,
    pub invalidator: Arc<dyn CacheInvalidator>,
}

enum Presented {
    Basic { username: String, password: String },
    Bearer(String),
}

fn presented_credentials(headers: &HeaderMap) -> Result<Presented, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| GatewayError::unauthorized("credentials not provided"))?
        .to_str()
        .map_err(|_| GatewayError::unauthorized("malformed authorization header"))?;
    let (scheme, rest) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| GatewayError::unauthorized("malformed authorization header"))?;

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD
            .decode(rest.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| GatewayError::unauthorized("malformed basic credentials"))?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| GatewayError::unauthorized("malformed basic credentials"))?;
        if username.is_empty() {
            return Err(GatewayError::unauthorized(BAD_CREDENTIALS));
        }
        return Ok(Presented::Basic {
            username: username.to_owned(),
            password: password.to_owned(),
        });
    }
    if scheme.eq_ignore_ascii_case("bearer") {
        return Ok(Presented::Bearer(rest.trim().to_owned()));
    }
    Err(GatewayError::unauthorized(format!(
        "unsupported authorization scheme: {scheme}"
    )))
}

/// Cached credential first, then the store. The flag tells whether the cache hit.
async fn resolve_by_username(
    state: &AuthState,
    tenant: &str,
    username: &str,
) -> Result<(Credential, bool), GatewayError> {
    if let Some(credential) = state.credentials.get(tenant, username) {
        return Ok((credential, true));
    }
    match state.store.lookup_by_username(tenant, username).await {
        Ok(Some(credential)) => Ok((credential, false)),
        Ok(None) | Err(StoreError::NotFound { .. }) => {
            tracing::debug!(tenant, username, "unknown username");
            Err(GatewayError::unauthorized(BAD_CREDENTIALS))
        }
        Err(err) => Err(err.into()),
    }
}

async fn verify_password(
    state: &AuthState,
    tenant: &str,
    credential: &Credential,
    password: &str,
) -> Result<(), GatewayError> {
    let user = match credential {
        Credential::Permission(permission) if permission.password == password => return Ok(()),
        Credential::Permission(_) => return Err(GatewayError::unauthorized(BAD_CREDENTIALS)),
        Credential::User(user) => user,
    };
    if state.passwords.has(tenant, &user.username, password) {
        return Ok(());
    }

    let hash = user.password.clone();
    let plaintext = password.to_owned();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &hash))
        .await
        .map_err(|e| GatewayError::internal(format!("password verification aborted: {e}")))?
        .unwrap_or_else(|e| {
            tracing::warn!(tenant, username = %user.username, error = %e, "stored password hash is unusable");
            false
        });
    if !verified {
        return Err(GatewayError::unauthorized(BAD_CREDENTIALS));
    }
    state.passwords.put(tenant, &user.username, password);
    Ok(())
}

/// Registered key for `tenant`, loading it from the store on a registry miss.
async fn tenant_key(state: &AuthState, tenant: &str) -> Result<TenantKey, GatewayError> {
    if let Some(key) = state.keys.get(tenant) {
        return Ok(key);
    }
    let record = match state.store.read_public_key(tenant).await {
        Ok(Some(record)) => record,
        Ok(None) | Err(StoreError::NotFound { .. }) => {
            return Err(GatewayError::unauthorized(NO_PUBLIC_KEY));
        }
        Err(err) => return Err(err.into()),
    };
    let key = TenantKey::from_record(&record)
        .map_err(|e| GatewayError::internal(format!("stored public key is unusable: {e}")))?;
    state.keys.set(tenant, key.clone());
    Ok(key)
}

async fn resolve_by_token(
    state: &AuthState,
    tenant: &str,
    token: &str,
) -> Result<Credential, GatewayError> {
    let key = tenant_key(state, tenant).await?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.validate_aud = false;
    let data = jsonwebtoken::decode::<Map<String, Value>>(token, key.decoding_key(), &validation)
        .map_err(|e| GatewayError::unauthorized(format!("invalid token: {e}")))?;

    let role = data
        .claims
        .get(key.role_key())
        .or_else(|| data.claims.get(DEFAULT_ROLE_KEY))
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::unauthorized("role claim missing in token"))?;

    match state.store.lookup_by_role(tenant, role).await {
        Ok(Some(permission)) => Ok(permission.into()),
        Ok(None) | Err(StoreError::NotFound { .. }) => Err(GatewayError::unauthorized(format!(
            "permission with role={role} not found"
        ))),
        Err(err) => Err(err.into()),
    }
}

fn authorize_category(credential: &Credential, category: Category) -> Result<(), GatewayError> {
    match credential {
        Credential::User(user) if user.is_admin || user.has_category(category) => Ok(()),
        Credential::User(_) if category.is_from_es() => Err(GatewayError::unauthorized(
            "user not allowed to access elasticsearch",
        )),
        Credential::User(_) if category.is_from_rs() => Err(GatewayError::unauthorized(
            "user not allowed to access reactivesearch API",
        )),
        Credential::User(_) => Err(GatewayError::unauthorized(format!(
            "user not allowed to access {category} API"
        ))),
        Credential::Permission(permission) if permission.has_category(category) => Ok(()),
        Credential::Permission(permission) => Err(GatewayError::unauthorized(format!(
            "permission with username={} does not have '{category}' category",
            permission.username
        ))),
    }
}

/// `GET /` is admitted for every identified credential.
pub(crate) fn is_root_request(req: &Request) -> bool {
    req.method() == Method::GET && req.uri().path() == "/"
}

fn path_username(req: &Request) -> Option<String> {
    req.extensions()
        .get::<Classified>()
        .and_then(|c| c.username.clone())
}

async fn authenticate_request(state: &AuthState, req: &mut Request) -> Result<(), GatewayError> {
    let (tenant, category, op) = {
        let ctx = context(req)?;
        ctx.indices()?;
        (ctx.domain()?.raw().to_owned(), ctx.category()?, ctx.op()?)
    };

    let (credential, cached) = match presented_credentials(req.headers())? {
        Presented::Basic { username, password } => {
            let (credential, cached) = resolve_by_username(state, &tenant, &username).await?;
            verify_password(state, &tenant, &credential, &password).await?;
            (credential, cached)
        }
        Presented::Bearer(token) => (resolve_by_token(state, &tenant, &token).await?, false),
    };

    if !is_root_request(req) {
        authorize_category(&credential, category)?;
    }

    if !cached {
        state
            .credentials
            .put(&tenant, credential.username(), credential.clone());
    }
    if op.is_mutation()
        && let Some(username) = path_username(req)
    {
        state.invalidator.invalidate_credential(&tenant, &username);
    }

    tracing::debug!(
        tenant,
        username = credential.username(),
        credential = %credential.tag(),
        cached,
        "request authenticated"
    );
    let ctx = context_mut(req)?;
    ctx.set_credential(credential)?;
    ctx.record_middleware("auth");
    Ok(())
}

/// Identify and authorize the request credential.
pub async fn authenticate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    match authenticate_request(&state, &mut req).await {
        Ok(()) => next.run(req).await,
        Err(err) => reject(err),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use arc_security::{Permission, User};
    use axum::http::HeaderValue;

    fn auth_header(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn parses_basic_credentials() {
        let Presented::Basic { username, password } =
            presented_credentials(&auth_header("Basic Zm9vOmJhcg==")).unwrap()
        else {
            panic!("expected basic credentials");
        };
        assert_eq!((username.as_str(), password.as_str()), ("foo", "bar"));
    }

    #[test]
    fn password_may_contain_colons() {
        let encoded = STANDARD.encode("foo:a:b");
        let Presented::Basic { password, .. } =
            presented_credentials(&auth_header(&format!("basic {encoded}"))).unwrap()
        else {
            panic!("expected basic credentials");
        };
        assert_eq!(password, "a:b");
    }

    #[test]
    fn parses_bearer_tokens() {
        assert!(matches!(
            presented_credentials(&auth_header("Bearer abc.def.ghi")).unwrap(),
            Presented::Bearer(t) if t == "abc.def.ghi"
        ));
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        for headers in [
            HeaderMap::new(),
            auth_header("Basic"),
            auth_header("Basic !!!"),
            auth_header("Basic Zm9v"),
            auth_header("Basic Og=="),
            auth_header("Digest abc"),
        ] {
            let err = presented_credentials(&headers).err().unwrap();
            assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn non_admin_users_need_the_category() {
        let mut user = User::new("u", "hash");
        user.categories = vec![Category::Docs];
        let credential: Credential = user.into();

        assert!(authorize_category(&credential, Category::Docs).is_ok());
        let err = authorize_category(&credential, Category::Search).unwrap_err();
        assert_eq!(err.to_string(), "user not allowed to access elasticsearch");
        let err = authorize_category(&credential, Category::ReactiveSearch).unwrap_err();
        assert_eq!(err.to_string(), "user not allowed to access reactivesearch API");
        let err = authorize_category(&credential, Category::Analytics).unwrap_err();
        assert_eq!(err.to_string(), "user not allowed to access analytics API");
    }

    #[test]
    fn admins_pass_every_category() {
        let mut user = User::new("root", "hash");
        user.is_admin = true;
        let credential: Credential = user.into();
        for category in Category::ALL {
            assert!(authorize_category(&credential, category).is_ok());
        }
    }

    #[test]
    fn permissions_need_the_category() {
        let credential: Credential = Permission::new("key", "secret", "admin").into();
        assert!(authorize_category(&credential, Category::Search).is_ok());
        let err = authorize_category(&credential, Category::User).unwrap_err();
        assert!(err.to_string().contains("'user'"));
    }
}
