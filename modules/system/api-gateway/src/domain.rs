//! Tenant identification.
//!
//! Every request is scoped to a tenant domain. In multi-tenant mode the
//! domain comes from the `X_REACTIVESEARCH_DOMAIN` header; otherwise the
//! fixed [`DEFAULT_TENANT`] is used. The raw name is encrypted with
//! AES-128-CFB under a process-wide key, a random IV is prepended and the
//! result is hex encoded. Both forms travel in the [`RequestContext`].
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use aes::Aes128;
use arc_security::{RequestContext, TenantDomain};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use rand::TryRngCore;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::config::{DEFAULT_TENANT, GatewayConfig};
use crate::error::GatewayError;

/// Header carrying the tenant domain.
pub const DOMAIN_HEADER: &str = "x_reactivesearch_domain";

/// Domain substituted for an empty header in development mode.
pub const DEV_TEST_DOMAIN: &str = "test.reactivesearch.local";

const KEY_LEN: usize = 16;
const IV_LEN: usize = 16;

type Encryptor = cfb_mode::Encryptor<Aes128>;
type Decryptor = cfb_mode::Decryptor<Aes128>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain encryption key is not configured")]
    MissingKey,
    #[error("domain encryption key must be {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("failed to read initialization vector: {0}")]
    Iv(String),
    #[error("malformed encrypted domain: {0}")]
    Malformed(String),
}

/// AES-128-CFB envelope for tenant names.
#[derive(Clone)]
pub struct DomainCipher {
    key: [u8; KEY_LEN],
}

impl fmt::Debug for DomainCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainCipher").finish_non_exhaustive()
    }
}

impl DomainCipher {
    /// # Errors
    /// Returns [`DomainError::InvalidKeyLength`] unless `key` is exactly 16 bytes.
    pub fn new(key: &[u8]) -> Result<Self, DomainError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| DomainError::InvalidKeyLength(key.len()))?;
        Ok(Self { key })
    }

    /// Encrypt `domain` under a fresh random IV and hex encode `iv || ciphertext`.
    ///
    /// # Errors
    /// Returns [`DomainError::Iv`] when the OS random source fails.
    pub fn encrypt(&self, domain: &str) -> Result<String, DomainError> {
        let mut out = vec![0u8; IV_LEN + domain.len()];
        let (iv, body) = out.split_at_mut(IV_LEN);
        OsRng
            .try_fill_bytes(iv)
            .map_err(|e| DomainError::Iv(e.to_string()))?;
        body.copy_from_slice(domain.as_bytes());
        Encryptor::new_from_slices(&self.key, iv)
            .map_err(|e| DomainError::Iv(e.to_string()))?
            .encrypt(body);
        Ok(hex::encode(out))
    }

    /// # Errors
    /// Returns [`DomainError::Malformed`] for input that is not hex, is shorter
    /// than the IV or does not decrypt to UTF-8.
    pub fn decrypt(&self, encoded: &str) -> Result<String, DomainError> {
        let mut raw = hex::decode(encoded).map_err(|e| DomainError::Malformed(e.to_string()))?;
        if raw.len() < IV_LEN {
            return Err(DomainError::Malformed("shorter than the IV".to_owned()));
        }
        let (iv, body) = raw.split_at_mut(IV_LEN);
        Decryptor::new_from_slices(&self.key, iv)
            .map_err(|e| DomainError::Malformed(e.to_string()))?
            .decrypt(body);
        String::from_utf8(body.to_vec()).map_err(|e| DomainError::Malformed(e.to_string()))
    }
}

/// Resolves the tenant of a request.
#[derive(Debug, Clone)]
pub struct TenantIdentifier {
    multi_tenant: bool,
    dev_mode: bool,
    cipher: Option<DomainCipher>,
}

impl TenantIdentifier {
    /// # Errors
    /// Returns [`DomainError::InvalidKeyLength`] when a configured key is not 16 bytes.
    pub fn from_config(cfg: &GatewayConfig) -> Result<Self, DomainError> {
        let cipher = cfg
            .domain_name_encryption_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| DomainCipher::new(k.as_bytes()))
            .transpose()?;
        Ok(Self {
            multi_tenant: cfg.multi_tenant,
            dev_mode: cfg.dev_mode,
            cipher,
        })
    }

    /// Resolve the tenant domain from request headers.
    ///
    /// # Errors
    /// 401 when the header is missing in multi-tenant mode, 500 when the key
    /// is missing or encryption fails.
    pub fn identify(&self, headers: &HeaderMap) -> Result<TenantDomain, GatewayError> {
        if !self.multi_tenant {
            let encrypted = self
                .cipher
                .as_ref()
                .map(|c| c.encrypt(DEFAULT_TENANT))
                .transpose()?;
            return Ok(TenantDomain::new(DEFAULT_TENANT, encrypted));
        }

        let header = headers
            .get(DOMAIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        let raw = match header {
            "" if self.dev_mode => DEV_TEST_DOMAIN,
            "" => {
                return Err(GatewayError::unauthorized(
                    "X_REACTIVESEARCH_DOMAIN header is required",
                ));
            }
            domain => domain,
        };

        let cipher = self.cipher.as_ref().ok_or(DomainError::MissingKey)?;
        let encrypted = cipher.encrypt(raw)?;
        Ok(TenantDomain::new(raw, Some(encrypted)))
    }
}

/// Opens the request context and records the tenant domain in it.
pub async fn identify_tenant(
    State(identifier): State<Arc<TenantIdentifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ctx = RequestContext::new(Instant::now());
    let result = identifier
        .identify(req.headers())
        .and_then(|domain| ctx.set_domain(domain).map_err(GatewayError::from));
    if let Err(err) = result {
        err.log();
        return err.into_response();
    }
    ctx.record_middleware("domain");
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue, StatusCode};

    const KEY: &str = "0123456789abcdef";

    fn headers(domain: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(HeaderName::from_static(DOMAIN_HEADER), HeaderValue::from_str(domain).unwrap());
        h
    }

    fn multi_tenant(key: Option<&str>, dev_mode: bool) -> TenantIdentifier {
        TenantIdentifier::from_config(&GatewayConfig {
            multi_tenant: true,
            dev_mode,
            domain_name_encryption_key: key.map(str::to_owned),
            ..GatewayConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn encrypt_then_decrypt_recovers_domain() {
        let cipher = DomainCipher::new(KEY.as_bytes()).unwrap();
        for domain in ["a", "tenant-one.example.com", "a-much-longer-domain-name.reactivesearch.io"] {
            let enc = cipher.encrypt(domain).unwrap();
            assert_eq!(enc.len(), (IV_LEN + domain.len()) * 2);
            assert_eq!(cipher.decrypt(&enc).unwrap(), domain);
        }
    }

    #[test]
    fn encryption_uses_fresh_iv() {
        let cipher = DomainCipher::new(KEY.as_bytes()).unwrap();
        assert_ne!(cipher.encrypt("acme").unwrap(), cipher.encrypt("acme").unwrap());
    }

    #[test]
    fn rejects_bad_key_and_ciphertext() {
        assert!(matches!(
            DomainCipher::new(b"short"),
            Err(DomainError::InvalidKeyLength(5))
        ));
        let cipher = DomainCipher::new(KEY.as_bytes()).unwrap();
        assert!(cipher.decrypt("zz").is_err());
        assert!(cipher.decrypt("00ff").is_err());
    }

    #[test]
    fn single_tenant_uses_default_domain() {
        let id = TenantIdentifier::from_config(&GatewayConfig::default()).unwrap();
        let domain = id.identify(&headers("ignored")).unwrap();
        assert_eq!(domain.raw(), DEFAULT_TENANT);
        assert!(domain.encrypted().is_none());
    }

    #[test]
    fn multi_tenant_reads_header_and_encrypts() {
        let id = multi_tenant(Some(KEY), false);
        let domain = id.identify(&headers(" acme.io ")).unwrap();
        assert_eq!(domain.raw(), "acme.io");
        let cipher = DomainCipher::new(KEY.as_bytes()).unwrap();
        assert_eq!(cipher.decrypt(domain.encrypted().unwrap()).unwrap(), "acme.io");
    }

    #[test]
    fn missing_header_is_unauthorized_outside_dev_mode() {
        let err = multi_tenant(Some(KEY), false)
            .identify(&HeaderMap::new())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let domain = multi_tenant(Some(KEY), true)
            .identify(&HeaderMap::new())
            .unwrap();
        assert_eq!(domain.raw(), DEV_TEST_DOMAIN);
    }

    #[test]
    fn missing_key_is_internal_error() {
        let err = multi_tenant(None, false)
            .identify(&headers("acme.io"))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
