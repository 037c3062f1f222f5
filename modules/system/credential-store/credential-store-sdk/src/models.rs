//! Records owned by the credential store besides users and permissions.

use serde::{Deserialize, Serialize};

/// Claim carrying the role when the tenant did not configure one.
pub const DEFAULT_ROLE_KEY: &str = "role";

/// Document ID of the per-tenant public key record.
pub const PUBLIC_KEY_DOC_ID: &str = "public_key";

/// Per-tenant RSA public key used to verify bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRecord {
    /// Base64 encoding of the PEM document.
    pub public_key: String,
    /// Name of the claim holding the role; empty means [`DEFAULT_ROLE_KEY`].
    #[serde(default)]
    pub role_key: String,
}

impl PublicKeyRecord {
    #[must_use]
    pub fn new(public_key: impl Into<String>, role_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            role_key: role_key.into(),
        }
        .normalized()
    }

    /// Claim name with the empty value mapped to [`DEFAULT_ROLE_KEY`].
    #[must_use]
    pub fn role_key(&self) -> &str {
        if self.role_key.is_empty() {
            DEFAULT_ROLE_KEY
        } else {
            &self.role_key
        }
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.role_key.is_empty() {
            DEFAULT_ROLE_KEY.clone_into(&mut self.role_key);
        }
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn empty_role_key_reads_as_role() {
        let record: PublicKeyRecord = serde_json::from_str(r#"{"public_key":"abc"}"#).unwrap();
        assert_eq!(record.role_key(), DEFAULT_ROLE_KEY);
        assert_eq!(record.normalized().role_key, DEFAULT_ROLE_KEY);
    }

    #[test]
    fn configured_role_key_is_kept() {
        let record = PublicKeyRecord::new("abc", "group");
        assert_eq!(record.role_key(), "group");
    }
}
