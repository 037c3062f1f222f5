//! API keys.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::{Category, acls_for};
use crate::error::ModelError;
use crate::pattern::{CidrBlock, IndexPattern, RefererPattern};
use crate::{Acl, Op, ensure_acls_authorized};

/// `ttl` value meaning the permission never expires.
pub const NEVER_EXPIRES: i64 = -1;

/// An API key: an opaque `username`/`password` pair with its own scopes and
/// network constraints. `password` is stored in plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub username: String,
    pub password: String,
    pub owner: String,
    pub creator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub acls: Vec<Acl>,
    #[serde(default = "default_ops")]
    pub ops: Vec<Op>,
    #[serde(default = "default_patterns")]
    pub indices: Vec<IndexPattern>,
    #[serde(default = "default_patterns")]
    pub pipelines: Vec<IndexPattern>,
    #[serde(default = "default_sources")]
    pub sources: Vec<CidrBlock>,
    #[serde(default = "default_referers")]
    pub referers: Vec<RefererPattern>,
    /// Lifetime in seconds counted from `created_at`; [`NEVER_EXPIRES`] disables expiry.
    #[serde(default = "default_ttl")]
    pub ttl: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reactivesearch_config: Option<Value>,
}

fn default_categories() -> Vec<Category> {
    vec![Category::Docs, Category::Search]
}

fn default_ops() -> Vec<Op> {
    vec![Op::Read]
}

fn default_patterns() -> Vec<IndexPattern> {
    vec![IndexPattern::any()]
}

fn default_sources() -> Vec<CidrBlock> {
    CidrBlock::ANY_V4.parse::<CidrBlock>().into_iter().collect()
}

fn default_referers() -> Vec<RefererPattern> {
    RefererPattern::new("*").into_iter().collect()
}

const fn default_ttl() -> i64 {
    NEVER_EXPIRES
}

impl Permission {
    /// A permission with default scopes (`docs`, `search`, read-only, any index, any source).
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        creator: impl Into<String>,
    ) -> Self {
        let creator = creator.into();
        Self {
            username: username.into(),
            password: password.into(),
            owner: creator.clone(),
            creator,
            role: None,
            categories: default_categories(),
            acls: Vec::new(),
            ops: default_ops(),
            indices: default_patterns(),
            pipelines: default_patterns(),
            sources: default_sources(),
            referers: default_referers(),
            ttl: NEVER_EXPIRES,
            created_at: Utc::now(),
            limits: None,
            description: None,
            include_fields: Vec::new(),
            exclude_fields: Vec::new(),
            reactivesearch_config: None,
        }
    }

    /// Fill ACLs from the category table when unset.
    pub fn normalize(&mut self) {
        if self.acls.is_empty() {
            self.acls = acls_for(&self.categories).into_iter().collect();
        }
    }

    /// # Errors
    /// Returns a [`ModelError`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.username.trim().is_empty() {
            return Err(ModelError::EmptyUsername);
        }
        ensure_acls_authorized(&self.categories, &self.acls)
    }

    #[must_use]
    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    /// An empty ACL list grants every ACL of the permission's categories.
    #[must_use]
    pub fn has_acl(&self, acl: Acl) -> bool {
        if self.acls.is_empty() {
            return self.categories.iter().any(|c| c.has_acl(acl));
        }
        self.acls.contains(&acl)
    }

    #[must_use]
    pub fn can_do(&self, op: Op) -> bool {
        self.ops.contains(&op)
    }

    #[must_use]
    pub fn can_access_index(&self, name: &str) -> bool {
        self.indices.iter().any(|p| p.matches(name))
    }

    #[must_use]
    pub fn can_access_pipeline(&self, name: &str) -> bool {
        self.pipelines.iter().any(|p| p.matches(name))
    }

    #[must_use]
    pub fn can_access_cluster(&self) -> bool {
        self.can_access_index("*")
    }

    /// Whether the permission had expired at `now`. Once true it stays true for any later `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.ttl < 0 {
            return false;
        }
        let Some(ttl) = TimeDelta::try_seconds(self.ttl) else {
            return false;
        };
        now.signed_duration_since(self.created_at) > ttl
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Source list rendered for error messages.
    #[must_use]
    pub fn sources_display(&self) -> String {
        let parts: Vec<String> = self.sources.iter().map(ToString::to_string).collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Partial update applied by `PATCH /_permission/{username}` and `PATCH /_role/{name}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionPatch {
    pub owner: Option<String>,
    pub role: Option<String>,
    pub categories: Option<Vec<Category>>,
    pub acls: Option<Vec<Acl>>,
    pub ops: Option<Vec<Op>>,
    pub indices: Option<Vec<IndexPattern>>,
    pub pipelines: Option<Vec<IndexPattern>>,
    pub sources: Option<Vec<CidrBlock>>,
    pub referers: Option<Vec<RefererPattern>>,
    pub ttl: Option<i64>,
    pub limits: Option<Value>,
    pub description: Option<String>,
    pub include_fields: Option<Vec<String>>,
    pub exclude_fields: Option<Vec<String>>,
    pub reactivesearch_config: Option<Value>,
}

impl PermissionPatch {
    /// # Errors
    /// Returns a [`ModelError`] when the patched permission is invalid.
    pub fn apply(self, permission: &mut Permission) -> Result<(), ModelError> {
        if let Some(owner) = self.owner {
            permission.owner = owner;
        }
        if let Some(role) = self.role {
            permission.role = Some(role);
        }
        match (self.categories, self.acls) {
            (Some(categories), acls) => {
                permission.categories = categories;
                permission.acls = acls.unwrap_or_default();
            }
            (None, Some(acls)) => permission.acls = acls,
            (None, None) => {}
        }
        if let Some(ops) = self.ops {
            permission.ops = ops;
        }
        if let Some(indices) = self.indices {
            permission.indices = indices;
        }
        if let Some(pipelines) = self.pipelines {
            permission.pipelines = pipelines;
        }
        if let Some(sources) = self.sources {
            permission.sources = sources;
        }
        if let Some(referers) = self.referers {
            permission.referers = referers;
        }
        if let Some(ttl) = self.ttl {
            permission.ttl = ttl;
        }
        if let Some(limits) = self.limits {
            permission.limits = Some(limits);
        }
        if let Some(description) = self.description {
            permission.description = Some(description);
        }
        if let Some(fields) = self.include_fields {
            permission.include_fields = fields;
        }
        if let Some(fields) = self.exclude_fields {
            permission.exclude_fields = fields;
        }
        if let Some(config) = self.reactivesearch_config {
            permission.reactivesearch_config = Some(config);
        }
        permission.normalize();
        permission.validate()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created_2020() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).single().unwrap()
    }

    #[test]
    fn defaults_admit_everything_readonly() {
        let p: Permission = serde_json::from_str(
            r#"{"username":"k","password":"s","owner":"o","creator":"c"}"#,
        )
        .unwrap();
        assert_eq!(p.ttl, NEVER_EXPIRES);
        assert!(p.can_access_cluster());
        assert!(p.can_do(Op::Read));
        assert!(!p.can_do(Op::Write));
        assert!(p.sources[0].is_any());
        assert!(p.referers[0].is_wildcard());
        assert!(!p.is_expired());
    }

    #[test]
    fn ttl_expiry_is_monotonic() {
        let mut p = Permission::new("k", "s", "c");
        p.created_at = created_2020();
        p.ttl = 3;
        let t = created_2020() + TimeDelta::seconds(4);
        assert!(p.is_expired_at(t));
        assert!(p.is_expired_at(t + TimeDelta::days(365)));
        assert!(!p.is_expired_at(created_2020() + TimeDelta::seconds(2)));
    }

    #[test]
    fn negative_ttl_never_expires() {
        let mut p = Permission::new("k", "s", "c");
        p.created_at = created_2020();
        assert!(!p.is_expired_at(Utc::now()));
    }

    #[test]
    fn role_patch_keeps_credentials() {
        let mut p = Permission::new("k", "s", "c");
        p.normalize();
        let patch = PermissionPatch {
            role: Some("admin".to_owned()),
            categories: Some(vec![Category::Cat]),
            ..PermissionPatch::default()
        };
        patch.apply(&mut p).unwrap();
        assert_eq!(p.username, "k");
        assert_eq!(p.role.as_deref(), Some("admin"));
        assert_eq!(p.acls, vec![Acl::Cat]);
    }

    #[test]
    fn patch_with_foreign_acl_fails() {
        let mut p = Permission::new("k", "s", "c");
        let patch = PermissionPatch {
            acls: Some(vec![Acl::Cluster]),
            ..PermissionPatch::default()
        };
        assert!(patch.apply(&mut p).is_err());
    }

    #[test]
    fn invalid_source_fails_to_deserialize() {
        let res: Result<Permission, _> = serde_json::from_str(
            r#"{"username":"k","password":"s","owner":"o","creator":"c","sources":["nope"]}"#,
        );
        assert!(res.is_err());
    }
}
