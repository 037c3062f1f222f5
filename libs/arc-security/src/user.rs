//! Human dashboard accounts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{UserAction, categories_for};
use crate::category::{Category, acls_for};
use crate::error::ModelError;
use crate::pattern::IndexPattern;
use crate::{Acl, Op, ensure_acls_authorized};

pub const BCRYPT: &str = "bcrypt";

/// A human account. `password` holds a bcrypt hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    #[serde(default = "default_hash_type")]
    pub password_hash_type: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub allowed_actions: Vec<UserAction>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub acls: Vec<Acl>,
    #[serde(default = "default_ops")]
    pub ops: Vec<Op>,
    #[serde(default = "default_indices")]
    pub indices: Vec<IndexPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_hash_type() -> String {
    BCRYPT.to_owned()
}

fn default_ops() -> Vec<Op> {
    Op::ALL.to_vec()
}

fn default_indices() -> Vec<IndexPattern> {
    vec![IndexPattern::any()]
}

impl User {
    /// A user with default scopes. `password_hash` must already be a bcrypt hash.
    #[must_use]
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password_hash.into(),
            password_hash_type: default_hash_type(),
            is_admin: false,
            allowed_actions: Vec::new(),
            categories: Vec::new(),
            acls: Vec::new(),
            ops: default_ops(),
            indices: default_indices(),
            email: None,
            created_at: Utc::now(),
        }
    }

    /// Fold `allowed_actions` into `categories` and fill ACLs from the category table when unset.
    pub fn normalize(&mut self) {
        if self.is_admin {
            self.categories = Category::ALL.to_vec();
        } else {
            self.categories = self.effective_categories().into_iter().collect();
        }
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
        if !self.is_admin && self.allowed_actions.is_empty() {
            return Err(ModelError::MissingAllowedActions(self.username.clone()));
        }
        if self.is_admin {
            return Ok(());
        }
        ensure_acls_authorized(&self.categories, &self.acls)
    }

    /// Explicit categories plus those granted by `allowed_actions`.
    ///
    /// Records read from a store may never have been normalized.
    #[must_use]
    pub fn effective_categories(&self) -> BTreeSet<Category> {
        let mut categories = categories_for(&self.allowed_actions);
        categories.extend(self.categories.iter().copied());
        categories
    }

    #[must_use]
    pub fn has_category(&self, category: Category) -> bool {
        self.is_admin
            || self.categories.contains(&category)
            || self
                .allowed_actions
                .iter()
                .any(|action| action.categories().contains(&category))
    }

    /// An empty ACL list grants every ACL of the user's categories.
    #[must_use]
    pub fn has_acl(&self, acl: Acl) -> bool {
        if self.is_admin {
            return true;
        }
        if self.acls.is_empty() {
            return self.effective_categories().iter().any(|c| c.has_acl(acl));
        }
        self.acls.contains(&acl)
    }

    #[must_use]
    pub fn can_do(&self, op: Op) -> bool {
        self.is_admin || self.ops.contains(&op)
    }

    #[must_use]
    pub fn can_access_index(&self, name: &str) -> bool {
        self.is_admin || self.indices.iter().any(|p| p.matches(name))
    }

    #[must_use]
    pub fn can_access_cluster(&self) -> bool {
        self.can_access_index("*")
    }
}

/// Partial update applied by `PATCH /_user/{username}`.
///
/// `password` is expected to be hashed by the caller before the patch is applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPatch {
    pub password: Option<String>,
    pub is_admin: Option<bool>,
    pub allowed_actions: Option<Vec<UserAction>>,
    pub categories: Option<Vec<Category>>,
    pub acls: Option<Vec<Acl>>,
    pub ops: Option<Vec<Op>>,
    pub indices: Option<Vec<IndexPattern>>,
    pub email: Option<String>,
}

impl UserPatch {
    /// Whether the patch replaces the user's password.
    #[must_use]
    pub fn changes_password(&self) -> bool {
        self.password.is_some()
    }

    /// Apply the patch and re-normalize the scopes.
    ///
    /// # Errors
    /// Returns a [`ModelError`] when the patched user is invalid.
    pub fn apply(self, user: &mut User) -> Result<(), ModelError> {
        let rescoped = self.categories.is_some() || self.allowed_actions.is_some();
        if let Some(password) = self.password {
            user.password = password;
        }
        if let Some(is_admin) = self.is_admin {
            user.is_admin = is_admin;
        }
        if let Some(actions) = self.allowed_actions {
            user.allowed_actions = actions;
            user.categories.clear();
        }
        if let Some(categories) = self.categories {
            user.categories = categories;
        }
        match self.acls {
            Some(acls) => user.acls = acls,
            None if rescoped => user.acls.clear(),
            None => {}
        }
        if let Some(ops) = self.ops {
            user.ops = ops;
        }
        if let Some(indices) = self.indices {
            user.indices = indices;
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
        user.normalize();
        user.validate()
    }
}
