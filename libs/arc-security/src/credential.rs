use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Acl, Category, Op, Permission, User};

/// Which kind of principal authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialTag {
    User,
    Permission,
}

impl fmt::Display for CredentialTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Permission => "permission",
        })
    }
}

/// A resolved principal. Cheap to clone; the records are shared.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    User(Arc<User>),
    Permission(Arc<Permission>),
}

impl Credential {
    #[must_use]
    pub fn tag(&self) -> CredentialTag {
        match self {
            Self::User(_) => CredentialTag::User,
            Self::Permission(_) => CredentialTag::Permission,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::User(u) => &u.username,
            Self::Permission(p) => &p.username,
        }
    }

    /// The stored secret: a bcrypt hash for users, plain text for permissions.
    #[must_use]
    pub fn password(&self) -> &str {
        match self {
            Self::User(u) => &u.password,
            Self::Permission(p) => &p.password,
        }
    }

    #[must_use]
    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            Self::Permission(_) => None,
        }
    }

    #[must_use]
    pub fn as_permission(&self) -> Option<&Permission> {
        match self {
            Self::Permission(p) => Some(p),
            Self::User(_) => None,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.as_user().is_some_and(|u| u.is_admin)
    }

    #[must_use]
    pub fn has_category(&self, category: Category) -> bool {
        match self {
            Self::User(u) => u.has_category(category),
            Self::Permission(p) => p.has_category(category),
        }
    }

    #[must_use]
    pub fn has_acl(&self, acl: Acl) -> bool {
        match self {
            Self::User(u) => u.has_acl(acl),
            Self::Permission(p) => p.has_acl(acl),
        }
    }

    /// Users are not gated by operation; only permissions are.
    #[must_use]
    pub fn can_do(&self, op: Op) -> bool {
        match self {
            Self::User(_) => true,
            Self::Permission(p) => p.can_do(op),
        }
    }

    #[must_use]
    pub fn can_access_index(&self, name: &str) -> bool {
        match self {
            Self::User(u) => u.can_access_index(name),
            Self::Permission(p) => p.can_access_index(name),
        }
    }

    /// Users carry no pipeline patterns; only permissions are gated.
    #[must_use]
    pub fn can_access_pipeline(&self, name: &str) -> bool {
        match self {
            Self::User(_) => true,
            Self::Permission(p) => p.can_access_pipeline(name),
        }
    }

    #[must_use]
    pub fn can_access_cluster(&self) -> bool {
        match self {
            Self::User(u) => u.can_access_cluster(),
            Self::Permission(p) => p.can_access_cluster(),
        }
    }
}

impl From<User> for Credential {
    fn from(value: User) -> Self {
        Self::User(Arc::new(value))
    }
}

impl From<Permission> for Credential {
    fn from(value: Permission) -> Self {
        Self::Permission(Arc::new(value))
    }
}
