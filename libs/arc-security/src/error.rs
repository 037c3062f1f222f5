use thiserror::Error;

use crate::{Acl, Category};

/// Validation failures for credential records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid index pattern '{pattern}': {reason}")]
    InvalidIndexPattern { pattern: String, reason: String },

    #[error("invalid referer pattern '{pattern}': {reason}")]
    InvalidReferer { pattern: String, reason: String },

    #[error("invalid CIDR source '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("acl '{acl}' is not authorized by any of the categories {categories:?}")]
    AclNotInCategories { acl: Acl, categories: Vec<Category> },

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("non-admin user '{0}' must have at least one allowed action")]
    MissingAllowedActions(String),
}

impl ModelError {
    pub fn invalid_index_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidIndexPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_referer(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidReferer {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_cidr(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidCidr {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
