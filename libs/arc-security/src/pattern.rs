//! Precompiled patterns carried by credential records.
//!
//! Each pattern keeps the raw string it was built from so records serialize back
//! exactly as they were written.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

fn glob_to_regex(raw: &str) -> String {
    raw.replace('*', ".*")
}

/// Glob over index or pipeline names; `*` matches any run of characters.
///
/// Matching is anchored, so `logs-*` admits `logs-2024` but not `old-logs-2024`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexPattern {
    raw: String,
    regex: Option<Regex>,
}

impl IndexPattern {
    /// # Errors
    /// Returns [`ModelError::InvalidIndexPattern`] when the pattern does not compile.
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        if raw == "*" {
            return Ok(Self::any());
        }
        let regex = Regex::new(&format!("^(?:{})$", glob_to_regex(&raw)))
            .map_err(|e| ModelError::invalid_index_pattern(raw.clone(), e))?;
        Ok(Self {
            raw,
            regex: Some(regex),
        })
    }

    /// The `*` pattern.
    #[must_use]
    pub fn any() -> Self {
        Self {
            raw: "*".to_owned(),
            regex: None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.regex.as_ref().is_none_or(|re| re.is_match(name))
    }
}

impl PartialEq for IndexPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for IndexPattern {}

impl fmt::Debug for IndexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IndexPattern").field(&self.raw).finish()
    }
}

impl TryFrom<String> for IndexPattern {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IndexPattern> for String {
    fn from(value: IndexPattern) -> Self {
        value.raw
    }
}

/// Pattern tested against the `Referer` header.
///
/// Unlike [`IndexPattern`] the match is unanchored: `*.example.com` admits any
/// referer containing a host under `example.com`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefererPattern {
    raw: String,
    regex: Regex,
}

impl RefererPattern {
    /// # Errors
    /// Returns [`ModelError::InvalidReferer`] when the pattern does not compile.
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        let regex = Regex::new(&glob_to_regex(&raw))
            .map_err(|e| ModelError::invalid_referer(raw.clone(), e))?;
        Ok(Self { raw, regex })
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.raw == "*"
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn matches(&self, referer: &str) -> bool {
        self.is_wildcard() || self.regex.is_match(referer)
    }
}

impl PartialEq for RefererPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for RefererPattern {}

impl fmt::Debug for RefererPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefererPattern").field(&self.raw).finish()
    }
}

impl TryFrom<String> for RefererPattern {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RefererPattern> for String {
    fn from(value: RefererPattern) -> Self {
        value.raw
    }
}

/// An IPv4 or IPv6 network a permission may be used from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock(IpNetwork);

impl CidrBlock {
    pub const ANY_V4: &'static str = "0.0.0.0/0";

    /// `0.0.0.0/0`, which admits every address.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.0.prefix() == 0 && self.0.is_ipv4()
    }

    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.is_any() || self.0.contains(ip)
    }
}

impl FromStr for CidrBlock {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IpNetwork::from_str(s.trim())
            .map(Self)
            .map_err(|e| ModelError::invalid_cidr(s, e))
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CidrBlock> for String {
    fn from(value: CidrBlock) -> Self {
        value.0.to_string()
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
