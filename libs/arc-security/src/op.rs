use std::fmt;

use serde::{Deserialize, Serialize};

/// The effect class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Read,
    Write,
    Delete,
}

impl Op {
    pub const ALL: [Self; 3] = [Self::Read, Self::Write, Self::Delete];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }

    /// Whether the operation mutates the addressed resource.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Write | Self::Delete)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
