//! Shapes of reactivesearch queries observed on the request path.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Search,
    Term,
    Range,
    Geo,
    Suggestion,
}

impl QueryType {
    pub const ALL: [Self; 5] = [
        Self::Search,
        Self::Term,
        Self::Range,
        Self::Geo,
        Self::Suggestion,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Term => "term",
            Self::Range => "range",
            Self::Geo => "geo",
            Self::Suggestion => "suggestion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Asc,
    Desc,
    Count,
}

impl SortBy {
    pub const ALL: [Self; 3] = [Self::Asc, Self::Desc, Self::Count];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::Count => "count",
        }
    }
}

/// One entry of a reactivesearch request's `query` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsQuery {
    pub id: String,
    #[serde(rename = "type", default = "default_query_type")]
    pub query_type: QueryType,
    #[serde(rename = "sortBy", default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
}

fn default_query_type() -> QueryType {
    QueryType::Search
}
