//! Coarse-grained request domains and the static `Category -> ACL` table.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::acl::Acl;

/// A coarse-grained request domain used for authorization.
///
/// Every variant serializes to a fixed lowercase token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Docs,
    Search,
    Indices,
    Cat,
    Clusters,
    Misc,
    User,
    Permission,
    Analytics,
    Streams,
    Rules,
    Suggestions,
    Auth,
    ReactiveSearch,
    SearchRelevancy,
    Synonyms,
    SearchGrader,
    UiBuilder,
    Logs,
    Cache,
    StoredQuery,
    Sync,
    Pipelines,
}

impl Category {
    pub const ALL: [Self; 23] = [
        Self::Docs,
        Self::Search,
        Self::Indices,
        Self::Cat,
        Self::Clusters,
        Self::Misc,
        Self::User,
        Self::Permission,
        Self::Analytics,
        Self::Streams,
        Self::Rules,
        Self::Suggestions,
        Self::Auth,
        Self::ReactiveSearch,
        Self::SearchRelevancy,
        Self::Synonyms,
        Self::SearchGrader,
        Self::UiBuilder,
        Self::Logs,
        Self::Cache,
        Self::StoredQuery,
        Self::Sync,
        Self::Pipelines,
    ];

    /// Categories that are served by the Elasticsearch-compatible backend.
    pub const ELASTICSEARCH: [Self; 6] = [
        Self::Docs,
        Self::Search,
        Self::Indices,
        Self::Cat,
        Self::Clusters,
        Self::Misc,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docs => "docs",
            Self::Search => "search",
            Self::Indices => "indices",
            Self::Cat => "cat",
            Self::Clusters => "clusters",
            Self::Misc => "misc",
            Self::User => "user",
            Self::Permission => "permission",
            Self::Analytics => "analytics",
            Self::Streams => "streams",
            Self::Rules => "rules",
            Self::Suggestions => "suggestions",
            Self::Auth => "auth",
            Self::ReactiveSearch => "reactivesearch",
            Self::SearchRelevancy => "searchrelevancy",
            Self::Synonyms => "synonyms",
            Self::SearchGrader => "searchgrader",
            Self::UiBuilder => "uibuilder",
            Self::Logs => "logs",
            Self::Cache => "cache",
            Self::StoredQuery => "storedquery",
            Self::Sync => "sync",
            Self::Pipelines => "pipelines",
        }
    }

    /// ACLs authorized by this category.
    #[must_use]
    pub fn acls(self) -> &'static [Acl] {
        match self {
            Self::Docs => &[
                Acl::Doc,
                Acl::Source,
                Acl::Create,
                Acl::Update,
                Acl::Delete,
                Acl::Bulk,
                Acl::Index,
                Acl::Mget,
                Acl::Termvectors,
                Acl::Mtermvectors,
                Acl::DeleteByQuery,
                Acl::UpdateByQuery,
                Acl::Reindex,
                Acl::Exists,
                Acl::Get,
            ],
            Self::Search => &[
                Acl::SearchQuery,
                Acl::Msearch,
                Acl::Count,
                Acl::Explain,
                Acl::FieldCaps,
                Acl::RankEval,
                Acl::SearchShards,
                Acl::Validate,
                Acl::Template,
                Acl::Render,
            ],
            Self::Indices => &[
                Acl::Indices,
                Acl::Alias,
                Acl::Aliases,
                Acl::Analyze,
                Acl::Cache,
                Acl::Close,
                Acl::Open,
                Acl::Flush,
                Acl::Forcemerge,
                Acl::Mapping,
                Acl::Recovery,
                Acl::Refresh,
                Acl::Rollover,
                Acl::Segments,
                Acl::Settings,
                Acl::Shrink,
                Acl::Split,
                Acl::Stats,
                Acl::Template,
                Acl::Exists,
                Acl::Get,
            ],
            Self::Cat => &[Acl::Cat],
            Self::Clusters => &[Acl::Cluster, Acl::Nodes, Acl::Remote, Acl::Tasks],
            Self::Misc => &[Acl::Get, Acl::Ingest, Acl::Scripts, Acl::Snapshot],
            Self::User => &[Acl::User],
            Self::Permission => &[Acl::Permission],
            Self::Analytics => &[Acl::Analytics],
            Self::Streams => &[Acl::Streams],
            Self::Rules => &[Acl::Rules],
            Self::Suggestions => &[Acl::Suggestions],
            Self::Auth => &[Acl::Auth],
            Self::ReactiveSearch => &[Acl::ReactiveSearch],
            Self::SearchRelevancy => &[Acl::SearchRelevancy],
            Self::Synonyms => &[Acl::Synonyms],
            Self::SearchGrader => &[Acl::SearchGrader],
            Self::UiBuilder => &[Acl::UiBuilder],
            Self::Logs => &[Acl::Logs],
            Self::Cache => &[Acl::CachePreferences],
            Self::StoredQuery => &[Acl::StoredQuery],
            Self::Sync => &[Acl::Sync],
            Self::Pipelines => &[Acl::Pipelines],
        }
    }

    #[must_use]
    pub fn has_acl(self, acl: Acl) -> bool {
        self.acls().contains(&acl)
    }

    #[must_use]
    pub fn is_from_es(self) -> bool {
        Self::ELASTICSEARCH.contains(&self)
    }

    #[must_use]
    pub fn is_from_rs(self) -> bool {
        matches!(self, Self::ReactiveSearch)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of the ACLs authorized by `categories`.
#[must_use]
pub fn acls_for(categories: &[Category]) -> BTreeSet<Acl> {
    categories
        .iter()
        .flat_map(|c| c.acls().iter().copied())
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn every_acl_is_authorized_by_some_category() {
        for acl in Acl::ALL {
            assert!(
                Category::ALL.iter().any(|c| c.has_acl(acl)),
                "acl {acl} is orphaned"
            );
        }
    }

    #[test]
    fn es_and_rs_sets_are_disjoint() {
        for c in Category::ALL {
            assert!(!(c.is_from_es() && c.is_from_rs()), "{c} is both");
        }
        assert!(Category::Search.is_from_es());
        assert!(Category::ReactiveSearch.is_from_rs());
        assert!(!Category::User.is_from_es());
    }

    #[test]
    fn acls_for_unions_tables() {
        let acls = acls_for(&[Category::Cat, Category::Clusters]);
        assert!(acls.contains(&Acl::Cat));
        assert!(acls.contains(&Acl::Nodes));
        assert!(!acls.contains(&Acl::SearchQuery));
        assert!(acls_for(&[]).is_empty());
    }

    #[test]
    fn shared_acls_do_not_duplicate() {
        let acls = acls_for(&[Category::Docs, Category::Indices]);
        assert_eq!(acls.iter().filter(|a| **a == Acl::Get).count(), 1);
    }
}
