//! Fine-grained request kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fine-grained request kind, authorized through one or more [`Category`](crate::Category) values.
///
/// `SearchQuery` is the `_search` endpoint family and keeps the `search` token on the wire;
/// it is unrelated to [`Category::Search`](crate::Category::Search) apart from the spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acl {
    // Elasticsearch APIs
    Cat,
    Bulk,
    Cluster,
    #[serde(rename = "search")]
    SearchQuery,
    Remote,
    Create,
    Count,
    Scripts,
    Delete,
    Doc,
    Source,
    FieldCaps,
    Close,
    Analyze,
    Exists,
    Get,
    Template,
    Explain,
    Indices,
    Alias,
    Aliases,
    DeleteByQuery,
    Cache,
    Index,
    Mapping,
    Flush,
    Forcemerge,
    Open,
    Recovery,
    Rollover,
    Refresh,
    Segments,
    Settings,
    Shrink,
    Split,
    Stats,
    Ingest,
    Validate,
    Msearch,
    Mget,
    Nodes,
    Mtermvectors,
    Reindex,
    UpdateByQuery,
    Render,
    RankEval,
    SearchShards,
    Snapshot,
    Tasks,
    Termvectors,
    Update,
    // Gateway APIs
    User,
    Permission,
    Analytics,
    Streams,
    Rules,
    Suggestions,
    Auth,
    #[serde(rename = "reactivesearch")]
    ReactiveSearch,
    #[serde(rename = "searchrelevancy")]
    SearchRelevancy,
    Synonyms,
    #[serde(rename = "searchgrader")]
    SearchGrader,
    #[serde(rename = "uibuilder")]
    UiBuilder,
    Logs,
    CachePreferences,
    #[serde(rename = "storedquery")]
    StoredQuery,
    Sync,
    Pipelines,
}

impl Acl {
    pub const ALL: [Self; 68] = [
        Self::Cat,
        Self::Bulk,
        Self::Cluster,
        Self::SearchQuery,
        Self::Remote,
        Self::Create,
        Self::Count,
        Self::Scripts,
        Self::Delete,
        Self::Doc,
        Self::Source,
        Self::FieldCaps,
        Self::Close,
        Self::Analyze,
        Self::Exists,
        Self::Get,
        Self::Template,
        Self::Explain,
        Self::Indices,
        Self::Alias,
        Self::Aliases,
        Self::DeleteByQuery,
        Self::Cache,
        Self::Index,
        Self::Mapping,
        Self::Flush,
        Self::Forcemerge,
        Self::Open,
        Self::Recovery,
        Self::Rollover,
        Self::Refresh,
        Self::Segments,
        Self::Settings,
        Self::Shrink,
        Self::Split,
        Self::Stats,
        Self::Ingest,
        Self::Validate,
        Self::Msearch,
        Self::Mget,
        Self::Nodes,
        Self::Mtermvectors,
        Self::Reindex,
        Self::UpdateByQuery,
        Self::Render,
        Self::RankEval,
        Self::SearchShards,
        Self::Snapshot,
        Self::Tasks,
        Self::Termvectors,
        Self::Update,
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
        Self::CachePreferences,
        Self::StoredQuery,
        Self::Sync,
        Self::Pipelines,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cat => "cat",
            Self::Bulk => "bulk",
            Self::Cluster => "cluster",
            Self::SearchQuery => "search",
            Self::Remote => "remote",
            Self::Create => "create",
            Self::Count => "count",
            Self::Scripts => "scripts",
            Self::Delete => "delete",
            Self::Doc => "doc",
            Self::Source => "source",
            Self::FieldCaps => "field_caps",
            Self::Close => "close",
            Self::Analyze => "analyze",
            Self::Exists => "exists",
            Self::Get => "get",
            Self::Template => "template",
            Self::Explain => "explain",
            Self::Indices => "indices",
            Self::Alias => "alias",
            Self::Aliases => "aliases",
            Self::DeleteByQuery => "delete_by_query",
            Self::Cache => "cache",
            Self::Index => "index",
            Self::Mapping => "mapping",
            Self::Flush => "flush",
            Self::Forcemerge => "forcemerge",
            Self::Open => "open",
            Self::Recovery => "recovery",
            Self::Rollover => "rollover",
            Self::Refresh => "refresh",
            Self::Segments => "segments",
            Self::Settings => "settings",
            Self::Shrink => "shrink",
            Self::Split => "split",
            Self::Stats => "stats",
            Self::Ingest => "ingest",
            Self::Validate => "validate",
            Self::Msearch => "msearch",
            Self::Mget => "mget",
            Self::Nodes => "nodes",
            Self::Mtermvectors => "mtermvectors",
            Self::Reindex => "reindex",
            Self::UpdateByQuery => "update_by_query",
            Self::Render => "render",
            Self::RankEval => "rank_eval",
            Self::SearchShards => "search_shards",
            Self::Snapshot => "snapshot",
            Self::Tasks => "tasks",
            Self::Termvectors => "termvectors",
            Self::Update => "update",
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
            Self::CachePreferences => "cache_preferences",
            Self::StoredQuery => "storedquery",
            Self::Sync => "sync",
            Self::Pipelines => "pipelines",
        }
    }
}

impl fmt::Display for Acl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
