//! Route classification table.
//!
//! Maps `(method, path)` to the category, ACL and operation that gate the
//! request, plus the plans allowed to use it. Paths use `matchit` syntax.
use std::fmt;

use arc_security::{Acl, Category, Op};
use axum::http::Method;

use crate::config::Plan;

/// Path parameter holding the comma-separated target indices.
pub const INDEX_PARAM: &str = "index";

/// Path parameter holding the comma-separated target ingest pipelines.
pub const PIPELINE_PARAM: &str = "pipeline";

/// Path parameter naming the credential a route operates on.
pub const USERNAME_PARAM: &str = "username";

const READ: &[&str] = &["GET", "HEAD"];
const WRITE: &[&str] = &["PUT", "POST", "PATCH"];
const DELETE: &[&str] = &["DELETE"];

const ENTERPRISE_PLANS: &[Plan] = &[
    Plan::ArcEnterprise,
    Plan::HostedArcEnterprise,
];

const PAID_PLANS: &[Plan] = &[
    Plan::ArcBasic,
    Plan::ArcStandard,
    Plan::ArcEnterprise,
    Plan::HostedArcBasic,
    Plan::HostedArcStandard,
    Plan::HostedArcEnterprise,
];

/// Classification of one `(method, path)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteClass {
    pub category: Category,
    pub acl: Acl,
    /// Operation when it does not follow from the method.
    pub op: Option<Op>,
    /// Plans allowed to use the route; empty means every plan.
    pub plans: &'static [Plan],
}

impl RouteClass {
    /// Fallback for paths the table does not know.
    pub const UNKNOWN: Self = Self {
        category: Category::Misc,
        acl: Acl::Get,
        op: None,
        plans: &[],
    };

    /// Operation of a request with `method` on this route.
    #[must_use]
    pub fn op_for(&self, method: &Method) -> Op {
        self.op.unwrap_or_else(|| op_from_method(method))
    }
}

/// GET and HEAD read, DELETE deletes, everything else writes.
#[must_use]
pub fn op_from_method(method: &Method) -> Op {
    match *method {
        Method::GET | Method::HEAD | Method::OPTIONS => Op::Read,
        Method::DELETE => Op::Delete,
        _ => Op::Write,
    }
}

#[derive(Debug, Clone)]
struct RouteRule {
    methods: &'static [&'static str],
    class: RouteClass,
}

impl RouteRule {
    fn accepts(&self, method: &Method) -> bool {
        self.methods.is_empty() || self.methods.contains(&method.as_str())
    }
}

/// Result of a table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub class: RouteClass,
    /// Value of the `{index}` segment, if the route has one.
    pub index: Option<String>,
    /// Value of the `{pipeline}` segment, if the route has one.
    pub pipeline: Option<String>,
    /// Value of the `{username}` segment, if the route has one.
    pub username: Option<String>,
}

/// `matchit`-backed lookup table.
#[derive(Clone)]
pub struct RouteTable {
    router: matchit::Router<Vec<RouteRule>>,
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable").finish_non_exhaustive()
    }
}

struct Builder {
    rules: Vec<(&'static str, RouteRule)>,
}

impl Builder {
    fn route(
        &mut self,
        paths: &[&'static str],
        methods: &'static [&'static str],
        category: Category,
        acl: Acl,
        op: Option<Op>,
    ) -> &mut Self {
        for &path in paths {
            self.rules.push((
                path,
                RouteRule {
                    methods,
                    class: RouteClass {
                        category,
                        acl,
                        op,
                        plans: &[],
                    },
                },
            ));
        }
        self
    }

    /// Any method, operation from the method.
    fn any(&mut self, paths: &[&'static str], category: Category, acl: Acl) -> &mut Self {
        self.route(paths, &[], category, acl, None)
    }

    /// Any method, always a read (POST carries a query body).
    fn read(&mut self, paths: &[&'static str], category: Category, acl: Acl) -> &mut Self {
        self.route(paths, &[], category, acl, Some(Op::Read))
    }

    /// Restrict every rule registered under `paths` to `plans`.
    fn plans(&mut self, paths: &[&'static str], plans: &'static [Plan]) -> &mut Self {
        for (path, rule) in &mut self.rules {
            if paths.contains(&*path) {
                rule.class.plans = plans;
            }
        }
        self
    }
}

impl RouteTable {
    /// Table covering the Elasticsearch REST API and the gateway's own routes.
    ///
    /// # Errors
    /// Returns an error when two paths conflict in `matchit`.
    pub fn builtin() -> Result<Self, matchit::InsertError> {
        let mut b = Builder { rules: Vec::new() };
        elasticsearch_routes(&mut b);
        gateway_routes(&mut b);
        Self::from_rules(b.rules)
    }

    fn from_rules(rules: Vec<(&'static str, RouteRule)>) -> Result<Self, matchit::InsertError> {
        let mut grouped: Vec<(&'static str, Vec<RouteRule>)> = Vec::new();
        for (path, rule) in rules {
            match grouped.iter_mut().find(|(p, _)| *p == path) {
                Some((_, existing)) => existing.push(rule),
                None => grouped.push((path, vec![rule])),
            }
        }
        let mut router = matchit::Router::new();
        for (path, rules) in grouped {
            router.insert(path, rules)?;
        }
        Ok(Self { router })
    }

    /// Classify a request. Unknown paths and methods fall back to [`RouteClass::UNKNOWN`].
    #[must_use]
    pub fn classify(&self, method: &Method, path: &str) -> Classified {
        let Ok(matched) = self.router.at(path) else {
            return Classified {
                class: RouteClass::UNKNOWN,
                index: None,
                pipeline: None,
                username: None,
            };
        };
        let class = matched
            .value
            .iter()
            .find(|r| r.accepts(method))
            .map_or(RouteClass::UNKNOWN, |r| r.class);
        Classified {
            class,
            index: matched.params.get(INDEX_PARAM).map(str::to_owned),
            pipeline: matched.params.get(PIPELINE_PARAM).map(str::to_owned),
            username: matched.params.get(USERNAME_PARAM).map(str::to_owned),
        }
    }
}

/// Split an `{index}` or `{pipeline}` segment into target names.
///
/// `_all` addresses every target and becomes `*`; other `_`-prefixed segments are API names.
#[must_use]
pub fn split_indices(segment: &str) -> Vec<String> {
    segment
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s {
            "_all" => Some("*".to_owned()),
            s if s.starts_with('_') => None,
            s => Some(s.to_owned()),
        })
        .collect()
}

#[allow(clippy::too_many_lines)]
fn elasticsearch_routes(b: &mut Builder) {
    use Category as C;

    b.any(&["/"], C::Misc, Acl::Get)
        // search
        .read(&["/_search", "/{index}/_search"], C::Search, Acl::SearchQuery)
        .read(&["/_msearch", "/{index}/_msearch"], C::Search, Acl::Msearch)
        .read(&["/_count", "/{index}/_count"], C::Search, Acl::Count)
        .read(&["/{index}/_explain/{id}"], C::Search, Acl::Explain)
        .read(&["/_validate/query", "/{index}/_validate/query"], C::Search, Acl::Validate)
        .read(&["/_field_caps", "/{index}/_field_caps"], C::Search, Acl::FieldCaps)
        .read(&["/_rank_eval", "/{index}/_rank_eval"], C::Search, Acl::RankEval)
        .read(&["/_search_shards", "/{index}/_search_shards"], C::Search, Acl::SearchShards)
        .read(&["/_search/template", "/{index}/_search/template"], C::Search, Acl::Template)
        .read(&["/_render/template", "/_render/template/{id}"], C::Search, Acl::Render)
        // documents
        .route(&["/{index}/_doc/{id}"], READ, C::Docs, Acl::Doc, Some(Op::Read))
        .route(&["/{index}/_doc/{id}"], WRITE, C::Docs, Acl::Index, Some(Op::Write))
        .route(&["/{index}/_doc/{id}"], DELETE, C::Docs, Acl::Delete, Some(Op::Delete))
        .route(&["/{index}/_doc"], WRITE, C::Docs, Acl::Index, Some(Op::Write))
        .route(&["/{index}/_create/{id}"], WRITE, C::Docs, Acl::Create, Some(Op::Write))
        .route(&["/{index}/_update/{id}"], WRITE, C::Docs, Acl::Update, Some(Op::Write))
        .any(&["/{index}/_source/{id}"], C::Docs, Acl::Source)
        .route(&["/_bulk", "/{index}/_bulk"], &[], C::Docs, Acl::Bulk, Some(Op::Write))
        .read(&["/_mget", "/{index}/_mget"], C::Docs, Acl::Mget)
        .read(&["/{index}/_termvectors", "/{index}/_termvectors/{id}"], C::Docs, Acl::Termvectors)
        .read(&["/_mtermvectors", "/{index}/_mtermvectors"], C::Docs, Acl::Mtermvectors)
        .route(&["/{index}/_delete_by_query"], &[], C::Docs, Acl::DeleteByQuery, Some(Op::Delete))
        .route(&["/{index}/_update_by_query"], &[], C::Docs, Acl::UpdateByQuery, Some(Op::Write))
        .route(&["/_reindex"], &[], C::Docs, Acl::Reindex, Some(Op::Write))
        // indices
        .any(&["/{index}"], C::Indices, Acl::Indices)
        .any(&["/_mapping", "/{index}/_mapping"], C::Indices, Acl::Mapping)
        .any(&["/_settings", "/{index}/_settings"], C::Indices, Acl::Settings)
        .any(&["/_alias", "/_alias/{name}", "/{index}/_alias", "/{index}/_alias/{name}"], C::Indices, Acl::Alias)
        .any(&["/_aliases", "/{index}/_aliases"], C::Indices, Acl::Aliases)
        .read(&["/_analyze", "/{index}/_analyze"], C::Indices, Acl::Analyze)
        .route(&["/_cache/clear", "/{index}/_cache/clear"], &[], C::Indices, Acl::Cache, Some(Op::Write))
        .route(&["/{index}/_close"], &[], C::Indices, Acl::Close, Some(Op::Write))
        .route(&["/{index}/_open"], &[], C::Indices, Acl::Open, Some(Op::Write))
        .route(&["/_flush", "/{index}/_flush"], &[], C::Indices, Acl::Flush, Some(Op::Write))
        .route(&["/_forcemerge", "/{index}/_forcemerge"], &[], C::Indices, Acl::Forcemerge, Some(Op::Write))
        .read(&["/_recovery", "/{index}/_recovery"], C::Indices, Acl::Recovery)
        .route(&["/_refresh", "/{index}/_refresh"], &[], C::Indices, Acl::Refresh, Some(Op::Write))
        .route(&["/{index}/_rollover", "/{index}/_rollover/{target}"], &[], C::Indices, Acl::Rollover, Some(Op::Write))
        .read(&["/_segments", "/{index}/_segments"], C::Indices, Acl::Segments)
        .route(&["/{index}/_shrink/{target}"], &[], C::Indices, Acl::Shrink, Some(Op::Write))
        .route(&["/{index}/_split/{target}"], &[], C::Indices, Acl::Split, Some(Op::Write))
        .read(&["/_stats", "/{index}/_stats"], C::Indices, Acl::Stats)
        .any(&["/_template/{name}", "/_index_template/{name}"], C::Indices, Acl::Template)
        // cat, cluster and misc
        .read(&["/_cat", "/_cat/{*rest}"], C::Cat, Acl::Cat)
        .any(&["/_cluster/{*rest}"], C::Clusters, Acl::Cluster)
        .any(&["/_nodes", "/_nodes/{*rest}"], C::Clusters, Acl::Nodes)
        .read(&["/_remote/info"], C::Clusters, Acl::Remote)
        .any(&["/_tasks", "/_tasks/{*rest}"], C::Clusters, Acl::Tasks)
        .any(
            &[
                "/_ingest/pipeline",
                "/_ingest/pipeline/_simulate",
                "/_ingest/pipeline/{pipeline}",
                "/_ingest/pipeline/{pipeline}/_simulate",
                "/_ingest/processor/grok",
                "/_ingest/geoip/stats",
            ],
            C::Misc,
            Acl::Ingest,
        )
        .any(&["/_scripts/{id}"], C::Misc, Acl::Scripts)
        .any(&["/_snapshot", "/_snapshot/{*rest}"], C::Misc, Acl::Snapshot);
}

fn gateway_routes(b: &mut Builder) {
    use Category as C;

    b.any(&["/_user", "/_users", "/_user/{username}"], C::User, Acl::User)
        .any(
            &[
                "/_permission",
                "/_permissions",
                "/_permission/{username}",
                "/user/_permissions",
                "/_role/{name}",
                "/{index}/_permissions",
            ],
            C::Permission,
            Acl::Permission,
        )
        .any(&["/_public_key"], C::Auth, Acl::Auth)
        .read(
            &[
                "/_reactivesearch",
                "/_reactivesearch.v3",
                "/{index}/_reactivesearch",
                "/{index}/_reactivesearch.v3",
            ],
            C::ReactiveSearch,
            Acl::ReactiveSearch,
        )
        .any(&["/_analytics", "/_analytics/{*rest}"], C::Analytics, Acl::Analytics)
        .any(&["/_logs", "/_logs/{*rest}"], C::Logs, Acl::Logs)
        .any(&["/_rules", "/_rules/{*rest}"], C::Rules, Acl::Rules)
        .any(&["/_synonyms", "/_synonyms/{*rest}"], C::Synonyms, Acl::Synonyms)
        .any(&["/_streams", "/_streams/{*rest}"], C::Streams, Acl::Streams)
        .any(&["/_suggestions", "/_suggestions/{*rest}"], C::Suggestions, Acl::Suggestions)
        .any(&["/_searchrelevancy", "/_searchrelevancy/{*rest}"], C::SearchRelevancy, Acl::SearchRelevancy)
        .any(&["/_searchgrader", "/_searchgrader/{*rest}"], C::SearchGrader, Acl::SearchGrader)
        .any(&["/_uibuilder", "/_uibuilder/{*rest}"], C::UiBuilder, Acl::UiBuilder)
        .any(&["/_cache/preferences"], C::Cache, Acl::CachePreferences)
        .any(&["/_storedquery", "/_storedquery/{*rest}"], C::StoredQuery, Acl::StoredQuery)
        .any(&["/_sync", "/_sync/{*rest}"], C::Sync, Acl::Sync)
        .any(
            &["/_pipeline", "/_pipeline/{pipeline}", "/_pipeline/{pipeline}/{*rest}"],
            C::Pipelines,
            Acl::Pipelines,
        )
        .plans(&["/_analytics", "/_analytics/{*rest}", "/_logs", "/_logs/{*rest}"], PAID_PLANS)
        .plans(
            &[
                "/_searchrelevancy",
                "/_searchrelevancy/{*rest}",
                "/_searchgrader",
                "/_searchgrader/{*rest}",
                "/_cache/preferences",
            ],
            ENTERPRISE_PLANS,
        );
}
