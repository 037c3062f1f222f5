//! High-level permission bundles granted to dashboard users.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserAction {
    Develop,
    Analytics,
    CuratedInsights,
    SearchRelevancy,
    AccessControl,
    UserManagement,
    Billing,
    DowntimeAlerts,
    #[serde(rename = "uibuilder")]
    UiBuilder,
    Speed,
}

const DEVELOP: &[Category] = &[
    Category::Docs,
    Category::Search,
    Category::Indices,
    Category::Cat,
    Category::Clusters,
    Category::Misc,
    Category::Streams,
    Category::ReactiveSearch,
    Category::Pipelines,
    Category::Sync,
];

const RELEVANCY: &[Category] = &[
    Category::SearchRelevancy,
    Category::Rules,
    Category::Suggestions,
    Category::Synonyms,
    Category::SearchGrader,
    Category::StoredQuery,
    Category::Cache,
];

impl UserAction {
    pub const ALL: [Self; 10] = [
        Self::Develop,
        Self::Analytics,
        Self::CuratedInsights,
        Self::SearchRelevancy,
        Self::AccessControl,
        Self::UserManagement,
        Self::Billing,
        Self::DowntimeAlerts,
        Self::UiBuilder,
        Self::Speed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Develop => "develop",
            Self::Analytics => "analytics",
            Self::CuratedInsights => "curated-insights",
            Self::SearchRelevancy => "search-relevancy",
            Self::AccessControl => "access-control",
            Self::UserManagement => "user-management",
            Self::Billing => "billing",
            Self::DowntimeAlerts => "downtime-alerts",
            Self::UiBuilder => "uibuilder",
            Self::Speed => "speed",
        }
    }

    /// Categories granted by this bundle. `search-relevancy` includes everything `develop` grants.
    #[must_use]
    pub fn categories(self) -> BTreeSet<Category> {
        let mut out = BTreeSet::new();
        match self {
            Self::Develop => out.extend(DEVELOP),
            Self::SearchRelevancy => {
                out.extend(DEVELOP);
                out.extend(RELEVANCY);
            }
            Self::Analytics => out.extend([Category::Analytics, Category::Logs]),
            Self::CuratedInsights => out.extend([Category::Analytics]),
            Self::AccessControl => out.extend([Category::Permission, Category::Auth]),
            Self::UserManagement => out.extend([Category::User]),
            Self::DowntimeAlerts => out.extend([Category::Logs]),
            Self::UiBuilder => out.extend([Category::UiBuilder, Category::ReactiveSearch]),
            Self::Speed => out.extend([Category::Cache]),
            Self::Billing => {}
        }
        out
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of the categories granted by `actions`.
#[must_use]
pub fn categories_for(actions: &[UserAction]) -> BTreeSet<Category> {
    actions.iter().flat_map(|a| a.categories()).collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn search_relevancy_extends_develop() {
        let develop = UserAction::Develop.categories();
        let relevancy = UserAction::SearchRelevancy.categories();
        assert!(develop.is_subset(&relevancy));
        assert!(relevancy.contains(&Category::Synonyms));
    }

    #[test]
    fn billing_grants_nothing() {
        assert!(UserAction::Billing.categories().is_empty());
    }

    #[test]
    fn categories_for_merges_bundles() {
        let cats = categories_for(&[UserAction::UserManagement, UserAction::Speed]);
        assert_eq!(
            cats.into_iter().collect::<Vec<_>>(),
            vec![Category::User, Category::Cache]
        );
    }
}
