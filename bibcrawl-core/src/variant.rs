use crate::expand::{CitationExpander, CoauthorExpander, Expander};
use serde::{Deserialize, Serialize};

/// The four traversal flavours. They share one engine and differ only in the
/// settings returned by the methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// BFS over works following reference lists.
    Citation,
    /// BFS over authors; the limit caps how many authors get collected.
    Author,
    /// BFS over authors bounded by the number of works processed.
    AuthorLimit,
    /// Author BFS plus institution metadata backfill.
    AuthorGraph,
}

/// Which counter the termination test reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitCounter {
    /// Distinct works expanded.
    Works,
    /// Frontier nodes fetched.
    Nodes,
    /// Distinct nodes collected by discovery. Gates enqueue instead of stopping the loop.
    Collected,
}

/// When a node enters the Visited registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitPolicy {
    /// Marked Visited when popped for a fetch; pops skip Visited IDs.
    OnFetch,
    /// Marked Visited (collected) when discovered; pops skip Processed IDs.
    OnDiscovery,
}

/// Which source query expands a frontier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    WorksByIds,
    WorksByAuthors,
}

/// What happens to the IDs of a batch whose fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum FailurePolicy {
    /// Record the IDs as dropped and move on. Their subtree is lost.
    #[default]
    Drop,
    /// Put the IDs on the retry queue until they have failed `max_attempts` times.
    Requeue { max_attempts: u32 },
}

impl Variant {
    pub const ALL: [Variant; 4] = [
        Variant::Citation,
        Variant::Author,
        Variant::AuthorLimit,
        Variant::AuthorGraph,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "citation" | "citations" => Some(Variant::Citation),
            "author" => Some(Variant::Author),
            "author_limit" => Some(Variant::AuthorLimit),
            "author_graph" => Some(Variant::AuthorGraph),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Citation => "citation",
            Variant::Author => "author",
            Variant::AuthorLimit => "author_limit",
            Variant::AuthorGraph => "author_graph",
        }
    }

    /// Suffix of the default output directory, `<seed>_<suffix>`.
    pub fn directory_suffix(&self) -> &'static str {
        match self {
            Variant::Citation => "citations_based_database",
            Variant::Author => "author_based_database",
            Variant::AuthorLimit => "author_limit_database",
            Variant::AuthorGraph => "author_graph_based_database",
        }
    }

    pub fn default_limit_counter(&self) -> LimitCounter {
        match self {
            Variant::Citation | Variant::AuthorLimit => LimitCounter::Works,
            Variant::Author | Variant::AuthorGraph => LimitCounter::Collected,
        }
    }

    pub fn visit_policy(&self) -> VisitPolicy {
        match self {
            Variant::Citation | Variant::AuthorLimit => VisitPolicy::OnFetch,
            Variant::Author | Variant::AuthorGraph => VisitPolicy::OnDiscovery,
        }
    }

    pub fn fetch_mode(&self) -> FetchMode {
        match self {
            Variant::Citation => FetchMode::WorksByIds,
            _ => FetchMode::WorksByAuthors,
        }
    }

    /// Frontier nodes are works, so one node yields at most one record.
    pub fn nodes_are_records(&self) -> bool {
        self.fetch_mode() == FetchMode::WorksByIds
    }

    pub fn collects_institutions(&self) -> bool {
        matches!(self, Variant::AuthorGraph)
    }

    pub fn expander(&self) -> Box<dyn Expander> {
        match self {
            Variant::Citation => Box::new(CitationExpander),
            Variant::Author | Variant::AuthorLimit => Box::new(CoauthorExpander::default()),
            Variant::AuthorGraph => Box::new(CoauthorExpander {
                collect_institutions: true,
            }),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LimitCounter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "works" => Some(LimitCounter::Works),
            "nodes" => Some(LimitCounter::Nodes),
            "collected" | "authors" => Some(LimitCounter::Collected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitCounter::Works => "works",
            LimitCounter::Nodes => "nodes",
            LimitCounter::Collected => "collected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trip_names() {
        for variant in Variant::ALL {
            assert_eq!(Variant::from_str(variant.as_str()), Some(variant));
        }
        assert_eq!(Variant::from_str("author-graph"), Some(Variant::AuthorGraph));
        assert_eq!(Variant::from_str("bogus"), None);
    }

    #[test]
    fn test_default_limit_counters() {
        assert_eq!(Variant::Citation.default_limit_counter(), LimitCounter::Works);
        assert_eq!(Variant::AuthorLimit.default_limit_counter(), LimitCounter::Works);
        assert_eq!(Variant::Author.default_limit_counter(), LimitCounter::Collected);
        assert_eq!(Variant::AuthorGraph.default_limit_counter(), LimitCounter::Collected);
    }

    #[test]
    fn test_only_citation_fetches_by_id() {
        assert!(Variant::Citation.nodes_are_records());
        assert!(!Variant::Author.nodes_are_records());
        assert!(!Variant::AuthorLimit.nodes_are_records());
        assert!(!Variant::AuthorGraph.nodes_are_records());
    }

    #[test]
    fn test_failure_policy_serde() {
        let json = serde_json::to_string(&FailurePolicy::Requeue { max_attempts: 3 }).unwrap();
        assert_eq!(json, r#"{"policy":"requeue","max_attempts":3}"#);
        let back: FailurePolicy = serde_json::from_str(r#"{"policy":"drop"}"#).unwrap();
        assert_eq!(back, FailurePolicy::Drop);
    }
}
