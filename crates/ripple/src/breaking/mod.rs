//! Breaking-change findings and their graph locations.
//!
//! Findings come from a detector (rule-based here, or any external producer)
//! with a raw location, usually a file path. `map_location` resolves that
//! location to a graph node when it can:
//!
//! 1. Exact node id text, or exact (normalized) node path; first in graph order
//! 2. First node whose path contains the location
//! 3. Otherwise the location stays raw
//!
//! Unmapped locations are not an error.

pub mod cache;
pub mod detect;

pub use cache::{AnnotationCache, CachedDetector};
pub use detect::{BreakingChangeDetector, RuleBasedDetector, detect_openapi_drift};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::changes::normalize_path;
use crate::graph::{DependencyGraph, NodeId};
use crate::types::Severity;

/// Where a finding applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Resolved graph node
    Node(NodeId),
    /// Location as produced by the detector
    Raw(String),
}

impl Location {
    /// Resolved node, if mapped.
    #[must_use]
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::Node(id) => Some(id),
            Self::Raw(_) => None,
        }
    }

    /// Returns `true` if the location resolved to a node.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Node(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(id) => write!(f, "{id}"),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

/// A severity-scored finding about a specific change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakingChangeRecord {
    /// Finding category (`field_removed`, `openapi_drift`, ...)
    pub change_type: String,
    /// Where the finding applies
    pub location: Location,
    /// Severity in `1..=5`
    pub severity: Severity,
    /// Human-readable detail
    pub description: String,
}

impl BreakingChangeRecord {
    /// Create a finding with a raw location.
    #[must_use]
    pub fn new(
        change_type: impl Into<String>,
        location: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            change_type: change_type.into(),
            location: Location::Raw(location.into()),
            severity,
            description: description.into(),
        }
    }
}

/// Resolve a raw location to a graph node, best effort.
#[must_use]
pub fn map_location(graph: &DependencyGraph, raw: &str) -> Location {
    if let Ok(id) = raw.parse::<NodeId>() {
        if graph.contains(&id) {
            return Location::Node(id);
        }
    }

    let wanted = normalize_path(raw);
    if wanted.is_empty() {
        return Location::Raw(raw.to_string());
    }

    let mut contained: Option<NodeId> = None;
    for (_, node) in graph.nodes() {
        let Some(path) = node.file_path() else {
            continue;
        };
        let path = normalize_path(path);
        if path == wanted {
            return Location::Node(node.id());
        }
        if contained.is_none() && path.contains(&wanted) {
            contained = Some(node.id());
        }
    }

    contained.map_or_else(|| Location::Raw(raw.to_string()), Location::Node)
}

/// Map every raw location in `records` onto the graph.
///
/// Already-mapped records are kept as they are.
#[must_use]
pub fn annotate(graph: &DependencyGraph, records: Vec<BreakingChangeRecord>) -> Vec<BreakingChangeRecord> {
    records
        .into_iter()
        .map(|mut record| {
            if let Location::Raw(raw) = &record.location {
                record.location = map_location(graph, raw);
            }
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::types::{FactSheet, RepositoryId};
    use rstest::rstest;

    fn repo() -> RepositoryId {
        RepositoryId::new("api").expect("valid repository id")
    }

    fn graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        build_graph(
            &mut graph,
            &repo(),
            &[
                FactSheet::new("app/models/user.py").with_class("User"),
                FactSheet::new("app/models/user_profile.py").with_class("Profile"),
            ],
        );
        graph
    }

    #[rstest]
    #[case::exact_path("app/models/user.py", Some("api::file::app/models/user.py"))]
    #[case::normalized_exact("./app/models/../models/user.py", Some("api::file::app/models/user.py"))]
    #[case::node_id("api::class::app/models/user.py::User", Some("api::class::app/models/user.py::User"))]
    #[case::substring("models/user", Some("api::file::app/models/user.py"))]
    #[case::unmapped("services/billing.py", None)]
    #[case::empty("", None)]
    fn maps_locations(#[case] raw: &str, #[case] expected: Option<&str>) {
        let location = map_location(&graph(), raw);

        match expected {
            Some(id) => assert_eq!(location.to_string(), id),
            None => assert_eq!(location, Location::Raw(raw.to_string())),
        }
    }

    #[test]
    fn exact_path_beats_earlier_substring_match() {
        let mut graph = DependencyGraph::new();
        build_graph(
            &mut graph,
            &repo(),
            &[
                FactSheet::new("pkg/user.py.bak/notes.py"),
                FactSheet::new("user.py"),
            ],
        );

        let location = map_location(&graph, "user.py");

        assert_eq!(location, Location::Node(NodeId::file(&repo(), "user.py")));
    }

    #[test]
    fn annotate_keeps_unmapped_locations_raw() {
        let records = vec![
            BreakingChangeRecord::new("field_removed", "app/models/user.py", Severity::MAX, "email"),
            BreakingChangeRecord::new("openapi_drift", "openapi.json", Severity::DIRECT, "x"),
        ];

        let annotated = annotate(&graph(), records);

        assert!(annotated[0].location.is_mapped());
        assert_eq!(annotated[1].location, Location::Raw("openapi.json".to_string()));
    }
}
