//! Map changed file paths onto graph nodes.
//!
//! Each changed path is normalized (`\` to `/`, `.`/`..` resolved, leading
//! `./` and `/` stripped) and tested against every file, function, and class
//! node with these strategies, in priority order:
//!
//! | Strategy | Match when |
//! |----------|------------|
//! | `BaseName` | Base names are equal |
//! | `Suffix` | Either normalized path ends with the other |
//! | `Substring` | Either normalized path contains the other |
//!
//! One changed file usually matches several nodes: the file node plus every
//! symbol it defines. Paths that match nothing are reported, not raised.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::{DependencyGraph, NodeId};
use crate::types::RepositoryId;

/// Path matching strategy, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathMatchStrategy {
    /// Base names are equal
    BaseName,
    /// One path is a suffix of the other
    Suffix,
    /// One path contains the other
    Substring,
}

impl PathMatchStrategy {
    /// Strategies in priority order.
    pub const ORDER: [Self; 3] = [Self::BaseName, Self::Suffix, Self::Substring];

    /// Stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BaseName => "base_name",
            Self::Suffix => "suffix",
            Self::Substring => "substring",
        }
    }

    /// Test a normalized changed path against a normalized node path.
    #[must_use]
    pub fn matches(&self, changed: &str, node_path: &str) -> bool {
        match self {
            Self::BaseName => base_name(changed) == base_name(node_path),
            Self::Suffix => changed.ends_with(node_path) || node_path.ends_with(changed),
            Self::Substring => changed.contains(node_path) || node_path.contains(changed),
        }
    }
}

/// A node matched by a changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMatch {
    /// Matched node
    pub node: NodeId,
    /// Normalized changed path that matched
    pub path: String,
    /// Strategy that produced the match
    pub strategy: PathMatchStrategy,
}

/// Result of mapping changed paths onto the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeMapping {
    /// Matched node ids, deduplicated, in graph order
    pub nodes: Vec<NodeId>,
    /// How each node matched (best strategy over all changed paths)
    pub matches: Vec<PathMatch>,
    /// Input paths that matched no node
    pub unmapped: Vec<String>,
}

impl ChangeMapping {
    /// Returns `true` if no node matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Normalize a path for comparison.
///
/// `..` segments that would climb above the root are dropped.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Map changed file paths to graph nodes.
///
/// Pure with respect to `graph`. The result does not depend on the order of
/// `paths`.
pub fn map_changed_files<S: AsRef<str>>(
    graph: &DependencyGraph,
    repository: Option<&RepositoryId>,
    paths: &[S],
) -> ChangeMapping {
    let mut unmapped: BTreeSet<String> = BTreeSet::new();
    let mut changed: BTreeSet<String> = BTreeSet::new();
    for raw in paths {
        let normalized = normalize_path(raw.as_ref());
        if normalized.is_empty() {
            unmapped.insert(raw.as_ref().to_string());
        } else {
            changed.insert(normalized);
        }
    }

    let mut mapping = ChangeMapping::default();
    let mut matched_paths: BTreeSet<&str> = BTreeSet::new();

    for (_, node) in graph.nodes() {
        if !node.kind().is_code() {
            continue;
        }
        if let Some(repo) = repository {
            if !node.in_repository(repo) {
                continue;
            }
        }
        let Some(file) = node.file_path() else {
            continue;
        };
        let node_path = normalize_path(file);

        let mut best: Option<(PathMatchStrategy, &str)> = None;
        for path in &changed {
            let Some(strategy) = PathMatchStrategy::ORDER
                .into_iter()
                .find(|strategy| strategy.matches(path, &node_path))
            else {
                continue;
            };
            matched_paths.insert(path.as_str());
            if best.is_none_or(|(current, _)| strategy < current) {
                best = Some((strategy, path.as_str()));
            }
        }

        if let Some((strategy, path)) = best {
            let id = node.id();
            mapping.nodes.push(id.clone());
            mapping.matches.push(PathMatch {
                node: id,
                path: path.to_string(),
                strategy,
            });
        }
    }

    unmapped.extend(
        changed
            .iter()
            .filter(|path| !matched_paths.contains(path.as_str()))
            .cloned(),
    );
    mapping.unmapped = unmapped.into_iter().collect();

    debug!(
        changed = changed.len(),
        nodes = mapping.nodes.len(),
        unmapped = mapping.unmapped.len(),
        "mapped changed files"
    );
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::types::FactSheet;
    use rstest::rstest;

    #[rstest]
    #[case::dot_prefix("./app/auth.py", "app/auth.py")]
    #[case::backslashes("app\\services\\auth.py", "app/services/auth.py")]
    #[case::parent("app/x/../auth.py", "app/auth.py")]
    #[case::leading_slash("/app/auth.py", "app/auth.py")]
    #[case::double_slash("app//auth.py", "app/auth.py")]
    #[case::climb_above_root("../auth.py", "auth.py")]
    #[case::only_dots("./.", "")]
    fn normalizes_paths(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_path(input), expected);
    }

    #[rstest]
    #[case::base_name(PathMatchStrategy::BaseName, "other/auth.py", "app/auth.py", true)]
    #[case::suffix(PathMatchStrategy::Suffix, "repo/app/auth.py", "app/auth.py", true)]
    #[case::suffix_reverse(PathMatchStrategy::Suffix, "auth.py", "app/auth.py", true)]
    #[case::substring(PathMatchStrategy::Substring, "app/auth", "app/auth.py", true)]
    #[case::no_substring(PathMatchStrategy::Substring, "billing", "app/auth.py", false)]
    fn strategy_matching(
        #[case] strategy: PathMatchStrategy,
        #[case] changed: &str,
        #[case] node_path: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(strategy.matches(changed, node_path), expected);
    }

    fn graph() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        build_graph(
            &mut graph,
            &RepositoryId::new("api").expect("valid repository id"),
            &[
                FactSheet::new("app/auth.py").with_function("login"),
                FactSheet::new("app/db.py").with_function("connect"),
            ],
        );
        build_graph(
            &mut graph,
            &RepositoryId::new("worker").expect("valid repository id"),
            &[FactSheet::new("jobs/auth.py").with_function("refresh")],
        );
        graph
    }

    #[test]
    fn maps_file_and_defined_symbols() {
        let graph = graph();
        let api = RepositoryId::new("api").expect("valid repository id");

        let mapping = map_changed_files(&graph, Some(&api), &["app/auth.py"]);

        assert_eq!(
            mapping.nodes,
            vec![
                NodeId::file(&api, "app/auth.py"),
                NodeId::function(&api, "app/auth.py", "login"),
            ]
        );
        assert!(mapping.unmapped.is_empty());
    }

    #[test]
    fn repository_filter_excludes_other_repositories() {
        let graph = graph();

        let unfiltered = map_changed_files(&graph, None, &["auth.py"]);
        let filtered = map_changed_files(&graph, Some(&RepositoryId::new("worker").expect("valid repository id")), &["auth.py"]);

        assert_eq!(unfiltered.nodes.len(), 4);
        assert_eq!(filtered.nodes.len(), 2);
        assert!(filtered
            .nodes
            .iter()
            .all(|id| id.repository() == Some(&RepositoryId::new("worker").expect("valid repository id"))));
    }

    #[test]
    fn reports_best_strategy_per_node() {
        let graph = graph();

        let mapping = map_changed_files(
            &graph,
            Some(&RepositoryId::new("api").expect("valid repository id")),
            &["src/app/db.py", "app/db"],
        );

        assert!(mapping
            .matches
            .iter()
            .all(|m| m.strategy == PathMatchStrategy::BaseName && m.path == "src/app/db.py"));
    }

    #[test]
    fn unmatched_paths_are_reported_not_raised() {
        let graph = graph();

        let mapping = map_changed_files(&graph, None, &["docs/README.md", "", "./"]);

        assert!(mapping.is_empty());
        assert_eq!(mapping.unmapped, vec!["", "./", "docs/README.md"]);
    }

    #[test]
    fn input_order_does_not_change_result() {
        let graph = graph();
        let forward = map_changed_files(&graph, None, &["app/db.py", "jobs/auth.py"]);
        let backward = map_changed_files(&graph, None, &["jobs/auth.py", "app/db.py"]);

        assert_eq!(forward, backward);
    }
}
