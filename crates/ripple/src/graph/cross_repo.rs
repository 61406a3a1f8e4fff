//! Candidate call links between repositories.
//!
//! Runs once every repository has been merged into one graph. For each
//! external node, its callers are paired with every function in a *different*
//! repository whose simple name equals, contains, or is contained by the
//! external's simple name. Each pair gets a `cross_repo_call` edge.
//!
//! Substring matching links unrelated functions that share short names. The
//! edges carry `Confidence::Low` so callers can filter them.

use petgraph::graph::NodeIndex;
use tracing::{debug, info};

use super::DependencyGraph;
use super::types::{CrossRepoStats, NodeKind, Relation};
use crate::types::simple_name;

/// Add `cross_repo_call` edges from callers of external nodes to matching
/// functions in other repositories.
pub fn link_cross_repository(graph: &mut DependencyGraph) -> CrossRepoStats {
    let functions: Vec<(NodeIndex, &str, &str)> = graph
        .nodes()
        .filter(|(_, node)| node.kind() == NodeKind::Function)
        .filter_map(|(idx, node)| {
            let repo = node.repository()?;
            Some((idx, repo.as_str(), node.simple_name()))
        })
        .filter(|(_, _, name)| !name.is_empty())
        .collect();

    let mut stats = CrossRepoStats::default();
    let mut links: Vec<(NodeIndex, NodeIndex)> = Vec::new();

    for (ext_idx, ext) in graph.nodes() {
        if ext.kind() != NodeKind::External {
            continue;
        }
        stats.externals_examined += 1;
        let ext_simple = simple_name(ext.display_name());
        if ext_simple.is_empty() {
            continue;
        }

        for (caller_idx, _) in graph.predecessors(ext_idx, Some(Relation::Calls)) {
            let Some(caller_repo) = graph.node_at(caller_idx).and_then(|n| n.repository()) else {
                continue;
            };
            for &(fn_idx, fn_repo, fn_simple) in &functions {
                if fn_repo == caller_repo.as_str() {
                    continue;
                }
                if names_match(ext_simple, fn_simple) {
                    links.push((caller_idx, fn_idx));
                }
            }
        }
    }

    for (caller, target) in links {
        if graph.add_edge(caller, target, Relation::CrossRepoCall) {
            stats.edges_added += 1;
            debug!(
                caller = %graph.node_at(caller).map(|n| n.id().to_string()).unwrap_or_default(),
                target = %graph.node_at(target).map(|n| n.id().to_string()).unwrap_or_default(),
                "added candidate cross-repository call"
            );
        }
    }

    info!(
        externals_examined = stats.externals_examined,
        edges_added = stats.edges_added,
        "linked repositories"
    );
    stats
}

/// Permissive name match: equal, or either contains the other.
fn names_match(external: &str, function: &str) -> bool {
    external == function || external.contains(function) || function.contains(external)
}
