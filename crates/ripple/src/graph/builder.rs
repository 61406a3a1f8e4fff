//! Three-phase graph construction for one repository.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         build_graph                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Phase 0: drop the repository's previous contribution        │
//! │  Phase 1: file/function/class nodes, defines + imports edges │
//! │  Phase 2: symbol index over this build's fact sheets         │
//! │  Phase 3: call resolution, calls edges                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The builder never fails. Malformed facts (unknown caller, empty callee)
//! are skipped and counted in `BuildStats`.

use petgraph::graph::NodeIndex;
use tracing::{debug, info};

use super::index::SymbolIndex;
use super::resolve::{ResolutionStrategy, resolve_callee};
use super::types::{BuildStats, GraphDelta, Node, NodeId, Relation};
use super::DependencyGraph;
use crate::types::{FactSheet, RepositoryId};

/// Merge one repository's fact sheets into `graph`.
///
/// Any nodes the repository contributed in an earlier build are removed
/// first, so repeated builds with the same input produce the same graph.
pub fn build_graph(
    graph: &mut DependencyGraph,
    repository: &RepositoryId,
    sheets: &[FactSheet],
) -> GraphDelta {
    let nodes_removed = graph.remove_repository(repository);
    if nodes_removed > 0 {
        debug!(
            repository = %repository,
            nodes_removed,
            "replaced previous repository contribution"
        );
    }

    let mut stats = BuildStats {
        files: sheets.len(),
        ..BuildStats::default()
    };

    add_definitions(graph, repository, sheets, &mut stats);
    let index = build_index(graph, repository, sheets);
    stats.name_collisions = index.collisions();
    add_calls(graph, repository, sheets, &index, &mut stats);

    info!(
        repository = %repository,
        files = stats.files,
        nodes_added = stats.nodes_added,
        edges_added = stats.edges_added,
        calls_processed = stats.calls_processed,
        calls_resolved = stats.calls_resolved,
        resolution_rate = stats.resolution_rate(),
        "built repository graph"
    );
    debug!(
        exact = stats.exact_matches,
        simple_name = stats.simple_name_matches,
        external = stats.external_calls,
        skipped_missing_caller = stats.skipped_missing_caller,
        skipped_empty_callee = stats.skipped_empty_callee,
        name_collisions = stats.name_collisions,
        "call resolution breakdown"
    );

    GraphDelta {
        repository: repository.clone(),
        nodes_removed,
        stats,
    }
}

/// Phase 1: file, function, and class nodes with their `defines` and `imports` edges.
fn add_definitions(
    graph: &mut DependencyGraph,
    repository: &RepositoryId,
    sheets: &[FactSheet],
    stats: &mut BuildStats,
) {
    for sheet in sheets {
        let file = insert(
            graph,
            stats,
            Node::File {
                repository: repository.clone(),
                path: sheet.file_path.clone(),
            },
        );

        let functions = sheet.functions.iter().map(|name| Node::Function {
            repository: repository.clone(),
            file: sheet.file_path.clone(),
            name: name.clone(),
        });
        let classes = sheet.classes.iter().map(|name| Node::Class {
            repository: repository.clone(),
            file: sheet.file_path.clone(),
            name: name.clone(),
        });
        for symbol in functions.chain(classes) {
            let symbol = insert(graph, stats, symbol);
            connect(graph, stats, file, symbol, Relation::Defines);
        }

        for import in &sheet.imports {
            let external = insert(
                graph,
                stats,
                Node::External {
                    name: import.clone(),
                },
            );
            connect(graph, stats, file, external, Relation::Imports);
        }
    }
}

/// Phase 2: lookup tables over this build's symbols.
fn build_index(
    graph: &DependencyGraph,
    repository: &RepositoryId,
    sheets: &[FactSheet],
) -> SymbolIndex {
    let mut index = SymbolIndex::new();
    for sheet in sheets {
        let path = sheet.file_path.as_str();
        for name in &sheet.functions {
            if let Some(node) = graph.index_of(&NodeId::function(repository, path, name.as_str())) {
                index.insert_function(name, path, node);
            }
        }
        for name in &sheet.classes {
            if let Some(node) = graph.index_of(&NodeId::class(repository, path, name.as_str())) {
                index.insert_class(name, path, node);
            }
        }
    }
    index
}

/// Phase 3: resolve call records into `calls` edges.
fn add_calls(
    graph: &mut DependencyGraph,
    repository: &RepositoryId,
    sheets: &[FactSheet],
    index: &SymbolIndex,
    stats: &mut BuildStats,
) {
    for sheet in sheets {
        let path = sheet.file_path.as_str();
        for call in &sheet.calls {
            let caller_id = NodeId::function(repository, path, call.caller.as_str());
            let Some(caller) = graph.index_of(&caller_id) else {
                stats.skipped_missing_caller += 1;
                continue;
            };
            let callee = call.callee.trim();
            if callee.is_empty() {
                stats.skipped_empty_callee += 1;
                continue;
            }
            stats.calls_processed += 1;

            let resolution = resolve_callee(index, callee, path);
            let target = match (resolution.target, resolution.strategy) {
                (Some(target), strategy) => {
                    stats.calls_resolved += 1;
                    if strategy == ResolutionStrategy::ExactMatch {
                        stats.exact_matches += 1;
                    } else {
                        stats.simple_name_matches += 1;
                    }
                    target
                }
                (None, _) => {
                    stats.external_calls += 1;
                    insert(
                        graph,
                        stats,
                        Node::External {
                            name: callee.to_string(),
                        },
                    )
                }
            };
            connect(graph, stats, caller, target, Relation::Calls);
        }
    }
}

fn insert(
    graph: &mut DependencyGraph,
    stats: &mut BuildStats,
    node: Node,
) -> NodeIndex {
    let (idx, created) = graph.ensure_node(node);
    if created {
        stats.nodes_added += 1;
    }
    idx
}

fn connect(
    graph: &mut DependencyGraph,
    stats: &mut BuildStats,
    source: NodeIndex,
    target: NodeIndex,
    relation: Relation,
) {
    if graph.add_edge(source, target, relation) {
        stats.edges_added += 1;
    }
}
