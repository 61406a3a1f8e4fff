//! The dependency graph: a typed node arena with keyed lookup.
//!
//! ## Module Structure
//!
//! - `types` - Nodes, node identities, relations, build counters
//! - `index` - Symbol lookup tables used during call resolution
//! - `resolve` - Ordered call resolution strategies
//! - `builder` - Three-phase graph construction for one repository
//! - `cross_repo` - Candidate links between repositories
//!
//! ## Design
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Storage | `petgraph::DiGraph` | Integer-indexed arena, stable insertion order |
//! | Lookup | `HashMap<NodeId, NodeIndex>` | O(1) identity lookup |
//! | Edge uniqueness | Per `(source, target, relation)` | Parallel edges of different relations allowed |
//! | Neighbor order | Sorted by edge index | Traversal follows insertion order, not petgraph's list order |

pub mod builder;
pub mod cross_repo;
pub mod index;
pub mod resolve;
pub mod types;

pub use builder::build_graph;
pub use cross_repo::link_cross_repository;
pub use index::SymbolIndex;
pub use resolve::{Resolution, ResolutionStrategy};
pub use types::{
    BuildStats, Confidence, CrossRepoStats, GraphDelta, Node, NodeId, NodeKind, Relation,
};

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RepositoryId;

/// Directed dependency graph over files, functions, classes, and externals.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<Node, Relation>,
    index: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns `true` if a node with this identity exists.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a node by identity.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Arena index of a node.
    #[must_use]
    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Node stored at an arena index.
    #[must_use]
    pub fn node_at(&self, idx: NodeIndex) -> Option<&Node> {
        self.graph.node_weight(idx)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.graph
            .node_indices()
            .map(move |idx| (idx, &self.graph[idx]))
    }

    /// All edges in insertion order as `(source, target, relation)`.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node, Relation)> {
        self.graph.edge_references().map(move |edge| {
            (
                &self.graph[edge.source()],
                &self.graph[edge.target()],
                *edge.weight(),
            )
        })
    }

    /// Returns `true` if an edge with this relation exists between the two nodes.
    #[must_use]
    pub fn has_edge(&self, source: &NodeId, target: &NodeId, relation: Relation) -> bool {
        match (self.index_of(source), self.index_of(target)) {
            (Some(s), Some(t)) => self.has_edge_at(s, t, relation),
            _ => false,
        }
    }

    fn has_edge_at(&self, source: NodeIndex, target: NodeIndex, relation: Relation) -> bool {
        self.graph
            .edges_connecting(source, target)
            .any(|edge| *edge.weight() == relation)
    }

    /// Insert a node unless one with the same identity exists.
    ///
    /// Returns the node's index and whether it was newly created.
    pub fn ensure_node(&mut self, node: Node) -> (NodeIndex, bool) {
        let id = node.id();
        if let Some(&idx) = self.index.get(&id) {
            return (idx, false);
        }
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        (idx, true)
    }

    /// Add an edge unless the same `(source, target, relation)` edge exists.
    ///
    /// Returns `true` if the edge was created.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, relation: Relation) -> bool {
        if self.has_edge_at(source, target, relation) {
            return false;
        }
        self.graph.add_edge(source, target, relation);
        true
    }

    /// Incoming neighbors in edge insertion order, optionally filtered by relation.
    #[must_use]
    pub fn predecessors(
        &self,
        idx: NodeIndex,
        relation: Option<Relation>,
    ) -> Vec<(NodeIndex, Relation)> {
        self.neighbors(idx, Direction::Incoming, relation)
    }

    /// Outgoing neighbors in edge insertion order, optionally filtered by relation.
    #[must_use]
    pub fn successors(
        &self,
        idx: NodeIndex,
        relation: Option<Relation>,
    ) -> Vec<(NodeIndex, Relation)> {
        self.neighbors(idx, Direction::Outgoing, relation)
    }

    fn neighbors(
        &self,
        idx: NodeIndex,
        direction: Direction,
        relation: Option<Relation>,
    ) -> Vec<(NodeIndex, Relation)> {
        let mut edges: Vec<(EdgeIndex, NodeIndex, Relation)> = self
            .graph
            .edges_directed(idx, direction)
            .filter(|edge| relation.is_none_or(|r| *edge.weight() == r))
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (edge.id(), other, *edge.weight())
            })
            .collect();
        // petgraph walks adjacency lists newest-first
        edges.sort_by_key(|(edge_idx, _, _)| *edge_idx);
        edges
            .into_iter()
            .map(|(_, other, rel)| (other, rel))
            .collect()
    }

    /// Remove every node owned by `repository`, then any external node left without edges.
    ///
    /// Remaining nodes keep their relative insertion order. Returns the number of nodes removed.
    pub fn remove_repository(&mut self, repository: &RepositoryId) -> usize {
        let before = self.graph.node_count();

        let without_repo = self.graph.filter_map(
            |_, node| (!node.in_repository(repository)).then(|| node.clone()),
            |_, relation| Some(*relation),
        );
        let pruned = without_repo.filter_map(
            |idx, node| {
                let orphaned = node.kind() == NodeKind::External
                    && without_repo.neighbors_undirected(idx).next().is_none();
                (!orphaned).then(|| node.clone())
            },
            |_, relation| Some(*relation),
        );

        self.graph = pruned;
        self.rebuild_index();
        before - self.graph.node_count()
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx].id(), idx))
            .collect();
    }

    /// Serialize to the externally visible node/edge list.
    #[must_use]
    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .graph
            .node_indices()
            .map(|idx| SnapshotNode::from_node(&self.graph[idx]))
            .collect();
        let edges = self
            .graph
            .edge_references()
            .map(|edge| SnapshotEdge {
                source: self.graph[edge.source()].id(),
                target: self.graph[edge.target()].id(),
                relation: *edge.weight(),
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }

    /// Rebuild a graph from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSnapshot` if a node's attributes do not match its id,
    /// or an edge references an unknown node.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Result<Self> {
        let mut graph = Self::new();
        for entry in &snapshot.nodes {
            let node = entry.to_node()?;
            graph.ensure_node(node);
        }
        for edge in &snapshot.edges {
            let source = graph.index_of(&edge.source).ok_or_else(|| {
                Error::InvalidSnapshot(format!("edge source not in snapshot: {}", edge.source))
            })?;
            let target = graph.index_of(&edge.target).ok_or_else(|| {
                Error::InvalidSnapshot(format!("edge target not in snapshot: {}", edge.target))
            })?;
            graph.add_edge(source, target, edge.relation);
        }
        Ok(graph)
    }
}

/// Serialized graph: node list plus edge list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Nodes in insertion order
    pub nodes: Vec<SnapshotNode>,
    /// Edges in insertion order
    pub edges: Vec<SnapshotEdge>,
}

/// One node of a snapshot: `{id, kind, attributes}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Textual node id
    pub id: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// Display attributes
    pub attributes: NodeAttributes,
}

/// Attributes carried by a snapshot node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    /// Display name (path for files)
    pub name: String,
    /// Owning file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Owning repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryId>,
}

impl SnapshotNode {
    fn from_node(node: &Node) -> Self {
        Self {
            id: node.id(),
            kind: node.kind(),
            attributes: NodeAttributes {
                name: node.display_name().to_string(),
                file: node.file_path().map(str::to_string),
                repository: node.repository().cloned(),
            },
        }
    }

    fn to_node(&self) -> Result<Node> {
        let attrs = &self.attributes;
        let scoped = |what: &str| -> Result<(RepositoryId, String)> {
            match (&attrs.repository, &attrs.file) {
                (Some(repo), Some(file)) => Ok((repo.clone(), file.clone())),
                _ => Err(Error::InvalidSnapshot(format!(
                    "{what} node {} lacks repository or file",
                    self.id
                ))),
            }
        };

        let node = match self.kind {
            NodeKind::File => {
                let (repository, path) = scoped("file")?;
                Node::File { repository, path }
            }
            NodeKind::Function => {
                let (repository, file) = scoped("function")?;
                Node::Function {
                    repository,
                    file,
                    name: attrs.name.clone(),
                }
            }
            NodeKind::Class => {
                let (repository, file) = scoped("class")?;
                Node::Class {
                    repository,
                    file,
                    name: attrs.name.clone(),
                }
            }
            NodeKind::External => Node::External {
                name: attrs.name.clone(),
            },
        };

        if node.id() != self.id {
            return Err(Error::InvalidSnapshot(format!(
                "attributes of {} describe {}",
                self.id,
                node.id()
            )));
        }
        Ok(node)
    }
}

/// One edge of a snapshot: `{source, target, relation}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    /// Source node id
    pub source: NodeId,
    /// Target node id
    pub target: NodeId,
    /// Edge relation
    pub relation: Relation,
}
