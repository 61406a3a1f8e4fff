//! Typed nodes, node identities, and edge relations for the dependency graph.
//!
//! Node identity is a composite key rendered in a stable textual form:
//!
//! | Kind | Text form |
//! |------|-----------|
//! | File | `{repo}::file::{path}` |
//! | Function | `{repo}::fn::{path}::{name}` |
//! | Class | `{repo}::class::{path}::{name}` |
//! | External | `external::{name}` |
//!
//! External nodes are global: two repositories calling the same unresolved
//! name share one external node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{RepositoryId, simple_name};

/// Kind of graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A source file
    File,
    /// A function or method
    Function,
    /// A class, struct, enum, trait, or interface
    Class,
    /// An unresolved call target or import
    External,
}

impl NodeKind {
    /// Stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "function",
            Self::Class => "class",
            Self::External => "external",
        }
    }

    /// Segment used in the textual node id.
    fn id_segment(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Function => "fn",
            Self::Class => "class",
            Self::External => "external",
        }
    }

    /// Returns `true` for kinds that represent code inside a repository.
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(self, Self::File | Self::Function | Self::Class)
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "function" => Ok(Self::Function),
            "class" => Ok(Self::Class),
            "external" => Ok(Self::External),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

/// Composite node identity: `{repository?, kind, file?, symbol?}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    repository: Option<RepositoryId>,
    kind: NodeKind,
    file: Option<String>,
    symbol: Option<String>,
}

impl NodeId {
    /// Identity of a file node.
    #[must_use]
    pub fn file(repository: &RepositoryId, path: impl Into<String>) -> Self {
        Self {
            repository: Some(repository.clone()),
            kind: NodeKind::File,
            file: Some(path.into()),
            symbol: None,
        }
    }

    /// Identity of a function node.
    #[must_use]
    pub fn function(
        repository: &RepositoryId,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            repository: Some(repository.clone()),
            kind: NodeKind::Function,
            file: Some(path.into()),
            symbol: Some(name.into()),
        }
    }

    /// Identity of a class node.
    #[must_use]
    pub fn class(
        repository: &RepositoryId,
        path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            repository: Some(repository.clone()),
            kind: NodeKind::Class,
            file: Some(path.into()),
            symbol: Some(name.into()),
        }
    }

    /// Identity of an external node.
    #[must_use]
    pub fn external(name: impl Into<String>) -> Self {
        Self {
            repository: None,
            kind: NodeKind::External,
            file: None,
            symbol: Some(name.into()),
        }
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Owning repository (`None` for external nodes).
    #[must_use]
    pub fn repository(&self) -> Option<&RepositoryId> {
        self.repository.as_ref()
    }

    /// Owning file path (`None` for external nodes).
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Symbol name (`None` for file nodes).
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segment = self.kind.id_segment();
        match (&self.repository, &self.file, &self.symbol) {
            (Some(repo), Some(file), Some(symbol)) => {
                write!(f, "{repo}::{segment}::{file}::{symbol}")
            }
            (Some(repo), Some(file), None) => write!(f, "{repo}::{segment}::{file}"),
            (_, _, Some(symbol)) => write!(f, "{segment}::{symbol}"),
            _ => write!(f, "{segment}::"),
        }
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("external::") {
            return Ok(Self::external(name));
        }

        let (repo, rest) = s
            .split_once("::")
            .ok_or_else(|| format!("malformed node id: {s}"))?;
        let repository: RepositoryId = repo.parse().map_err(|e| format!("{e} in node id: {s}"))?;

        if let Some(path) = rest.strip_prefix("file::") {
            return Ok(Self::file(&repository, path));
        }

        let (kind, rest) = if let Some(rest) = rest.strip_prefix("fn::") {
            (NodeKind::Function, rest)
        } else if let Some(rest) = rest.strip_prefix("class::") {
            (NodeKind::Class, rest)
        } else {
            return Err(format!("unknown node kind in id: {s}"));
        };

        let (path, name) = rest
            .rsplit_once("::")
            .ok_or_else(|| format!("node id missing symbol name: {s}"))?;
        Ok(match kind {
            NodeKind::Class => Self::class(&repository, path, name),
            _ => Self::function(&repository, path, name),
        })
    }
}

impl TryFrom<String> for NodeId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

/// A graph node: a tagged union with explicit fields per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// A source file
    File {
        /// Owning repository
        repository: RepositoryId,
        /// File path as supplied by the fact sheet
        path: String,
    },
    /// A function or method defined in a file
    Function {
        /// Owning repository
        repository: RepositoryId,
        /// Defining file
        file: String,
        /// Full name, dotted for methods
        name: String,
    },
    /// A class-like type defined in a file
    Class {
        /// Owning repository
        repository: RepositoryId,
        /// Defining file
        file: String,
        /// Class name
        name: String,
    },
    /// An unresolved reference, shared across repositories
    External {
        /// Raw reference text
        name: String,
    },
}

impl Node {
    /// Compute this node's identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Self::File { repository, path } => NodeId::file(repository, path.as_str()),
            Self::Function {
                repository,
                file,
                name,
            } => NodeId::function(repository, file.as_str(), name.as_str()),
            Self::Class {
                repository,
                file,
                name,
            } => NodeId::class(repository, file.as_str(), name.as_str()),
            Self::External { name } => NodeId::external(name.as_str()),
        }
    }

    /// Node kind.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File { .. } => NodeKind::File,
            Self::Function { .. } => NodeKind::Function,
            Self::Class { .. } => NodeKind::Class,
            Self::External { .. } => NodeKind::External,
        }
    }

    /// Owning repository (`None` for external nodes).
    #[must_use]
    pub fn repository(&self) -> Option<&RepositoryId> {
        match self {
            Self::File { repository, .. }
            | Self::Function { repository, .. }
            | Self::Class { repository, .. } => Some(repository),
            Self::External { .. } => None,
        }
    }

    /// Owning file path (`None` for external nodes).
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Function { file, .. } | Self::Class { file, .. } => Some(file),
            Self::External { .. } => None,
        }
    }

    /// Human-readable name: the path for files, the symbol name otherwise.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::File { path, .. } => path,
            Self::Function { name, .. } | Self::Class { name, .. } | Self::External { name } => {
                name
            }
        }
    }

    /// Last dotted component of the display name.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        match self {
            Self::File { path, .. } => path.rsplit('/').next().unwrap_or(path),
            _ => simple_name(self.display_name()),
        }
    }

    /// Returns `true` if this node belongs to `repository`.
    #[must_use]
    pub fn in_repository(&self, repository: &RepositoryId) -> bool {
        self.repository() == Some(repository)
    }
}

/// How much trust callers should place in an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Heuristic candidate link (substring matching)
    Low,
    /// Derived from definitions or resolved names
    High,
}

/// Typed edge relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// File defines a function or class
    Defines,
    /// File imports an external reference
    Imports,
    /// Function calls a function, class, or external
    Calls,
    /// Candidate call across repositories
    CrossRepoCall,
}

impl Relation {
    /// Stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Defines => "defines",
            Self::Imports => "imports",
            Self::Calls => "calls",
            Self::CrossRepoCall => "cross_repo_call",
        }
    }

    /// Confidence of edges with this relation.
    #[must_use]
    pub fn confidence(&self) -> Confidence {
        match self {
            Self::CrossRepoCall => Confidence::Low,
            Self::Defines | Self::Imports | Self::Calls => Confidence::High,
        }
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defines" => Ok(Self::Defines),
            "imports" => Ok(Self::Imports),
            "calls" => Ok(Self::Calls),
            "cross_repo_call" => Ok(Self::CrossRepoCall),
            other => Err(format!("unknown relation: {other}")),
        }
    }
}

/// Counters reported by one graph build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Fact sheets consumed
    pub files: usize,
    /// Nodes created (existing externals are reused, not counted)
    pub nodes_added: usize,
    /// Edges created (duplicates are not counted)
    pub edges_added: usize,
    /// Call records considered for resolution
    pub calls_processed: usize,
    /// Calls resolved to a function or class node
    pub calls_resolved: usize,
    /// Calls resolved by exact full-name match
    pub exact_matches: usize,
    /// Calls resolved by simple-name match
    pub simple_name_matches: usize,
    /// Calls routed to an external node
    pub external_calls: usize,
    /// Call records whose caller has no function node
    pub skipped_missing_caller: usize,
    /// Call records with an empty callee
    pub skipped_empty_callee: usize,
    /// Full names defined more than once (last definition wins)
    pub name_collisions: usize,
}

impl BuildStats {
    /// Fraction of processed calls that resolved to a node inside the build.
    #[must_use]
    pub fn resolution_rate(&self) -> f64 {
        if self.calls_processed == 0 {
            return 0.0;
        }
        // Counts stay far below 2^52
        #[allow(clippy::cast_precision_loss)]
        let rate = self.calls_resolved as f64 / self.calls_processed as f64;
        rate
    }
}

/// Result of merging one repository's facts into the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDelta {
    /// Repository that was (re)built
    pub repository: RepositoryId,
    /// Nodes removed from a previous build of the same repository
    pub nodes_removed: usize,
    /// Build counters
    pub stats: BuildStats,
}

/// Counters reported by the cross-repository linking pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossRepoStats {
    /// External nodes examined
    pub externals_examined: usize,
    /// Candidate `cross_repo_call` edges added
    pub edges_added: usize,
}
