//! Domain types shared across the pipeline.
//!
//! - **Inputs**: `FactSheet`, `CallRecord`, `FileChange` (produced by extractors and diff collaborators)
//! - **Identity**: `RepositoryId`, `Language`
//! - **Scoring**: `Severity`
//!
//! ## Design Decisions
//!
//! | Decision | Choice | Rationale |
//! |----------|--------|-----------|
//! | Imports | `BTreeSet` | Set semantics with stable iteration order |
//! | Severity | Validated newtype | Out-of-range scores cannot be constructed |
//! | Call callee | Raw string | Resolution happens later, against the whole repository |

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Strongly-typed ID wrappers
// ============================================================================

/// Identifier of a repository contributing facts to the graph.
///
/// Repository ids are embedded in node ids (`{repo}::fn::{path}::{name}`) and
/// snapshot keys (`{repo}@{commit},...`), so the text must stay unambiguous
/// in both. See [`RepositoryId::new`] for the rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId(String);

/// Reserved: `external::` prefixes ids of global external nodes.
const RESERVED_REPOSITORY: &str = "external";

/// Substrings that would split a node id or snapshot key entry.
const FORBIDDEN_IN_REPOSITORY: &[&str] = &["::", ",", "@"];

impl RepositoryId {
    /// Create a repository identifier.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidId` if `id` is empty, equals `external`,
    /// contains `::`, `,` or `@`, or ends with `:` (which would merge with the
    /// following `::` separator).
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidId("repository id is empty".to_string()));
        }
        if id == RESERVED_REPOSITORY {
            return Err(Error::InvalidId(format!(
                "repository id '{id}' is reserved for external nodes"
            )));
        }
        if let Some(bad) = FORBIDDEN_IN_REPOSITORY.iter().find(|bad| id.contains(**bad)) {
            return Err(Error::InvalidId(format!(
                "repository id '{id}' contains '{bad}'"
            )));
        }
        if id.ends_with(':') {
            return Err(Error::InvalidId(format!("repository id '{id}' ends with ':'")));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RepositoryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RepositoryId> for String {
    fn from(id: RepositoryId) -> Self {
        id.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Languages with a grammar-backed fact extractor.
///
/// Files in any other language still get a file node, with no symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python source files (`.py`, `.pyi`)
    Python,
    /// Rust source files (`.rs`)
    Rust,
    /// C# source files (`.cs`)
    CSharp,
}

impl Language {
    /// File extensions handled by this language.
    #[must_use]
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "pyi"],
            Self::Rust => &["rs"],
            Self::CSharp => &["cs"],
        }
    }

    /// Detect language from file extension.
    ///
    /// # Returns
    ///
    /// `None` if the extension is not recognized.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            "cs" => Some(Self::CSharp),
            _ => None,
        }
    }

    /// Detect language from a file path's extension.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Rust => "rust",
            Self::CSharp => "csharp",
        }
    }
}

/// Status of a changed file as reported by version control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// File was created
    Added,
    /// File content changed
    #[default]
    Modified,
    /// File was deleted
    Removed,
    /// File moved to a new path
    Renamed,
}

impl ChangeStatus {
    /// Stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Renamed => "renamed",
        }
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Impact or finding severity in the closed range `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    /// Lowest severity.
    pub const MIN: Self = Self(1);
    /// Cascading and file-level fallback impacts.
    pub const CASCADING: Self = Self(2);
    /// Indirect (two-hop) impacts.
    pub const INDIRECT: Self = Self(3);
    /// Direct (one-hop) impacts.
    pub const DIRECT: Self = Self(4);
    /// Highest severity.
    pub const MAX: Self = Self(5);

    /// Create a severity, rejecting values outside `1..=5`.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Create a severity, clamping into `1..=5`.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        // Clamped into 1..=5 first, so the cast is lossless
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(value.clamp(1, 5) as u8)
    }

    /// The raw score.
    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("severity {value} outside 1..=5"))
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

// ============================================================================
// Extraction output
// ============================================================================

/// A call site: the enclosing function and the raw callee expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallRecord {
    /// Name of the calling function, dotted for methods (`Class.method`)
    pub caller: String,
    /// Callee as written, normalized to `a.b.c` with arguments dropped
    pub callee: String,
}

impl CallRecord {
    /// Create a call record.
    #[must_use]
    pub fn new(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
        }
    }
}

/// Facts extracted from one source file.
///
/// Produced by an extractor, consumed (and discarded) by the graph builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactSheet {
    /// Path of the file, unique within its repository
    pub file_path: String,
    /// Language the facts were extracted with, if any
    pub language: Option<Language>,
    /// Defined functions in source order (methods as `Class.method`)
    pub functions: Vec<String>,
    /// Defined classes (or structs, enums, traits) in source order
    pub classes: Vec<String>,
    /// Import references as written
    pub imports: BTreeSet<String>,
    /// Call sites in source order
    pub calls: Vec<CallRecord>,
    /// ORM column fields (`name = Column(...)` / `name = Field(...)`)
    pub orm_fields: Vec<String>,
}

impl FactSheet {
    /// Create an empty fact sheet for a file.
    #[must_use]
    pub fn new(file_path: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let language = Language::from_path(&file_path);
        Self {
            file_path,
            language,
            ..Self::default()
        }
    }

    /// Add a defined function.
    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.functions.push(name.into());
        self
    }

    /// Add a defined class.
    #[must_use]
    pub fn with_class(mut self, name: impl Into<String>) -> Self {
        self.classes.push(name.into());
        self
    }

    /// Add an import reference.
    #[must_use]
    pub fn with_import(mut self, import: impl Into<String>) -> Self {
        self.imports.insert(import.into());
        self
    }

    /// Add a call record.
    #[must_use]
    pub fn with_call(mut self, caller: impl Into<String>, callee: impl Into<String>) -> Self {
        self.calls.push(CallRecord::new(caller, callee));
        self
    }

    /// Returns `true` if no facts were extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.classes.is_empty()
            && self.imports.is_empty()
            && self.calls.is_empty()
            && self.orm_fields.is_empty()
    }
}

/// A changed file as reported by the version-control collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Path of the changed file, as reported by the diff
    pub file_path: String,
    /// Kind of change
    #[serde(default)]
    pub status: ChangeStatus,
    /// Unified diff hunk text, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

impl FileChange {
    /// A modification without patch text.
    #[must_use]
    pub fn modified(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            status: ChangeStatus::Modified,
            patch: None,
        }
    }

    /// Attach patch text.
    #[must_use]
    pub fn with_patch(mut self, patch: impl Into<String>) -> Self {
        self.patch = Some(patch.into());
        self
    }
}

/// Last component of a dotted name (`Class.method` -> `method`).
#[must_use]
pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
