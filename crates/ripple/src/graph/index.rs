//! Symbol lookup tables for call resolution.
//!
//! Built in one pass over the fact sheets of a single build:
//!
//! - `by_full_name`: functions and classes by full name. Last writer wins.
//! - `by_simple_name`: functions by last dotted component. All candidates kept,
//!   in insertion order.
//!
//! A per-file table backs the same-file preference for exact matches, so a
//! caller's own definition beats one overwritten in from another file.
//!
//! A full name defined twice silently aliases to the later definition. The
//! overwrite is counted and logged so callers can see when it happened.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use tracing::warn;

use crate::types::simple_name;

/// A symbol node together with its defining file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Arena index of the symbol node
    pub node: NodeIndex,
    /// File that defines the symbol
    pub file: String,
}

/// Name-based lookup over the symbols of one build.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    by_full_name: HashMap<String, IndexEntry>,
    by_file: HashMap<(String, String), NodeIndex>,
    by_simple_name: HashMap<String, Vec<IndexEntry>>,
    collisions: usize,
}

impl SymbolIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under its full and simple names.
    pub fn insert_function(&mut self, name: &str, file: &str, node: NodeIndex) {
        self.insert_full_name(name, file, node);
        self.by_simple_name
            .entry(simple_name(name).to_string())
            .or_default()
            .push(IndexEntry {
                node,
                file: file.to_string(),
            });
    }

    /// Register a class under its full name.
    pub fn insert_class(&mut self, name: &str, file: &str, node: NodeIndex) {
        self.insert_full_name(name, file, node);
    }

    fn insert_full_name(&mut self, name: &str, file: &str, node: NodeIndex) {
        self.by_file
            .insert((file.to_string(), name.to_string()), node);
        let entry = IndexEntry {
            node,
            file: file.to_string(),
        };
        if let Some(previous) = self.by_full_name.insert(name.to_string(), entry) {
            if previous.node != node {
                self.collisions += 1;
                warn!(
                    name,
                    previous_file = %previous.file,
                    file,
                    "full name defined more than once; later definition wins"
                );
            }
        }
    }

    /// Exact full-name lookup.
    #[must_use]
    pub fn by_full_name(&self, name: &str) -> Option<&IndexEntry> {
        self.by_full_name.get(name)
    }

    /// Exact full-name lookup restricted to one file.
    #[must_use]
    pub fn by_full_name_in_file(&self, name: &str, file: &str) -> Option<NodeIndex> {
        self.by_file
            .get(&(file.to_string(), name.to_string()))
            .copied()
    }

    /// All functions sharing a simple name, in insertion order.
    #[must_use]
    pub fn by_simple_name(&self, name: &str) -> &[IndexEntry] {
        self.by_simple_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Simple-name lookup preferring a candidate defined in `file`.
    #[must_use]
    pub fn prefer_same_file(&self, name: &str, file: &str) -> Option<&IndexEntry> {
        let candidates = self.by_simple_name(name);
        candidates
            .iter()
            .find(|entry| entry.file == file)
            .or_else(|| candidates.first())
    }

    /// Number of full-name overwrites seen while building.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Number of distinct full names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_full_name.len()
    }

    /// Returns `true` if nothing was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_full_name.is_empty()
    }
}
