//! `SQLite` persistence for graph snapshots.
//!
//! A snapshot is stored under a [`SnapshotKey`]: the sorted set of
//! `repository@commit` pairs the graph was built from. Saving under an
//! existing key replaces the previous snapshot.
//!
//! ## Module Structure
//!
//! - `schema` - Database schema (DDL)

mod schema;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::{GraphSnapshot, NodeAttributes, SnapshotEdge, SnapshotNode};
use crate::types::RepositoryId;

use schema::SCHEMA;

/// Identity of a snapshot: the commit each repository was analyzed at.
///
/// Pairs are kept sorted by repository, so the same set always renders to
/// the same text (`api@1a2b,worker@3c4d`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotKey {
    commits: BTreeMap<RepositoryId, String>,
}

impl SnapshotKey {
    /// Create an empty key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the commit for a repository.
    ///
    /// Commits may contain `@` but not `,`, so the rendered key parses back
    /// to the same pairs.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidId`] if `commit` is empty or contains `,`.
    pub fn with(mut self, repository: &RepositoryId, commit: impl Into<String>) -> Result<Self> {
        let commit = commit.into();
        if commit.is_empty() || commit.contains(',') {
            return Err(Error::InvalidId(format!(
                "commit for {repository} must be non-empty and free of ',': {commit:?}"
            )));
        }
        self.commits.insert(repository.clone(), commit);
        Ok(self)
    }

    /// Commit recorded for `repository`.
    #[must_use]
    pub fn commit(&self, repository: &RepositoryId) -> Option<&str> {
        self.commits.get(repository).map(String::as_str)
    }

    /// `(repository, commit)` pairs sorted by repository.
    pub fn entries(&self) -> impl Iterator<Item = (&RepositoryId, &str)> {
        self.commits.iter().map(|(repo, commit)| (repo, commit.as_str()))
    }

    /// Returns `true` if no repository is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (repo, commit)) in self.commits.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{repo}@{commit}")?;
        }
        Ok(())
    }
}

impl FromStr for SnapshotKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut key = Self::new();
        for pair in s.split(',').filter(|pair| !pair.is_empty()) {
            // Repository ids never contain '@', commits may
            let (repo, commit) = pair
                .split_once('@')
                .ok_or_else(|| format!("snapshot key entry missing '@': {pair}"))?;
            let repo: RepositoryId = repo.parse().map_err(|e| format!("{e} in key entry: {pair}"))?;
            key = key
                .with(&repo, commit)
                .map_err(|e| format!("{e} in key entry: {pair}"))?;
        }
        Ok(key)
    }
}

impl TryFrom<String> for SnapshotKey {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SnapshotKey> for String {
    fn from(key: SnapshotKey) -> Self {
        key.to_string()
    }
}

/// Listing entry for a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Snapshot identity
    pub key: SnapshotKey,
    /// Number of stored nodes
    pub node_count: usize,
    /// Number of stored edges
    pub edge_count: usize,
    /// Save time, seconds since the Unix epoch
    pub saved_at: i64,
}

/// `SQLite`-backed snapshot store.
///
/// The connection is wrapped in a `Mutex` so one store can be shared across
/// threads.
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore").finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            Error::Internal(format!(
                "snapshot store mutex poisoned (a thread panicked while holding the lock): {e}"
            ))
        })
    }

    // Seconds fit in i64 for the next few hundred billion years
    #[allow(clippy::cast_possible_wrap)]
    fn now_secs() -> Result<i64> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .map_err(|e| Error::Config(format!("System clock is before Unix epoch: {e}")))
    }

    /// Save `snapshot` under `key`, replacing any previous snapshot.
    ///
    /// Runs in a single transaction: either the whole snapshot is stored or
    /// nothing changes.
    pub fn save(&self, key: &SnapshotKey, snapshot: &GraphSnapshot) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidSnapshot(
                "snapshot key must name at least one repository".to_string(),
            ));
        }
        let key_text = key.to_string();
        let saved_at = Self::now_secs()?;

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM snapshots WHERE key = ?1", [&key_text])?;
        tx.execute(
            "INSERT INTO snapshots (key, node_count, edge_count, saved_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                key_text,
                to_i64(snapshot.nodes.len())?,
                to_i64(snapshot.edges.len())?,
                saved_at
            ],
        )?;
        let snapshot_id = tx.last_insert_rowid();

        {
            let mut insert_node = tx.prepare(
                "INSERT INTO snapshot_nodes (snapshot_id, position, node_id, kind, attributes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, node) in snapshot.nodes.iter().enumerate() {
                insert_node.execute(params![
                    snapshot_id,
                    to_i64(position)?,
                    node.id.to_string(),
                    node.kind.as_str(),
                    serde_json::to_string(&node.attributes)?,
                ])?;
            }

            let mut insert_edge = tx.prepare(
                "INSERT INTO snapshot_edges (snapshot_id, position, source, target, relation)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (position, edge) in snapshot.edges.iter().enumerate() {
                insert_edge.execute(params![
                    snapshot_id,
                    to_i64(position)?,
                    edge.source.to_string(),
                    edge.target.to_string(),
                    edge.relation.as_str(),
                ])?;
            }
        }

        tx.commit()?;
        info!(
            key = %key,
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "saved graph snapshot"
        );
        Ok(())
    }

    /// Load the snapshot stored under `key`, if any.
    pub fn load(&self, key: &SnapshotKey) -> Result<Option<GraphSnapshot>> {
        let conn = self.connection()?;
        let Some(snapshot_id) = conn
            .query_row(
                "SELECT id FROM snapshots WHERE key = ?1",
                [key.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
        else {
            return Ok(None);
        };

        let mut node_stmt = conn.prepare(
            "SELECT node_id, kind, attributes FROM snapshot_nodes
             WHERE snapshot_id = ?1 ORDER BY position",
        )?;
        let rows = node_stmt.query_map([snapshot_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut nodes = Vec::new();
        for row in rows {
            let (id, kind, attributes) = row?;
            nodes.push(SnapshotNode {
                id: id.parse().map_err(Error::InvalidSnapshot)?,
                kind: kind.parse().map_err(Error::InvalidSnapshot)?,
                attributes: serde_json::from_str::<NodeAttributes>(&attributes)?,
            });
        }

        let mut edge_stmt = conn.prepare(
            "SELECT source, target, relation FROM snapshot_edges
             WHERE snapshot_id = ?1 ORDER BY position",
        )?;
        let rows = edge_stmt.query_map([snapshot_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut edges = Vec::new();
        for row in rows {
            let (source, target, relation) = row?;
            edges.push(SnapshotEdge {
                source: source.parse().map_err(Error::InvalidSnapshot)?,
                target: target.parse().map_err(Error::InvalidSnapshot)?,
                relation: relation.parse().map_err(Error::InvalidSnapshot)?,
            });
        }

        debug!(key = %key, nodes = nodes.len(), edges = edges.len(), "loaded graph snapshot");
        Ok(Some(GraphSnapshot { nodes, edges }))
    }

    /// Summaries of all stored snapshots, sorted by key.
    pub fn list(&self) -> Result<Vec<SnapshotSummary>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT key, node_count, edge_count, saved_at FROM snapshots ORDER BY key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (key, node_count, edge_count, saved_at) = row?;
            summaries.push(SnapshotSummary {
                key: key.parse().map_err(Error::InvalidSnapshot)?,
                node_count: to_usize(node_count)?,
                edge_count: to_usize(edge_count)?,
                saved_at,
            });
        }
        Ok(summaries)
    }

    /// Delete the snapshot stored under `key`. Returns `true` if one existed.
    pub fn delete(&self, key: &SnapshotKey) -> Result<bool> {
        let conn = self.connection()?;
        let deleted = conn.execute("DELETE FROM snapshots WHERE key = ?1", [key.to_string()])?;
        if deleted > 0 {
            info!(key = %key, "deleted graph snapshot");
        }
        Ok(deleted > 0)
    }
}

fn to_i64(value: usize) -> Result<i64> {
    i64::try_from(value).map_err(|e| Error::Internal(format!("count overflows i64: {e}")))
}

fn to_usize(value: i64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|e| Error::InvalidSnapshot(format!("negative or oversized count {value}: {e}")))
}
