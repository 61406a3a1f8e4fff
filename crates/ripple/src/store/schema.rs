//! Database schema for persisted graph snapshots.

/// Database schema definition.
pub(crate) const SCHEMA: &str = r"
-- One row per saved snapshot, keyed by its repository@commit set
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY,
    key TEXT NOT NULL UNIQUE,
    node_count INTEGER NOT NULL,
    edge_count INTEGER NOT NULL,
    saved_at INTEGER NOT NULL
);

-- Nodes in insertion order; attributes are JSON text
CREATE TABLE IF NOT EXISTS snapshot_nodes (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    node_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    attributes TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, position)
);

-- Edges in insertion order
CREATE TABLE IF NOT EXISTS snapshot_edges (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    relation TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, position)
);
";
