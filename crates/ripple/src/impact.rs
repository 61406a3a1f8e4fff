//! Impact propagation from changed nodes.
//!
//! ## Buckets
//!
//! | Bucket | Affected nodes | Severity |
//! |--------|----------------|----------|
//! | Direct | `calls` predecessors of a changed function; any non-`defines` predecessor of a changed class | 4 |
//! | Indirect | `calls` predecessors of each direct impact | 3 |
//! | Cascading | Every function in another repository, when a changed function's name matches a high-risk pattern | 2 |
//! | Fallback (direct) | Symbols defined by changed files, capped, when nothing else was direct | 2 |
//! | Breaking changes | Copied verbatim from the caller | as given |
//!
//! Buckets are independent. Breaking-change severities are summed per location
//! into `location_boosts` for reporting and never folded into other buckets.
//!
//! Traversal follows edge insertion order, so identical graphs and change sets
//! produce identical reports.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::breaking::BreakingChangeRecord;
use crate::graph::{DependencyGraph, Node, NodeId, NodeKind, Relation};
use crate::types::Severity;

/// Patterns that flag a changed function as a likely cross-service boundary.
pub const DEFAULT_HIGH_RISK_PATTERNS: &[&str] = &[
    "get_db",
    "verify",
    "authenticate",
    "authorize",
    "create_user",
    "get_user",
    "update_user",
    "create_transaction",
    "get_balance",
];

/// Default cap on fallback impacts per changed file.
pub const DEFAULT_FALLBACK_LIMIT: usize = 10;

/// Tuning for impact propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Case-insensitive substrings; the first one found in a changed
    /// function's simple name triggers cascading impacts
    pub high_risk_patterns: Vec<String>,
    /// Maximum fallback impacts emitted per changed file
    pub fallback_limit: usize,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            high_risk_patterns: DEFAULT_HIGH_RISK_PATTERNS
                .iter()
                .map(ToString::to_string)
                .collect(),
            fallback_limit: DEFAULT_FALLBACK_LIMIT,
        }
    }
}

impl ImpactConfig {
    /// First configured pattern contained in `name`, compared case-insensitively.
    #[must_use]
    pub fn matching_pattern(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.high_risk_patterns
            .iter()
            .map(String::as_str)
            .find(|pattern| !pattern.is_empty() && name.contains(&pattern.to_lowercase()))
    }
}

/// One affected node and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRecord {
    /// Changed node the impact originates from
    pub source: NodeId,
    /// Node affected by the change
    pub affected: NodeId,
    /// Severity in `1..=5`
    pub severity: Severity,
    /// Human-readable explanation
    pub reason: String,
}

/// Impact buckets for one analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// One-hop impacts (and file-level fallback)
    pub direct: Vec<ImpactRecord>,
    /// Two-hop impacts
    pub indirect: Vec<ImpactRecord>,
    /// Heuristic cross-repository impacts
    pub cascading: Vec<ImpactRecord>,
    /// Breaking-change findings, verbatim
    pub breaking_changes: Vec<BreakingChangeRecord>,
    /// Summed breaking-change severity per location
    pub location_boosts: BTreeMap<String, u32>,
    /// Changed ids that were not present in the graph
    pub unknown_changed: Vec<NodeId>,
}

impl ImpactReport {
    /// Number of impact records across direct, indirect, and cascading buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.direct.len() + self.indirect.len() + self.cascading.len()
    }

    /// Returns `true` if no bucket holds anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.breaking_changes.is_empty()
    }

    /// Highest severity across every bucket, including breaking changes.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.direct
            .iter()
            .chain(&self.indirect)
            .chain(&self.cascading)
            .map(|record| record.severity)
            .chain(self.breaking_changes.iter().map(|record| record.severity))
            .max()
    }

    /// Distinct affected nodes across impact buckets, in report order.
    #[must_use]
    pub fn affected_nodes(&self) -> Vec<&NodeId> {
        let mut seen = HashSet::new();
        self.direct
            .iter()
            .chain(&self.indirect)
            .chain(&self.cascading)
            .map(|record| &record.affected)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

impl fmt::Display for ImpactReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "impact: {} direct, {} indirect, {} cascading, {} breaking",
            self.direct.len(),
            self.indirect.len(),
            self.cascading.len(),
            self.breaking_changes.len()
        )?;
        if let Some(max) = self.max_severity() {
            writeln!(f, "max severity: {max}")?;
        }
        for (label, bucket) in [
            ("direct", &self.direct),
            ("indirect", &self.indirect),
            ("cascading", &self.cascading),
        ] {
            for record in bucket.iter().take(5) {
                writeln!(
                    f,
                    "  [{label} {}] {}: {}",
                    record.severity, record.affected, record.reason
                )?;
            }
        }
        for record in &self.breaking_changes {
            writeln!(
                f,
                "  [breaking {}] {} at {}: {}",
                record.severity, record.change_type, record.location, record.description
            )?;
        }
        Ok(())
    }
}

/// Deduplicating accumulator for one bucket.
#[derive(Default)]
struct Bucket {
    records: Vec<ImpactRecord>,
    seen: HashSet<(NodeId, NodeId)>,
}

impl Bucket {
    fn push(&mut self, source: &NodeId, affected: &Node, severity: Severity, reason: String) {
        let affected = affected.id();
        if self.seen.insert((source.clone(), affected.clone())) {
            self.records.push(ImpactRecord {
                source: source.clone(),
                affected,
                severity,
                reason,
            });
        }
    }
}

/// Compute direct, indirect, and cascading impacts of `changed`.
///
/// Pure with respect to `graph`. Unknown ids are listed in
/// `ImpactReport::unknown_changed` and otherwise ignored.
#[must_use]
pub fn compute_impact(
    graph: &DependencyGraph,
    changed: &[NodeId],
    breaking: &[BreakingChangeRecord],
    config: &ImpactConfig,
) -> ImpactReport {
    let mut report = ImpactReport::default();
    let mut direct = Bucket::default();
    let mut indirect = Bucket::default();
    let mut cascading = Bucket::default();

    let mut resolved: Vec<(NodeIndex, &Node)> = Vec::new();
    let mut seen_changed = HashSet::new();
    for id in changed {
        if !seen_changed.insert(id) {
            continue;
        }
        match graph.index_of(id).zip(graph.node(id)) {
            Some(entry) => resolved.push(entry),
            None => report.unknown_changed.push(id.clone()),
        }
    }

    for &(idx, node) in &resolved {
        let source = node.id();
        let relation = match node.kind() {
            NodeKind::Function => Some(Relation::Calls),
            NodeKind::Class => None,
            NodeKind::File | NodeKind::External => continue,
        };
        let verb = if node.kind() == NodeKind::Function {
            "calls"
        } else {
            "uses"
        };

        for (caller_idx, rel) in graph.predecessors(idx, relation) {
            if rel == Relation::Defines || caller_idx == idx {
                continue;
            }
            let Some(caller) = graph.node_at(caller_idx) else {
                continue;
            };
            direct.push(
                &source,
                caller,
                Severity::DIRECT,
                format!("directly {verb} {}", node.display_name()),
            );

            for (upstream_idx, _) in graph.predecessors(caller_idx, Some(Relation::Calls)) {
                if upstream_idx == caller_idx || upstream_idx == idx {
                    continue;
                }
                let Some(upstream) = graph.node_at(upstream_idx) else {
                    continue;
                };
                indirect.push(
                    &source,
                    upstream,
                    Severity::INDIRECT,
                    format!(
                        "calls {}, which uses {}",
                        caller.display_name(),
                        node.display_name()
                    ),
                );
            }
        }

        if node.kind() == NodeKind::Function {
            add_cascading(graph, node, &source, config, &mut cascading);
        }
    }

    if direct.records.is_empty() {
        for &(idx, node) in &resolved {
            if node.kind() != NodeKind::File {
                continue;
            }
            let source = node.id();
            for (symbol_idx, _) in graph
                .successors(idx, Some(Relation::Defines))
                .into_iter()
                .take(config.fallback_limit)
            {
                let Some(symbol) = graph.node_at(symbol_idx) else {
                    continue;
                };
                direct.push(
                    &source,
                    symbol,
                    Severity::CASCADING,
                    format!(
                        "{} defined in changed file {}",
                        symbol.kind().as_str(),
                        node.display_name()
                    ),
                );
            }
        }
    }

    report.direct = direct.records;
    report.indirect = indirect.records;
    report.cascading = cascading.records;
    report.breaking_changes = breaking.to_vec();
    for record in breaking {
        *report
            .location_boosts
            .entry(record.location.to_string())
            .or_insert(0) += u32::from(record.severity.get());
    }

    debug!(
        changed = changed.len(),
        unknown = report.unknown_changed.len(),
        direct = report.direct.len(),
        indirect = report.indirect.len(),
        cascading = report.cascading.len(),
        breaking = report.breaking_changes.len(),
        "computed impact"
    );
    report
}

fn add_cascading(
    graph: &DependencyGraph,
    changed: &Node,
    source: &NodeId,
    config: &ImpactConfig,
    bucket: &mut Bucket,
) {
    let Some(pattern) = config.matching_pattern(changed.simple_name()) else {
        return;
    };
    let Some(repository) = changed.repository() else {
        return;
    };
    for (_, node) in graph.nodes() {
        if node.kind() != NodeKind::Function || node.in_repository(repository) {
            continue;
        }
        bucket.push(
            source,
            node,
            Severity::CASCADING,
            format!("potential cross-service dependency (pattern: {pattern})"),
        );
    }
}
