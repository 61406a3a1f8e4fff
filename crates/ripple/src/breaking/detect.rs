//! Rule-based breaking-change detection.
//!
//! `RuleBasedDetector` scans unified diffs for ORM column fields:
//!
//! | Finding | Rule | Severity |
//! |---------|------|----------|
//! | `type_changed` | Field removed and re-added with a different column type | 4 |
//! | `field_renamed` | Field removed, a similar new field added | 4 |
//! | `field_removed` | Field removed, nothing similar added | 5 |
//!
//! `detect_openapi_drift` compares two OpenAPI documents and reports each
//! difference as `openapi_drift` (severity 4).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::BreakingChangeRecord;
use crate::config::BreakingConfig;
use crate::types::{FileChange, Severity};

/// Finding category for a removed ORM field.
pub const FIELD_REMOVED: &str = "field_removed";
/// Finding category for a renamed ORM field.
pub const FIELD_RENAMED: &str = "field_renamed";
/// Finding category for a changed column type.
pub const TYPE_CHANGED: &str = "type_changed";
/// Finding category for OpenAPI document drift.
pub const OPENAPI_DRIFT: &str = "openapi_drift";

#[allow(clippy::expect_used)] // Literal patterns; covered by tests
static REMOVED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-.*?\b(\w+)\b\s*=\s*(?:Column|Field)\b").expect("valid removed-field regex")
});

#[allow(clippy::expect_used)]
static ADDED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\+.*?\b(\w+)\b\s*=\s*(?:Column|Field)\b").expect("valid added-field regex")
});

#[allow(clippy::expect_used)]
static COLUMN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(String|Integer|Boolean|Float|DateTime|Date|Text|JSON|ARRAY)(?:\(.*?\))?")
        .expect("valid column-type regex")
});

/// Produces breaking-change findings for one changed file.
pub trait BreakingChangeDetector: Send + Sync {
    /// Inspect a change and return findings with raw locations.
    fn detect(&self, change: &FileChange) -> Vec<BreakingChangeRecord>;
}

/// ORM field changes found in a diff, in diff order.
#[derive(Debug, Default)]
struct FieldChanges {
    removed: Vec<(String, String)>,
    added: Vec<(String, String)>,
}

impl FieldChanges {
    fn scan(patch: &str) -> Self {
        let mut changes = Self::default();
        for line in patch.lines() {
            // File headers look like removals/additions but never define fields
            if line.starts_with("---") || line.starts_with("+++") {
                continue;
            }
            if let Some(name) = REMOVED_FIELD.captures(line).and_then(|c| c.get(1)) {
                changes
                    .removed
                    .push((name.as_str().to_string(), column_type(line)));
            } else if let Some(name) = ADDED_FIELD.captures(line).and_then(|c| c.get(1)) {
                changes
                    .added
                    .push((name.as_str().to_string(), column_type(line)));
            }
        }
        changes
    }
}

/// Column type mentioned in a field definition line.
///
/// Falls back to the first comma-separated part of the right-hand side.
fn column_type(line: &str) -> String {
    if let Some(found) = COLUMN_TYPE.find(line) {
        return found.as_str().to_string();
    }
    let definition = line.split_once('=').map_or(line, |(_, rhs)| rhs);
    definition
        .split(',')
        .next()
        .unwrap_or(definition)
        .trim()
        .to_string()
}

/// Detects ORM field removals, renames, and type changes in unified diffs.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedDetector {
    config: BreakingConfig,
}

impl RuleBasedDetector {
    /// Create a detector with the given thresholds.
    #[must_use]
    pub fn new(config: BreakingConfig) -> Self {
        Self { config }
    }

    /// Heuristic rename check between an old and a new field name.
    ///
    /// Names are similar when one contains the other, they share a prefix or
    /// suffix of `affix_len` characters, or their normalized Levenshtein
    /// similarity reaches `rename_similarity`.
    #[must_use]
    pub fn similar_names(&self, old: &str, new: &str) -> bool {
        let old = old.to_lowercase();
        let new = new.to_lowercase();
        if old.contains(&new) || new.contains(&old) {
            return true;
        }

        let affix = self.config.affix_len;
        let old_chars: Vec<char> = old.chars().collect();
        let new_chars: Vec<char> = new.chars().collect();
        if affix > 0 && old_chars.len() >= affix && new_chars.len() >= affix {
            let same_prefix = old_chars[..affix] == new_chars[..affix];
            let same_suffix =
                old_chars[old_chars.len() - affix..] == new_chars[new_chars.len() - affix..];
            if same_prefix || same_suffix {
                return true;
            }
        }

        if old_chars.is_empty() || new_chars.is_empty() {
            return false;
        }
        let distance = levenshtein(&old_chars, &new_chars);
        let longest = old_chars.len().max(new_chars.len());
        // Name lengths are far below 2^52
        #[allow(clippy::cast_precision_loss)]
        let similarity = 1.0 - distance as f64 / longest as f64;
        similarity >= self.config.rename_similarity
    }
}

impl BreakingChangeDetector for RuleBasedDetector {
    fn detect(&self, change: &FileChange) -> Vec<BreakingChangeRecord> {
        let Some(patch) = change.patch.as_deref() else {
            return Vec::new();
        };
        let fields = FieldChanges::scan(patch);
        let removed_names: BTreeSet<&str> =
            fields.removed.iter().map(|(name, _)| name.as_str()).collect();
        let location = change.file_path.as_str();
        let mut findings = Vec::new();

        for (name, old_type) in &fields.removed {
            if let Some((_, new_type)) = fields.added.iter().find(|(added, _)| added == name) {
                if new_type != old_type {
                    findings.push(BreakingChangeRecord::new(
                        TYPE_CHANGED,
                        location,
                        Severity::DIRECT,
                        format!("column type of {name} changed: {old_type} -> {new_type}"),
                    ));
                }
                continue;
            }

            let renamed_to = fields
                .added
                .iter()
                .map(|(added, _)| added.as_str())
                .find(|added| !removed_names.contains(added) && self.similar_names(name, added));
            match renamed_to {
                Some(new_name) => findings.push(BreakingChangeRecord::new(
                    FIELD_RENAMED,
                    location,
                    Severity::DIRECT,
                    format!("[{name} -> {new_name}] field renamed; readers of {name} break"),
                )),
                None => findings.push(BreakingChangeRecord::new(
                    FIELD_REMOVED,
                    location,
                    Severity::MAX,
                    format!("[{name} -> removed] field removed"),
                )),
            }
        }

        if !findings.is_empty() {
            debug!(
                file = %change.file_path,
                findings = findings.len(),
                "detected field-level breaking changes"
            );
        }
        findings
    }
}

/// Edit distance between two character sequences.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut previous: Vec<usize> = (0..=short.len()).collect();
    for (i, &lc) in long.iter().enumerate() {
        let mut current = Vec::with_capacity(short.len() + 1);
        current.push(i + 1);
        for (j, &sc) in short.iter().enumerate() {
            let insertion = previous[j + 1] + 1;
            let deletion = current[j] + 1;
            let substitution = previous[j] + usize::from(lc != sc);
            current.push(insertion.min(deletion).min(substitution));
        }
        previous = current;
    }
    previous[short.len()]
}

/// Compare two OpenAPI documents and report each difference.
///
/// `location` names the current document (usually its path) and becomes the
/// raw location of every finding.
#[must_use]
pub fn detect_openapi_drift(
    previous: &Value,
    current: &Value,
    location: &str,
) -> Vec<BreakingChangeRecord> {
    let mut diffs = Vec::new();
    deep_diff(previous, current, "", &mut diffs);
    diffs
        .into_iter()
        .map(|diff| BreakingChangeRecord::new(OPENAPI_DRIFT, location, Severity::DIRECT, diff))
        .collect()
}

fn deep_diff(old: &Value, new: &Value, path: &str, out: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let sub = format!("{path}/{key}");
                match (a.get(key), b.get(key)) {
                    (None, Some(_)) => out.push(format!("Added: {sub}")),
                    (Some(_), None) => out.push(format!("Removed: {sub}")),
                    (Some(x), Some(y)) => deep_diff(x, y, &sub, out),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if a != b {
                out.push(format!("List changed at {path}"));
            }
        }
        _ => {
            if old != new {
                out.push(format!("Value changed at {path}: {old} -> {new}"));
            }
        }
    }
}
