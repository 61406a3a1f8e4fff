//! Call resolution strategies.
//!
//! Strategies are tried in a fixed order and the first hit wins:
//!
//! 1. `ExactMatch` - callee text equals a full function or class name; a
//!    definition in the caller's file beats the last-writer-wins entry
//! 2. `SimpleNameMatch` - last dotted component (or the whole bare name) matches
//!    a function's simple name; a candidate in the caller's file is preferred
//! 3. `External` - nothing matched; the call targets an external node
//!
//! The order favors locality. It is optimistic and over-links common names
//! such as `get` or `save`.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use super::index::SymbolIndex;

/// Strategy that produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Callee equals a full name
    ExactMatch,
    /// Callee's last component equals a function's simple name
    SimpleNameMatch,
    /// No symbol matched
    External,
}

impl ResolutionStrategy {
    /// Strategies in priority order.
    pub const ORDER: [Self; 3] = [Self::ExactMatch, Self::SimpleNameMatch, Self::External];

    /// Stable string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::SimpleNameMatch => "simple_name_match",
            Self::External => "external",
        }
    }
}

/// Outcome of resolving one callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved symbol, `None` when the callee stays external
    pub target: Option<NodeIndex>,
    /// Strategy that decided the outcome
    pub strategy: ResolutionStrategy,
}

impl Resolution {
    const fn external() -> Self {
        Self {
            target: None,
            strategy: ResolutionStrategy::External,
        }
    }
}

/// Resolve a raw callee from a caller defined in `caller_file`.
#[must_use]
pub fn resolve_callee(index: &SymbolIndex, callee: &str, caller_file: &str) -> Resolution {
    for strategy in ResolutionStrategy::ORDER {
        let target = match strategy {
            ResolutionStrategy::ExactMatch => {
                if let Some(node) = index.by_full_name_in_file(callee, caller_file) {
                    return Resolution {
                        target: Some(node),
                        strategy,
                    };
                }
                index.by_full_name(callee)
            }
            ResolutionStrategy::SimpleNameMatch => {
                let lookup = callee.rsplit_once('.').map_or(callee, |(_, last)| last);
                index.prefer_same_file(lookup, caller_file)
            }
            ResolutionStrategy::External => return Resolution::external(),
        };
        if let Some(entry) = target {
            return Resolution {
                target: Some(entry.node),
                strategy,
            };
        }
    }
    Resolution::external()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn index() -> SymbolIndex {
        let mut index = SymbolIndex::new();
        index.insert_function("connect", "db.py", NodeIndex::new(0));
        index.insert_function("g", "b.py", NodeIndex::new(1));
        index.insert_function("g", "a.py", NodeIndex::new(2));
        index.insert_function("User.save", "models.py", NodeIndex::new(3));
        index.insert_class("User", "models.py", NodeIndex::new(4));
        index
    }

    #[rstest]
    #[case::exact_function("connect", "x.py", Some(0), ResolutionStrategy::ExactMatch)]
    #[case::exact_method("User.save", "x.py", Some(3), ResolutionStrategy::ExactMatch)]
    #[case::exact_class("User", "x.py", Some(4), ResolutionStrategy::ExactMatch)]
    #[case::dotted_simple("db.connect", "auth.py", Some(0), ResolutionStrategy::SimpleNameMatch)]
    #[case::attribute_chain("self.repo.save", "x.py", Some(3), ResolutionStrategy::SimpleNameMatch)]
    #[case::same_file_exact("g", "b.py", Some(1), ResolutionStrategy::ExactMatch)]
    #[case::last_writer_exact("g", "x.py", Some(2), ResolutionStrategy::ExactMatch)]
    #[case::unresolved("requests.get", "x.py", None, ResolutionStrategy::External)]
    fn resolves_in_priority_order(
        #[case] callee: &str,
        #[case] caller_file: &str,
        #[case] expected: Option<usize>,
        #[case] strategy: ResolutionStrategy,
    ) {
        let resolution = resolve_callee(&index(), callee, caller_file);
        assert_eq!(resolution.target, expected.map(NodeIndex::new));
        assert_eq!(resolution.strategy, strategy);
    }

    #[test]
    fn simple_name_match_prefers_caller_file() {
        let mut index = SymbolIndex::new();
        index.insert_function("mod_b.g", "b.py", NodeIndex::new(1));
        index.insert_function("mod_a.g", "a.py", NodeIndex::new(2));

        let from_a = resolve_callee(&index, "g", "a.py");
        assert_eq!(from_a.target, Some(NodeIndex::new(2)));
        assert_eq!(from_a.strategy, ResolutionStrategy::SimpleNameMatch);

        let from_c = resolve_callee(&index, "g", "c.py");
        assert_eq!(from_c.target, Some(NodeIndex::new(1)));
    }
}
