//! Analysis configuration.
//!
//! Loaded from YAML; every field is optional and falls back to the default.
//!
//! ```yaml
//! impact:
//!   high_risk_patterns: [auth, payment, charge]
//!   fallback_limit: 10
//! breaking:
//!   rename_similarity: 0.6
//!   affix_len: 4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::impact::ImpactConfig;

/// Default minimum normalized Levenshtein similarity for a rename.
pub const DEFAULT_RENAME_SIMILARITY: f64 = 0.6;

/// Default shared prefix/suffix length for a rename.
pub const DEFAULT_AFFIX_LEN: usize = 4;

/// Thresholds for the rule-based breaking-change detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakingConfig {
    /// Minimum similarity in `0.0..=1.0` for a removed and an added field
    /// to count as a rename
    pub rename_similarity: f64,
    /// Shared prefix or suffix length that marks two field names as a rename
    pub affix_len: usize,
}

impl Default for BreakingConfig {
    fn default() -> Self {
        Self {
            rename_similarity: DEFAULT_RENAME_SIMILARITY,
            affix_len: DEFAULT_AFFIX_LEN,
        }
    }
}

/// Top-level configuration for an analysis session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Impact propagation tuning
    pub impact: ImpactConfig,
    /// Breaking-change detector thresholds
    pub breaking: BreakingConfig,
}

impl AnalysisConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Serialize to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Config(format!("YAML error: {e}")))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        let similarity = self.breaking.rename_similarity;
        if !(0.0..=1.0).contains(&similarity) {
            return Err(Error::Config(format!(
                "breaking.rename_similarity must be within 0.0..=1.0, got {similarity}"
            )));
        }
        if self.breaking.affix_len == 0 {
            return Err(Error::Config(
                "breaking.affix_len must be at least 1".to_string(),
            ));
        }
        if self
            .impact
            .high_risk_patterns
            .iter()
            .any(|pattern| pattern.trim().is_empty())
        {
            return Err(Error::Config(
                "impact.high_risk_patterns must not contain empty patterns".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::DEFAULT_FALLBACK_LIMIT;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.impact.fallback_limit, DEFAULT_FALLBACK_LIMIT);
        assert!(config.impact.high_risk_patterns.iter().any(|p| p == "auth"));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AnalysisConfig::from_yaml_str("impact:\n  fallback_limit: 3\n").expect("valid yaml");

        assert_eq!(config.impact.fallback_limit, 3);
        assert_eq!(config.impact.high_risk_patterns, ImpactConfig::default().high_risk_patterns);
        assert_eq!(config.breaking, BreakingConfig::default());
    }

    #[test]
    fn empty_document_is_default() {
        let config = AnalysisConfig::from_yaml_str("{}").expect("valid yaml");

        assert_eq!(config, AnalysisConfig::default());
    }

    #[rstest]
    #[case::similarity_above_one("breaking:\n  rename_similarity: 1.5\n", "rename_similarity")]
    #[case::zero_affix("breaking:\n  affix_len: 0\n", "affix_len")]
    #[case::empty_pattern("impact:\n  high_risk_patterns: [auth, '']\n", "empty patterns")]
    #[case::wrong_type("impact:\n  fallback_limit: many\n", "invalid type")]
    fn rejects_invalid_config(#[case] yaml: &str, #[case] expected: &str) {
        let err = AnalysisConfig::from_yaml_str(yaml).expect_err("invalid config");

        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(expected), "unexpected error: {err}");
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("ripple.yaml");
        let mut config = AnalysisConfig::default();
        config.impact.high_risk_patterns = vec!["ledger".to_string()];
        std::fs::write(&path, config.to_yaml_string().expect("serialize")).expect("write");

        let loaded = AnalysisConfig::load(&path).expect("load");

        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AnalysisConfig::load(Path::new("/nonexistent/ripple.yaml")).expect_err("missing");

        assert!(matches!(err, Error::Io(_)));
    }
}
