//! Matching configuration
//!
//! Every scoring threshold and tolerance window lives here. Values default to
//! the ones observed in production and can be overridden from TOML.
//!
//! ## Configuration Resolution
//!
//! 1. Explicit path (e.g. `--config`), if it exists
//! 2. Override in data dir (~/.local/share/conciliar/config/matching.toml)
//! 3. Embedded defaults (compiled into binary)

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/matching.toml");

/// Thresholds and weights used by scoring, suggestions and the batch matcher
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    /// Minimum score for a lone candidate to be auto-applied
    pub auto_reconcile_threshold: f64,
    /// Minimum score for a candidate to be suggested
    pub min_suggestion_score: f64,
    pub max_suggestions: usize,
    /// Amount difference (percent) beyond which amount scores zero
    pub amount_tolerance_pct: f64,
    pub date_near_days: i64,
    pub date_far_days: i64,
    pub weights: ScoreWeights,
    /// Text is truncated to this many characters before comparison
    pub max_compare_chars: usize,
    /// Edit distance only runs when both inputs are at most this long
    pub max_edit_distance_chars: usize,
    /// Document numbers shorter than this never count as contained
    pub min_reference_len: usize,
    /// Fuzzy window applied to new statements
    pub default_amount_tolerance_pct: f64,
    pub default_date_tolerance_days: i64,
}

/// Points awarded by each scoring criterion
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreWeights {
    pub amount: f64,
    pub date: f64,
    pub date_near: f64,
    pub date_far: f64,
    pub reference: f64,
    pub name: f64,
    pub pattern: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            amount: 40.0,
            date: 25.0,
            date_near: 15.0,
            date_far: 5.0,
            reference: 25.0,
            name: 10.0,
            pattern: 10.0,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            auto_reconcile_threshold: 95.0,
            min_suggestion_score: 50.0,
            max_suggestions: 5,
            amount_tolerance_pct: 10.0,
            date_near_days: 3,
            date_far_days: 7,
            weights: ScoreWeights::default(),
            max_compare_chars: 256,
            max_edit_distance_chars: 64,
            min_reference_len: 3,
            default_amount_tolerance_pct: 1.0,
            default_date_tolerance_days: 3,
        }
    }
}

impl MatchingConfig {
    /// Load using the standard resolution order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let content = match explicit {
            Some(path) if path.exists() => read(path)?,
            Some(path) => {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    debug!(path = %path.display(), "Using matching config override");
                    read(&path)?
                }
                _ => DEFAULT_CONFIG.to_string(),
            },
        };

        Self::from_toml(&content)
    }

    /// Parse config from TOML content, filling gaps with defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(t) = raw.thresholds {
            if let Some(v) = t.auto_reconcile {
                config.auto_reconcile_threshold = v;
            }
            if let Some(v) = t.min_suggestion {
                config.min_suggestion_score = v;
            }
            if let Some(v) = t.max_suggestions {
                config.max_suggestions = v;
            }
        }

        if let Some(a) = raw.amount {
            if let Some(v) = a.tolerance_pct {
                config.amount_tolerance_pct = v;
            }
        }

        if let Some(d) = raw.date {
            if let Some(v) = d.near_days {
                config.date_near_days = v;
            }
            if let Some(v) = d.far_days {
                config.date_far_days = v;
            }
        }

        if let Some(w) = raw.weights {
            let weights = &mut config.weights;
            weights.amount = w.amount.unwrap_or(weights.amount);
            weights.date = w.date.unwrap_or(weights.date);
            weights.date_near = w.date_near.unwrap_or(weights.date_near);
            weights.date_far = w.date_far.unwrap_or(weights.date_far);
            weights.reference = w.reference.unwrap_or(weights.reference);
            weights.name = w.name.unwrap_or(weights.name);
            weights.pattern = w.pattern.unwrap_or(weights.pattern);
        }

        if let Some(t) = raw.text {
            if let Some(v) = t.max_compare_chars {
                config.max_compare_chars = v;
            }
            if let Some(v) = t.max_edit_distance_chars {
                config.max_edit_distance_chars = v;
            }
            if let Some(v) = t.min_reference_len {
                config.min_reference_len = v;
            }
        }

        if let Some(s) = raw.statement_defaults {
            if let Some(v) = s.amount_tolerance_pct {
                config.default_amount_tolerance_pct = v;
            }
            if let Some(v) = s.date_tolerance_days {
                config.default_date_tolerance_days = v;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range or contradictory values
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=100.0).contains(&v);

        if !in_range(self.auto_reconcile_threshold) || !in_range(self.min_suggestion_score) {
            return Err(Error::Config(
                "score thresholds must be between 0 and 100".into(),
            ));
        }
        if self.min_suggestion_score > self.auto_reconcile_threshold {
            return Err(Error::Config(format!(
                "min_suggestion ({}) cannot exceed auto_reconcile ({})",
                self.min_suggestion_score, self.auto_reconcile_threshold
            )));
        }
        if self.max_suggestions == 0 {
            return Err(Error::Config("max_suggestions must be at least 1".into()));
        }
        if self.amount_tolerance_pct <= 0.0 || self.default_amount_tolerance_pct < 0.0 {
            return Err(Error::Config("amount tolerance must be positive".into()));
        }
        if self.date_near_days <= 0 || self.date_far_days < self.date_near_days {
            return Err(Error::Config(format!(
                "date windows must satisfy 0 < near_days ({}) <= far_days ({})",
                self.date_near_days, self.date_far_days
            )));
        }
        if self.default_date_tolerance_days < 0 {
            return Err(Error::Config("date tolerance cannot be negative".into()));
        }
        if self.max_compare_chars == 0 {
            return Err(Error::Config("max_compare_chars must be positive".into()));
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("conciliar").join("config").join("matching.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    thresholds: Option<RawThresholds>,
    amount: Option<RawAmount>,
    date: Option<RawDate>,
    weights: Option<RawWeights>,
    text: Option<RawText>,
    statement_defaults: Option<RawStatementDefaults>,
}

#[derive(Debug, Deserialize)]
struct RawThresholds {
    auto_reconcile: Option<f64>,
    min_suggestion: Option<f64>,
    max_suggestions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawAmount {
    tolerance_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDate {
    near_days: Option<i64>,
    far_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawWeights {
    amount: Option<f64>,
    date: Option<f64>,
    date_near: Option<f64>,
    date_far: Option<f64>,
    reference: Option<f64>,
    name: Option<f64>,
    pattern: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    max_compare_chars: Option<usize>,
    max_edit_distance_chars: Option<usize>,
    min_reference_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawStatementDefaults {
    amount_tolerance_pct: Option<f64>,
    date_tolerance_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = MatchingConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, MatchingConfig::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = MatchingConfig::from_toml(
            r#"
[thresholds]
auto_reconcile = 90.0

[date]
far_days = 10
"#,
        )
        .unwrap();
        assert_eq!(config.auto_reconcile_threshold, 90.0);
        assert_eq!(config.min_suggestion_score, 50.0);
        assert_eq!(config.date_near_days, 3);
        assert_eq!(config.date_far_days, 10);
        assert_eq!(config.weights.amount, 40.0);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(MatchingConfig::from_toml("").unwrap(), MatchingConfig::default());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let err = MatchingConfig::from_toml(
            r#"
[thresholds]
auto_reconcile = 40.0
min_suggestion = 60.0
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot exceed"));
    }

    #[test]
    fn test_rejects_bad_date_windows() {
        let err = MatchingConfig::from_toml("[date]\nnear_days = 5\nfar_days = 2\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        assert!(MatchingConfig::from_toml("[thresholds\nauto = ").is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matching.toml");
        fs::write(&path, "[thresholds]\nmax_suggestions = 3\n").unwrap();

        let config = MatchingConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_suggestions, 3);

        let missing = dir.path().join("nope.toml");
        assert!(MatchingConfig::load(Some(&missing)).is_err());
    }
}
