//! Engine configuration.
//!
//! Sampling, windowing and transform knobs for the inference and
//! normalization passes. Trigger cadence is owned by whatever scheduler
//! embeds the engine and is deliberately absent here.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Documents sampled per inference pass.
    pub sample_size: usize,

    /// Fraction of the sample a field may be missing from before it is
    /// marked optional. `0.05` means present in < 95% of samples.
    pub optional_threshold: f64,

    /// Raw records scanned per normalization sweep, newest first. Records
    /// older than the window are not considered by that pass.
    pub scan_window: usize,

    /// Array elements inspected per path when characterizing inner shape.
    /// Large heterogeneous arrays beyond this bound are not observed.
    pub array_sample: usize,

    /// Nesting depth above which a payload is reported malformed.
    pub max_depth: usize,

    /// Canonical transform options.
    pub transform: TransformConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            optional_threshold: default_optional_threshold(),
            scan_window: default_scan_window(),
            array_sample: default_array_sample(),
            max_depth: default_max_depth(),
            transform: TransformConfig::default(),
        }
    }
}

/// Options for the canonical transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Field-name substrings (matched case-insensitively) that cause an
    /// all-digit string value to be reinterpreted as an integer.
    pub numeric_hints: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            numeric_hints: default_numeric_hints(),
        }
    }
}

fn default_sample_size() -> usize {
    50
}

fn default_optional_threshold() -> f64 {
    0.05
}

fn default_scan_window() -> usize {
    1000
}

fn default_array_sample() -> usize {
    3
}

fn default_max_depth() -> usize {
    64
}

fn default_numeric_hints() -> Vec<String> {
    vec!["age".into(), "price".into(), "count".into()]
}

impl EngineConfig {
    /// Defaults overridden by `SHAPESENSE_*` environment variables.
    ///
    /// Unparseable values are logged and ignored rather than failing
    /// startup.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<usize>("SHAPESENSE_SAMPLE_SIZE") {
            cfg.sample_size = v;
        }
        if let Some(v) = env_parse::<f64>("SHAPESENSE_OPTIONAL_THRESHOLD") {
            cfg.optional_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("SHAPESENSE_SCAN_WINDOW") {
            cfg.scan_window = v;
        }
        if let Some(v) = env_parse::<usize>("SHAPESENSE_ARRAY_SAMPLE") {
            cfg.array_sample = v;
        }

        cfg
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.sample_size == 0 {
            bail!("sample_size must be positive");
        }
        if !(0.0..1.0).contains(&self.optional_threshold) {
            bail!(
                "optional_threshold must be in [0, 1), got {}",
                self.optional_threshold
            );
        }
        if self.scan_window == 0 {
            bail!("scan_window must be positive");
        }
        if self.max_depth == 0 {
            bail!("max_depth must be positive");
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.sample_size, 50);
        assert_eq!(cfg.optional_threshold, 0.05);
        assert_eq!(cfg.scan_window, 1000);
        assert_eq!(cfg.array_sample, 3);
        assert_eq!(
            cfg.transform.numeric_hints,
            vec!["age", "price", "count"]
        );
    }

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_sample_size() {
        let cfg = EngineConfig {
            sample_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_threshold_of_one() {
        let cfg = EngineConfig {
            optional_threshold: 1.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"sample_size": 10}"#).unwrap();
        assert_eq!(cfg.sample_size, 10);
        assert_eq!(cfg.scan_window, 1000);
        assert_eq!(cfg.array_sample, 3);
    }

    #[test]
    fn env_override_applies() {
        // Env vars are process-global; use a key unique to this test.
        unsafe { std::env::set_var("SHAPESENSE_ARRAY_SAMPLE", "5") };
        let cfg = EngineConfig::from_env();
        assert_eq!(cfg.array_sample, 5);
        unsafe { std::env::remove_var("SHAPESENSE_ARRAY_SAMPLE") };
    }
}
