//! Evaluation settings.
//!
//! Settings come from three layers, later ones winning: built-in defaults
//! (optionally overridden by environment variables), an optional TOML file,
//! and explicit command-line flags applied by the binary.
//!
//! ```toml
//! [evaluation]
//! workers = 16
//! force = false
//!
//! [statistics]
//! bootstrap_samples = 2000
//! confidence_level = 0.95
//! permutations = 10000
//! seed = 42
//! ```

use crate::error::{BenchError, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;

/// Upper bound on evaluation threads regardless of core count.
pub const DEFAULT_WORKER_CAP: usize = 64;
pub const DEFAULT_BOOTSTRAP_SAMPLES: usize = 1000;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
pub const DEFAULT_PERMUTATIONS: usize = 10_000;

/// Knobs for one benchmark run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalSettings {
    /// Maximum evaluation threads.
    pub workers: usize,
    /// Evaluate candidates even when some pages have no repeats.
    pub tolerate_missing: bool,
    pub bootstrap_samples: usize,
    /// Two-sided confidence level in `(0, 1)`.
    pub confidence_level: f64,
    pub permutations: usize,
    /// Seed for resampling and sampling; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for EvalSettings {
    #[inline]
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKER_CAP,
            tolerate_missing: false,
            bootstrap_samples: DEFAULT_BOOTSTRAP_SAMPLES,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            permutations: DEFAULT_PERMUTATIONS,
            seed: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

impl EvalSettings {
    /// Defaults overridden by environment variables.
    ///
    /// Environment variables:
    /// - `OCRBENCH_WORKERS`: thread cap (default: 64)
    /// - `OCRBENCH_BOOTSTRAP_SAMPLES`: resamples (default: 1000)
    /// - `OCRBENCH_CONFIDENCE_LEVEL`: level (default: 0.95)
    /// - `OCRBENCH_SEED`: RNG seed (default: unseeded)
    #[must_use = "creates settings from environment variables"]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: env_parse("OCRBENCH_WORKERS").unwrap_or(defaults.workers),
            bootstrap_samples: env_parse("OCRBENCH_BOOTSTRAP_SAMPLES")
                .unwrap_or(defaults.bootstrap_samples),
            confidence_level: env_parse("OCRBENCH_CONFIDENCE_LEVEL")
                .unwrap_or(defaults.confidence_level),
            seed: env_parse("OCRBENCH_SEED").or(defaults.seed),
            ..defaults
        }
    }

    /// Overlay the values present in a config file.
    pub fn apply_file(&mut self, file: &ConfigFile) {
        if let Some(evaluation) = &file.evaluation {
            if let Some(workers) = evaluation.workers {
                self.workers = workers;
            }
            if let Some(force) = evaluation.force {
                self.tolerate_missing = force;
            }
        }
        if let Some(statistics) = &file.statistics {
            if let Some(samples) = statistics.bootstrap_samples {
                self.bootstrap_samples = samples;
            }
            if let Some(level) = statistics.confidence_level {
                self.confidence_level = level;
            }
            if let Some(permutations) = statistics.permutations {
                self.permutations = permutations;
            }
            if statistics.seed.is_some() {
                self.seed = statistics.seed;
            }
        }
    }

    /// Threads to use: the cap, bounded by the machine's parallelism.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        let available = std::thread::available_parallelism().map_or(1, std::num::NonZero::get);
        available.min(self.workers).max(1)
    }

    /// Reject settings the statistics cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] for a zero thread cap, zero resamples,
    /// or a confidence level outside `(0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(BenchError::Config("workers must be at least 1".to_string()));
        }
        if self.bootstrap_samples == 0 {
            return Err(BenchError::Config(
                "bootstrap_samples must be at least 1".to_string(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(BenchError::Config(format!(
                "confidence_level {} outside (0, 1)",
                self.confidence_level
            )));
        }
        Ok(())
    }
}

/// On-disk configuration; every field is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ConfigFile {
    pub evaluation: Option<EvaluationSection>,
    pub statistics: Option<StatisticsSection>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct EvaluationSection {
    pub workers: Option<usize>,
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct StatisticsSection {
    pub bootstrap_samples: Option<usize>,
    pub confidence_level: Option<f64>,
    pub permutations: Option<usize>,
    pub seed: Option<u64>,
}

/// Load a TOML config file. A missing file yields the empty config.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    toml::from_str(&contents)
        .map_err(|e| BenchError::Config(format!("{}: {e}", path.display())))
}
