//! Run options and the TOML configuration file.
//!
//! ```toml
//! [run]
//! dry_run = false
//! seed = 42
//! noise_pct = 5.0
//! drift_tolerance = 3.0
//!
//! [live]
//! claims_per_day = 120
//! speed = 4.0
//! tick_interval_ms = 500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Options for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Execute the full pipeline but never hand batches to the sink.
    #[serde(default)]
    pub dry_run: bool,
    /// Fixed seed for reproducible output. Entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Bound on the multiplicative monthly perturbation, percent.
    #[serde(default = "default_noise_pct")]
    pub noise_pct: f64,
    /// Accepted drift between realized and target metrics, percentage
    /// points. A scenario's own `target_metrics.tolerance` wins.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: f64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            seed: None,
            noise_pct: default_noise_pct(),
            drift_tolerance: default_drift_tolerance(),
        }
    }
}

impl RunOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true, ..Self::default() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed), ..Self::default() }
    }
}

fn default_noise_pct() -> f64 {
    5.0
}

fn default_drift_tolerance() -> f64 {
    3.0
}

/// Defaults for the live generation manager, overridable from the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveDefaults {
    #[serde(default = "default_claims_per_day")]
    pub claims_per_day: u32,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_event_rate")]
    pub event_rate: f64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for LiveDefaults {
    fn default() -> Self {
        Self {
            claims_per_day: default_claims_per_day(),
            speed: default_speed(),
            tick_interval_ms: default_tick_interval_ms(),
            event_rate: default_event_rate(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

fn default_claims_per_day() -> u32 {
    48
}

fn default_speed() -> f64 {
    1.0
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_event_rate() -> f64 {
    0.2
}

fn default_max_consecutive_failures() -> u32 {
    5
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub run: RunOptions,
    #[serde(default)]
    pub live: LiveDefaults,
}

impl SimConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `SimError::ConfigError` if the TOML is malformed or does not
    /// match the expected layout.
    pub fn from_toml_str(s: &str) -> SimResult<Self> {
        toml::from_str(s).map_err(|e| SimError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SimError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
