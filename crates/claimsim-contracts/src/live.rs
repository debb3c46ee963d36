//! Control-plane types for the continuous generation manager.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entity::InsertCounts,
    error::{SimError, SimResult},
    ids::RunId,
    report::Shortfall,
    scenario::{
        CountRange, EventKindWeights, PatternDefinition, Practice, ScenarioDefinition, ValueTier,
    },
};

/// Desired behaviour of a continuous generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Claims per simulated day.
    pub claims_per_day: u32,
    /// Simulated-time multiplier. Higher speed packs a simulated day into
    /// fewer, larger ticks.
    #[serde(default = "default_speed")]
    pub speed: f64,
    /// Wall-clock time between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    pub practice: Practice,
    pub lines_per_claim: CountRange,
    pub value_tiers: Vec<ValueTier>,
    /// Patterns injected on every tick at their current denial rate.
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
    /// Probability a denied claim is appealed, in `[0, 1]`.
    #[serde(default)]
    pub appeal_rate: f64,
    /// Probability a denied claim produces one learning event, in `[0, 1]`.
    #[serde(default)]
    pub event_rate: f64,
    #[serde(default)]
    pub event_weights: EventKindWeights,
    #[serde(default)]
    pub users: Vec<String>,
    /// First simulated day. Defaults to today.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Fixed seed for reproducible streams. Entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Consecutive failed ticks after which the job stops itself.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl GenerationConfig {
    /// Derive a live configuration from a scenario's practice, volume shape,
    /// and patterns.
    pub fn from_scenario(scenario: &ScenarioDefinition, claims_per_day: u32, speed: f64) -> Self {
        Self {
            claims_per_day,
            speed,
            tick_interval_ms: default_tick_interval_ms(),
            practice: scenario.practice.clone(),
            lines_per_claim: scenario.volume.lines_per_claim,
            value_tiers: scenario.volume.value_tiers.clone(),
            patterns: scenario.patterns.clone(),
            appeal_rate: scenario.appeals.rate,
            event_rate: 0.2,
            event_weights: scenario.learning_events.kind_weights,
            users: scenario.learning_events.users.clone(),
            start_date: None,
            seed: None,
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }

    /// Parse a standalone generation config from TOML.
    pub fn from_toml_str(s: &str) -> SimResult<Self> {
        toml::from_str(s).map_err(|e| SimError::ConfigError {
            reason: format!("failed to parse generation config TOML: {}", e),
        })
    }

    pub fn from_file(path: &Path) -> SimResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SimError::ConfigError {
            reason: format!("failed to read generation config '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}

fn default_speed() -> f64 {
    1.0
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl std::fmt::Display for GenerationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationState::Idle => write!(f, "idle"),
            GenerationState::Running => write!(f, "running"),
            GenerationState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Result of generating one batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub claims: u32,
    pub line_items: u32,
    pub denied: u32,
    pub appeals: u32,
    pub events: u32,
    pub billed_cents: i64,
    pub shortfalls: Vec<Shortfall>,
    pub persisted: InsertCounts,
    pub rejected: usize,
}

/// Cumulative statistics since the last `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTotals {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub claims: u64,
    pub line_items: u64,
    pub denied: u64,
    pub appeals: u64,
    pub events: u64,
    pub billed_cents: i64,
    pub persisted: InsertCounts,
    /// Last simulated day a tick generated claims for.
    #[serde(default)]
    pub simulated_through: Option<NaiveDate>,
}

impl GenerationTotals {
    pub fn record(&mut self, stats: &BatchStats) {
        self.claims += stats.claims as u64;
        self.line_items += stats.line_items as u64;
        self.denied += stats.denied as u64;
        self.appeals += stats.appeals as u64;
        self.events += stats.events as u64;
        self.billed_cents += stats.billed_cents;
        self.persisted.add(&stats.persisted);
    }
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub state: GenerationState,
    pub run_id: Option<RunId>,
    pub config: Option<GenerationConfig>,
    pub totals: GenerationTotals,
    /// Failed ticks since the last start.
    pub errors: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Why the last job ended, when it ended on its own.
    pub stop_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Answer to a `start` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub accepted: bool,
    pub message: String,
    #[serde(default)]
    pub run_id: Option<RunId>,
}
