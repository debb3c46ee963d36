//! Validation reports, run summaries, and bulk results.
//!
//! These are the structured, inspectable values the pipeline, bulk runner,
//! and generation manager hand back across the control surface instead of
//! raw errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{calendar::YearMonth, entity::InsertCounts, ids::RunId};

// ── Validation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the run.
    Error,
    /// Reported, run continues.
    Warning,
}

/// A single defect found while validating a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Stable identifier of the check that failed (e.g. `"timeline-order"`).
    pub rule_id: String,
    /// Dotted path to the offending field (e.g. `"patterns[2].policy_ids"`).
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(rule_id: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(rule_id: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }
}

/// Every issue found in one validation pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no error-severity issue was found.
    pub fn passed(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }
}

// ── Pipeline run ──────────────────────────────────────────────────────────────

/// Pipeline lifecycle. Runs move forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Loaded,
    Validating,
    Generating,
    Summarizing,
    Completed,
    Failed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PipelineState::Loaded => "loaded",
            PipelineState::Validating => "validating",
            PipelineState::Generating => "generating",
            PipelineState::Summarizing => "summarizing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Not enough eligible claims to reach a pattern's target in one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub pattern_id: String,
    pub target: u32,
    pub achieved: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    Shortfall {
        month: YearMonth,
        pattern_id: String,
        target: u32,
        achieved: u32,
    },
    MetricDrift {
        metric: String,
        target: f64,
        realized: f64,
        tolerance: f64,
    },
    /// A non-blocking validation finding, carried into the summary.
    Validation { rule_id: String, path: String, message: String },
    /// The sink refused some entities of a committed batch.
    RejectedEntities { month: YearMonth, count: usize },
}

/// Injection result for one pattern in one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternBatchStats {
    pub pattern_id: String,
    /// Claims whose lines carry one of the pattern's codes.
    pub eligible: u32,
    pub target: u32,
    pub denied: u32,
    pub target_rate: f64,
}

impl PatternBatchStats {
    /// Realized denial rate over the eligible base, percent.
    pub fn realized_rate(&self) -> f64 {
        percent(self.denied as u64, self.eligible as u64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthSummary {
    pub month: Option<YearMonth>,
    pub claims: u32,
    pub line_items: u32,
    pub denied: u32,
    pub appeals: u32,
    pub events: u32,
    pub billed_cents: i64,
    pub denied_cents: i64,
    pub patterns: Vec<PatternBatchStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSummary {
    pub pattern_id: String,
    pub eligible: u64,
    pub target_denied: u64,
    pub denied: u64,
    pub shortfall_months: u32,
    pub baseline_rate: f64,
    pub current_rate: f64,
    /// Realized rate in the pattern's first and last active month.
    pub first_month_rate: Option<f64>,
    pub last_month_rate: Option<f64>,
}

impl PatternSummary {
    pub fn realized_rate(&self) -> f64 {
        percent(self.denied, self.eligible)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricComparison {
    pub metric: String,
    pub target: f64,
    pub realized: f64,
    pub tolerance: f64,
}

impl MetricComparison {
    pub fn drift(&self) -> f64 {
        self.realized - self.target
    }

    pub fn within_tolerance(&self) -> bool {
        self.drift().abs() <= self.tolerance
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    pub claims: u64,
    pub line_items: u64,
    pub denied: u64,
    pub appeals: u64,
    pub overturned: u64,
    pub upheld: u64,
    pub pending: u64,
    pub events: u64,
    pub billed_cents: i64,
    pub denied_cents: i64,
    pub recovered_cents: i64,
}

impl RunTotals {
    pub fn denial_rate(&self) -> f64 {
        percent(self.denied, self.claims)
    }

    pub fn appeal_rate(&self) -> f64 {
        percent(self.appeals, self.denied)
    }

    /// Overturned share of decided (non-pending) appeals.
    pub fn overturn_rate(&self) -> f64 {
        percent(self.overturned, self.overturned + self.upheld)
    }
}

/// Everything a completed pipeline run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub scenario_id: String,
    pub dry_run: bool,
    pub state_history: Vec<PipelineState>,
    pub months: Vec<MonthSummary>,
    pub patterns: Vec<PatternSummary>,
    pub totals: RunTotals,
    pub comparisons: Vec<MetricComparison>,
    pub warnings: Vec<RunWarning>,
    /// What the sink accepted. Zero in dry-run.
    pub persisted: InsertCounts,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn final_state(&self) -> PipelineState {
        self.state_history
            .last()
            .copied()
            .unwrap_or(PipelineState::Loaded)
    }

    pub fn pattern(&self, id: &str) -> Option<&PatternSummary> {
        self.patterns.iter().find(|p| p.pattern_id == id)
    }
}

// ── Bulk ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkFailure {
    pub index: usize,
    pub scenario_id: String,
    pub error: String,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkReport {
    pub completed: Vec<RunSummary>,
    pub failures: Vec<BulkFailure>,
    /// Scenario ids never attempted because an earlier failure aborted the
    /// list.
    pub skipped: Vec<String>,
}

impl BulkReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// `part / whole` as a percentage; zero when `whole` is zero.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
