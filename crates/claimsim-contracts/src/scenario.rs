//! Scenario document types.
//!
//! A `ScenarioDefinition` is the root input of a pipeline run: a practice
//! and its providers, a claim volume profile, and the denial patterns whose
//! trajectories the generated claim stream must reproduce. Documents are
//! plain JSON (see `claimsim-verify` for the loader and schema). All rates
//! named `*_rate` on patterns and target metrics are percentages in
//! `[0, 100]`; the appeal filing rate is a probability in `[0, 1]`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::YearMonth;

// ── Root ──────────────────────────────────────────────────────────────────────

/// The root scenario document. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub timeline: Timeline,
    pub practice: Practice,
    pub volume: VolumeProfile,
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
    #[serde(default)]
    pub appeals: AppealProfile,
    #[serde(default)]
    pub learning_events: LearningEventDistribution,
    #[serde(default)]
    pub target_metrics: TargetMetrics,
}

impl ScenarioDefinition {
    /// Every calendar month the timeline touches, in order.
    pub fn months(&self) -> Vec<YearMonth> {
        self.timeline.months()
    }

    pub fn pattern(&self, id: &str) -> Option<&PatternDefinition> {
        self.patterns.iter().find(|p| p.id == id)
    }
}

// ── Timeline ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Named milestones (go-live dates, training sessions). Informational;
    /// surfaced in run summaries.
    #[serde(default)]
    pub key_events: Vec<KeyEvent>,
}

impl Timeline {
    pub fn months(&self) -> Vec<YearMonth> {
        YearMonth::range_inclusive(YearMonth::of(self.start_date), YearMonth::of(self.end_date))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEvent {
    pub date: NaiveDate,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// ── Practice ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practice {
    pub id: String,
    pub name: String,
    pub providers: Vec<Provider>,
    /// Relative payer weights. Empty means the built-in commercial mix.
    #[serde(default)]
    pub payer_mix: Vec<PayerShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub specialty: String,
    /// Relative share of the practice's claim volume.
    pub claim_weight: f64,
    /// Explicit procedure code pool. Empty means the specialty catalog.
    #[serde(default)]
    pub procedure_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerShare {
    pub name: String,
    pub weight: f64,
}

// ── Volume ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfile {
    /// Exact number of claims the run must generate across all months.
    pub total_claims: u32,
    /// Relative per-month volume. Empty means uniform; one entry per
    /// timeline month; or exactly 12 entries indexed by calendar month
    /// (seasonality).
    #[serde(default)]
    pub monthly_multipliers: Vec<f64>,
    pub lines_per_claim: CountRange,
    pub value_tiers: Vec<ValueTier>,
}

impl VolumeProfile {
    /// Resolve the multiplier vector against the concrete timeline months.
    ///
    /// Returns `None` when the multiplier count matches neither the month
    /// count nor the 12-entry seasonal form.
    pub fn month_weights(&self, months: &[YearMonth]) -> Option<Vec<f64>> {
        let m = &self.monthly_multipliers;
        if m.is_empty() {
            Some(vec![1.0; months.len()])
        } else if m.len() == months.len() {
            Some(m.clone())
        } else if m.len() == 12 {
            Some(months.iter().map(|ym| m[(ym.month - 1) as usize]).collect())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRange {
    pub min: u32,
    pub max: u32,
}

/// A claim value band. Line amounts are drawn uniformly within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueTier {
    pub name: String,
    /// Minimum line amount in dollars.
    pub min_amount: f64,
    /// Maximum line amount in dollars.
    pub max_amount: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl ValueTier {
    pub fn min_cents(&self) -> i64 {
        (self.min_amount * 100.0).round() as i64
    }

    pub fn max_cents(&self) -> i64 {
        (self.max_amount * 100.0).round() as i64
    }
}

fn default_weight() -> f64 {
    1.0
}

// ── Patterns ──────────────────────────────────────────────────────────────────

/// The payer-side reason family a denial belongs to. Drives appeal outcome
/// probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCategory {
    MissingModifier,
    CodingError,
    Documentation,
    MedicalNecessity,
    PriorAuthorization,
    Bundling,
    Eligibility,
    TimelyFiling,
    Duplicate,
    NonCoveredService,
    Other,
}

impl DenialCategory {
    pub const ALL: [DenialCategory; 11] = [
        DenialCategory::MissingModifier,
        DenialCategory::CodingError,
        DenialCategory::Documentation,
        DenialCategory::MedicalNecessity,
        DenialCategory::PriorAuthorization,
        DenialCategory::Bundling,
        DenialCategory::Eligibility,
        DenialCategory::TimelyFiling,
        DenialCategory::Duplicate,
        DenialCategory::NonCoveredService,
        DenialCategory::Other,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTier {
    Critical,
    High,
    Medium,
    Low,
}

impl PatternTier {
    /// Higher is more severe. The injector processes patterns in descending
    /// severity.
    pub fn severity(&self) -> u8 {
        match self {
            PatternTier::Critical => 4,
            PatternTier::High => 3,
            PatternTier::Medium => 2,
            PatternTier::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    #[default]
    Active,
    Monitoring,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDefinition {
    pub id: String,
    pub name: String,
    pub category: DenialCategory,
    pub tier: PatternTier,
    #[serde(default)]
    pub status: PatternStatus,
    /// Procedure codes the pattern applies to. A claim is eligible when any
    /// of its lines carries one of these codes.
    pub procedure_codes: Vec<String>,
    /// Policy library identifiers; every one must resolve.
    #[serde(default)]
    pub policy_ids: Vec<String>,
    pub denial_reason: String,
    /// Payer edit / adjustment reason codes attached to hit lines.
    #[serde(default)]
    pub edit_codes: Vec<String>,
    pub trajectory: TrajectoryCurve,
    #[serde(default)]
    pub engagement: EngagementProfile,
    #[serde(default)]
    pub remediation: Remediation,
}

impl PatternDefinition {
    pub fn matches_code(&self, code: &str) -> bool {
        self.procedure_codes.iter().any(|c| c == code)
    }

    /// True when `month` falls inside the trajectory window.
    pub fn active_in(&self, month: YearMonth) -> bool {
        let (start, end) = self.trajectory.window();
        start <= month && month <= end
    }
}

/// Named trajectory shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveShape {
    /// Converges on the current rate within two to three months.
    SteepImprovement,
    /// Linear decay across the full window.
    GradualImprovement,
    /// Smoothstep between two close rates.
    SlightImprovement,
    /// Holds the baseline rate.
    Stable,
    /// Holds the baseline rate; baseline and current must be within a
    /// narrow band.
    Flat,
    /// Linear rise from baseline to current.
    Worsening,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectorySnapshot {
    pub period: Period,
    pub denial_rate: f64,
    /// Denied dollars over the period. Informational.
    #[serde(default)]
    pub denied_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlySnapshot {
    pub month: YearMonth,
    pub denial_rate: f64,
    #[serde(default)]
    pub denied_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryCurve {
    pub shape: CurveShape,
    pub baseline: TrajectorySnapshot,
    pub current: TrajectorySnapshot,
    /// Explicit per-month targets. When present for a month they replace the
    /// interpolated value.
    #[serde(default)]
    pub monthly: Vec<MonthlySnapshot>,
}

impl TrajectoryCurve {
    /// First and last month of the pattern's active window.
    pub fn window(&self) -> (YearMonth, YearMonth) {
        (
            YearMonth::of(self.baseline.period.start),
            YearMonth::of(self.current.period.end),
        )
    }

    pub fn window_months(&self) -> Vec<YearMonth> {
        let (start, end) = self.window();
        YearMonth::range_inclusive(start, end)
    }

    pub fn snapshot_for(&self, month: YearMonth) -> Option<&MonthlySnapshot> {
        self.monthly.iter().find(|s| s.month == month)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngagementProfile {
    #[serde(default)]
    pub views: u32,
    #[serde(default)]
    pub tests: u32,
    #[serde(default)]
    pub exports: u32,
    #[serde(default)]
    pub first_seen: Option<NaiveDate>,
    #[serde(default)]
    pub action_history: Vec<ActionRecord>,
}

impl EngagementProfile {
    /// Relative share of the scenario's learning events this pattern
    /// attracts. Never zero, so quiet patterns still receive some activity.
    pub fn weight(&self) -> f64 {
        (self.views + self.tests + self.exports).max(1) as f64
    }

    /// Dates around which learning events concentrate, sorted and unique.
    pub fn cluster_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .first_seen
            .into_iter()
            .chain(self.action_history.iter().map(|a| a.date))
            .collect();
        dates.sort();
        dates.dedup();
        dates
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub date: NaiveDate,
    pub action: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Remediation {
    #[serde(default)]
    pub short_term: Option<ShortTermFix>,
    #[serde(default)]
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortTermFix {
    pub resubmission_window_days: u32,
    pub instructions: String,
}

// ── Appeals ───────────────────────────────────────────────────────────────────

/// Outcome probabilities for appeals of one denial category. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeProbabilities {
    pub overturned: f64,
    pub upheld: f64,
    pub pending: f64,
}

impl OutcomeProbabilities {
    pub fn total(&self) -> f64 {
        self.overturned + self.upheld + self.pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeOverride {
    pub category: DenialCategory,
    #[serde(flatten)]
    pub probabilities: OutcomeProbabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppealProfile {
    /// Probability that a denied claim is appealed, in `[0, 1]`.
    #[serde(default = "default_appeal_rate")]
    pub rate: f64,
    #[serde(default)]
    pub outcome_overrides: Vec<OutcomeOverride>,
}

impl Default for AppealProfile {
    fn default() -> Self {
        Self {
            rate: default_appeal_rate(),
            outcome_overrides: Vec::new(),
        }
    }
}

fn default_appeal_rate() -> f64 {
    0.35
}

// ── Learning events ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningEventKind {
    PatternViewed,
    ClaimInspected,
    PracticeSession,
    CorrectionApplied,
}

impl LearningEventKind {
    /// Kinds that point at a concrete denied claim when one is available.
    pub fn references_claim(&self) -> bool {
        matches!(self, LearningEventKind::ClaimInspected | LearningEventKind::CorrectionApplied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventKindWeights {
    pub pattern_viewed: f64,
    pub claim_inspected: f64,
    pub practice_session: f64,
    pub correction_applied: f64,
}

impl EventKindWeights {
    pub fn entries(&self) -> [(LearningEventKind, f64); 4] {
        [
            (LearningEventKind::PatternViewed, self.pattern_viewed),
            (LearningEventKind::ClaimInspected, self.claim_inspected),
            (LearningEventKind::PracticeSession, self.practice_session),
            (LearningEventKind::CorrectionApplied, self.correction_applied),
        ]
    }
}

impl Default for EventKindWeights {
    fn default() -> Self {
        Self {
            pattern_viewed: 0.45,
            claim_inspected: 0.25,
            practice_session: 0.2,
            correction_applied: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningEventDistribution {
    /// Total learning events across the whole run.
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub kind_weights: EventKindWeights,
    /// Portal user ids events are attributed to. Empty means a single
    /// practice administrator.
    #[serde(default)]
    pub users: Vec<String>,
}

// ── Targets ───────────────────────────────────────────────────────────────────

/// Aggregate metrics the realized run is compared against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetMetrics {
    /// Denied claims / generated claims, percent.
    #[serde(default)]
    pub overall_denial_rate: Option<f64>,
    /// Appealed / denied, percent.
    #[serde(default)]
    pub appeal_rate: Option<f64>,
    /// Overturned / decided appeals, percent.
    #[serde(default)]
    pub overturn_rate: Option<f64>,
    /// Declared line-item total; must be reachable from the lines range.
    #[serde(default)]
    pub total_line_items: Option<u32>,
    /// Accepted drift in percentage points. Falls back to the run option.
    #[serde(default)]
    pub tolerance: Option<f64>,
}
