//! Generated entities and the batch envelope handed to persistence.
//!
//! Amounts are integer cents so the claim-total invariant holds exactly.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    ids::{AppealId, BatchId, ClaimId, EventId},
    scenario::{DenialCategory, LearningEventKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Paid,
    Denied,
}

/// Denial details attached to a claim by the pattern injector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimDenial {
    pub pattern_id: String,
    pub category: DenialCategory,
    pub reason: String,
    pub policy_ids: Vec<String>,
    pub edit_codes: Vec<String>,
    pub denied_date: NaiveDate,
    /// Fix guidance from the policy library, when the pattern references a
    /// policy that carries one.
    #[serde(default)]
    pub guidance: Option<String>,
}

/// Per-line marker of which pattern hit the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDenial {
    pub pattern_id: String,
    pub edit_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedLineItem {
    /// 1-based position within the claim.
    pub line_number: u16,
    pub procedure_code: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub units: u16,
    pub billed_cents: i64,
    /// 1-based indexes into the claim's diagnosis codes.
    pub diagnosis_pointers: Vec<u8>,
    #[serde(default)]
    pub denial: Option<LineDenial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedClaim {
    pub id: ClaimId,
    pub claim_number: String,
    pub practice_id: String,
    pub provider_id: String,
    pub patient_id: String,
    pub patient_name: String,
    pub payer: String,
    pub service_date: NaiveDate,
    pub submitted_date: NaiveDate,
    pub value_tier: String,
    /// Always equal to the sum of the lines' `billed_cents`.
    pub billed_cents: i64,
    pub paid_cents: i64,
    pub diagnosis_codes: Vec<String>,
    pub lines: Vec<GeneratedLineItem>,
    pub status: ClaimStatus,
    #[serde(default)]
    pub denial: Option<ClaimDenial>,
}

impl GeneratedClaim {
    pub fn is_denied(&self) -> bool {
        self.status == ClaimStatus::Denied
    }

    pub fn line_total_cents(&self) -> i64 {
        self.lines.iter().map(|l| l.billed_cents).sum()
    }

    pub fn has_any_code(&self, codes: &[String]) -> bool {
        self.lines
            .iter()
            .any(|l| codes.iter().any(|c| *c == l.procedure_code))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealOutcome {
    Overturned,
    Upheld,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAppeal {
    pub id: AppealId,
    pub claim_id: ClaimId,
    pub pattern_id: String,
    pub category: DenialCategory,
    pub filed_date: NaiveDate,
    pub outcome: AppealOutcome,
    /// Absent while the appeal is pending.
    #[serde(default)]
    pub outcome_date: Option<NaiveDate>,
    /// Billed amount recovered by an overturn; zero otherwise.
    pub recovered_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEvent {
    pub id: EventId,
    pub pattern_id: String,
    pub kind: LearningEventKind,
    pub occurred_on: NaiveDate,
    pub user_id: String,
    #[serde(default)]
    pub claim_id: Option<ClaimId>,
}

/// One unit of persistence work: a scenario month or a manager tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedBatch {
    pub id: BatchId,
    /// Human-readable origin, e.g. `"scenario:cardio-modifiers:2024-03"`.
    pub label: String,
    pub claims: Vec<GeneratedClaim>,
    pub appeals: Vec<GeneratedAppeal>,
    pub events: Vec<LearningEvent>,
}

impl GeneratedBatch {
    pub fn line_count(&self) -> usize {
        self.claims.iter().map(|c| c.lines.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty() && self.appeals.is_empty() && self.events.is_empty()
    }
}

// ── Sink results ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Claim,
    LineItem,
    Appeal,
    Event,
}

/// One entity a sink refused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityFailure {
    pub kind: EntityKind,
    pub id: String,
    pub reason: String,
}

/// Per-entity outcome of `ClaimSink::insert_batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertCounts {
    pub claims: u64,
    pub line_items: u64,
    pub appeals: u64,
    pub events: u64,
}

impl InsertCounts {
    pub fn add(&mut self, other: &InsertCounts) {
        self.claims += other.claims;
        self.line_items += other.line_items;
        self.appeals += other.appeals;
        self.events += other.events;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertReport {
    pub inserted: InsertCounts,
    pub failures: Vec<EntityFailure>,
    /// True when the sink recognised the batch as an already-committed retry
    /// and inserted nothing.
    #[serde(default)]
    pub duplicate_batch: bool,
}
