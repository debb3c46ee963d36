//! Fixtures and in-memory collaborators shared by the unit tests.

use std::sync::{Arc, Mutex};

use claimsim_contracts::{
    entity::{GeneratedBatch, InsertReport},
    error::{SimError, SimResult},
    policy::PolicyReference,
    report::{ValidationIssue, ValidationReport},
    scenario::ScenarioDefinition,
};

use crate::traits::{ClaimSink, PolicyResolver, ScenarioValidator};

/// Six months of a two-cardiologist practice with a steep modifier pattern
/// and a gradual prior-auth pattern.
pub fn scenario(id: &str) -> ScenarioDefinition {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": "Cardiology modifier cleanup",
        "timeline": { "start_date": "2024-01-01", "end_date": "2024-06-30" },
        "practice": {
            "id": "heart-clinic",
            "name": "Heart Clinic",
            "providers": [
                { "id": "dr-a", "name": "Dr A", "specialty": "cardiology", "claim_weight": 2.0 },
                {
                    "id": "dr-b", "name": "Dr B", "specialty": "cardiology", "claim_weight": 1.0,
                    "procedure_codes": ["99214", "93000", "93306", "93015"]
                }
            ],
            "payer_mix": [
                { "name": "Medicare", "weight": 0.6 },
                { "name": "Aetna", "weight": 0.4 }
            ]
        },
        "volume": {
            "total_claims": 600,
            "lines_per_claim": { "min": 1, "max": 3 },
            "value_tiers": [
                { "name": "routine", "min_amount": 60.0, "max_amount": 250.0, "weight": 3.0 },
                { "name": "imaging", "min_amount": 400.0, "max_amount": 1200.0, "weight": 1.0 }
            ]
        },
        "patterns": [
            {
                "id": "ekg-missing-25",
                "name": "EKG billed with E/M, modifier 25 missing",
                "category": "missing_modifier",
                "tier": "critical",
                "procedure_codes": ["93000"],
                "policy_ids": ["CMS-NCCI-25"],
                "denial_reason": "E/M service not separately identifiable without modifier 25",
                "edit_codes": ["CO-4"],
                "trajectory": {
                    "shape": "steep_improvement",
                    "baseline": {
                        "period": { "start": "2024-01-01", "end": "2024-01-31" },
                        "denial_rate": 30.0
                    },
                    "current": {
                        "period": { "start": "2024-06-01", "end": "2024-06-30" },
                        "denial_rate": 5.0
                    }
                },
                "engagement": {
                    "views": 40, "tests": 5, "exports": 2,
                    "first_seen": "2024-03-04",
                    "action_history": [
                        { "date": "2024-03-05", "action": "reviewed" },
                        { "date": "2024-03-18", "action": "trained_staff" }
                    ]
                }
            },
            {
                "id": "echo-prior-auth",
                "name": "Echo without prior authorization",
                "category": "prior_authorization",
                "tier": "medium",
                "procedure_codes": ["93306"],
                "denial_reason": "Prior authorization not on file",
                "trajectory": {
                    "shape": "gradual_improvement",
                    "baseline": {
                        "period": { "start": "2024-01-01", "end": "2024-01-31" },
                        "denial_rate": 20.0
                    },
                    "current": {
                        "period": { "start": "2024-06-01", "end": "2024-06-30" },
                        "denial_rate": 8.0
                    }
                },
                "engagement": { "views": 10 }
            }
        ],
        "appeals": { "rate": 0.4 },
        "learning_events": { "total": 60, "users": ["biller-1", "coder-2"] },
        "target_metrics": { "overall_denial_rate": 6.0, "tolerance": 5.0 }
    }))
    .expect("fixture scenario deserializes")
}

/// Records every batch it is handed.
#[derive(Clone, Default)]
pub struct MockSink {
    batches: Arc<Mutex<Vec<GeneratedBatch>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<GeneratedBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl ClaimSink for MockSink {
    fn insert_batch(&self, batch: &GeneratedBatch) -> SimResult<InsertReport> {
        self.batches.lock().unwrap().push(batch.clone());
        let mut report = InsertReport::default();
        report.inserted.claims = batch.claims.len() as u64;
        report.inserted.line_items = batch.line_count() as u64;
        report.inserted.appeals = batch.appeals.len() as u64;
        report.inserted.events = batch.events.len() as u64;
        Ok(report)
    }
}

/// Records batches until call number `fail_on` (1-based), which fails.
pub struct RecordingSink {
    pub batches: Arc<Mutex<Vec<GeneratedBatch>>>,
    pub fail_on: usize,
}

impl ClaimSink for RecordingSink {
    fn insert_batch(&self, batch: &GeneratedBatch) -> SimResult<InsertReport> {
        let mut batches = self.batches.lock().unwrap();
        if batches.len() + 1 == self.fail_on {
            return Err(SimError::Persistence {
                reason: "connection reset".to_string(),
            });
        }
        batches.push(batch.clone());
        Ok(InsertReport::default())
    }
}

pub struct StaticPolicies(Vec<PolicyReference>);

impl StaticPolicies {
    pub fn cardiology() -> Self {
        Self(vec![PolicyReference {
            id: "CMS-NCCI-25".to_string(),
            title: "NCCI modifier 25 policy".to_string(),
            payer: Some("Medicare".to_string()),
            fix_guidance: "Append modifier 25 to the E/M line.".to_string(),
            common_mistake: None,
        }])
    }
}

impl PolicyResolver for StaticPolicies {
    fn resolve(&self, policy_id: &str) -> Option<PolicyReference> {
        self.0.iter().find(|p| p.id == policy_id).cloned()
    }
}

/// Accepts every scenario.
pub struct PassValidator;

impl ScenarioValidator for PassValidator {
    fn validate(&self, _: &ScenarioDefinition, _: &dyn PolicyResolver) -> ValidationReport {
        ValidationReport::default()
    }
}

/// Rejects every scenario with two errors.
pub struct RejectingValidator;

impl ScenarioValidator for RejectingValidator {
    fn validate(&self, _: &ScenarioDefinition, _: &dyn PolicyResolver) -> ValidationReport {
        ValidationReport {
            issues: vec![
                ValidationIssue::error("timeline-order", "timeline", "end_date precedes start_date"),
                ValidationIssue::error("provider-weights", "practice.providers", "weights sum to zero"),
            ],
        }
    }
}

/// Rejects scenarios whose id starts with `"invalid"`.
pub struct IdPrefixValidator;

impl ScenarioValidator for IdPrefixValidator {
    fn validate(&self, scenario: &ScenarioDefinition, _: &dyn PolicyResolver) -> ValidationReport {
        let mut report = ValidationReport::default();
        if scenario.id.starts_with("invalid") {
            report.push(ValidationIssue::error("scenario-id", "id", "scenario marked invalid"));
        }
        report
    }
}
