//! The scenario validator used by the pipeline.
//!
//! `JsonScenarioValidator` implements the `ScenarioValidator` trait from
//! `claimsim-core`. Validation runs in two phases:
//!
//! 1. **Structural**: the scenario is serialized back to JSON and checked
//!    against the scenario schema. Documents that came through the loader
//!    already passed this once; scenarios built in code have not.
//! 2. **Semantic**: every rule in [`crate::rules`] runs, then every
//!    registered custom rule. All issues are accumulated.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use claimsim_contracts::{
    error::SimResult,
    report::{ValidationIssue, ValidationReport},
    scenario::ScenarioDefinition,
};
use claimsim_core::traits::{PolicyResolver, ScenarioValidator};

use crate::{
    loader::{scenario_schema, structural_issues},
    rules,
};

/// A caller-supplied scenario check.
///
/// Returns `Some(message)` when the scenario fails the check. Failures are
/// reported as errors under the name the rule was registered with.
pub type CustomRuleFn = Box<dyn Fn(&ScenarioDefinition) -> Option<String> + Send + Sync>;

pub struct JsonScenarioValidator {
    schema: Value,
    /// Ordered by name so reports are deterministic.
    custom_rules: BTreeMap<String, CustomRuleFn>,
}

impl JsonScenarioValidator {
    /// Validator using the bundled scenario schema.
    pub fn new() -> SimResult<Self> {
        Ok(Self::with_schema(scenario_schema()?))
    }

    /// Validator using a caller-supplied schema document. A `null` schema
    /// skips the structural phase.
    pub fn with_schema(schema: Value) -> Self {
        Self {
            schema,
            custom_rules: BTreeMap::new(),
        }
    }

    /// Register a custom rule under `name`. Registering the same name twice
    /// replaces the previous rule.
    pub fn register_rule(&mut self, name: impl Into<String>, rule: CustomRuleFn) {
        self.custom_rules.insert(name.into(), rule);
    }
}

impl ScenarioValidator for JsonScenarioValidator {
    fn validate(&self, scenario: &ScenarioDefinition, policies: &dyn PolicyResolver) -> ValidationReport {
        let mut report = ValidationReport::default();

        // ── Phase 1: structural ──────────────────────────────────────────────
        if !self.schema.is_null() {
            match serde_json::to_value(scenario) {
                Ok(doc) => report.issues.extend(structural_issues(&self.schema, &doc)),
                Err(e) => report.push(ValidationIssue::error(
                    "json-schema",
                    "",
                    format!("scenario could not be serialized for schema validation: {e}"),
                )),
            }
        }

        // ── Phase 2: semantic ────────────────────────────────────────────────
        report.extend(rules::check_all(scenario, policies));

        for (name, rule) in &self.custom_rules {
            debug!(rule_id = %name, scenario_id = %scenario.id, "evaluating custom rule");
            if let Some(message) = rule(scenario) {
                report.push(ValidationIssue::error(name, "", message));
            }
        }

        for issue in &report.issues {
            warn!(
                scenario_id = %scenario.id,
                rule_id = %issue.rule_id,
                path = %issue.path,
                severity = ?issue.severity,
                message = %issue.message,
                "scenario validation issue"
            );
        }
        debug!(
            scenario_id = %scenario.id,
            errors = report.errors().count(),
            warnings = report.warnings().count(),
            "scenario validated"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimsim_contracts::{policy::PolicyReference, report::Severity};
    use serde_json::json;

    struct Policies(Vec<&'static str>);

    impl PolicyResolver for Policies {
        fn resolve(&self, policy_id: &str) -> Option<PolicyReference> {
            self.0.iter().any(|p| *p == policy_id).then(|| PolicyReference {
                id: policy_id.to_string(),
                title: policy_id.to_string(),
                payer: None,
                fix_guidance: "Fix it.".to_string(),
                common_mistake: None,
            })
        }
    }

    fn policies() -> Policies {
        Policies(vec!["CMS-NCCI-25", "AETNA-PA-ECHO"])
    }

    fn doc() -> Value {
        json!({
            "id": "ortho-prior-auth",
            "name": "Orthopedics prior auth",
            "timeline": {
                "start_date": "2024-01-01",
                "end_date": "2024-06-30",
                "key_events": [{ "date": "2024-03-01", "name": "PA workflow go-live" }]
            },
            "practice": {
                "id": "bone-and-joint",
                "name": "Bone and Joint",
                "providers": [
                    { "id": "dr-k", "name": "Dr K", "specialty": "orthopedics", "claim_weight": 1.0 },
                    { "id": "dr-l", "name": "Dr L", "specialty": "Orthopedics", "claim_weight": 1.5 }
                ],
                "payer_mix": [{ "name": "Aetna", "weight": 1.0 }]
            },
            "volume": {
                "total_claims": 120,
                "monthly_multipliers": [1.0, 1.0, 1.2, 1.2, 0.8, 0.8],
                "lines_per_claim": { "min": 1, "max": 4 },
                "value_tiers": [
                    { "name": "office", "min_amount": 80.0, "max_amount": 300.0, "weight": 3.0 },
                    { "name": "surgical", "min_amount": 1500.0, "max_amount": 6000.0, "weight": 1.0 }
                ]
            },
            "patterns": [{
                "id": "mri-prior-auth",
                "name": "MRI without prior auth",
                "category": "prior_authorization",
                "tier": "high",
                "procedure_codes": ["73721"],
                "policy_ids": ["AETNA-PA-ECHO"],
                "denial_reason": "Prior authorization required",
                "trajectory": {
                    "shape": "gradual_improvement",
                    "baseline": { "period": { "start": "2024-01-01", "end": "2024-01-31" }, "denial_rate": 25.0 },
                    "current": { "period": { "start": "2024-06-01", "end": "2024-06-30" }, "denial_rate": 10.0 },
                    "monthly": [
                        { "month": "2024-02", "denial_rate": 22.0 },
                        { "month": "2024-04", "denial_rate": 16.0 }
                    ]
                }
            }],
            "appeals": { "rate": 0.3 },
            "target_metrics": { "total_line_items": 300, "overall_denial_rate": 4.0 }
        })
    }

    fn scenario(value: Value) -> ScenarioDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn validate(value: Value) -> ValidationReport {
        JsonScenarioValidator::new().unwrap().validate(&scenario(value), &policies())
    }

    fn rule_ids(report: &ValidationReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.rule_id.as_str()).collect()
    }

    #[test]
    fn well_formed_scenario_passes_cleanly() {
        let report = validate(doc());
        assert!(report.passed(), "{:?}", report.issues);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
    }

    #[test]
    fn inverted_timeline_is_an_error() {
        let mut d = doc();
        d["timeline"]["end_date"] = json!("2023-12-31");
        let report = validate(d);
        assert!(!report.passed());
        assert!(rule_ids(&report).contains(&"timeline-order"));
    }

    #[test]
    fn same_day_timeline_is_rejected() {
        let mut d = doc();
        d["timeline"]["end_date"] = json!("2024-01-01");
        assert!(rule_ids(&validate(d)).contains(&"timeline-order"));
    }

    #[test]
    fn unresolved_policy_is_reported_with_path() {
        let mut d = doc();
        d["patterns"][0]["policy_ids"] = json!(["AETNA-PA-ECHO", "NOPE-1"]);
        let report = validate(d);
        let issue = report.errors().find(|i| i.rule_id == "pattern-policy").unwrap();
        assert_eq!(issue.path, "patterns[0].policy_ids[1]");
        assert!(issue.message.contains("NOPE-1"));
    }

    #[test]
    fn every_defect_is_collected_in_one_pass() {
        let mut d = doc();
        d["timeline"]["end_date"] = json!("2023-06-30");
        d["volume"]["value_tiers"][1]["min_amount"] = json!(7000.0);
        d["volume"]["lines_per_claim"] = json!({ "min": 3, "max": 2 });
        d["patterns"][0]["policy_ids"] = json!(["MISSING"]);
        d["appeals"]["rate"] = json!(1.5);

        let report = validate(d);
        let ids = rule_ids(&report);
        for expected in ["timeline-order", "value-tiers", "lines-per-claim", "pattern-policy", "appeal-rate"] {
            assert!(ids.contains(&expected), "missing {expected} in {ids:?}");
        }
    }

    #[test]
    fn declared_line_items_must_be_reachable() {
        let mut d = doc();
        d["target_metrics"]["total_line_items"] = json!(1000);
        let report = validate(d);
        let issue = report.errors().find(|i| i.rule_id == "total-line-items").unwrap();
        assert!(issue.message.contains("120..=480"));

        let mut d = doc();
        d["target_metrics"]["total_line_items"] = json!(100);
        assert!(rule_ids(&validate(d)).contains(&"total-line-items"));

        let mut d = doc();
        d["target_metrics"]["total_line_items"] = json!(480);
        assert!(validate(d).passed());
    }

    #[test]
    fn multiplier_count_must_fit_the_timeline() {
        let mut d = doc();
        d["volume"]["monthly_multipliers"] = json!([1.0, 2.0]);
        assert!(rule_ids(&validate(d)).contains(&"monthly-multipliers"));

        let mut d = doc();
        d["volume"]["monthly_multipliers"] = json!(vec![1.0; 12]);
        assert!(validate(d).passed());
    }

    #[test]
    fn negative_weight_fails_both_phases() {
        let mut d = doc();
        d["practice"]["providers"][0]["claim_weight"] = json!(-1.0);
        let report = validate(d);
        let ids = rule_ids(&report);
        assert!(ids.contains(&"json-schema"));
        assert!(ids.contains(&"provider-weights"));
        let structural = report.issues.iter().find(|i| i.rule_id == "json-schema").unwrap();
        assert_eq!(structural.path, "practice.providers[0].claim_weight");
    }

    #[test]
    fn duplicate_pattern_ids_are_rejected() {
        let mut d = doc();
        let copy = d["patterns"][0].clone();
        d["patterns"].as_array_mut().unwrap().push(copy);
        let report = validate(d);
        let issue = report.errors().find(|i| i.rule_id == "pattern-id-unique").unwrap();
        assert_eq!(issue.path, "patterns[1].id");
    }

    #[test]
    fn improving_shape_cannot_rise() {
        let mut d = doc();
        d["patterns"][0]["trajectory"]["current"]["denial_rate"] = json!(40.0);
        assert!(rule_ids(&validate(d)).contains(&"trajectory-direction"));
    }

    #[test]
    fn flat_shape_requires_a_narrow_band() {
        let mut d = doc();
        d["patterns"][0]["trajectory"]["shape"] = json!("flat");
        d["patterns"][0]["trajectory"]["monthly"] = json!([]);
        let report = validate(d.clone());
        assert!(rule_ids(&report).contains(&"trajectory-shape"));

        d["patterns"][0]["trajectory"]["current"]["denial_rate"] = json!(24.0);
        assert!(validate(d).passed());
    }

    #[test]
    fn out_of_range_rates_are_errors() {
        let mut d = doc();
        d["patterns"][0]["trajectory"]["baseline"]["denial_rate"] = json!(120.0);
        let report = validate(d);
        let issue = report.errors().find(|i| i.rule_id == "pattern-rate").unwrap();
        assert_eq!(issue.path, "patterns[0].trajectory.baseline.denial_rate");
    }

    #[test]
    fn snapshots_outside_window_are_errors() {
        let mut d = doc();
        d["patterns"][0]["trajectory"]["monthly"] = json!([{ "month": "2024-09", "denial_rate": 10.0 }]);
        assert!(rule_ids(&validate(d)).contains(&"monthly-window"));
    }

    #[test]
    fn rising_snapshots_on_gradual_curve_warn_only() {
        let mut d = doc();
        d["patterns"][0]["trajectory"]["monthly"] = json!([
            { "month": "2024-02", "denial_rate": 12.0 },
            { "month": "2024-03", "denial_rate": 20.0 }
        ]);
        let report = validate(d);
        assert!(report.passed());
        let warning = report.warnings().find(|i| i.rule_id == "trajectory-shape").unwrap();
        assert_eq!(warning.severity, Severity::Warning);
    }

    #[test]
    fn unbilled_codes_warn_without_failing() {
        let mut d = doc();
        d["patterns"][0]["procedure_codes"] = json!(["00000"]);
        let report = validate(d);
        assert!(report.passed());
        assert!(report.warnings().any(|i| i.rule_id == "pattern-codes-reachable"));
    }

    #[test]
    fn unknown_specialty_without_codes_is_an_error() {
        let mut d = doc();
        d["practice"]["providers"][1]["specialty"] = json!("astrology");
        let report = validate(d);
        assert!(!report.passed());
        let e = report.errors().find(|i| i.rule_id == "provider-codes").unwrap();
        assert_eq!(e.path, "practice.providers[1]");
    }

    #[test]
    fn zero_weight_provider_without_codes_still_fails() {
        let mut d = doc();
        d["practice"]["providers"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "id": "dr-x", "name": "Dr X", "specialty": "astrology", "claim_weight": 0.0 }));
        let report = validate(d);
        assert!(!report.passed());
        let e = report.errors().find(|i| i.rule_id == "provider-codes").unwrap();
        assert_eq!(e.path, "practice.providers[2]");
        assert!(e.message.contains("dr-x"));
    }

    #[test]
    fn explicit_codes_rescue_an_unknown_specialty() {
        let mut d = doc();
        d["practice"]["providers"][1]["specialty"] = json!("astrology");
        d["practice"]["providers"][1]["procedure_codes"] = json!(["73721"]);
        let report = validate(d);
        assert!(report.passed(), "{:?}", report.issues);
        assert!(!rule_ids(&report).contains(&"provider-codes"));
    }

    #[test]
    fn override_probabilities_must_sum_to_one() {
        let mut d = doc();
        d["appeals"]["outcome_overrides"] = json!([
            { "category": "prior_authorization", "overturned": 0.5, "upheld": 0.3, "pending": 0.1 }
        ]);
        assert!(rule_ids(&validate(d)).contains(&"outcome-override"));
    }

    #[test]
    fn custom_rules_run_after_builtins() {
        let mut v = JsonScenarioValidator::new().unwrap();
        v.register_rule(
            "max-claims",
            Box::new(|s: &ScenarioDefinition| {
                (s.volume.total_claims > 100).then(|| "too many claims for a smoke test".to_string())
            }),
        );
        let report = v.validate(&scenario(doc()), &policies());
        assert!(!report.passed());
        assert_eq!(report.issues.last().unwrap().rule_id, "max-claims");
    }

    #[test]
    fn null_schema_skips_structural_phase() {
        let mut d = doc();
        d["practice"]["providers"][0]["claim_weight"] = json!(-1.0);
        let report = JsonScenarioValidator::with_schema(Value::Null).validate(&scenario(d), &policies());
        assert!(!rule_ids(&report).contains(&"json-schema"));
        assert!(rule_ids(&report).contains(&"provider-weights"));
    }
}
