//! # claimsim-ref-portal
//!
//! Reference wiring for a denial-management portal's demo data.
//!
//! Ships a payer policy library and three scenarios, each telling a
//! different story a portal user would recognise:
//!
//! 1. **Cardiology, modifier 25**: a critical pattern that collapses within
//!    a quarter of a staff training session, beside a stable bundling issue.
//! 2. **Orthopedics, prior authorization**: a year of gradual improvement
//!    with seasonal volume and a custom appeal outcome mix.
//! 3. **Family medicine, steady state**: a flat eligibility pattern and a
//!    slowly worsening timely filing problem.
//!
//! [`pipeline`], [`bulk_runner`], and [`live_manager`] assemble the engine
//! around any `ClaimSink` with the reference policy library and the
//! schema plus rule validator.

pub mod builtin;
pub mod wiring;

pub use builtin::{builtin_ids, builtin_scenario, builtin_scenarios, policy_library};
pub use wiring::{bulk_runner, live_config, live_manager, pipeline};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use claimsim_contracts::{
        config::{LiveDefaults, RunOptions},
        entity::ClaimStatus,
        error::SimError,
        report::PipelineState,
    };
    use claimsim_core::{traits::PolicyResolver, BulkOptions};
    use claimsim_store::InMemoryClaimStore;

    use super::*;

    #[test]
    fn policy_library_resolves_ids_and_aliases() {
        let library = policy_library().unwrap();
        assert_eq!(library.len(), 6);
        assert!(library.resolve("CMS-NCCI-25").is_some());
        assert_eq!(library.resolve("aetna-cpb-0236").unwrap().id, "AETNA-PA-MRI");
        assert!(library.resolve("CMS-UNKNOWN").is_none());
    }

    #[test]
    fn builtin_scenarios_validate_cleanly() {
        let pipeline = pipeline(Arc::new(InMemoryClaimStore::new())).unwrap();
        let scenarios = builtin_scenarios().unwrap();
        assert_eq!(scenarios.len(), 3);
        for scenario in &scenarios {
            let report = pipeline.validate(scenario);
            assert!(report.issues.is_empty(), "{}: {:?}", scenario.id, report.issues);
        }
    }

    #[test]
    fn builtin_ids_match_documents() {
        for id in builtin_ids() {
            assert_eq!(builtin_scenario(id).unwrap().id, id);
        }
    }

    #[test]
    fn unknown_builtin_lists_known_ids() {
        let err = builtin_scenario("dermatology").unwrap_err();
        assert!(matches!(err, SimError::InvalidInput { .. }));
        assert!(err.to_string().contains("orthopedics-prior-auth"));
    }

    #[test]
    fn seeded_dry_runs_repeat() {
        let store = InMemoryClaimStore::new();
        let pipeline = pipeline(Arc::new(store.clone())).unwrap();
        let scenario = builtin_scenario("family-medicine-steady").unwrap();
        let options = RunOptions { dry_run: true, ..RunOptions::seeded(99) };

        let a = pipeline.run(&scenario, &options).unwrap();
        let b = pipeline.run(&scenario, &options).unwrap();
        assert_eq!(a.totals, b.totals);
        assert_eq!(a.totals.claims, 900);
        assert_eq!(a.persisted.claims, 0);
        assert!(store.claims().unwrap().is_empty());
    }

    #[test]
    fn cardiology_run_lands_in_the_store() {
        let store = InMemoryClaimStore::new();
        let pipeline = pipeline(Arc::new(store.clone())).unwrap();
        let scenario = builtin_scenario("cardiology-modifier-25").unwrap();

        let summary = pipeline.run(&scenario, &RunOptions::seeded(7)).unwrap();
        assert_eq!(summary.final_state(), PipelineState::Completed);
        assert_eq!(summary.months.len(), 6);
        assert_eq!(summary.totals.claims, 1800);
        assert_eq!(summary.persisted.claims, 1800);
        assert_eq!(store.claims().unwrap().len(), 1800);

        let ekg = summary.pattern("ekg-missing-25").unwrap();
        assert!(ekg.first_month_rate.unwrap() > ekg.last_month_rate.unwrap());

        let claims = store.claims().unwrap();
        let denied = claims
            .iter()
            .filter(|c| c.status == ClaimStatus::Denied)
            .filter_map(|c| c.denial.as_ref())
            .find(|d| d.pattern_id == "ekg-missing-25")
            .unwrap();
        assert!(denied.guidance.as_deref().unwrap().contains("modifier 25"));
    }

    #[test]
    fn bulk_continues_past_a_broken_scenario() {
        let runner = bulk_runner(Arc::new(InMemoryClaimStore::new())).unwrap();
        let mut scenarios = builtin_scenarios().unwrap();
        let mut broken = scenarios[0].clone();
        broken.id = "no-providers".to_string();
        broken.practice.providers.clear();
        scenarios.insert(1, broken);

        let options = BulkOptions {
            dry_run: true,
            continue_on_error: true,
            run: RunOptions::seeded(3),
        };
        let report = runner.run(&scenarios, &options);
        assert_eq!(report.completed.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert!(report.failures[0].issues.iter().any(|i| i.rule_id == "providers-present"));
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn live_config_takes_scenario_shape_and_default_tunables() {
        let scenario = builtin_scenario("orthopedics-prior-auth").unwrap();
        let defaults = LiveDefaults {
            claims_per_day: 30,
            event_rate: 0.5,
            ..LiveDefaults::default()
        };
        let config = live_config(&scenario, &defaults);
        assert_eq!(config.claims_per_day, 30);
        assert_eq!(config.event_rate, 0.5);
        assert_eq!(config.practice.id, "summit-ortho");
        assert_eq!(config.patterns.len(), 2);
        assert_eq!(config.appeal_rate, 0.5);
    }

    #[test]
    fn live_manager_runs_a_single_day() {
        let store = InMemoryClaimStore::new();
        let manager = live_manager(Arc::new(store.clone())).unwrap();
        let scenario = builtin_scenario("cardiology-modifier-25").unwrap();
        let mut config = live_config(&scenario, &LiveDefaults::default());
        config.seed = Some(5);

        let stats = manager.run_single_batch(&config).unwrap();
        assert_eq!(stats.claims, LiveDefaults::default().claims_per_day);
        assert_eq!(store.claims().unwrap().len() as u32, stats.claims);
    }
}
