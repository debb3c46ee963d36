//! Bulk execution of many scenarios through one pipeline.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use claimsim_contracts::{
    config::RunOptions,
    error::SimError,
    report::{BulkFailure, BulkReport},
    scenario::ScenarioDefinition,
};

use crate::pipeline::ScenarioPipeline;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkOptions {
    /// Forwarded to every run.
    #[serde(default)]
    pub dry_run: bool,
    /// Keep going after a scenario fails. When false the first failure
    /// aborts the list and the rest are reported as skipped.
    #[serde(default)]
    pub continue_on_error: bool,
    /// Base options for each run. A fixed seed is offset by the scenario's
    /// position so runs in one batch do not share a stream.
    #[serde(default)]
    pub run: RunOptions,
}

impl BulkOptions {
    fn run_options(&self, index: usize) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            seed: self.run.seed.map(|s| s.wrapping_add(index as u64)),
            ..self.run.clone()
        }
    }
}

/// Runs a list of scenarios in order through a shared pipeline.
pub struct BulkRunner {
    pipeline: ScenarioPipeline,
}

impl BulkRunner {
    pub fn new(pipeline: ScenarioPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &ScenarioPipeline {
        &self.pipeline
    }

    /// Run every scenario in order. Never fails as a whole: per-scenario
    /// errors are collected in the report.
    pub fn run(&self, scenarios: &[ScenarioDefinition], options: &BulkOptions) -> BulkReport {
        let mut report = BulkReport::default();

        for (index, scenario) in scenarios.iter().enumerate() {
            match self.pipeline.run(scenario, &options.run_options(index)) {
                Ok(summary) => report.completed.push(summary),
                Err(e) => {
                    warn!(
                        index,
                        scenario_id = %scenario.id,
                        error = %e,
                        "bulk scenario failed"
                    );
                    let issues = match &e {
                        SimError::ScenarioInvalid { issues, .. } => issues.clone(),
                        _ => vec![],
                    };
                    report.failures.push(BulkFailure {
                        index,
                        scenario_id: scenario.id.clone(),
                        error: e.to_string(),
                        issues,
                    });
                    if !options.continue_on_error {
                        report.skipped = scenarios[index + 1..].iter().map(|s| s.id.clone()).collect();
                        break;
                    }
                }
            }
        }

        info!(
            total = scenarios.len(),
            completed = report.completed.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "bulk run finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scenario, IdPrefixValidator, MockSink, StaticPolicies};

    fn runner(sink: MockSink) -> BulkRunner {
        BulkRunner::new(ScenarioPipeline::new(
            Box::new(sink),
            Box::new(StaticPolicies::cardiology()),
            Box::new(IdPrefixValidator),
        ))
    }

    fn three() -> Vec<ScenarioDefinition> {
        vec![scenario("first"), scenario("invalid-second"), scenario("third")]
    }

    #[test]
    fn continue_on_error_runs_everything() {
        let sink = MockSink::new();
        let options = BulkOptions {
            dry_run: true,
            continue_on_error: true,
            run: RunOptions::seeded(1),
        };
        let report = runner(sink.clone()).run(&three(), &options);

        let done: Vec<&str> = report.completed.iter().map(|s| s.scenario_id.as_str()).collect();
        assert_eq!(done, vec!["first", "third"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].scenario_id, "invalid-second");
        assert_eq!(report.failures[0].issues.len(), 1);
        assert!(report.skipped.is_empty());
        assert!(!report.succeeded());
        assert!(sink.batches().is_empty());
    }

    #[test]
    fn stop_on_first_error_skips_the_rest() {
        let options = BulkOptions {
            dry_run: true,
            continue_on_error: false,
            run: RunOptions::seeded(1),
        };
        let report = runner(MockSink::new()).run(&three(), &options);

        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.skipped, vec!["third".to_string()]);
    }

    #[test]
    fn dry_run_flag_is_forwarded() {
        let sink = MockSink::new();
        let options = BulkOptions {
            dry_run: false,
            continue_on_error: true,
            run: RunOptions::seeded(2),
        };
        let report = runner(sink.clone()).run(&[scenario("only")], &options);
        assert!(report.succeeded());
        assert!(!report.completed[0].dry_run);
        assert_eq!(sink.batches().len(), 6);
    }

    #[test]
    fn seeds_are_offset_per_scenario() {
        let options = BulkOptions { run: RunOptions::seeded(10), ..BulkOptions::default() };
        assert_eq!(options.run_options(0).seed, Some(10));
        assert_eq!(options.run_options(2).seed, Some(12));
        assert_eq!(BulkOptions::default().run_options(3).seed, None);
    }
}
