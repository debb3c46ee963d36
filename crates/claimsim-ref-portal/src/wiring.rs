//! Assembles the engine from the reference collaborators.

use std::sync::Arc;

use tracing::debug;

use claimsim_contracts::{
    config::LiveDefaults, error::SimResult, live::GenerationConfig, scenario::ScenarioDefinition,
};
use claimsim_core::{traits::ClaimSink, BulkRunner, ScenarioPipeline};
use claimsim_live::GenerationManager;
use claimsim_verify::JsonScenarioValidator;

use crate::builtin::policy_library;

/// A pipeline over `sink`, the reference policy library, and the schema
/// plus rule validator.
pub fn pipeline(sink: Arc<dyn ClaimSink>) -> SimResult<ScenarioPipeline> {
    let library = policy_library()?;
    debug!(policies = library.len(), "reference policy library loaded");
    Ok(ScenarioPipeline::new(
        Box::new(sink),
        Box::new(library),
        Box::new(JsonScenarioValidator::new()?),
    ))
}

pub fn bulk_runner(sink: Arc<dyn ClaimSink>) -> SimResult<BulkRunner> {
    Ok(BulkRunner::new(pipeline(sink)?))
}

/// A live configuration for `scenario` with the tunables from `defaults`.
pub fn live_config(scenario: &ScenarioDefinition, defaults: &LiveDefaults) -> GenerationConfig {
    GenerationConfig {
        tick_interval_ms: defaults.tick_interval_ms,
        event_rate: defaults.event_rate,
        max_consecutive_failures: defaults.max_consecutive_failures,
        ..GenerationConfig::from_scenario(scenario, defaults.claims_per_day, defaults.speed)
    }
}

/// A generation manager that attaches reference fix guidance to denials.
pub fn live_manager(sink: Arc<dyn ClaimSink>) -> SimResult<GenerationManager> {
    Ok(GenerationManager::with_resolver(sink, Arc::new(policy_library()?)))
}
