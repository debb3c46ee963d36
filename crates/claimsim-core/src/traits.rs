//! Collaborator traits for the generation engine.
//!
//! The pipeline and the generation manager are wired through three seams:
//!
//! - `ClaimSink`: persistence (database, file, or in-memory store)
//! - `PolicyResolver`: payer policy library lookups
//! - `ScenarioValidator`: structural and semantic scenario checks
//!
//! The engine never reaches a concrete store or policy file directly, so
//! every component can be driven by in-memory fakes in tests.

use std::sync::Arc;

use claimsim_contracts::{
    entity::{GeneratedBatch, InsertReport},
    error::SimResult,
    policy::PolicyReference,
    report::ValidationReport,
    scenario::ScenarioDefinition,
};

/// Receives generated batches.
///
/// A batch is the unit of commit: the pipeline hands over one batch per
/// scenario month and the manager one per tick. Implementations report
/// per-entity rejections in the returned `InsertReport` instead of failing
/// the whole batch; an `Err` means nothing from the batch can be trusted
/// to have been written.
pub trait ClaimSink: Send + Sync {
    fn insert_batch(&self, batch: &GeneratedBatch) -> SimResult<InsertReport>;
}

/// Looks up payer policy references by id.
///
/// Implementations are read-only and must be cheap; the validator calls
/// `resolve()` once per referenced policy id.
pub trait PolicyResolver: Send + Sync {
    fn resolve(&self, policy_id: &str) -> Option<PolicyReference>;
}

/// Checks a scenario before any generation starts.
///
/// Implementations collect every issue in one pass rather than stopping at
/// the first. Policy references are checked through `resolver`.
pub trait ScenarioValidator: Send + Sync {
    fn validate(
        &self,
        scenario: &ScenarioDefinition,
        resolver: &dyn PolicyResolver,
    ) -> ValidationReport;
}

impl<T: ClaimSink + ?Sized> ClaimSink for Arc<T> {
    fn insert_batch(&self, batch: &GeneratedBatch) -> SimResult<InsertReport> {
        (**self).insert_batch(batch)
    }
}

impl<T: PolicyResolver + ?Sized> PolicyResolver for Arc<T> {
    fn resolve(&self, policy_id: &str) -> Option<PolicyReference> {
        (**self).resolve(policy_id)
    }
}
