//! In-memory implementation of `ClaimSink`.
//!
//! `InMemoryClaimStore` keeps every accepted entity behind an
//! `Arc<Mutex<_>>`, so clones share one store: hand one clone to a pipeline
//! or generation manager and keep another to inspect what was committed.
//!
//! Commits are idempotent per batch content. Re-submitting a batch that was
//! already accepted inserts nothing and reports `duplicate_batch`. Within a
//! new batch, entities that collide with stored ones are refused one by one
//! and the rest of the batch is still accepted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use claimsim_contracts::{
    entity::{
        EntityFailure, EntityKind, GeneratedAppeal, GeneratedBatch, GeneratedClaim, InsertCounts,
        InsertReport, LearningEvent,
    },
    error::{SimError, SimResult},
    ids::{AppealId, ClaimId, EventId},
};
use claimsim_core::traits::ClaimSink;

use crate::fingerprint::batch_fingerprint;

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) claims: Vec<GeneratedClaim>,
    pub(crate) appeals: Vec<GeneratedAppeal>,
    pub(crate) events: Vec<LearningEvent>,
    claim_ids: HashSet<ClaimId>,
    appeal_ids: HashSet<AppealId>,
    event_ids: HashSet<EventId>,
    /// Fingerprints of every accepted batch.
    fingerprints: HashSet<String>,
    totals: InsertCounts,
}

/// A shared, idempotent in-memory claim store.
#[derive(Clone, Default)]
pub struct InMemoryClaimStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SimResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|e| SimError::Persistence {
            reason: format!("claim store lock poisoned: {e}"),
        })
    }

    pub fn claims(&self) -> SimResult<Vec<GeneratedClaim>> {
        Ok(self.lock()?.claims.clone())
    }

    pub fn appeals(&self) -> SimResult<Vec<GeneratedAppeal>> {
        Ok(self.lock()?.appeals.clone())
    }

    pub fn events(&self) -> SimResult<Vec<LearningEvent>> {
        Ok(self.lock()?.events.clone())
    }

    /// Number of distinct batches accepted.
    pub fn batch_count(&self) -> SimResult<usize> {
        Ok(self.lock()?.fingerprints.len())
    }

    /// Entity counts across every accepted batch.
    pub fn totals(&self) -> SimResult<InsertCounts> {
        Ok(self.lock()?.totals.clone())
    }

    /// Drop everything, including remembered batch fingerprints.
    pub fn clear(&self) -> SimResult<()> {
        *self.lock()? = StoreState::default();
        info!("claim store cleared");
        Ok(())
    }
}

impl ClaimSink for InMemoryClaimStore {
    fn insert_batch(&self, batch: &GeneratedBatch) -> SimResult<InsertReport> {
        let fingerprint = batch_fingerprint(batch)?;
        let mut state = self.lock()?;
        let mut report = InsertReport::default();

        if state.fingerprints.contains(&fingerprint) {
            info!(batch_id = %batch.id, label = %batch.label, "batch already committed; skipping retry");
            report.duplicate_batch = true;
            return Ok(report);
        }

        for claim in &batch.claims {
            if !state.claim_ids.insert(claim.id) {
                report.failures.push(EntityFailure {
                    kind: EntityKind::Claim,
                    id: claim.id.to_string(),
                    reason: "duplicate claim id".to_string(),
                });
                continue;
            }
            report.inserted.claims += 1;
            report.inserted.line_items += claim.lines.len() as u64;
            state.claims.push(claim.clone());
        }

        for appeal in &batch.appeals {
            let reason = if !state.claim_ids.contains(&appeal.claim_id) {
                Some(format!("appeal references unknown claim {}", appeal.claim_id))
            } else if !state.appeal_ids.insert(appeal.id) {
                Some("duplicate appeal id".to_string())
            } else {
                None
            };
            match reason {
                Some(reason) => report.failures.push(EntityFailure {
                    kind: EntityKind::Appeal,
                    id: appeal.id.to_string(),
                    reason,
                }),
                None => {
                    report.inserted.appeals += 1;
                    state.appeals.push(appeal.clone());
                }
            }
        }

        for event in &batch.events {
            let reason = match event.claim_id {
                Some(claim_id) if !state.claim_ids.contains(&claim_id) => {
                    Some(format!("event references unknown claim {claim_id}"))
                }
                _ if !state.event_ids.insert(event.id) => Some("duplicate event id".to_string()),
                _ => None,
            };
            match reason {
                Some(reason) => report.failures.push(EntityFailure {
                    kind: EntityKind::Event,
                    id: event.id.to_string(),
                    reason,
                }),
                None => {
                    report.inserted.events += 1;
                    state.events.push(event.clone());
                }
            }
        }

        state.fingerprints.insert(fingerprint);
        state.totals.add(&report.inserted);

        debug!(
            batch_id = %batch.id,
            label = %batch.label,
            claims = report.inserted.claims,
            appeals = report.inserted.appeals,
            events = report.inserted.events,
            failures = report.failures.len(),
            "batch committed"
        );
        Ok(report)
    }
}
