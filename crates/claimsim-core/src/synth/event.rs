//! Learning-event synthesis.
//!
//! Events record practice staff engaging with a denial pattern in the
//! learning portal. Dates concentrate around the pattern's engagement
//! cluster dates when any fall inside the requested window.

use chrono::{Duration, NaiveDate};
use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::SliceRandom,
    Rng,
};

use claimsim_contracts::{
    entity::LearningEvent,
    error::{SimError, SimResult},
    ids::{ClaimId, EventId},
    scenario::{EventKindWeights, PatternDefinition},
};

/// How far an event may land from its cluster date.
const CLUSTER_JITTER_DAYS: i64 = 2;

/// Attributed when a scenario names no portal users.
pub const DEFAULT_USER: &str = "practice-admin";

/// Scenario-wide knobs shared by every event request.
#[derive(Debug, Clone, Default)]
pub struct EventMix {
    pub weights: EventKindWeights,
    pub users: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EventRequest<'a> {
    pub pattern: &'a PatternDefinition,
    pub count: u32,
    /// Inclusive date window events must fall in.
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Denied claims of this pattern that claim-level events may point at.
    pub denied_claims: &'a [ClaimId],
}

/// Produce `request.count` events for one pattern, sorted by date.
pub fn synthesize_events<R: Rng + ?Sized>(
    request: &EventRequest<'_>,
    mix: &EventMix,
    rng: &mut R,
) -> SimResult<Vec<LearningEvent>> {
    if request.count == 0 {
        return Ok(vec![]);
    }
    if request.to < request.from {
        return Err(SimError::invalid(format!(
            "event window {}..{} is empty",
            request.from, request.to
        )));
    }

    let entries = mix.weights.entries();
    let kinds = WeightedIndex::new(entries.iter().map(|(_, w)| *w))
        .map_err(|e| SimError::invalid(format!("learning event kind weights: {}", e)))?;

    let clusters: Vec<NaiveDate> = request
        .pattern
        .engagement
        .cluster_dates()
        .into_iter()
        .filter(|d| *d >= request.from && *d <= request.to)
        .collect();
    let span_days = (request.to - request.from).num_days();

    let mut events = Vec::with_capacity(request.count as usize);
    for _ in 0..request.count {
        let kind = entries[kinds.sample(rng)].0;

        let occurred_on = match clusters.choose(rng) {
            Some(center) => {
                let jitter = rng.gen_range(-CLUSTER_JITTER_DAYS..=CLUSTER_JITTER_DAYS);
                (*center + Duration::days(jitter)).clamp(request.from, request.to)
            }
            None => request.from + Duration::days(rng.gen_range(0..=span_days)),
        };

        let user_id = mix
            .users
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let claim_id = if kind.references_claim() {
            request.denied_claims.choose(rng).copied()
        } else {
            None
        };

        events.push(LearningEvent {
            id: EventId::new(),
            pattern_id: request.pattern.id.clone(),
            kind,
            occurred_on,
            user_id,
            claim_id,
        });
    }
    events.sort_by_key(|e| e.occurred_on);
    Ok(events)
}
