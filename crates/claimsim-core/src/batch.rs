//! Batch generation shared by the scenario pipeline and the live manager.
//!
//! A `BatchContext` holds everything about a practice that stays fixed
//! across batches (provider code pools, tier and payer weights, appeal
//! table). Each `BatchRequest` then asks for a number of claims over a date
//! window with a set of pattern targets, and gets back one
//! `GeneratedBatch` with its claims, appeals, and learning events.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

use claimsim_contracts::{
    calendar::YearMonth,
    entity::GeneratedBatch,
    error::{SimError, SimResult},
    ids::{BatchId, ClaimId},
    live::{BatchStats, GenerationConfig},
    report::{MonthSummary, PatternBatchStats, Shortfall},
    scenario::{CountRange, Practice, ScenarioDefinition, ValueTier},
};

use crate::{
    catalog::{ProviderProfile, DEFAULT_PAYERS},
    curves::distribute_counts,
    injector::{inject, PatternTarget},
    synth::{
        synthesize_appeal, synthesize_claim, synthesize_events, AppealOutcomeTable, ClaimRequest,
        EventMix, EventRequest,
    },
};

/// How many learning events each pattern receives in a batch.
#[derive(Debug, Clone)]
pub enum EventQuota {
    /// Exact counts by pattern id. Patterns not listed get none.
    Fixed(HashMap<String, u32>),
    /// Each denied claim yields one event with this probability.
    PerDenial(f64),
}

#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub label: String,
    pub claims: u32,
    /// Inclusive service-date window.
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub targets: Vec<PatternTarget<'a>>,
    pub events: EventQuota,
}

#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub batch: GeneratedBatch,
    pub patterns: Vec<PatternBatchStats>,
    pub shortfalls: Vec<Shortfall>,
}

impl BatchOutput {
    pub fn denied_count(&self) -> u32 {
        self.batch.claims.iter().filter(|c| c.is_denied()).count() as u32
    }

    pub fn billed_cents(&self) -> i64 {
        self.batch.claims.iter().map(|c| c.billed_cents).sum()
    }

    pub fn denied_cents(&self) -> i64 {
        self.batch
            .claims
            .iter()
            .filter(|c| c.is_denied())
            .map(|c| c.billed_cents)
            .sum()
    }

    pub fn stats(&self) -> BatchStats {
        BatchStats {
            claims: self.batch.claims.len() as u32,
            line_items: self.batch.line_count() as u32,
            denied: self.denied_count(),
            appeals: self.batch.appeals.len() as u32,
            events: self.batch.events.len() as u32,
            billed_cents: self.billed_cents(),
            shortfalls: self.shortfalls.clone(),
            ..BatchStats::default()
        }
    }

    pub fn month_summary(&self, month: Option<YearMonth>) -> MonthSummary {
        MonthSummary {
            month,
            claims: self.batch.claims.len() as u32,
            line_items: self.batch.line_count() as u32,
            denied: self.denied_count(),
            appeals: self.batch.appeals.len() as u32,
            events: self.batch.events.len() as u32,
            billed_cents: self.billed_cents(),
            denied_cents: self.denied_cents(),
            patterns: self.patterns.clone(),
        }
    }
}

/// Practice-level state reused across every batch of a run.
#[derive(Debug, Clone)]
pub struct BatchContext {
    practice_id: String,
    profiles: Vec<ProviderProfile>,
    provider_weights: Vec<f64>,
    tiers: Vec<ValueTier>,
    tier_index: WeightedIndex<f64>,
    payers: Vec<String>,
    payer_index: WeightedIndex<f64>,
    lines: CountRange,
    appeal_rate: f64,
    outcomes: AppealOutcomeTable,
    events: EventMix,
    next_claim: u64,
}

impl BatchContext {
    pub fn new(
        practice: &Practice,
        lines: CountRange,
        tiers: &[ValueTier],
        appeal_rate: f64,
        outcomes: AppealOutcomeTable,
        events: EventMix,
    ) -> SimResult<Self> {
        if practice.providers.is_empty() {
            return Err(SimError::invalid(format!(
                "practice '{}' has no providers",
                practice.id
            )));
        }
        if !appeal_rate.is_finite() || !(0.0..=1.0).contains(&appeal_rate) {
            return Err(SimError::invalid(format!(
                "appeal rate must be within [0, 1], got {}",
                appeal_rate
            )));
        }

        let profiles = practice
            .providers
            .iter()
            .map(ProviderProfile::resolve)
            .collect::<SimResult<Vec<_>>>()?;
        let provider_weights = practice.providers.iter().map(|p| p.claim_weight).collect();

        let tier_index = WeightedIndex::new(tiers.iter().map(|t| t.weight))
            .map_err(|e| SimError::invalid(format!("value tier weights: {}", e)))?;

        let (payers, payer_weights): (Vec<String>, Vec<f64>) = if practice.payer_mix.is_empty() {
            DEFAULT_PAYERS
                .iter()
                .map(|(name, w)| (name.to_string(), *w))
                .unzip()
        } else {
            practice
                .payer_mix
                .iter()
                .map(|p| (p.name.clone(), p.weight))
                .unzip()
        };
        let payer_index = WeightedIndex::new(payer_weights)
            .map_err(|e| SimError::invalid(format!("payer mix weights: {}", e)))?;

        Ok(Self {
            practice_id: practice.id.clone(),
            profiles,
            provider_weights,
            tiers: tiers.to_vec(),
            tier_index,
            payers,
            payer_index,
            lines,
            appeal_rate,
            outcomes,
            events,
            next_claim: 0,
        })
    }

    pub fn from_scenario(scenario: &ScenarioDefinition) -> SimResult<Self> {
        Self::new(
            &scenario.practice,
            scenario.volume.lines_per_claim,
            &scenario.volume.value_tiers,
            scenario.appeals.rate,
            AppealOutcomeTable::with_overrides(&scenario.appeals.outcome_overrides)?,
            EventMix {
                weights: scenario.learning_events.kind_weights,
                users: scenario.learning_events.users.clone(),
            },
        )
    }

    pub fn from_config(config: &GenerationConfig) -> SimResult<Self> {
        Self::new(
            &config.practice,
            config.lines_per_claim,
            &config.value_tiers,
            config.appeal_rate,
            AppealOutcomeTable::default(),
            EventMix {
                weights: config.event_weights,
                users: config.users.clone(),
            },
        )
    }

    /// Claims generated so far through this context.
    pub fn claims_issued(&self) -> u64 {
        self.next_claim
    }

    pub fn generate<R: Rng + ?Sized>(
        &mut self,
        request: &BatchRequest<'_>,
        rng: &mut R,
    ) -> SimResult<BatchOutput> {
        if request.to < request.from {
            return Err(SimError::invalid(format!(
                "batch '{}' has an empty date window {}..{}",
                request.label, request.from, request.to
            )));
        }
        if let EventQuota::PerDenial(p) = request.events {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(SimError::invalid(format!(
                    "event rate must be within [0, 1], got {}",
                    p
                )));
            }
        }

        let per_provider = distribute_counts(request.claims, &self.provider_weights)?;
        let span_days = (request.to - request.from).num_days();

        let mut claims = Vec::with_capacity(request.claims as usize);
        for (profile, count) in self.profiles.iter().zip(per_provider) {
            for _ in 0..count {
                self.next_claim += 1;
                let claim_request = ClaimRequest {
                    practice_id: &self.practice_id,
                    claim_number: format!("CLM-{:07}", self.next_claim),
                    service_date: request.from + Duration::days(rng.gen_range(0..=span_days)),
                    tier: &self.tiers[self.tier_index.sample(rng)],
                    lines: self.lines,
                    payer: &self.payers[self.payer_index.sample(rng)],
                };
                claims.push(synthesize_claim(profile, &claim_request, rng)?);
            }
        }
        claims.sort_by_key(|c| c.service_date);

        let injection = inject(&mut claims, &request.targets, rng)?;

        let mut appeals = Vec::new();
        for &i in &injection.denied {
            if let Some(appeal) = synthesize_appeal(&claims[i], self.appeal_rate, &self.outcomes, rng)? {
                appeals.push(appeal);
            }
        }

        let mut denied_by_pattern: HashMap<&str, Vec<ClaimId>> = HashMap::new();
        for claim in &claims {
            if let Some(denial) = &claim.denial {
                denied_by_pattern
                    .entry(denial.pattern_id.as_str())
                    .or_default()
                    .push(claim.id);
            }
        }

        let mut events = Vec::new();
        for target in &request.targets {
            let pattern = target.pattern;
            let denied = denied_by_pattern
                .get(pattern.id.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let count = match &request.events {
                EventQuota::Fixed(counts) => counts.get(&pattern.id).copied().unwrap_or(0),
                EventQuota::PerDenial(p) => denied.iter().filter(|_| rng.gen_bool(*p)).count() as u32,
            };
            events.extend(synthesize_events(
                &EventRequest {
                    pattern,
                    count,
                    from: request.from,
                    to: request.to,
                    denied_claims: denied,
                },
                &self.events,
                rng,
            )?);
        }
        events.sort_by_key(|e| e.occurred_on);

        Ok(BatchOutput {
            batch: GeneratedBatch {
                id: BatchId::new(),
                label: request.label.clone(),
                claims,
                appeals,
                events,
            },
            patterns: injection.stats,
            shortfalls: injection.shortfalls,
        })
    }
}
