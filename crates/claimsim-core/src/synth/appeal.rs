//! Appeal synthesis for denied claims.
//!
//! Whether a denial is appealed is a Bernoulli draw at the scenario's
//! appeal rate. The outcome follows a per-category probability table: the
//! built-in defaults reflect how often each kind of denial is typically
//! overturned, and scenarios may override individual categories.

use std::collections::HashMap;

use chrono::Duration;
use rand::Rng;

use claimsim_contracts::{
    entity::{AppealOutcome, GeneratedAppeal, GeneratedClaim},
    error::{SimError, SimResult},
    ids::AppealId,
    scenario::{DenialCategory, OutcomeOverride, OutcomeProbabilities},
};

/// Days from denial to appeal filing.
const FILING_LAG_DAYS: (i64, i64) = (5, 45);
/// Days from filing to a decision.
const DECISION_LAG_DAYS: (i64, i64) = (15, 60);

fn probabilities(overturned: f64, upheld: f64, pending: f64) -> OutcomeProbabilities {
    OutcomeProbabilities { overturned, upheld, pending }
}

fn default_probabilities(category: DenialCategory) -> OutcomeProbabilities {
    match category {
        DenialCategory::MissingModifier => probabilities(0.75, 0.15, 0.10),
        DenialCategory::CodingError => probabilities(0.60, 0.28, 0.12),
        DenialCategory::Documentation => probabilities(0.55, 0.30, 0.15),
        DenialCategory::MedicalNecessity => probabilities(0.40, 0.45, 0.15),
        DenialCategory::PriorAuthorization => probabilities(0.35, 0.50, 0.15),
        DenialCategory::Bundling => probabilities(0.45, 0.42, 0.13),
        DenialCategory::Eligibility => probabilities(0.20, 0.70, 0.10),
        DenialCategory::TimelyFiling => probabilities(0.10, 0.82, 0.08),
        DenialCategory::Duplicate => probabilities(0.05, 0.90, 0.05),
        DenialCategory::NonCoveredService => probabilities(0.08, 0.84, 0.08),
        DenialCategory::Other => probabilities(0.30, 0.55, 0.15),
    }
}

/// Outcome probabilities by denial category.
#[derive(Debug, Clone)]
pub struct AppealOutcomeTable {
    entries: HashMap<DenialCategory, OutcomeProbabilities>,
}

impl Default for AppealOutcomeTable {
    fn default() -> Self {
        let entries = DenialCategory::ALL
            .iter()
            .map(|c| (*c, default_probabilities(*c)))
            .collect();
        Self { entries }
    }
}

impl AppealOutcomeTable {
    /// The built-in table with `overrides` replacing their categories.
    ///
    /// Override sums must be positive and finite; they are normalized when
    /// drawing, so `0.6/0.3/0.1` and `6/3/1` behave the same.
    pub fn with_overrides(overrides: &[OutcomeOverride]) -> SimResult<Self> {
        let mut table = Self::default();
        for o in overrides {
            let p = &o.probabilities;
            let valid = [p.overturned, p.upheld, p.pending]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0);
            if !valid || p.total() <= 0.0 {
                return Err(SimError::invalid(format!(
                    "outcome override for {:?} must be non-negative with a positive sum",
                    o.category
                )));
            }
            table.entries.insert(o.category, *p);
        }
        Ok(table)
    }

    pub fn probabilities(&self, category: DenialCategory) -> OutcomeProbabilities {
        self.entries
            .get(&category)
            .copied()
            .unwrap_or_else(|| default_probabilities(category))
    }

    pub fn draw<R: Rng + ?Sized>(&self, category: DenialCategory, rng: &mut R) -> AppealOutcome {
        let p = self.probabilities(category);
        let roll = rng.gen::<f64>() * p.total();
        if roll < p.overturned {
            AppealOutcome::Overturned
        } else if roll < p.overturned + p.upheld {
            AppealOutcome::Upheld
        } else {
            AppealOutcome::Pending
        }
    }
}

/// Decide whether `claim` is appealed and, if so, synthesize the appeal.
///
/// Returns `Ok(None)` when the draw at `appeal_rate` says no appeal.
/// `claim` must be denied; `appeal_rate` must lie in `[0, 1]`.
pub fn synthesize_appeal<R: Rng + ?Sized>(
    claim: &GeneratedClaim,
    appeal_rate: f64,
    table: &AppealOutcomeTable,
    rng: &mut R,
) -> SimResult<Option<GeneratedAppeal>> {
    if !appeal_rate.is_finite() || !(0.0..=1.0).contains(&appeal_rate) {
        return Err(SimError::invalid(format!(
            "appeal rate must be within [0, 1], got {}",
            appeal_rate
        )));
    }
    let denial = match (&claim.denial, claim.is_denied()) {
        (Some(denial), true) => denial,
        _ => {
            return Err(SimError::invalid(format!(
                "claim {} is not denied and cannot be appealed",
                claim.claim_number
            )))
        }
    };

    if !rng.gen_bool(appeal_rate) {
        return Ok(None);
    }

    let outcome = table.draw(denial.category, rng);
    let filed_date =
        denial.denied_date + Duration::days(rng.gen_range(FILING_LAG_DAYS.0..=FILING_LAG_DAYS.1));
    let outcome_date = match outcome {
        AppealOutcome::Pending => None,
        _ => Some(
            filed_date + Duration::days(rng.gen_range(DECISION_LAG_DAYS.0..=DECISION_LAG_DAYS.1)),
        ),
    };
    let recovered_cents = match outcome {
        AppealOutcome::Overturned => claim.billed_cents,
        _ => 0,
    };

    Ok(Some(GeneratedAppeal {
        id: AppealId::new(),
        claim_id: claim.id,
        pattern_id: denial.pattern_id.clone(),
        category: denial.category,
        filed_date,
        outcome,
        outcome_date,
        recovered_cents,
    }))
}
