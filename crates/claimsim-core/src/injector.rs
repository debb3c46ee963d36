//! Pattern injection.
//!
//! Turns paid claims into denied ones so each active pattern hits its
//! target rate for the batch. The denominator for a pattern is its eligible
//! base: the claims carrying at least one of its procedure codes. Patterns
//! are applied in descending tier severity, then by id, and a claim is
//! never denied by more than one pattern. When a higher-severity pattern
//! has already consumed the shared claims, the later pattern falls short
//! and the deficit is reported, never backfilled.

use chrono::Duration;
use rand::{seq::index, Rng};
use tracing::debug;

use claimsim_contracts::{
    entity::{ClaimDenial, ClaimStatus, GeneratedClaim, LineDenial},
    error::SimResult,
    report::{PatternBatchStats, Shortfall},
    scenario::PatternDefinition,
};

use crate::{curves::distribute_denied, traits::PolicyResolver};

/// Days from submission to the payer's denial.
const DENIAL_LAG_DAYS: (i64, i64) = (14, 30);

/// One pattern's target for the batch being injected.
#[derive(Debug, Clone)]
pub struct PatternTarget<'a> {
    pub pattern: &'a PatternDefinition,
    /// Target denial rate over the eligible base, percent.
    pub rate: f64,
    /// Fix guidance resolved from the pattern's policy references.
    pub guidance: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InjectionOutcome {
    /// One entry per target, in application order.
    pub stats: Vec<PatternBatchStats>,
    pub shortfalls: Vec<Shortfall>,
    /// Indexes into the claim slice of every claim denied by this call.
    pub denied: Vec<usize>,
}

/// Guidance for a pattern's denials: the first referenced policy that
/// carries fix guidance, else the pattern's own short-term remediation.
pub fn guidance_for(pattern: &PatternDefinition, resolver: &dyn PolicyResolver) -> Option<String> {
    pattern
        .policy_ids
        .iter()
        .filter_map(|id| resolver.resolve(id))
        .map(|p| p.fix_guidance)
        .find(|g| !g.trim().is_empty())
        .or_else(|| {
            pattern
                .remediation
                .short_term
                .as_ref()
                .map(|fix| fix.instructions.clone())
        })
}

/// Order in which patterns claim their share of the batch.
pub fn application_order(targets: &[PatternTarget<'_>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..targets.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (targets[a].pattern, targets[b].pattern);
        pb.tier
            .severity()
            .cmp(&pa.tier.severity())
            .then_with(|| pa.id.cmp(&pb.id))
    });
    order
}

/// Deny claims in place so each target's rate is met over its eligible base.
pub fn inject<R: Rng + ?Sized>(
    claims: &mut [GeneratedClaim],
    targets: &[PatternTarget<'_>],
    rng: &mut R,
) -> SimResult<InjectionOutcome> {
    let mut outcome = InjectionOutcome::default();

    for ti in application_order(targets) {
        let target = &targets[ti];
        let pattern = target.pattern;

        let eligible: Vec<usize> = claims
            .iter()
            .enumerate()
            .filter(|(_, c)| c.has_any_code(&pattern.procedure_codes))
            .map(|(i, _)| i)
            .collect();
        let wanted = distribute_denied(eligible.len() as u32, target.rate)?;

        let candidates: Vec<usize> = eligible
            .iter()
            .copied()
            .filter(|&i| !claims[i].is_denied())
            .collect();
        let take = (wanted as usize).min(candidates.len());

        let mut chosen: Vec<usize> = index::sample(rng, candidates.len(), take)
            .into_iter()
            .map(|k| candidates[k])
            .collect();
        chosen.sort_unstable();

        for &i in &chosen {
            let lag = rng.gen_range(DENIAL_LAG_DAYS.0..=DENIAL_LAG_DAYS.1);
            apply_denial(&mut claims[i], target, lag);
        }

        if (take as u32) < wanted {
            debug!(
                pattern_id = %pattern.id,
                target = wanted,
                achieved = take,
                "eligible pool exhausted"
            );
            outcome.shortfalls.push(Shortfall {
                pattern_id: pattern.id.clone(),
                target: wanted,
                achieved: take as u32,
            });
        }

        outcome.stats.push(PatternBatchStats {
            pattern_id: pattern.id.clone(),
            eligible: eligible.len() as u32,
            target: wanted,
            denied: take as u32,
            target_rate: target.rate,
        });
        outcome.denied.extend(chosen);
    }

    Ok(outcome)
}

fn apply_denial(claim: &mut GeneratedClaim, target: &PatternTarget<'_>, lag_days: i64) {
    let pattern = target.pattern;
    for line in claim.lines.iter_mut() {
        if pattern.matches_code(&line.procedure_code) {
            line.denial = Some(LineDenial {
                pattern_id: pattern.id.clone(),
                edit_codes: pattern.edit_codes.clone(),
            });
        }
    }
    claim.status = ClaimStatus::Denied;
    claim.paid_cents = 0;
    claim.denial = Some(ClaimDenial {
        pattern_id: pattern.id.clone(),
        category: pattern.category,
        reason: pattern.denial_reason.clone(),
        policy_ids: pattern.policy_ids.clone(),
        edit_codes: pattern.edit_codes.clone(),
        denied_date: claim.submitted_date + Duration::days(lag_days),
        guidance: target.guidance.clone(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimsim_contracts::{
        entity::GeneratedLineItem,
        ids::ClaimId,
        scenario::{
            CurveShape, DenialCategory, PatternStatus, PatternTier, Period, TrajectoryCurve,
            TrajectorySnapshot,
        },
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn claim(codes: &[&str]) -> GeneratedClaim {
        let lines: Vec<GeneratedLineItem> = codes
            .iter()
            .enumerate()
            .map(|(i, code)| GeneratedLineItem {
                line_number: i as u16 + 1,
                procedure_code: code.to_string(),
                modifiers: vec![],
                units: 1,
                billed_cents: 10_000,
                diagnosis_pointers: vec![1],
                denial: None,
            })
            .collect();
        GeneratedClaim {
            id: ClaimId::new(),
            claim_number: "CLM".to_string(),
            practice_id: "p".to_string(),
            provider_id: "dr".to_string(),
            patient_id: "PT".to_string(),
            patient_name: "Quinn Moreau".to_string(),
            payer: "Cigna".to_string(),
            service_date: date(4),
            submitted_date: date(6),
            value_tier: "standard".to_string(),
            billed_cents: 10_000 * lines.len() as i64,
            paid_cents: 10_000 * lines.len() as i64,
            diagnosis_codes: vec!["I10".to_string()],
            lines,
            status: ClaimStatus::Paid,
            denial: None,
        }
    }

    fn pattern(id: &str, tier: PatternTier, codes: &[&str]) -> PatternDefinition {
        let snapshot = TrajectorySnapshot {
            period: Period { start: date(1), end: date(31) },
            denial_rate: 10.0,
            denied_amount: 0.0,
        };
        PatternDefinition {
            id: id.to_string(),
            name: id.to_string(),
            category: DenialCategory::MissingModifier,
            tier,
            status: PatternStatus::Active,
            procedure_codes: codes.iter().map(|c| c.to_string()).collect(),
            policy_ids: vec!["LCD-1".to_string()],
            denial_reason: "Modifier 25 missing".to_string(),
            edit_codes: vec!["CO-4".to_string()],
            trajectory: TrajectoryCurve {
                shape: CurveShape::Stable,
                baseline: snapshot.clone(),
                current: snapshot,
                monthly: vec![],
            },
            engagement: Default::default(),
            remediation: Default::default(),
        }
    }

    #[test]
    fn hits_target_over_eligible_base() {
        let mut claims: Vec<GeneratedClaim> = (0..100).map(|_| claim(&["99214"])).collect();
        claims.extend((0..100).map(|_| claim(&["93000"])));
        let p = pattern("ekg-mod", PatternTier::High, &["93000"]);
        let targets = [PatternTarget { pattern: &p, rate: 23.0, guidance: Some("Append 25".into()) }];

        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let outcome = inject(&mut claims, &targets, &mut rng).unwrap();

        assert_eq!(outcome.stats[0].eligible, 100);
        assert_eq!(outcome.stats[0].denied, 23);
        assert!(outcome.shortfalls.is_empty());
        let denied: Vec<&GeneratedClaim> = claims.iter().filter(|c| c.is_denied()).collect();
        assert_eq!(denied.len(), 23);
        for c in denied {
            assert!(c.has_any_code(&p.procedure_codes));
            assert_eq!(c.paid_cents, 0);
            assert_eq!(c.billed_cents, c.line_total_cents());
            let d = c.denial.as_ref().unwrap();
            assert_eq!(d.guidance.as_deref(), Some("Append 25"));
            assert!(d.denied_date > c.submitted_date);
            assert!(c.lines.iter().all(|l| l.denial.is_some()));
        }
    }

    #[test]
    fn only_matching_lines_are_marked() {
        let mut claims = vec![claim(&["99214", "93000"])];
        let p = pattern("ekg-mod", PatternTier::High, &["93000"]);
        let targets = [PatternTarget { pattern: &p, rate: 100.0, guidance: None }];
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        inject(&mut claims, &targets, &mut rng).unwrap();

        assert!(claims[0].lines[0].denial.is_none());
        assert_eq!(claims[0].lines[1].denial.as_ref().unwrap().pattern_id, "ekg-mod");
    }

    #[test]
    fn higher_tier_wins_shared_claims_and_lower_tier_falls_short() {
        let mut claims: Vec<GeneratedClaim> = (0..10).map(|_| claim(&["93000"])).collect();
        let low = pattern("a-low", PatternTier::Low, &["93000"]);
        let critical = pattern("z-critical", PatternTier::Critical, &["93000"]);
        let targets = [
            PatternTarget { pattern: &low, rate: 50.0, guidance: None },
            PatternTarget { pattern: &critical, rate: 80.0, guidance: None },
        ];

        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let outcome = inject(&mut claims, &targets, &mut rng).unwrap();

        assert_eq!(outcome.stats[0].pattern_id, "z-critical");
        assert_eq!(outcome.stats[0].denied, 8);
        assert_eq!(outcome.stats[1].denied, 2);
        assert_eq!(
            outcome.shortfalls,
            vec![Shortfall { pattern_id: "a-low".to_string(), target: 5, achieved: 2 }]
        );
        assert_eq!(claims.iter().filter(|c| c.is_denied()).count(), 10);
        assert_eq!(outcome.denied.len(), 10);
    }

    #[test]
    fn equal_tiers_apply_in_id_order() {
        let a = pattern("alpha", PatternTier::Medium, &["1"]);
        let b = pattern("beta", PatternTier::Medium, &["1"]);
        let targets = [
            PatternTarget { pattern: &b, rate: 1.0, guidance: None },
            PatternTarget { pattern: &a, rate: 1.0, guidance: None },
        ];
        assert_eq!(application_order(&targets), vec![1, 0]);
    }

    #[test]
    fn no_eligible_claims_is_not_a_shortfall() {
        let mut claims: Vec<GeneratedClaim> = (0..5).map(|_| claim(&["99214"])).collect();
        let p = pattern("ekg-mod", PatternTier::High, &["93000"]);
        let targets = [PatternTarget { pattern: &p, rate: 40.0, guidance: None }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = inject(&mut claims, &targets, &mut rng).unwrap();
        assert_eq!(outcome.stats[0].eligible, 0);
        assert!(outcome.shortfalls.is_empty());
        assert!(claims.iter().all(|c| !c.is_denied()));
    }

    #[test]
    fn invalid_rate_is_rejected() {
        let mut claims = vec![claim(&["93000"])];
        let p = pattern("ekg-mod", PatternTier::High, &["93000"]);
        let targets = [PatternTarget { pattern: &p, rate: 140.0, guidance: None }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(inject(&mut claims, &targets, &mut rng).is_err());
    }
}
