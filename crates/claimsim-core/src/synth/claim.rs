//! Claim synthesis.

use chrono::{Duration, NaiveDate};
use rand::{seq::SliceRandom, Rng};

use claimsim_contracts::{
    entity::{ClaimStatus, GeneratedClaim, GeneratedLineItem},
    error::{SimError, SimResult},
    ids::ClaimId,
    scenario::{CountRange, ValueTier},
};

use crate::catalog::{ProviderProfile, COMMON_MODIFIERS, FIRST_NAMES, LAST_NAMES};

/// Days between service and submission.
const SUBMISSION_LAG_DAYS: (i64, i64) = (1, 14);
/// Diagnoses per claim, capped by the provider's pool.
const MAX_DIAGNOSES: usize = 4;
const MODIFIER_PROBABILITY: f64 = 0.15;

/// Everything about one claim that is decided before synthesis.
#[derive(Debug, Clone)]
pub struct ClaimRequest<'a> {
    pub practice_id: &'a str,
    pub claim_number: String,
    pub service_date: NaiveDate,
    pub tier: &'a ValueTier,
    pub lines: CountRange,
    pub payer: &'a str,
}

/// Produce one paid claim for `provider`.
///
/// Line amounts are drawn uniformly from the tier's range, and the claim's
/// billed amount is their exact sum.
pub fn synthesize_claim<R: Rng + ?Sized>(
    provider: &ProviderProfile,
    request: &ClaimRequest<'_>,
    rng: &mut R,
) -> SimResult<GeneratedClaim> {
    if provider.procedures.is_empty() {
        return Err(SimError::synthesis(format!(
            "provider '{}' has no procedure codes",
            provider.provider_id
        )));
    }
    let CountRange { min, max } = request.lines;
    if min == 0 || min > max {
        return Err(SimError::invalid(format!(
            "lines per claim must satisfy 1 <= min <= max, got {}..{}",
            min, max
        )));
    }
    let (low, high) = (request.tier.min_cents(), request.tier.max_cents());
    if low < 0 || low > high {
        return Err(SimError::invalid(format!(
            "value tier '{}' has an empty amount range",
            request.tier.name
        )));
    }

    let diagnoses: Vec<String> = {
        let upper = provider.diagnoses.len().min(MAX_DIAGNOSES);
        let count = if upper == 0 { 0 } else { rng.gen_range(1..=upper) };
        provider
            .diagnoses
            .choose_multiple(rng, count)
            .cloned()
            .collect()
    };

    let line_count = rng.gen_range(min..=max);
    let mut lines = Vec::with_capacity(line_count as usize);
    for n in 1..=line_count {
        let procedure_code = provider
            .procedures
            .choose(rng)
            .cloned()
            .ok_or_else(|| SimError::synthesis("empty procedure pool"))?;

        let modifiers = if rng.gen_bool(MODIFIER_PROBABILITY) {
            COMMON_MODIFIERS
                .choose(rng)
                .map(|m| vec![m.to_string()])
                .unwrap_or_default()
        } else {
            vec![]
        };

        let units = if rng.gen_bool(0.8) { 1 } else { rng.gen_range(2..=4) };

        let diagnosis_pointers = if diagnoses.is_empty() {
            vec![]
        } else {
            let primary = rng.gen_range(1..=diagnoses.len()) as u8;
            let mut pointers = vec![primary];
            if diagnoses.len() > 1 && rng.gen_bool(0.3) {
                let secondary = rng.gen_range(1..=diagnoses.len()) as u8;
                if secondary != primary {
                    pointers.push(secondary);
                }
            }
            pointers
        };

        lines.push(GeneratedLineItem {
            line_number: n as u16,
            procedure_code,
            modifiers,
            units,
            billed_cents: rng.gen_range(low..=high),
            diagnosis_pointers,
            denial: None,
        });
    }

    let billed_cents: i64 = lines.iter().map(|l| l.billed_cents).sum();
    let lag = rng.gen_range(SUBMISSION_LAG_DAYS.0..=SUBMISSION_LAG_DAYS.1);

    let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Alex");
    let last = LAST_NAMES.choose(rng).copied().unwrap_or("Doe");

    Ok(GeneratedClaim {
        id: ClaimId::new(),
        claim_number: request.claim_number.clone(),
        practice_id: request.practice_id.to_string(),
        provider_id: provider.provider_id.clone(),
        patient_id: format!("PT-{:06}", rng.gen_range(0..1_000_000)),
        patient_name: format!("{} {}", first, last),
        payer: request.payer.to_string(),
        service_date: request.service_date,
        submitted_date: request.service_date + Duration::days(lag),
        value_tier: request.tier.name.clone(),
        billed_cents,
        paid_cents: billed_cents,
        diagnosis_codes: diagnoses,
        lines,
        status: ClaimStatus::Paid,
        denial: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn profile(codes: &[&str]) -> ProviderProfile {
        ProviderProfile {
            provider_id: "dr-heart".to_string(),
            procedures: codes.iter().map(|c| c.to_string()).collect(),
            diagnoses: vec!["I10".to_string(), "R07.9".to_string(), "I48.91".to_string()],
        }
    }

    fn tier() -> ValueTier {
        ValueTier {
            name: "standard".to_string(),
            min_amount: 75.0,
            max_amount: 420.0,
            weight: 1.0,
        }
    }

    fn request<'a>(tier: &'a ValueTier, lines: CountRange) -> ClaimRequest<'a> {
        ClaimRequest {
            practice_id: "heart-clinic",
            claim_number: "CLM-0000001".to_string(),
            service_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
            tier,
            lines,
            payer: "Aetna",
        }
    }

    #[test]
    fn claim_total_equals_line_sum() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let tier = tier();
        let p = profile(&["99213", "93000", "93306"]);
        for _ in 0..200 {
            let claim =
                synthesize_claim(&p, &request(&tier, CountRange { min: 1, max: 6 }), &mut rng)
                    .unwrap();
            assert_eq!(claim.billed_cents, claim.line_total_cents());
            assert_eq!(claim.paid_cents, claim.billed_cents);
            assert!(!claim.is_denied());
        }
    }

    #[test]
    fn lines_respect_count_range_and_tier_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tier = tier();
        let p = profile(&["99213"]);
        for _ in 0..100 {
            let claim =
                synthesize_claim(&p, &request(&tier, CountRange { min: 2, max: 3 }), &mut rng)
                    .unwrap();
            assert!((2..=3).contains(&claim.lines.len()));
            for (i, line) in claim.lines.iter().enumerate() {
                assert_eq!(line.line_number as usize, i + 1);
                assert!((7_500..=42_000).contains(&line.billed_cents));
                assert_eq!(line.procedure_code, "99213");
                for ptr in &line.diagnosis_pointers {
                    assert!(*ptr >= 1 && (*ptr as usize) <= claim.diagnosis_codes.len());
                }
            }
        }
    }

    #[test]
    fn submission_follows_service() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tier = tier();
        let claim = synthesize_claim(
            &profile(&["93000"]),
            &request(&tier, CountRange { min: 1, max: 1 }),
            &mut rng,
        )
        .unwrap();
        assert!(claim.submitted_date > claim.service_date);
        assert_eq!(claim.payer, "Aetna");
        assert_eq!(claim.practice_id, "heart-clinic");
    }

    #[test]
    fn empty_procedure_pool_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tier = tier();
        let err = synthesize_claim(
            &profile(&[]),
            &request(&tier, CountRange { min: 1, max: 2 }),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Synthesis { .. }));
    }

    #[test]
    fn inverted_line_range_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tier = tier();
        let result = synthesize_claim(
            &profile(&["93000"]),
            &request(&tier, CountRange { min: 3, max: 1 }),
            &mut rng,
        );
        assert!(matches!(result, Err(SimError::InvalidInput { .. })));
    }
}
