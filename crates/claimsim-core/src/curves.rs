//! Curve and distribution library.
//!
//! Pure functions that turn a pattern's trajectory into a per-month target
//! denial rate, and split integer totals across weighted buckets. Every
//! function here fails fast with `SimError::InvalidInput` on malformed
//! input; nothing is clamped silently except the final perturbed rate.

use rand::Rng;

use claimsim_contracts::{
    calendar::YearMonth,
    error::{SimError, SimResult},
    scenario::{CurveShape, TrajectoryCurve},
};

/// Decay constant of the steep-improvement curve. At 1.2 the curve covers
/// roughly 90% of the distance to the current rate by the third month.
pub const STEEP_DECAY: f64 = 1.2;

/// Fraction of the baseline-to-current distance covered at `month_index`
/// of a `total_months` window, before noise.
///
/// Stable and flat shapes never move off the baseline. A single-month
/// window is fully converged.
pub fn shape_progress(shape: CurveShape, month_index: usize, total_months: usize) -> SimResult<f64> {
    if total_months == 0 {
        return Err(SimError::invalid("curve window has no months"));
    }
    if month_index >= total_months {
        return Err(SimError::invalid(format!(
            "month index {} outside a {}-month window",
            month_index, total_months
        )));
    }

    if matches!(shape, CurveShape::Stable | CurveShape::Flat) {
        return Ok(0.0);
    }
    if total_months == 1 {
        return Ok(1.0);
    }

    let last = (total_months - 1) as f64;
    let i = month_index as f64;
    let t = i / last;

    let progress = match shape {
        CurveShape::SteepImprovement => {
            (1.0 - (-STEEP_DECAY * i).exp()) / (1.0 - (-STEEP_DECAY * last).exp())
        }
        CurveShape::GradualImprovement | CurveShape::Worsening => t,
        CurveShape::SlightImprovement => t * t * (3.0 - 2.0 * t),
        CurveShape::Stable | CurveShape::Flat => 0.0,
    };
    Ok(progress)
}

/// Interpolated, noise-free denial rate at `month_index` of the window.
pub fn shaped_rate(curve: &TrajectoryCurve, month_index: usize, total_months: usize) -> SimResult<f64> {
    let baseline = check_rate(curve.baseline.denial_rate, "baseline denial rate")?;
    let current = check_rate(curve.current.denial_rate, "current denial rate")?;
    let progress = shape_progress(curve.shape, month_index, total_months)?;
    Ok(baseline + (current - baseline) * progress)
}

/// Apply bounded multiplicative noise of up to `±noise_pct` percent, then
/// clamp into `[0, 100]`.
pub fn perturb<R: Rng + ?Sized>(rate: f64, noise_pct: f64, rng: &mut R) -> SimResult<f64> {
    let rate = check_rate(rate, "denial rate")?;
    let noise_pct = check_rate(noise_pct, "noise percentage")?;
    if noise_pct == 0.0 {
        return Ok(rate);
    }
    let amplitude = noise_pct / 100.0;
    let factor = 1.0 + rng.gen_range(-amplitude..=amplitude);
    Ok((rate * factor).clamp(0.0, 100.0))
}

/// Target denial rate for `month_index`: the shaped rate with noise applied.
pub fn denial_rate_for_month<R: Rng + ?Sized>(
    curve: &TrajectoryCurve,
    month_index: usize,
    total_months: usize,
    noise_pct: f64,
    rng: &mut R,
) -> SimResult<f64> {
    let rate = shaped_rate(curve, month_index, total_months)?;
    perturb(rate, noise_pct, rng)
}

/// Target rate for a calendar month, or `None` outside the curve's window.
///
/// An explicit monthly snapshot for `month` replaces the interpolated value
/// and is used as-is, without noise.
pub fn rate_for_calendar_month<R: Rng + ?Sized>(
    curve: &TrajectoryCurve,
    month: YearMonth,
    noise_pct: f64,
    rng: &mut R,
) -> SimResult<Option<f64>> {
    let (start, end) = curve.window();
    if end < start {
        return Err(SimError::invalid(format!(
            "curve window ends ({}) before it starts ({})",
            end, start
        )));
    }
    if month < start || month > end {
        return Ok(None);
    }
    if let Some(snapshot) = curve.snapshot_for(month) {
        return check_rate(snapshot.denial_rate, "monthly snapshot denial rate").map(Some);
    }

    let index = start.months_until(&month) as usize;
    let total = start.months_until(&end) as usize + 1;
    denial_rate_for_month(curve, index, total, noise_pct, rng).map(Some)
}

/// Split `total` across `weights` by largest remainder.
///
/// The result always sums to exactly `total`. Remainder units go to the
/// largest fractional parts, ties broken by lower index. Zero-weight
/// buckets receive nothing.
pub fn distribute_counts(total: u32, weights: &[f64]) -> SimResult<Vec<u32>> {
    if weights.is_empty() {
        return Err(SimError::invalid("cannot distribute over zero buckets"));
    }
    if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(SimError::invalid(format!(
            "weights must be finite and non-negative, got {}",
            bad
        )));
    }
    let sum: f64 = weights.iter().sum();
    if sum == 0.0 {
        if total == 0 {
            return Ok(vec![0; weights.len()]);
        }
        return Err(SimError::invalid(format!(
            "cannot distribute {} over weights that sum to zero",
            total
        )));
    }

    let quotas: Vec<f64> = weights.iter().map(|w| w / sum * total as f64).collect();
    let mut counts: Vec<u32> = quotas.iter().map(|q| q.floor() as u32).collect();

    let mut order: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });

    let assigned: u32 = counts.iter().sum();
    if assigned > total {
        // Rounding pushed a quota across an integer boundary.
        for &i in order.iter().rev().cycle() {
            if counts.iter().sum::<u32>() == total {
                break;
            }
            if counts[i] > 0 {
                counts[i] -= 1;
            }
        }
    } else {
        let remainder = (total - assigned) as usize;
        for &i in order.iter().cycle().take(remainder) {
            counts[i] += 1;
        }
    }
    Ok(counts)
}

/// Whole number of claims to deny out of `claim_count` at `denial_rate`
/// percent, rounded half away from zero.
pub fn distribute_denied(claim_count: u32, denial_rate: f64) -> SimResult<u32> {
    let rate = check_rate(denial_rate, "denial rate")?;
    let denied = (claim_count as f64 * rate / 100.0).round() as u32;
    Ok(denied.min(claim_count))
}

fn check_rate(value: f64, what: &str) -> SimResult<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(SimError::invalid(format!(
            "{} must be within [0, 100], got {}",
            what, value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use claimsim_contracts::scenario::{MonthlySnapshot, Period, TrajectorySnapshot};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn curve(shape: CurveShape, baseline: f64, current: f64) -> TrajectoryCurve {
        TrajectoryCurve {
            shape,
            baseline: TrajectorySnapshot {
                period: Period { start: date(2024, 1, 1), end: date(2024, 1, 31) },
                denial_rate: baseline,
                denied_amount: 0.0,
            },
            current: TrajectorySnapshot {
                period: Period { start: date(2024, 6, 1), end: date(2024, 6, 30) },
                denial_rate: current,
                denied_amount: 0.0,
            },
            monthly: vec![],
        }
    }

    // ── Shapes ───────────────────────────────────────────────────────────────

    #[test]
    fn every_shape_starts_at_baseline() {
        for shape in [
            CurveShape::SteepImprovement,
            CurveShape::GradualImprovement,
            CurveShape::SlightImprovement,
            CurveShape::Stable,
            CurveShape::Flat,
            CurveShape::Worsening,
        ] {
            let c = curve(shape, 30.0, 5.0);
            assert_eq!(shaped_rate(&c, 0, 6).unwrap(), 30.0, "{:?}", shape);
        }
    }

    #[test]
    fn improving_shapes_end_at_current() {
        for shape in [
            CurveShape::SteepImprovement,
            CurveShape::GradualImprovement,
            CurveShape::SlightImprovement,
        ] {
            let c = curve(shape, 30.0, 5.0);
            let last = shaped_rate(&c, 5, 6).unwrap();
            assert!((last - 5.0).abs() < 1e-9, "{:?} ended at {}", shape, last);
        }
    }

    #[test]
    fn steep_curve_converges_by_month_three() {
        let c = curve(CurveShape::SteepImprovement, 30.0, 5.0);
        let m3 = shaped_rate(&c, 3, 12).unwrap();
        // Within 10% of the baseline-to-current distance.
        assert!(m3 - 5.0 < 2.5, "month 3 rate {} not converged", m3);
    }

    #[test]
    fn gradual_curve_is_linear() {
        let c = curve(CurveShape::GradualImprovement, 20.0, 10.0);
        let rates: Vec<f64> = (0..6).map(|i| shaped_rate(&c, i, 6).unwrap()).collect();
        for pair in rates.windows(2) {
            assert!(((pair[0] - pair[1]) - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn stable_and_flat_hold_baseline() {
        for shape in [CurveShape::Stable, CurveShape::Flat] {
            let c = curve(shape, 12.0, 11.0);
            for i in 0..6 {
                assert_eq!(shaped_rate(&c, i, 6).unwrap(), 12.0);
            }
        }
    }

    #[test]
    fn worsening_rises_to_current() {
        let c = curve(CurveShape::Worsening, 5.0, 20.0);
        assert_eq!(shaped_rate(&c, 5, 6).unwrap(), 20.0);
        assert!(shaped_rate(&c, 2, 6).unwrap() > 5.0);
    }

    #[test]
    fn noisy_steep_curve_is_monotone_within_noise_band() {
        let c = curve(CurveShape::SteepImprovement, 30.0, 5.0);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let noise = 5.0;
        let rates: Vec<f64> = (0..6)
            .map(|i| denial_rate_for_month(&c, i, 6, noise, &mut rng).unwrap())
            .collect();
        for pair in rates.windows(2) {
            let band = pair[0] * 2.0 * noise / 100.0;
            assert!(pair[1] <= pair[0] + band, "{:?}", rates);
        }
    }

    #[test]
    fn perturbation_stays_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            let r = perturb(20.0, 5.0, &mut rng).unwrap();
            assert!((19.0..=21.0).contains(&r));
        }
        let r = perturb(99.9, 50.0, &mut rng).unwrap();
        assert!(r <= 100.0);
    }

    #[test]
    fn zero_noise_is_deterministic() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(perturb(17.5, 0.0, &mut rng).unwrap(), 17.5);
    }

    #[test]
    fn malformed_rates_fail_fast() {
        let c = curve(CurveShape::GradualImprovement, 130.0, 5.0);
        assert!(matches!(shaped_rate(&c, 0, 6), Err(SimError::InvalidInput { .. })));

        let c = curve(CurveShape::GradualImprovement, 30.0, f64::NAN);
        assert!(shaped_rate(&c, 0, 6).is_err());

        let c = curve(CurveShape::GradualImprovement, 30.0, 5.0);
        assert!(shaped_rate(&c, 6, 6).is_err());
        assert!(shaped_rate(&c, 0, 0).is_err());
    }

    // ── Calendar months ──────────────────────────────────────────────────────

    #[test]
    fn calendar_month_outside_window_has_no_rate() {
        let c = curve(CurveShape::GradualImprovement, 30.0, 5.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let july = YearMonth::new(2024, 7).unwrap();
        assert_eq!(rate_for_calendar_month(&c, july, 0.0, &mut rng).unwrap(), None);
    }

    #[test]
    fn monthly_snapshot_overrides_interpolation() {
        let mut c = curve(CurveShape::GradualImprovement, 30.0, 5.0);
        let march = YearMonth::new(2024, 3).unwrap();
        c.monthly.push(MonthlySnapshot { month: march, denial_rate: 27.0, denied_amount: 0.0 });

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(rate_for_calendar_month(&c, march, 5.0, &mut rng).unwrap(), Some(27.0));

        let june = YearMonth::new(2024, 6).unwrap();
        assert_eq!(rate_for_calendar_month(&c, june, 0.0, &mut rng).unwrap(), Some(5.0));
    }

    // ── Distribution ─────────────────────────────────────────────────────────

    #[test]
    fn distribute_counts_conserves_total() {
        let weights = [1.0, 1.3, 0.7, 2.2, 0.0, 0.9];
        for total in [0, 1, 7, 100, 999, 12_345] {
            let counts = distribute_counts(total, &weights).unwrap();
            assert_eq!(counts.iter().sum::<u32>(), total);
            assert_eq!(counts[4], 0);
        }
    }

    #[test]
    fn distribute_counts_breaks_ties_by_index() {
        assert_eq!(distribute_counts(10, &[1.0, 1.0, 1.0]).unwrap(), vec![4, 3, 3]);
        assert_eq!(distribute_counts(2, &[1.0, 1.0, 1.0]).unwrap(), vec![1, 1, 0]);
    }

    #[test]
    fn distribute_counts_prefers_largest_remainder() {
        // Quotas 1.4, 2.6, 1.0 -> floors 1, 2, 1 and the spare unit goes to 0.6.
        assert_eq!(distribute_counts(5, &[1.4, 2.6, 1.0]).unwrap(), vec![1, 3, 1]);
    }

    #[test]
    fn distribute_counts_rejects_bad_weights() {
        assert!(distribute_counts(5, &[]).is_err());
        assert!(distribute_counts(5, &[1.0, -0.5]).is_err());
        assert!(distribute_counts(5, &[f64::INFINITY]).is_err());
        assert!(distribute_counts(5, &[0.0, 0.0]).is_err());
        assert_eq!(distribute_counts(0, &[0.0, 0.0]).unwrap(), vec![0, 0]);
    }

    #[test]
    fn distribute_denied_rounds_and_bounds() {
        assert_eq!(distribute_denied(100, 23.0).unwrap(), 23);
        assert_eq!(distribute_denied(10, 25.0).unwrap(), 3);
        assert_eq!(distribute_denied(10, 24.0).unwrap(), 2);
        assert_eq!(distribute_denied(0, 50.0).unwrap(), 0);
        assert_eq!(distribute_denied(7, 100.0).unwrap(), 7);
        assert!(distribute_denied(10, -1.0).is_err());
        assert!(distribute_denied(10, 100.5).is_err());
    }
}
