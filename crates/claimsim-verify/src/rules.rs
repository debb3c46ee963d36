//! Semantic scenario rules.
//!
//! Each check appends to the report and never stops early. Rule ids are
//! stable and appear in validation output; paths use the dotted form
//! `patterns[1].trajectory.current.denial_rate`.

use std::collections::HashSet;

use claimsim_contracts::{
    calendar::YearMonth,
    report::{ValidationIssue, ValidationReport},
    scenario::{CurveShape, PatternDefinition, ScenarioDefinition},
};
use claimsim_core::{catalog::ProviderProfile, traits::PolicyResolver};

/// Largest gap, in percentage points, between baseline and current for a
/// flat trajectory.
pub const FLAT_BAND: f64 = 2.0;

/// Slack allowed when monthly snapshots of a monotone shape move the wrong
/// way between consecutive months.
pub const MONOTONE_SLACK: f64 = 2.0;

/// Tolerance on appeal outcome probabilities summing to one.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Run every semantic rule against `scenario`.
pub fn check_all(scenario: &ScenarioDefinition, policies: &dyn PolicyResolver) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_identity(scenario, &mut report);
    check_timeline(scenario, &mut report);
    check_practice(scenario, &mut report);
    check_volume(scenario, &mut report);
    check_patterns(scenario, policies, &mut report);
    check_appeals(scenario, &mut report);
    check_learning_events(scenario, &mut report);
    check_targets(scenario, &mut report);
    report
}

fn check_identity(s: &ScenarioDefinition, report: &mut ValidationReport) {
    if s.id.trim().is_empty() {
        report.push(ValidationIssue::error("scenario-id", "id", "scenario id must not be blank"));
    }
    if s.practice.id.trim().is_empty() {
        report.push(ValidationIssue::error(
            "practice-id",
            "practice.id",
            "practice id must not be blank",
        ));
    }
}

fn check_timeline(s: &ScenarioDefinition, report: &mut ValidationReport) {
    let t = &s.timeline;
    if t.end_date <= t.start_date {
        report.push(ValidationIssue::error(
            "timeline-order",
            "timeline.end_date",
            format!("end_date {} must be after start_date {}", t.end_date, t.start_date),
        ));
        return;
    }
    for (i, event) in t.key_events.iter().enumerate() {
        if event.date < t.start_date || event.date > t.end_date {
            report.push(ValidationIssue::warning(
                "key-event-range",
                format!("timeline.key_events[{i}].date"),
                format!("key event '{}' on {} falls outside the timeline", event.name, event.date),
            ));
        }
    }
}

fn check_practice(s: &ScenarioDefinition, report: &mut ValidationReport) {
    let providers = &s.practice.providers;
    if providers.is_empty() {
        report.push(ValidationIssue::error(
            "providers-present",
            "practice.providers",
            "practice must have at least one provider",
        ));
        return;
    }

    let mut seen = HashSet::new();
    for (i, p) in providers.iter().enumerate() {
        if !seen.insert(p.id.as_str()) {
            report.push(ValidationIssue::error(
                "provider-id-unique",
                format!("practice.providers[{i}].id"),
                format!("duplicate provider id '{}'", p.id),
            ));
        }
        if !p.claim_weight.is_finite() || p.claim_weight < 0.0 {
            report.push(ValidationIssue::error(
                "provider-weights",
                format!("practice.providers[{i}].claim_weight"),
                format!("claim weight must be a non-negative number, got {}", p.claim_weight),
            ));
        }
        // Every provider is resolved before the first claim, drawn or not.
        if ProviderProfile::resolve(p).is_err() {
            report.push(ValidationIssue::error(
                "provider-codes",
                format!("practice.providers[{i}]"),
                format!(
                    "provider '{}' has no procedure codes and specialty '{}' is not in the catalog",
                    p.id, p.specialty
                ),
            ));
        }
    }
    let total: f64 = providers.iter().map(|p| p.claim_weight).filter(|w| w.is_finite()).sum();
    if total <= 0.0 {
        report.push(ValidationIssue::error(
            "provider-weights",
            "practice.providers",
            "provider claim weights must sum to a positive value",
        ));
    }

    let payers = &s.practice.payer_mix;
    for (i, payer) in payers.iter().enumerate() {
        if !payer.weight.is_finite() || payer.weight < 0.0 {
            report.push(ValidationIssue::error(
                "payer-weights",
                format!("practice.payer_mix[{i}].weight"),
                format!("payer weight must be a non-negative number, got {}", payer.weight),
            ));
        }
    }
    if !payers.is_empty() && payers.iter().map(|p| p.weight).sum::<f64>() <= 0.0 {
        report.push(ValidationIssue::error(
            "payer-weights",
            "practice.payer_mix",
            "payer weights must sum to a positive value",
        ));
    }
}

fn check_volume(s: &ScenarioDefinition, report: &mut ValidationReport) {
    let v = &s.volume;
    if v.total_claims == 0 {
        report.push(ValidationIssue::error(
            "total-claims",
            "volume.total_claims",
            "total_claims must be greater than zero",
        ));
    }

    let months = s.months();
    for (i, m) in v.monthly_multipliers.iter().enumerate() {
        if !m.is_finite() || *m < 0.0 {
            report.push(ValidationIssue::error(
                "monthly-multipliers",
                format!("volume.monthly_multipliers[{i}]"),
                format!("multiplier must be a non-negative number, got {m}"),
            ));
        }
    }
    match v.month_weights(&months) {
        None => report.push(ValidationIssue::error(
            "monthly-multipliers",
            "volume.monthly_multipliers",
            format!(
                "expected {} entries (one per timeline month) or 12 (by calendar month), got {}",
                months.len(),
                v.monthly_multipliers.len()
            ),
        )),
        Some(weights) if !weights.is_empty() && weights.iter().all(|w| *w <= 0.0) => {
            report.push(ValidationIssue::error(
                "monthly-multipliers",
                "volume.monthly_multipliers",
                "multipliers for the timeline months must not all be zero",
            ))
        }
        Some(_) => {}
    }

    let range = v.lines_per_claim;
    if range.min < 1 {
        report.push(ValidationIssue::error(
            "lines-per-claim",
            "volume.lines_per_claim.min",
            "every claim needs at least one line",
        ));
    }
    if range.min > range.max {
        report.push(ValidationIssue::error(
            "lines-per-claim",
            "volume.lines_per_claim",
            format!("min {} exceeds max {}", range.min, range.max),
        ));
    }

    if v.value_tiers.is_empty() {
        report.push(ValidationIssue::error(
            "value-tiers",
            "volume.value_tiers",
            "at least one value tier is required",
        ));
    }
    for (i, tier) in v.value_tiers.iter().enumerate() {
        let path = format!("volume.value_tiers[{i}]");
        if !(tier.min_amount.is_finite() && tier.max_amount.is_finite()) || tier.min_amount < 0.0 {
            report.push(ValidationIssue::error(
                "value-tiers",
                path.clone(),
                format!("tier '{}' amounts must be non-negative numbers", tier.name),
            ));
        } else if tier.min_amount > tier.max_amount {
            report.push(ValidationIssue::error(
                "value-tiers",
                path.clone(),
                format!(
                    "tier '{}' min_amount {} exceeds max_amount {}",
                    tier.name, tier.min_amount, tier.max_amount
                ),
            ));
        }
        if !tier.weight.is_finite() || tier.weight < 0.0 {
            report.push(ValidationIssue::error(
                "value-tiers",
                format!("{path}.weight"),
                format!("tier weight must be a non-negative number, got {}", tier.weight),
            ));
        }
    }
    if !v.value_tiers.is_empty() && v.value_tiers.iter().map(|t| t.weight).sum::<f64>() <= 0.0 {
        report.push(ValidationIssue::error(
            "value-tiers",
            "volume.value_tiers",
            "tier weights must sum to a positive value",
        ));
    }

    if let Some(lines) = s.target_metrics.total_line_items {
        if range.min <= range.max {
            let low = u64::from(v.total_claims) * u64::from(range.min);
            let high = u64::from(v.total_claims) * u64::from(range.max);
            if u64::from(lines) < low || u64::from(lines) > high {
                report.push(ValidationIssue::error(
                    "total-line-items",
                    "target_metrics.total_line_items",
                    format!(
                        "{lines} line items is not reachable from {} claims with {}..={} lines each (range {low}..={high})",
                        v.total_claims, range.min, range.max
                    ),
                ));
            }
        }
    }
}

fn check_patterns(s: &ScenarioDefinition, policies: &dyn PolicyResolver, report: &mut ValidationReport) {
    let timeline = (YearMonth::of(s.timeline.start_date), YearMonth::of(s.timeline.end_date));
    let profiles: Vec<ProviderProfile> = s
        .practice
        .providers
        .iter()
        .filter_map(|p| ProviderProfile::resolve(p).ok())
        .collect();

    let mut seen = HashSet::new();
    for (i, pattern) in s.patterns.iter().enumerate() {
        let base = format!("patterns[{i}]");

        if pattern.id.trim().is_empty() {
            report.push(ValidationIssue::error("pattern-id", format!("{base}.id"), "pattern id must not be blank"));
        } else if !seen.insert(pattern.id.as_str()) {
            report.push(ValidationIssue::error(
                "pattern-id-unique",
                format!("{base}.id"),
                format!("duplicate pattern id '{}'", pattern.id),
            ));
        }

        if pattern.procedure_codes.is_empty() {
            report.push(ValidationIssue::error(
                "pattern-codes",
                format!("{base}.procedure_codes"),
                "a pattern must target at least one procedure code",
            ));
        } else if !profiles.is_empty()
            && !pattern.procedure_codes.iter().any(|c| profiles.iter().any(|p| p.bills(c)))
        {
            report.push(ValidationIssue::warning(
                "pattern-codes-reachable",
                format!("{base}.procedure_codes"),
                format!("no provider bills any of {:?}; the pattern can never fire", pattern.procedure_codes),
            ));
        }

        for (k, policy_id) in pattern.policy_ids.iter().enumerate() {
            if policies.resolve(policy_id).is_none() {
                report.push(ValidationIssue::error(
                    "pattern-policy",
                    format!("{base}.policy_ids[{k}]"),
                    format!("policy '{policy_id}' is not in the policy library"),
                ));
            }
        }

        check_trajectory(pattern, &base, timeline, report);
    }
}

fn check_trajectory(
    pattern: &PatternDefinition,
    base: &str,
    timeline: (YearMonth, YearMonth),
    report: &mut ValidationReport,
) {
    let t = &pattern.trajectory;
    let path = format!("{base}.trajectory");
    let mut rates_ok = true;

    for (name, snap) in [("baseline", &t.baseline), ("current", &t.current)] {
        if !(0.0..=100.0).contains(&snap.denial_rate) {
            rates_ok = false;
            report.push(ValidationIssue::error(
                "pattern-rate",
                format!("{path}.{name}.denial_rate"),
                format!("denial rate must be within [0, 100], got {}", snap.denial_rate),
            ));
        }
        if snap.period.end < snap.period.start {
            report.push(ValidationIssue::error(
                "pattern-window",
                format!("{path}.{name}.period"),
                format!("period ends {} before it starts {}", snap.period.end, snap.period.start),
            ));
        }
    }

    let (start, end) = t.window();
    if end < start {
        report.push(ValidationIssue::error(
            "pattern-window",
            path.clone(),
            format!("current period ends ({end}) before the baseline period starts ({start})"),
        ));
        return;
    }
    if end < timeline.0 || start > timeline.1 {
        report.push(ValidationIssue::warning(
            "pattern-window",
            path.clone(),
            format!("window {start}..{end} does not overlap the timeline; the pattern never fires"),
        ));
    }

    let mut months = HashSet::new();
    for (k, snap) in t.monthly.iter().enumerate() {
        let snap_path = format!("{path}.monthly[{k}]");
        if !(0.0..=100.0).contains(&snap.denial_rate) {
            report.push(ValidationIssue::error(
                "pattern-rate",
                format!("{snap_path}.denial_rate"),
                format!("denial rate must be within [0, 100], got {}", snap.denial_rate),
            ));
        }
        if snap.month < start || snap.month > end {
            report.push(ValidationIssue::error(
                "monthly-window",
                format!("{snap_path}.month"),
                format!("snapshot month {} is outside the window {start}..{end}", snap.month),
            ));
        }
        if !months.insert(snap.month) {
            report.push(ValidationIssue::error(
                "monthly-window",
                format!("{snap_path}.month"),
                format!("duplicate snapshot for {}", snap.month),
            ));
        }
    }

    if rates_ok {
        check_shape(pattern, &path, report);
    }
}

/// Direction and band checks for the named shape, plus the softer
/// consistency checks of explicit monthly snapshots.
fn check_shape(pattern: &PatternDefinition, path: &str, report: &mut ValidationReport) {
    let t = &pattern.trajectory;
    let (b, c) = (t.baseline.denial_rate, t.current.denial_rate);
    let shape_path = format!("{path}.shape");

    match t.shape {
        CurveShape::SteepImprovement | CurveShape::GradualImprovement | CurveShape::SlightImprovement => {
            if c > b {
                report.push(ValidationIssue::error(
                    "trajectory-direction",
                    shape_path.clone(),
                    format!("{:?} requires current ({c}) at or below baseline ({b})", t.shape),
                ));
            }
        }
        CurveShape::Worsening => {
            if c < b {
                report.push(ValidationIssue::error(
                    "trajectory-direction",
                    shape_path.clone(),
                    format!("worsening requires current ({c}) at or above baseline ({b})"),
                ));
            }
        }
        CurveShape::Flat => {
            if (b - c).abs() > FLAT_BAND {
                report.push(ValidationIssue::error(
                    "trajectory-shape",
                    shape_path.clone(),
                    format!("flat requires baseline ({b}) and current ({c}) within {FLAT_BAND} points"),
                ));
            }
        }
        CurveShape::Stable => {}
    }

    if t.monthly.is_empty() {
        return;
    }
    let (start, _) = t.window();
    let mut snaps: Vec<_> = t.monthly.iter().collect();
    snaps.sort_by_key(|s| s.month);

    match t.shape {
        CurveShape::SteepImprovement => {
            let band = (0.25 * (b - c).abs()).max(MONOTONE_SLACK);
            for s in snaps.iter().filter(|s| start.months_until(&s.month) >= 3) {
                if (s.denial_rate - c).abs() > band {
                    report.push(ValidationIssue::warning(
                        "trajectory-shape",
                        shape_path.clone(),
                        format!(
                            "steep improvement should have converged by {}; snapshot {} is {} points from current",
                            s.month,
                            s.denial_rate,
                            (s.denial_rate - c).abs()
                        ),
                    ));
                }
            }
        }
        CurveShape::GradualImprovement | CurveShape::SlightImprovement => {
            for pair in snaps.windows(2) {
                if pair[1].denial_rate > pair[0].denial_rate + MONOTONE_SLACK {
                    report.push(ValidationIssue::warning(
                        "trajectory-shape",
                        shape_path.clone(),
                        format!(
                            "rate rises from {} in {} to {} in {} on an improving trajectory",
                            pair[0].denial_rate, pair[0].month, pair[1].denial_rate, pair[1].month
                        ),
                    ));
                }
            }
        }
        CurveShape::Worsening => {
            for pair in snaps.windows(2) {
                if pair[1].denial_rate + MONOTONE_SLACK < pair[0].denial_rate {
                    report.push(ValidationIssue::warning(
                        "trajectory-shape",
                        shape_path.clone(),
                        format!(
                            "rate falls from {} in {} to {} in {} on a worsening trajectory",
                            pair[0].denial_rate, pair[0].month, pair[1].denial_rate, pair[1].month
                        ),
                    ));
                }
            }
        }
        CurveShape::Stable | CurveShape::Flat => {
            for s in &snaps {
                if (s.denial_rate - b).abs() > FLAT_BAND {
                    report.push(ValidationIssue::warning(
                        "trajectory-shape",
                        shape_path.clone(),
                        format!("snapshot {} for {} strays from the held baseline {b}", s.denial_rate, s.month),
                    ));
                }
            }
        }
    }
}

fn check_appeals(s: &ScenarioDefinition, report: &mut ValidationReport) {
    let a = &s.appeals;
    if !(0.0..=1.0).contains(&a.rate) {
        report.push(ValidationIssue::error(
            "appeal-rate",
            "appeals.rate",
            format!("appeal rate is a probability in [0, 1], got {}", a.rate),
        ));
    }
    let mut seen = HashSet::new();
    for (i, o) in a.outcome_overrides.iter().enumerate() {
        let path = format!("appeals.outcome_overrides[{i}]");
        if !seen.insert(o.category) {
            report.push(ValidationIssue::error(
                "outcome-override",
                path.clone(),
                format!("duplicate override for {:?}", o.category),
            ));
        }
        let p = o.probabilities;
        if [p.overturned, p.upheld, p.pending].iter().any(|x| !x.is_finite() || *x < 0.0) {
            report.push(ValidationIssue::error(
                "outcome-override",
                path,
                "outcome probabilities must be non-negative",
            ));
        } else if (p.total() - 1.0).abs() > PROBABILITY_EPSILON {
            report.push(ValidationIssue::error(
                "outcome-override",
                path,
                format!("outcome probabilities must sum to 1, got {}", p.total()),
            ));
        }
    }
}

fn check_learning_events(s: &ScenarioDefinition, report: &mut ValidationReport) {
    let e = &s.learning_events;
    let weights = e.kind_weights.entries();
    if weights.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
        report.push(ValidationIssue::error(
            "event-weights",
            "learning_events.kind_weights",
            "event kind weights must be non-negative",
        ));
    } else if e.total > 0 && weights.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
        report.push(ValidationIssue::error(
            "event-weights",
            "learning_events.kind_weights",
            "event kind weights must sum to a positive value when events are requested",
        ));
    }
    if e.total > 0 && s.patterns.is_empty() {
        report.push(ValidationIssue::warning(
            "event-patterns",
            "learning_events.total",
            "learning events requested but the scenario has no patterns to attach them to",
        ));
    }
}

fn check_targets(s: &ScenarioDefinition, report: &mut ValidationReport) {
    let t = &s.target_metrics;
    for (name, value) in [
        ("overall_denial_rate", t.overall_denial_rate),
        ("appeal_rate", t.appeal_rate),
        ("overturn_rate", t.overturn_rate),
    ] {
        if let Some(v) = value {
            if !(0.0..=100.0).contains(&v) {
                report.push(ValidationIssue::error(
                    "target-metrics",
                    format!("target_metrics.{name}"),
                    format!("target rate must be within [0, 100], got {v}"),
                ));
            }
        }
    }
    if let Some(tol) = t.tolerance {
        if !tol.is_finite() || tol < 0.0 {
            report.push(ValidationIssue::error(
                "target-metrics",
                "target_metrics.tolerance",
                format!("tolerance must be non-negative, got {tol}"),
            ));
        }
    }
}
