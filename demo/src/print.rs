//! Human-readable rendering of run reports.

use claimsim_contracts::{
    live::{BatchStats, GenerationStatus, GenerationTotals},
    report::{BulkReport, RunSummary, RunWarning, Severity, ValidationReport},
};

fn dollars(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

pub fn validation(scenario_id: &str, report: &ValidationReport) {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    println!(
        "  {:<28} {}  ({} error(s), {} warning(s))",
        scenario_id,
        verdict,
        report.errors().count(),
        report.warnings().count()
    );
    for issue in &report.issues {
        let tag = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warn ",
        };
        println!("      {tag} [{}] {}: {}", issue.rule_id, issue.path, issue.message);
    }
}

pub fn run_summary(summary: &RunSummary) {
    let t = &summary.totals;
    println!("=== {} ({}) ===", summary.scenario_id, summary.final_state());
    if summary.dry_run {
        println!("  Dry run: nothing was persisted.");
    }
    println!("  Months:        {}", summary.months.len());
    println!("  Claims:        {} ({} line items)", t.claims, t.line_items);
    println!("  Denied:        {} ({:.1}%)", t.denied, t.denial_rate());
    println!(
        "  Appeals:       {} ({:.1}% of denials; {} overturned, {} upheld, {} pending)",
        t.appeals,
        t.appeal_rate(),
        t.overturned,
        t.upheld,
        t.pending
    );
    println!("  Events:        {}", t.events);
    println!(
        "  Billed:        {}  denied {}  recovered {}",
        dollars(t.billed_cents),
        dollars(t.denied_cents),
        dollars(t.recovered_cents)
    );
    if !summary.dry_run {
        println!("  Persisted:     {} claims", summary.persisted.claims);
    }

    if !summary.patterns.is_empty() {
        println!();
        println!(
            "  {:<30} {:>8} {:>7} {:>9} {:>9}  trend",
            "pattern", "eligible", "denied", "realized", "target"
        );
        for p in &summary.patterns {
            let trend = match (p.first_month_rate, p.last_month_rate) {
                (Some(first), Some(last)) => format!("{first:.1}% -> {last:.1}%"),
                _ => "-".to_string(),
            };
            println!(
                "  {:<30} {:>8} {:>7} {:>8.1}% {:>8.1}%  {}",
                p.pattern_id,
                p.eligible,
                p.denied,
                p.realized_rate(),
                p.current_rate,
                trend
            );
        }
    }

    if !summary.comparisons.is_empty() {
        println!();
        for c in &summary.comparisons {
            let mark = if c.within_tolerance() { "ok" } else { "DRIFT" };
            println!(
                "  {:<22} target {:>6.1}  realized {:>6.1}  (±{:.1}) {}",
                c.metric, c.target, c.realized, c.tolerance, mark
            );
        }
    }

    if !summary.warnings.is_empty() {
        println!();
        println!("  Warnings:");
        for w in &summary.warnings {
            println!("    - {}", warning(w));
        }
    }
    println!();
}

fn warning(w: &RunWarning) -> String {
    match w {
        RunWarning::Shortfall { month, pattern_id, target, achieved } => {
            format!("{month}: {pattern_id} reached {achieved} of {target} denials")
        }
        RunWarning::MetricDrift { metric, target, realized, tolerance } => {
            format!("{metric} drifted to {realized:.1} from {target:.1} (tolerance {tolerance:.1})")
        }
        RunWarning::Validation { rule_id, path, message } => format!("[{rule_id}] {path}: {message}"),
        RunWarning::RejectedEntities { month, count } => {
            format!("{month}: sink rejected {count} entities")
        }
    }
}

pub fn bulk(report: &BulkReport) {
    for summary in &report.completed {
        run_summary(summary);
    }
    println!(
        "Bulk: {} completed, {} failed, {} skipped",
        report.completed.len(),
        report.failures.len(),
        report.skipped.len()
    );
    for f in &report.failures {
        println!("  FAILED #{} {}: {}", f.index, f.scenario_id, f.error);
        for issue in &f.issues {
            println!("      [{}] {}: {}", issue.rule_id, issue.path, issue.message);
        }
    }
    for id in &report.skipped {
        println!("  skipped {id}");
    }
}

pub fn batch(stats: &BatchStats) {
    println!("  Claims:        {} ({} line items)", stats.claims, stats.line_items);
    println!("  Denied:        {}", stats.denied);
    println!("  Appeals:       {}", stats.appeals);
    println!("  Events:        {}", stats.events);
    println!("  Billed:        {}", dollars(stats.billed_cents));
    println!("  Persisted:     {} claims, {} rejected entities", stats.persisted.claims, stats.rejected);
    for s in &stats.shortfalls {
        println!("  Shortfall:     {} reached {} of {}", s.pattern_id, s.achieved, s.target);
    }
}

pub fn live_progress(status: &GenerationStatus) {
    let t = &status.totals;
    let through = t
        .simulated_through
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  [{}] ticks {:>4}  claims {:>6}  denied {:>5}  through {}  errors {}",
        status.state, t.ticks, t.claims, t.denied, through, status.errors
    );
}

pub fn live_totals(totals: &GenerationTotals) {
    println!("  Ticks:         {} ({} failed)", totals.ticks, totals.failed_ticks);
    println!("  Claims:        {} ({} line items)", totals.claims, totals.line_items);
    println!("  Denied:        {}", totals.denied);
    println!("  Appeals:       {}", totals.appeals);
    println!("  Events:        {}", totals.events);
    println!("  Billed:        {}", dollars(totals.billed_cents));
    println!("  Persisted:     {} claims", totals.persisted.claims);
}
