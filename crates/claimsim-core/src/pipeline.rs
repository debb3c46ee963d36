//! The scenario pipeline: validate, generate month by month, summarize.
//!
//! A run moves strictly forward through
//!
//!   Loaded → Validating → Generating → Summarizing → Completed
//!
//! with `Failed` reachable from any non-terminal state. Validation collects
//! every issue before any generation starts; a failed validation never
//! reaches the sink. Each month is committed to the sink as its own batch,
//! so a failure in month N leaves months before N intact. Dry-run executes
//! the whole pipeline and skips only the sink.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use claimsim_contracts::{
    calendar::YearMonth,
    config::RunOptions,
    entity::{AppealOutcome, GeneratedBatch, InsertCounts},
    error::{SimError, SimResult},
    ids::RunId,
    report::{
        MetricComparison, MonthSummary, PatternBatchStats, PatternSummary, PipelineState,
        RunSummary, RunTotals, RunWarning, ValidationReport,
    },
    scenario::{PatternDefinition, ScenarioDefinition},
};

use crate::{
    batch::{BatchContext, BatchRequest, EventQuota},
    curves::{distribute_counts, rate_for_calendar_month},
    injector::{guidance_for, PatternTarget},
    rng,
    traits::{ClaimSink, PolicyResolver, ScenarioValidator},
};

/// Extra event weight a month receives per engagement cluster date it
/// contains.
const CLUSTER_MONTH_BOOST: f64 = 3.0;

/// Drives one scenario at a time from document to persisted batches.
///
/// The pipeline owns its collaborators; construct it once and call `run()`
/// for as many scenarios as needed.
pub struct ScenarioPipeline {
    sink: Box<dyn ClaimSink>,
    resolver: Box<dyn PolicyResolver>,
    validator: Box<dyn ScenarioValidator>,
}

/// What the generation phase hands to summarization.
struct Generated {
    months: Vec<MonthSummary>,
    totals: RunTotals,
    persisted: InsertCounts,
}

impl ScenarioPipeline {
    pub fn new(
        sink: Box<dyn ClaimSink>,
        resolver: Box<dyn PolicyResolver>,
        validator: Box<dyn ScenarioValidator>,
    ) -> Self {
        Self { sink, resolver, validator }
    }

    pub fn resolver(&self) -> &dyn PolicyResolver {
        self.resolver.as_ref()
    }

    /// Validate without generating.
    pub fn validate(&self, scenario: &ScenarioDefinition) -> ValidationReport {
        self.validator.validate(scenario, self.resolver.as_ref())
    }

    /// Run `scenario` to completion.
    ///
    /// # Errors
    ///
    /// - `ScenarioInvalid` when validation finds any error-severity issue.
    ///   Nothing is generated and the sink is never called.
    /// - `Synthesis` / `InvalidInput` when a month cannot be generated.
    ///   Months already committed stay committed.
    /// - `Persistence` when the sink fails a whole batch.
    ///
    /// Shortfalls, metric drift, and per-entity sink rejections are not
    /// errors; they are reported as warnings on the returned summary.
    pub fn run(&self, scenario: &ScenarioDefinition, options: &RunOptions) -> SimResult<RunSummary> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let mut history = vec![PipelineState::Loaded];

        info!(
            run_id = %run_id,
            scenario_id = %scenario.id,
            dry_run = options.dry_run,
            "pipeline run starting"
        );

        // ── Validating ───────────────────────────────────────────────────────
        advance(&mut history, PipelineState::Validating, &scenario.id);
        let report = self.validate(scenario);
        if !report.passed() {
            advance(&mut history, PipelineState::Failed, &scenario.id);
            warn!(
                scenario_id = %scenario.id,
                errors = report.errors().count(),
                warnings = report.warnings().count(),
                "scenario rejected by validation"
            );
            return Err(SimError::ScenarioInvalid {
                scenario_id: scenario.id.clone(),
                issues: report.issues,
            });
        }
        let mut warnings: Vec<RunWarning> = report
            .warnings()
            .map(|i| RunWarning::Validation {
                rule_id: i.rule_id.clone(),
                path: i.path.clone(),
                message: i.message.clone(),
            })
            .collect();

        // ── Generating ───────────────────────────────────────────────────────
        advance(&mut history, PipelineState::Generating, &scenario.id);
        let generated = match self.generate(scenario, options, &mut warnings) {
            Ok(g) => g,
            Err(e) => {
                advance(&mut history, PipelineState::Failed, &scenario.id);
                error!(
                    run_id = %run_id,
                    scenario_id = %scenario.id,
                    error = %e,
                    "generation failed"
                );
                return Err(e);
            }
        };

        // ── Summarizing ──────────────────────────────────────────────────────
        advance(&mut history, PipelineState::Summarizing, &scenario.id);
        let patterns = summarize_patterns(scenario, &generated.months);
        let comparisons = compare_targets(scenario, options, &generated.totals);
        for c in comparisons.iter().filter(|c| !c.within_tolerance()) {
            warn!(
                scenario_id = %scenario.id,
                metric = %c.metric,
                target = c.target,
                realized = c.realized,
                tolerance = c.tolerance,
                "realized metric drifted from target"
            );
            warnings.push(RunWarning::MetricDrift {
                metric: c.metric.clone(),
                target: c.target,
                realized: c.realized,
                tolerance: c.tolerance,
            });
        }

        advance(&mut history, PipelineState::Completed, &scenario.id);
        info!(
            run_id = %run_id,
            scenario_id = %scenario.id,
            claims = generated.totals.claims,
            denied = generated.totals.denied,
            appeals = generated.totals.appeals,
            events = generated.totals.events,
            warnings = warnings.len(),
            "pipeline run completed"
        );

        Ok(RunSummary {
            run_id,
            scenario_id: scenario.id.clone(),
            dry_run: options.dry_run,
            state_history: history,
            months: generated.months,
            patterns,
            totals: generated.totals,
            comparisons,
            warnings,
            persisted: generated.persisted,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn generate(
        &self,
        scenario: &ScenarioDefinition,
        options: &RunOptions,
        warnings: &mut Vec<RunWarning>,
    ) -> SimResult<Generated> {
        let mut rng = rng::stream(options.seed);

        let months = scenario.months();
        let weights = scenario.volume.month_weights(&months).ok_or_else(|| {
            SimError::invalid(format!(
                "{} monthly multipliers for a {}-month timeline",
                scenario.volume.monthly_multipliers.len(),
                months.len()
            ))
        })?;
        let per_month = distribute_counts(scenario.volume.total_claims, &weights)?;

        let mut context = BatchContext::from_scenario(scenario)?;
        let event_plan = plan_events(scenario, &months)?;
        let guidance: HashMap<&str, Option<String>> = scenario
            .patterns
            .iter()
            .map(|p| (p.id.as_str(), guidance_for(p, self.resolver.as_ref())))
            .collect();

        let mut summaries = Vec::with_capacity(months.len());
        let mut totals = RunTotals::default();
        let mut persisted = InsertCounts::default();

        for (month, claims) in months.iter().copied().zip(per_month) {
            let from = month.first_day().max(scenario.timeline.start_date);
            let to = month.last_day().min(scenario.timeline.end_date);

            let mut targets = Vec::new();
            for pattern in &scenario.patterns {
                let rate = rate_for_calendar_month(
                    &pattern.trajectory,
                    month,
                    options.noise_pct,
                    &mut rng,
                )?;
                if let Some(rate) = rate {
                    targets.push(PatternTarget {
                        pattern,
                        rate,
                        guidance: guidance.get(pattern.id.as_str()).cloned().flatten(),
                    });
                }
            }

            let quota: HashMap<String, u32> = event_plan
                .iter()
                .filter(|((_, m), _)| *m == month)
                .map(|((id, _), n)| (id.clone(), *n))
                .collect();

            let request = BatchRequest {
                label: format!("scenario:{}:{}", scenario.id, month),
                claims,
                from,
                to,
                targets,
                events: EventQuota::Fixed(quota),
            };
            let output = context.generate(&request, &mut rng)?;

            debug!(
                scenario_id = %scenario.id,
                month = %month,
                claims = output.batch.claims.len(),
                denied = output.denied_count(),
                appeals = output.batch.appeals.len(),
                events = output.batch.events.len(),
                "month generated"
            );

            for s in &output.shortfalls {
                warn!(
                    scenario_id = %scenario.id,
                    month = %month,
                    pattern_id = %s.pattern_id,
                    target = s.target,
                    achieved = s.achieved,
                    "pattern fell short of its target"
                );
                warnings.push(RunWarning::Shortfall {
                    month,
                    pattern_id: s.pattern_id.clone(),
                    target: s.target,
                    achieved: s.achieved,
                });
            }

            accumulate(&mut totals, &output.batch);

            if !options.dry_run && !output.batch.is_empty() {
                let report = self.sink.insert_batch(&output.batch)?;
                if report.duplicate_batch {
                    debug!(month = %month, batch_id = %output.batch.id, "sink reported a replayed batch");
                }
                if !report.failures.is_empty() {
                    warn!(
                        scenario_id = %scenario.id,
                        month = %month,
                        rejected = report.failures.len(),
                        "sink rejected entities"
                    );
                    warnings.push(RunWarning::RejectedEntities {
                        month,
                        count: report.failures.len(),
                    });
                }
                persisted.add(&report.inserted);
            }

            summaries.push(output.month_summary(Some(month)));
        }

        Ok(Generated { months: summaries, totals, persisted })
    }
}

fn advance(history: &mut Vec<PipelineState>, next: PipelineState, scenario_id: &str) {
    debug!(scenario_id = %scenario_id, state = %next, "pipeline state transition");
    history.push(next);
}

fn accumulate(totals: &mut RunTotals, batch: &GeneratedBatch) {
    totals.claims += batch.claims.len() as u64;
    totals.line_items += batch.line_count() as u64;
    for claim in &batch.claims {
        totals.billed_cents += claim.billed_cents;
        if claim.is_denied() {
            totals.denied += 1;
            totals.denied_cents += claim.billed_cents;
        }
    }
    for appeal in &batch.appeals {
        totals.appeals += 1;
        totals.recovered_cents += appeal.recovered_cents;
        match appeal.outcome {
            AppealOutcome::Overturned => totals.overturned += 1,
            AppealOutcome::Upheld => totals.upheld += 1,
            AppealOutcome::Pending => totals.pending += 1,
        }
    }
    totals.events += batch.events.len() as u64;
}

/// Split the scenario's learning-event total across patterns by engagement
/// weight, then across each pattern's active months, favouring months
/// that contain engagement cluster dates.
pub fn plan_events(
    scenario: &ScenarioDefinition,
    months: &[YearMonth],
) -> SimResult<HashMap<(String, YearMonth), u32>> {
    let mut plan = HashMap::new();
    let total = scenario.learning_events.total;
    if total == 0 {
        return Ok(plan);
    }

    let active: Vec<(&PatternDefinition, Vec<YearMonth>)> = scenario
        .patterns
        .iter()
        .map(|p| (p, months.iter().copied().filter(|m| p.active_in(*m)).collect::<Vec<_>>()))
        .filter(|(_, ms)| !ms.is_empty())
        .collect();
    if active.is_empty() {
        return Ok(plan);
    }

    let pattern_weights: Vec<f64> = active.iter().map(|(p, _)| p.engagement.weight()).collect();
    let per_pattern = distribute_counts(total, &pattern_weights)?;

    for ((pattern, active_months), count) in active.iter().zip(per_pattern) {
        let clusters = pattern.engagement.cluster_dates();
        let month_weights: Vec<f64> = active_months
            .iter()
            .map(|m| {
                let hits = clusters.iter().filter(|d| m.contains(**d)).count();
                1.0 + CLUSTER_MONTH_BOOST * hits as f64
            })
            .collect();
        let per_month = distribute_counts(count, &month_weights)?;
        for (month, n) in active_months.iter().zip(per_month) {
            if n > 0 {
                plan.insert((pattern.id.clone(), *month), n);
            }
        }
    }
    Ok(plan)
}

fn summarize_patterns(scenario: &ScenarioDefinition, months: &[MonthSummary]) -> Vec<PatternSummary> {
    scenario
        .patterns
        .iter()
        .map(|pattern| {
            let stats: Vec<&PatternBatchStats> = months
                .iter()
                .flat_map(|m| m.patterns.iter())
                .filter(|s| s.pattern_id == pattern.id)
                .collect();
            PatternSummary {
                pattern_id: pattern.id.clone(),
                eligible: stats.iter().map(|s| s.eligible as u64).sum(),
                target_denied: stats.iter().map(|s| s.target as u64).sum(),
                denied: stats.iter().map(|s| s.denied as u64).sum(),
                shortfall_months: stats.iter().filter(|s| s.denied < s.target).count() as u32,
                baseline_rate: pattern.trajectory.baseline.denial_rate,
                current_rate: pattern.trajectory.current.denial_rate,
                first_month_rate: stats.first().map(|s| s.realized_rate()),
                last_month_rate: stats.last().map(|s| s.realized_rate()),
            }
        })
        .collect()
}

fn compare_targets(
    scenario: &ScenarioDefinition,
    options: &RunOptions,
    totals: &RunTotals,
) -> Vec<MetricComparison> {
    let targets = &scenario.target_metrics;
    let tolerance = targets.tolerance.unwrap_or(options.drift_tolerance);
    [
        ("overall_denial_rate", targets.overall_denial_rate, totals.denial_rate()),
        ("appeal_rate", targets.appeal_rate, totals.appeal_rate()),
        ("overturn_rate", targets.overturn_rate, totals.overturn_rate()),
    ]
    .into_iter()
    .filter_map(|(metric, target, realized)| {
        target.map(|target| MetricComparison {
            metric: metric.to_string(),
            target,
            realized,
            tolerance,
        })
    })
    .collect()
}
