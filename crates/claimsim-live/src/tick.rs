//! Simulated clock and the per-batch work shared by ticks and
//! `run_single_batch`.

use chrono::{Duration, NaiveDate, Utc};
use tracing::debug;

use claimsim_contracts::{
    error::{SimError, SimResult},
    live::{BatchStats, GenerationConfig},
};
use claimsim_core::{
    curves::distribute_counts,
    injector::{guidance_for, PatternTarget},
    rng::SimRng,
    traits::{ClaimSink, PolicyResolver},
    BatchContext, BatchRequest, EventQuota,
};

/// Finest split of a simulated day: one tick per simulated minute.
pub const MAX_TICKS_PER_DAY: u32 = 24 * 60;

/// Slowest accepted speed, the one that reaches [`MAX_TICKS_PER_DAY`].
pub const MIN_SPEED: f64 = 24.0 / MAX_TICKS_PER_DAY as f64;

/// Ticks one simulated day is split into: `ceil(24 / speed)`, clamped to
/// `1..=MAX_TICKS_PER_DAY`.
pub fn ticks_per_day(speed: f64) -> u32 {
    let ticks = (24.0 / speed).ceil();
    if ticks.is_nan() {
        return 1;
    }
    ticks.clamp(1.0, MAX_TICKS_PER_DAY as f64) as u32
}

/// Reject configurations a job could never run with.
pub fn check_config(config: &GenerationConfig) -> SimResult<()> {
    let bad = |reason: String| Err(SimError::ConfigError { reason });
    if config.claims_per_day == 0 {
        return bad("claims_per_day must be greater than zero".to_string());
    }
    if !config.speed.is_finite() || config.speed <= 0.0 {
        return bad(format!("speed must be a positive number, got {}", config.speed));
    }
    if config.speed < MIN_SPEED {
        return bad(format!(
            "speed must be at least {MIN_SPEED} ({MAX_TICKS_PER_DAY} ticks per simulated day), got {}",
            config.speed
        ));
    }
    if config.tick_interval_ms == 0 {
        return bad("tick_interval_ms must be greater than zero".to_string());
    }
    if config.max_consecutive_failures == 0 {
        return bad("max_consecutive_failures must be at least 1".to_string());
    }
    if !config.event_rate.is_finite() || !(0.0..=1.0).contains(&config.event_rate) {
        return bad(format!("event_rate must be within [0, 1], got {}", config.event_rate));
    }
    for pattern in &config.patterns {
        let rate = pattern.trajectory.current.denial_rate;
        if !(0.0..=100.0).contains(&rate) {
            return bad(format!(
                "pattern '{}' current denial rate must be within [0, 100], got {rate}",
                pattern.id
            ));
        }
        if pattern.procedure_codes.is_empty() {
            return bad(format!("pattern '{}' has no procedure codes", pattern.id));
        }
    }
    Ok(())
}

/// Position in simulated time. Each day's claims are apportioned across its
/// ticks so the day always totals exactly `claims_per_day`.
#[derive(Debug, Clone)]
pub struct SimClock {
    day: NaiveDate,
    tick_in_day: usize,
    per_tick: Vec<u32>,
}

impl SimClock {
    pub fn new(config: &GenerationConfig) -> SimResult<Self> {
        let ticks = ticks_per_day(config.speed) as usize;
        Ok(Self {
            day: config.start_date.unwrap_or_else(|| Utc::now().date_naive()),
            tick_in_day: 0,
            per_tick: distribute_counts(config.claims_per_day, &vec![1.0; ticks])?,
        })
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Claims due on the current tick.
    pub fn claims_due(&self) -> u32 {
        self.per_tick[self.tick_in_day]
    }

    /// Move to the next tick, rolling over to the next day when the current
    /// one is complete.
    pub fn advance(&mut self) {
        self.tick_in_day += 1;
        if self.tick_in_day == self.per_tick.len() {
            self.tick_in_day = 0;
            self.day += Duration::days(1);
        }
    }
}

/// Everything one batch needs apart from the random stream.
pub struct BatchJob<'a> {
    pub config: &'a GenerationConfig,
    pub resolver: Option<&'a dyn PolicyResolver>,
    pub sink: &'a dyn ClaimSink,
}

impl BatchJob<'_> {
    /// Generate `claims` claims dated `day`, inject every pattern at its
    /// current rate, and commit the batch.
    pub fn run(
        &self,
        ctx: &mut BatchContext,
        label: String,
        claims: u32,
        day: NaiveDate,
        rng: &mut SimRng,
    ) -> SimResult<BatchStats> {
        let targets = self
            .config
            .patterns
            .iter()
            .map(|pattern| PatternTarget {
                pattern,
                rate: pattern.trajectory.current.denial_rate,
                guidance: self.resolver.and_then(|r| guidance_for(pattern, r)),
            })
            .collect();
        let request = BatchRequest {
            label,
            claims,
            from: day,
            to: day,
            targets,
            events: EventQuota::PerDenial(self.config.event_rate),
        };

        let output = ctx.generate(&request, rng)?;
        let mut stats = output.stats();
        if !output.batch.is_empty() {
            let report = self.sink.insert_batch(&output.batch)?;
            stats.persisted = report.inserted;
            stats.rejected = report.failures.len();
        }
        debug!(
            label = %request.label,
            claims = stats.claims,
            denied = stats.denied,
            rejected = stats.rejected,
            "live batch committed"
        );
        Ok(stats)
    }
}
