//! The continuous generation manager.
//!
//! `GenerationManager` owns at most one background job. A job is a tokio
//! task ticking on `tokio::time::interval`; each tick generates one slice
//! of a simulated day and commits it to the sink. The task watches a
//! `watch` stop channel in `select!` so `stop()` takes effect before the
//! next tick while an in-flight tick always completes.
//!
//! A tick calls the synchronous `ClaimSink`. On a multi-thread runtime it
//! runs under `block_in_place` so sink I/O does not hold a worker that
//! other tasks are queued on.
//!
//! Tick failures never escape the loop. They are logged, counted, and
//! surfaced through `status()`; after `max_consecutive_failures` in a row
//! the job stops itself and records why.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::{
    runtime::{Handle, RuntimeFlavor},
    sync::watch,
    task::{block_in_place, JoinHandle},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use claimsim_contracts::{
    error::{SimError, SimResult},
    ids::RunId,
    live::{BatchStats, GenerationConfig, GenerationState, GenerationStatus, GenerationTotals, StartResponse},
};
use claimsim_core::{
    rng::{self, SimRng},
    traits::{ClaimSink, PolicyResolver},
    BatchContext,
};

use crate::tick::{check_config, BatchJob, SimClock};

struct Job {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Inner {
    sink: Arc<dyn ClaimSink>,
    resolver: Option<Arc<dyn PolicyResolver>>,
    status: Mutex<GenerationStatus>,
    job: Mutex<Option<Job>>,
}

impl Inner {
    // A poisoned lock still holds a consistent status snapshot; every
    // writer updates it in a single assignment.
    fn status(&self) -> MutexGuard<'_, GenerationStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job(&self) -> MutexGuard<'_, Option<Job>> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a generation manager. Clones share the same job and status.
#[derive(Clone)]
pub struct GenerationManager {
    inner: Arc<Inner>,
}

impl GenerationManager {
    pub fn new(sink: Arc<dyn ClaimSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                resolver: None,
                status: Mutex::new(GenerationStatus::default()),
                job: Mutex::new(None),
            }),
        }
    }

    /// Attach fix guidance from a policy library to generated denials.
    pub fn with_resolver(sink: Arc<dyn ClaimSink>, resolver: Arc<dyn PolicyResolver>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                resolver: Some(resolver),
                status: Mutex::new(GenerationStatus::default()),
                job: Mutex::new(None),
            }),
        }
    }

    /// Start a background job. Must be called from within a tokio runtime.
    ///
    /// Rejected (with `accepted: false`) while another job is running, when
    /// the configuration is invalid, or when no runtime is available.
    pub fn start(&self, config: GenerationConfig) -> StartResponse {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => return rejected(format!("no tokio runtime available: {e}")),
        };

        let prepared = check_config(&config)
            .and_then(|_| BatchContext::from_config(&config))
            .and_then(|ctx| SimClock::new(&config).map(|clock| (ctx, clock)));

        let run_id = RunId::new();
        {
            let mut status = self.inner.status();
            if status.state != GenerationState::Idle {
                warn!(state = %status.state, "start rejected: job already active");
                return rejected(SimError::AlreadyRunning.to_string());
            }
            let (ctx, clock) = match prepared {
                Ok(parts) => parts,
                Err(e) => {
                    warn!(error = %e, "start rejected: invalid generation config");
                    return rejected(e.to_string());
                }
            };

            *status = GenerationStatus {
                state: GenerationState::Running,
                run_id: Some(run_id),
                config: Some(config.clone()),
                started_at: Some(Utc::now()),
                ..GenerationStatus::default()
            };

            let (stop_tx, stop_rx) = watch::channel(false);
            let task = JobTask {
                inner: Arc::clone(&self.inner),
                rng: rng::stream(config.seed),
                config,
                ctx,
                clock,
            };
            let handle = runtime.spawn(task.run(stop_rx));
            *self.inner.job() = Some(Job { stop_tx, handle });
        }

        info!(%run_id, "generation job started");
        StartResponse {
            accepted: true,
            message: format!("generation job {run_id} started"),
            run_id: Some(run_id),
        }
    }

    /// Signal the running job, wait for its in-flight tick, and return the
    /// totals accumulated since the last `start`.
    pub async fn stop(&self) -> SimResult<GenerationTotals> {
        {
            let mut status = self.inner.status();
            if status.state != GenerationState::Running {
                return Err(SimError::NotRunning);
            }
            status.state = GenerationState::Stopping;
        }

        let job = self.inner.job().take();
        if let Some(job) = job {
            // The task may already have exited on its own.
            let _ = job.stop_tx.send(true);
            if let Err(e) = job.handle.await {
                error!(error = %e, "generation task ended abnormally");
            }
        }

        let mut status = self.inner.status();
        status.state = GenerationState::Idle;
        info!(
            ticks = status.totals.ticks,
            claims = status.totals.claims,
            errors = status.errors,
            "generation job stopped"
        );
        Ok(status.totals.clone())
    }

    /// Current state, configuration, and totals. No side effects.
    pub fn status(&self) -> GenerationStatus {
        self.inner.status().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.status().state == GenerationState::Running
    }

    /// Generate and commit one day's worth of claims synchronously,
    /// independent of any background job.
    pub fn run_single_batch(&self, config: &GenerationConfig) -> SimResult<BatchStats> {
        check_config(config)?;
        let mut ctx = BatchContext::from_config(config)?;
        let clock = SimClock::new(config)?;
        let mut rng = rng::stream(config.seed);

        let job = BatchJob {
            config,
            resolver: self.inner.resolver.as_deref(),
            sink: self.inner.sink.as_ref(),
        };
        let label = format!("single:{}", clock.day());
        let stats = job.run(&mut ctx, label, config.claims_per_day, clock.day(), &mut rng)?;
        info!(claims = stats.claims, denied = stats.denied, "single batch generated");
        Ok(stats)
    }
}

fn rejected(message: String) -> StartResponse {
    StartResponse {
        accepted: false,
        message,
        run_id: None,
    }
}

/// Run blocking work from inside a task. A current-thread runtime has no
/// second worker to take over, so the work runs inline there.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current().map(|h| h.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => block_in_place(f),
        _ => f(),
    }
}

/// State owned by the background task.
struct JobTask {
    inner: Arc<Inner>,
    config: GenerationConfig,
    ctx: BatchContext,
    clock: SimClock,
    rng: SimRng,
}

impl JobTask {
    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        debug!("stop signal received");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if !blocking(|| self.tick()) {
                        break;
                    }
                }
            }
        }
    }

    /// Run one tick. Returns false when the job stopped itself.
    fn tick(&mut self) -> bool {
        let day = self.clock.day();
        let label = format!("live:{day}");
        let job = BatchJob {
            config: &self.config,
            resolver: self.inner.resolver.as_deref(),
            sink: self.inner.sink.as_ref(),
        };
        let result = job.run(&mut self.ctx, label, self.clock.claims_due(), day, &mut self.rng);

        let mut status = self.inner.status();
        match result {
            Ok(stats) => {
                self.clock.advance();
                status.totals.ticks += 1;
                status.totals.record(&stats);
                status.totals.simulated_through = Some(day);
                status.consecutive_failures = 0;
                if !stats.shortfalls.is_empty() {
                    debug!(%day, shortfalls = stats.shortfalls.len(), "tick fell short of pattern targets");
                }
                true
            }
            Err(e) => {
                status.totals.failed_ticks += 1;
                status.errors += 1;
                status.consecutive_failures += 1;
                status.last_error = Some(e.to_string());
                warn!(
                    %day,
                    error = %e,
                    consecutive = status.consecutive_failures,
                    "generation tick failed"
                );

                let limit = self.config.max_consecutive_failures;
                if status.consecutive_failures >= limit {
                    let reason = format!("stopped after {limit} consecutive failed ticks; last error: {e}");
                    error!(%reason, "generation job stopping itself");
                    status.stop_reason = Some(reason);
                    status.state = GenerationState::Idle;
                    return false;
                }
                true
            }
        }
    }
}
