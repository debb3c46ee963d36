//! claimsim: scenario-driven synthetic claims generation CLI.
//!
//! Scenarios are named either by a built-in id (see `claimsim list`) or by
//! a path to a JSON file holding one scenario or an array of them.
//!
//! Usage:
//!   cargo run -p claimsim-demo -- list
//!   cargo run -p claimsim-demo -- validate scenarios/*.json
//!   cargo run -p claimsim-demo -- run cardiology-modifier-25 --seed 7
//!   cargo run -p claimsim-demo -- bulk --continue-on-error --dry-run
//!   cargo run -p claimsim-demo -- batch orthopedics-prior-auth --claims-per-day 60
//!   cargo run -p claimsim-demo -- live family-medicine-steady --speed 8 --duration-secs 20

mod print;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use claimsim_contracts::{
    config::{RunOptions, SimConfig},
    error::{SimError, SimResult},
    live::GenerationConfig,
    scenario::ScenarioDefinition,
};
use claimsim_core::{traits::ClaimSink, BulkOptions};
use claimsim_ref_portal as portal;
use claimsim_store::{InMemoryClaimStore, JsonlClaimSink};
use claimsim_verify::load_scenarios_file;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Generate synthetic healthcare claims that follow scripted denial trends.
#[derive(Parser)]
#[command(
    name = "claimsim",
    about = "Scenario-driven synthetic claims generation",
    long_about = "Validates claim scenarios and generates claims, denials, appeals, and\n\
                  learning events whose denial rates follow each pattern's trajectory."
)]
struct Cli {
    /// TOML file with [run] and [live] defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in scenarios.
    List,
    /// Validate scenarios without generating anything.
    Validate {
        /// Built-in ids or JSON files. All built-ins when omitted.
        scenarios: Vec<String>,
    },
    /// Run one scenario through the pipeline.
    Run {
        scenario: String,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run several scenarios in order.
    Bulk {
        /// Built-in ids or JSON files. All built-ins when omitted.
        scenarios: Vec<String>,
        /// Keep going after a scenario fails.
        #[arg(long)]
        continue_on_error: bool,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Generate one simulated day at each pattern's current rate.
    Batch {
        scenario: String,
        #[command(flatten)]
        live: LiveArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Generate continuously in the background for a while.
    Live {
        scenario: String,
        #[command(flatten)]
        live: LiveArgs,
        /// Wall-clock seconds to keep the job running.
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Fixed seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Generate and summarize without persisting.
    #[arg(long)]
    dry_run: bool,
    /// Bound on monthly rate noise, percent.
    #[arg(long)]
    noise_pct: Option<f64>,
}

#[derive(Args)]
struct LiveArgs {
    /// Standalone generation config (TOML). Replaces the scenario-derived one.
    #[arg(long)]
    generation_config: Option<PathBuf>,
    #[arg(long)]
    claims_per_day: Option<u32>,
    /// Simulated-time multiplier.
    #[arg(long)]
    speed: Option<f64>,
    #[arg(long)]
    tick_interval_ms: Option<u64>,
    /// First simulated day (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct OutputArgs {
    /// Append generated entities to this JSON Lines file instead of keeping
    /// them in memory.
    #[arg(long)]
    out: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for per-month and per-tick detail.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("claimsim error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the command completed but found failures.
fn run(cli: Cli) -> SimResult<bool> {
    let config = match &cli.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    let json = cli.json;

    match cli.command {
        Command::List => list(),
        Command::Validate { scenarios } => validate(&scenarios, json),
        Command::Run { scenario, run, output } => {
            run_one(&scenario, &config, &run, &output, json)
        }
        Command::Bulk { scenarios, continue_on_error, run, output } => {
            bulk(&scenarios, &config, &run, continue_on_error, &output, json)
        }
        Command::Batch { scenario, live, output } => batch(&scenario, &config, &live, &output, json),
        Command::Live { scenario, live, duration_secs, output } => {
            live_run(&scenario, &config, &live, duration_secs, &output, json)
        }
    }
}

// ── Scenario sources ──────────────────────────────────────────────────────────

/// Resolve one argument: an existing file path, else a built-in id.
fn load(source: &str) -> SimResult<Vec<ScenarioDefinition>> {
    let path = Path::new(source);
    if path.is_file() {
        load_scenarios_file(path)
    } else {
        portal::builtin_scenario(source).map(|s| vec![s])
    }
}

fn load_all(sources: &[String]) -> SimResult<Vec<ScenarioDefinition>> {
    if sources.is_empty() {
        return portal::builtin_scenarios();
    }
    let mut scenarios = Vec::new();
    for source in sources {
        scenarios.extend(load(source)?);
    }
    Ok(scenarios)
}

fn load_one(source: &str) -> SimResult<ScenarioDefinition> {
    let mut scenarios = load(source)?;
    match scenarios.len() {
        1 => Ok(scenarios.remove(0)),
        n => Err(SimError::invalid(format!(
            "'{source}' holds {n} scenarios; name exactly one"
        ))),
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Where generated entities go. The in-memory store is kept so its
/// contents can be counted afterwards.
enum Output {
    Memory(InMemoryClaimStore),
    File(Arc<JsonlClaimSink>),
}

impl Output {
    fn open(args: &OutputArgs) -> SimResult<Self> {
        match &args.out {
            Some(path) => Ok(Output::File(Arc::new(JsonlClaimSink::open(path)?))),
            None => Ok(Output::Memory(InMemoryClaimStore::new())),
        }
    }

    fn sink(&self) -> Arc<dyn ClaimSink> {
        match self {
            Output::Memory(store) => Arc::new(store.clone()),
            Output::File(sink) => Arc::clone(sink) as Arc<dyn ClaimSink>,
        }
    }

    fn report(&self) -> SimResult<()> {
        match self {
            Output::Memory(store) => {
                let totals = store.totals()?;
                info!(
                    claims = totals.claims,
                    appeals = totals.appeals,
                    events = totals.events,
                    "in-memory store contents"
                );
            }
            Output::File(sink) => println!("Entities written to {}", sink.path().display()),
        }
        Ok(())
    }
}

fn emit_json<T: Serialize>(value: &T) -> SimResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| SimError::invalid(format!(
        "report could not be serialized: {e}"
    )))?;
    println!("{text}");
    Ok(())
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn list() -> SimResult<bool> {
    for scenario in portal::builtin_scenarios()? {
        println!("  {:<28} {}", scenario.id, scenario.name);
    }
    Ok(true)
}

fn validate(sources: &[String], json: bool) -> SimResult<bool> {
    let pipeline = portal::pipeline(Arc::new(InMemoryClaimStore::new()))?;
    let mut all_passed = true;
    let mut reports = Vec::new();
    for scenario in load_all(sources)? {
        let report = pipeline.validate(&scenario);
        all_passed &= report.passed();
        if json {
            reports.push((scenario.id, report));
        } else {
            print::validation(&scenario.id, &report);
        }
    }
    if json {
        emit_json(&reports)?;
    }
    Ok(all_passed)
}

fn run_options(config: &SimConfig, args: &RunArgs) -> RunOptions {
    let mut options = config.run.clone();
    if args.seed.is_some() {
        options.seed = args.seed;
    }
    if args.dry_run {
        options.dry_run = true;
    }
    if let Some(noise) = args.noise_pct {
        options.noise_pct = noise;
    }
    options
}

fn run_one(
    source: &str,
    config: &SimConfig,
    args: &RunArgs,
    output: &OutputArgs,
    json: bool,
) -> SimResult<bool> {
    let scenario = load_one(source)?;
    let output = Output::open(output)?;
    let pipeline = portal::pipeline(output.sink())?;

    let summary = pipeline.run(&scenario, &run_options(config, args))?;
    if json {
        emit_json(&summary)?;
    } else {
        print::run_summary(&summary);
    }
    output.report()?;
    Ok(true)
}

fn bulk(
    sources: &[String],
    config: &SimConfig,
    args: &RunArgs,
    continue_on_error: bool,
    output: &OutputArgs,
    json: bool,
) -> SimResult<bool> {
    let scenarios = load_all(sources)?;
    let output = Output::open(output)?;
    let runner = portal::bulk_runner(output.sink())?;

    let run = run_options(config, args);
    let options = BulkOptions {
        dry_run: run.dry_run,
        continue_on_error,
        run,
    };
    let report = runner.run(&scenarios, &options);
    if json {
        emit_json(&report)?;
    } else {
        print::bulk(&report);
    }
    output.report()?;
    Ok(report.succeeded())
}

fn generation_config(source: &str, config: &SimConfig, args: &LiveArgs) -> SimResult<GenerationConfig> {
    let mut generation = match &args.generation_config {
        Some(path) => GenerationConfig::from_file(path)?,
        None => portal::live_config(&load_one(source)?, &config.live),
    };
    if let Some(n) = args.claims_per_day {
        generation.claims_per_day = n;
    }
    if let Some(speed) = args.speed {
        generation.speed = speed;
    }
    if let Some(ms) = args.tick_interval_ms {
        generation.tick_interval_ms = ms;
    }
    if let Some(date) = &args.start_date {
        generation.start_date = Some(*date);
    }
    if args.seed.is_some() {
        generation.seed = args.seed;
    }
    Ok(generation)
}

fn batch(
    source: &str,
    config: &SimConfig,
    args: &LiveArgs,
    output: &OutputArgs,
    json: bool,
) -> SimResult<bool> {
    let generation = generation_config(source, config, args)?;
    let output = Output::open(output)?;
    let manager = portal::live_manager(output.sink())?;

    let stats = manager.run_single_batch(&generation)?;
    if json {
        emit_json(&stats)?;
    } else {
        println!("=== single batch: {} ===", generation.practice.name);
        print::batch(&stats);
    }
    output.report()?;
    Ok(stats.rejected == 0)
}

fn live_run(
    source: &str,
    config: &SimConfig,
    args: &LiveArgs,
    duration_secs: u64,
    output: &OutputArgs,
    json: bool,
) -> SimResult<bool> {
    let generation = generation_config(source, config, args)?;
    let output = Output::open(output)?;
    let manager = portal::live_manager(output.sink())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| SimError::ConfigError {
            reason: format!("failed to start async runtime: {e}"),
        })?;

    let (totals, stop_reason) = runtime.block_on(async {
        let response = manager.start(generation);
        if !response.accepted {
            return Err(SimError::ConfigError { reason: response.message });
        }
        if !json {
            println!("{}", response.message);
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(duration_secs);
        let mut progress = tokio::time::interval(Duration::from_secs(1));
        loop {
            progress.tick().await;
            let status = manager.status();
            if !json {
                print::live_progress(&status);
            }
            if !manager.is_running() {
                warn!(reason = ?status.stop_reason, "generation job ended on its own");
                return Ok((status.totals, status.stop_reason));
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
        }
        manager.stop().await.map(|totals| (totals, None))
    })?;

    if json {
        emit_json(&totals)?;
    } else {
        println!("=== live generation finished ===");
        print::live_totals(&totals);
        if let Some(reason) = &stop_reason {
            println!("  Stopped:       {reason}");
        }
    }
    output.report()?;
    Ok(stop_reason.is_none())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config_file() {
        let config = SimConfig::from_toml_str(include_str!("../config/claimsim.toml")).unwrap();
        let args = RunArgs { seed: Some(9), dry_run: true, noise_pct: None };
        let options = run_options(&config, &args);
        assert_eq!(options.seed, Some(9));
        assert!(options.dry_run);
        assert_eq!(options.noise_pct, 5.0);
    }

    #[test]
    fn live_flags_override_scenario_defaults() {
        let config = SimConfig::from_toml_str(include_str!("../config/claimsim.toml")).unwrap();
        let args = LiveArgs {
            generation_config: None,
            claims_per_day: None,
            speed: Some(2.0),
            tick_interval_ms: None,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            seed: Some(1),
        };
        let generation = generation_config("cardiology-modifier-25", &config, &args).unwrap();
        assert_eq!(generation.claims_per_day, 96);
        assert_eq!(generation.speed, 2.0);
        assert_eq!(generation.tick_interval_ms, 500);
        assert_eq!(generation.start_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    }

    #[test]
    fn unknown_source_is_an_error() {
        assert!(load_one("no-such-scenario").is_err());
        assert_eq!(load_all(&[]).unwrap().len(), 3);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "claimsim", "bulk", "--continue-on-error", "--dry-run", "--seed", "4", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Bulk { continue_on_error: true, run: RunArgs { dry_run: true, seed: Some(4), .. }, .. }
        ));
    }
}
