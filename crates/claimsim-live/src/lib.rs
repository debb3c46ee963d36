//! # claimsim-live
//!
//! Continuous, background claim generation.
//!
//! [`GenerationManager`] runs one job at a time on the tokio runtime:
//! `start(config)` spawns the ticking task, `stop()` ends it and returns
//! what it generated, `status()` reports progress, and
//! `run_single_batch(config)` produces one day's batch synchronously for
//! previews.
//!
//! ```rust,ignore
//! let manager = GenerationManager::new(Arc::new(InMemoryClaimStore::new()));
//! let started = manager.start(config);
//! assert!(started.accepted);
//! tokio::time::sleep(Duration::from_secs(5)).await;
//! let totals = manager.stop().await?;
//! ```

pub mod manager;
pub mod tick;

pub use manager::GenerationManager;
pub use tick::{ticks_per_day, SimClock, MAX_TICKS_PER_DAY, MIN_SPEED};

// ── Tests ─────────────────────────────────────────────────────────────────────
