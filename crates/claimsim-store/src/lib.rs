//! # claimsim-store
//!
//! `ClaimSink` implementations for generated claim batches.
//!
//! - [`InMemoryClaimStore`]: shared, idempotent store for tests, dry
//!   inspection, and the live generation manager.
//! - [`JsonlClaimSink`]: appends every entity to a JSON Lines file.
//!
//! Both recognise a retried batch by its SHA-256 content fingerprint and
//! report it as `duplicate_batch` instead of inserting it twice.
//!
//! ```rust,ignore
//! use claimsim_store::InMemoryClaimStore;
//!
//! let store = InMemoryClaimStore::new();
//! let pipeline = ScenarioPipeline::new(Box::new(store.clone()), resolver, validator);
//! pipeline.run(&scenario, &RunOptions::seeded(7))?;
//! assert_eq!(store.totals()?.claims, scenario.volume.total_claims as u64);
//! ```

pub mod fingerprint;
pub mod jsonl;
pub mod memory;

pub use fingerprint::batch_fingerprint;
pub use jsonl::JsonlClaimSink;
pub use memory::InMemoryClaimStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
