//! # claimsim-core
//!
//! The scenario-driven synthetic claims generation engine.
//!
//! This crate provides:
//! - The collaborator traits (`ClaimSink`, `PolicyResolver`,
//!   `ScenarioValidator`) the engine is wired through
//! - The curve and distribution library
//! - Claim, appeal, and learning-event synthesizers
//! - The pattern injector and the batch generator built on it
//! - The `ScenarioPipeline` and the `BulkRunner` that drives it
//!
//! ## Usage
//!
//! ```rust,ignore
//! use claimsim_core::{ScenarioPipeline, traits::{ClaimSink, PolicyResolver, ScenarioValidator}};
//!
//! let pipeline = ScenarioPipeline::new(Box::new(sink), Box::new(policies), Box::new(validator));
//! let summary = pipeline.run(&scenario, &RunOptions::dry_run())?;
//! ```

pub mod batch;
pub mod bulk;
pub mod catalog;
pub mod curves;
pub mod injector;
pub mod pipeline;
pub mod rng;
pub mod synth;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use batch::{BatchContext, BatchOutput, BatchRequest, EventQuota};
pub use bulk::{BulkOptions, BulkRunner};
pub use pipeline::ScenarioPipeline;
