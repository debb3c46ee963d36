//! # claimsim-verify
//!
//! Scenario document loading and validation.
//!
//! Scenario documents are checked in two phases:
//!
//! 1. **Structural**: the raw JSON is validated against the bundled
//!    scenario schema with the `jsonschema` crate, before it is ever
//!    deserialized.
//! 2. **Semantic**: [`validator::JsonScenarioValidator`] evaluates the
//!    domain rules in [`rules`] against the typed document. Every issue is
//!    collected so a caller sees the full defect list in one pass.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use claimsim_verify::{loader, validator::JsonScenarioValidator};
//!
//! let scenarios = loader::load_scenarios_file("scenarios/cardiology.json")?;
//! let validator = JsonScenarioValidator::new()?;
//! let report = validator.validate(&scenarios[0], &policies);
//! ```

pub mod loader;
pub mod rules;
pub mod validator;

pub use loader::{load_scenario_str, load_scenarios_file, load_scenarios_str, SCENARIO_SCHEMA};
pub use validator::JsonScenarioValidator;
