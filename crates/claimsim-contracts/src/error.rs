//! Error types for the claims generation engine.
//!
//! Every fallible operation returns `SimResult<T>`. Variants carry enough
//! context for a caller (CLI, bulk runner, manager status) to report the
//! failure without re-deriving it.

use thiserror::Error;

use crate::report::ValidationIssue;

/// The unified error type for scenario generation.
#[derive(Debug, Error)]
pub enum SimError {
    /// A pure curve/distribution function received malformed input.
    ///
    /// These indicate a malformed scenario and are never clamped silently.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The scenario failed validation. All issues are reported at once.
    #[error("scenario '{scenario_id}' is invalid ({} issue(s))", issues.len())]
    ScenarioInvalid {
        scenario_id: String,
        issues: Vec<ValidationIssue>,
    },

    /// An entity synthesizer could not produce output (e.g. a provider with
    /// no procedure codes). Fatal to the current batch.
    #[error("synthesis failed: {reason}")]
    Synthesis { reason: String },

    /// The persistence sink rejected or failed a batch.
    #[error("persistence failed: {reason}")]
    Persistence { reason: String },

    /// `start` was called while a generation job is already running.
    #[error("a generation job is already running")]
    AlreadyRunning,

    /// `stop` was called while no generation job is running.
    #[error("no generation job is running")]
    NotRunning,

    /// A configuration value is missing, unreadable, or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A scenario document does not match the document schema.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },
}

impl SimError {
    /// Shorthand for `SimError::InvalidInput`.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput { reason: reason.into() }
    }

    /// Shorthand for `SimError::Synthesis`.
    pub fn synthesis(reason: impl Into<String>) -> Self {
        Self::Synthesis { reason: reason.into() }
    }
}

/// Convenience alias used throughout the claimsim crates.
pub type SimResult<T> = Result<T, SimError>;
