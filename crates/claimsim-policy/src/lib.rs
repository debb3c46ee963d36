//! # claimsim-policy
//!
//! A TOML-driven payer policy library for the claims generation engine.
//!
//! ## Overview
//!
//! This crate provides [`TomlPolicyLibrary`], which implements the
//! [`PolicyResolver`](claimsim_core::traits::PolicyResolver) trait. Policies
//! are declared in a TOML file; scenario patterns cite them by id, the
//! validator checks every citation resolves, and the pipeline copies each
//! policy's fix guidance onto the denials it generates.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use claimsim_policy::TomlPolicyLibrary;
//!
//! let library = TomlPolicyLibrary::from_file(Path::new("policies/library.toml"))?;
//! // Pass `library` to `claimsim_core::ScenarioPipeline::new(...)`.
//! ```

pub mod entry;
pub mod library;

pub use entry::{PolicyEntry, PolicyLibraryConfig};
pub use library::TomlPolicyLibrary;

// ── Tests ─────────────────────────────────────────────────────────────────────
