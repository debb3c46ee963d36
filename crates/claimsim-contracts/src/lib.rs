//! # claimsim-contracts
//!
//! Shared types for the scenario-driven claims generation engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate; it holds data definitions, error types, and configuration.

pub mod calendar;
pub mod config;
pub mod entity;
pub mod error;
pub mod ids;
pub mod live;
pub mod policy;
pub mod report;
pub mod scenario;
