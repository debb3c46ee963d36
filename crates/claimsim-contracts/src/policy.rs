//! Policy reference types.
//!
//! Patterns cite payer policies by identifier. The resolver (see
//! `claimsim-core::traits::PolicyResolver`) maps an identifier to the
//! guidance text that enriches generated denials.

use serde::{Deserialize, Serialize};

/// One entry of the payer policy library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyReference {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub payer: Option<String>,
    /// What a biller should change so the claim passes.
    pub fix_guidance: String,
    /// The billing mistake that most often triggers this policy.
    #[serde(default)]
    pub common_mistake: Option<String>,
}
