//! Policy library entry types and file schema.
//!
//! A `PolicyLibraryConfig` is deserialized from TOML and holds the list of
//! payer policies that scenario patterns cite by id.

use serde::{Deserialize, Serialize};

use claimsim_contracts::policy::PolicyReference;

/// A single policy loaded from TOML.
///
/// Example in TOML:
/// ```toml
/// [[policies]]
/// id = "CMS-NCCI-25"
/// title = "Modifier 25 on same-day E/M services"
/// payer = "Medicare"
/// aliases = ["NCCI-MOD-25"]
/// fix_guidance = "Append modifier 25 to the E/M line when a separately identifiable service was performed."
/// common_mistake = "Billing 99214 with 93000 and no modifier."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// Stable identifier patterns reference in `policy_ids`.
    pub id: String,

    pub title: String,

    /// Payer the policy comes from. Absent for cross-payer guidance such as
    /// CPT coding conventions.
    #[serde(default)]
    pub payer: Option<String>,

    /// Other identifiers the same policy is cited under (older revision
    /// numbers, payer-local names). Matched like `id`.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// What a biller should change so the claim passes. Must not be empty.
    pub fix_guidance: String,

    #[serde(default)]
    pub common_mistake: Option<String>,
}

impl PolicyEntry {
    /// Every identifier this entry answers to.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    pub fn to_reference(&self) -> PolicyReference {
        PolicyReference {
            id: self.id.clone(),
            title: self.title.clone(),
            payer: self.payer.clone(),
            fix_guidance: self.fix_guidance.clone(),
            common_mistake: self.common_mistake.clone(),
        }
    }
}

/// The top-level structure deserialized from a TOML policy library file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyLibraryConfig {
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
}
