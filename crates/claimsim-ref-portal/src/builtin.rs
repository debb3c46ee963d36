//! Built-in policy library and scenarios, compiled into the binary.

use claimsim_contracts::{
    error::{SimError, SimResult},
    scenario::ScenarioDefinition,
};
use claimsim_policy::TomlPolicyLibrary;
use claimsim_verify::load_scenario_str;

const POLICY_LIBRARY: &str = include_str!("../policies/library.toml");

/// `(id, document)` for every built-in scenario, in presentation order.
pub const SCENARIOS: &[(&str, &str)] = &[
    (
        "cardiology-modifier-25",
        include_str!("../scenarios/cardiology_modifier_25.json"),
    ),
    (
        "orthopedics-prior-auth",
        include_str!("../scenarios/orthopedics_prior_auth.json"),
    ),
    (
        "family-medicine-steady",
        include_str!("../scenarios/family_medicine_steady.json"),
    ),
];

/// The reference payer policy library every built-in scenario cites.
pub fn policy_library() -> SimResult<TomlPolicyLibrary> {
    TomlPolicyLibrary::from_toml_str(POLICY_LIBRARY)
}

pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    SCENARIOS.iter().map(|(id, _)| *id)
}

/// Parse every built-in scenario.
pub fn builtin_scenarios() -> SimResult<Vec<ScenarioDefinition>> {
    SCENARIOS.iter().map(|(_, doc)| load_scenario_str(doc)).collect()
}

/// Parse one built-in scenario by id.
///
/// Returns `SimError::InvalidInput` naming the known ids when `id` is not
/// built in.
pub fn builtin_scenario(id: &str) -> SimResult<ScenarioDefinition> {
    let (_, doc) = SCENARIOS.iter().find(|(known, _)| *known == id).ok_or_else(|| {
        SimError::invalid(format!(
            "no built-in scenario '{id}'; known: {}",
            builtin_ids().collect::<Vec<_>>().join(", ")
        ))
    })?;
    load_scenario_str(doc)
}
