//! TOML-backed policy library.
//!
//! `TomlPolicyLibrary` loads a `PolicyLibraryConfig` from a TOML string or
//! file and implements the `PolicyResolver` trait from claimsim-core.
//!
//! Lookups match an entry's `id` or any of its `aliases`, ignoring ASCII
//! case and surrounding whitespace. Identifiers must be unique across the
//! whole library, aliases included; a clash is a load-time error.

use std::{collections::HashMap, path::Path};

use tracing::debug;

use claimsim_contracts::{
    error::{SimError, SimResult},
    policy::PolicyReference,
};
use claimsim_core::traits::PolicyResolver;

use crate::entry::{PolicyEntry, PolicyLibraryConfig};

/// A `PolicyResolver` implementation that reads policies from a TOML
/// document.
///
/// ```rust,ignore
/// use claimsim_policy::TomlPolicyLibrary;
///
/// let library = TomlPolicyLibrary::from_file(Path::new("policies/library.toml"))?;
/// ```
#[derive(Debug)]
pub struct TomlPolicyLibrary {
    config: PolicyLibraryConfig,
    index: HashMap<String, usize>,
}

fn normalize(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}

impl TomlPolicyLibrary {
    /// Parse `s` as TOML and build the library.
    ///
    /// Returns `SimError::ConfigError` if the TOML is malformed, does not
    /// match `PolicyLibraryConfig`, repeats an identifier, or carries an
    /// entry with empty fix guidance.
    pub fn from_toml_str(s: &str) -> SimResult<Self> {
        let config: PolicyLibraryConfig = toml::from_str(s).map_err(|e| SimError::ConfigError {
            reason: format!("failed to parse policy library TOML: {}", e),
        })?;
        Self::from_config(config)
    }

    /// Read the file at `path` and parse it as a TOML policy library.
    pub fn from_file(path: &Path) -> SimResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SimError::ConfigError {
            reason: format!("failed to read policy library '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_config(config: PolicyLibraryConfig) -> SimResult<Self> {
        let mut index = HashMap::new();
        for (pos, entry) in config.policies.iter().enumerate() {
            if entry.fix_guidance.trim().is_empty() {
                return Err(SimError::ConfigError {
                    reason: format!("policy '{}' has empty fix_guidance", entry.id),
                });
            }
            for ident in entry.identifiers() {
                let key = normalize(ident);
                if key.is_empty() {
                    return Err(SimError::ConfigError {
                        reason: format!("policy at position {} has a blank identifier", pos),
                    });
                }
                if let Some(previous) = index.insert(key, pos) {
                    return Err(SimError::ConfigError {
                        reason: format!(
                            "policy identifier '{}' is declared by both '{}' and '{}'",
                            ident, config.policies[previous].id, entry.id
                        ),
                    });
                }
            }
        }
        debug!(policies = config.policies.len(), "policy library loaded");
        Ok(Self { config, index })
    }

    pub fn len(&self) -> usize {
        self.config.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.config.policies.is_empty()
    }

    pub fn entries(&self) -> &[PolicyEntry] {
        &self.config.policies
    }

    pub fn get(&self, policy_id: &str) -> Option<&PolicyEntry> {
        self.index
            .get(&normalize(policy_id))
            .map(|&pos| &self.config.policies[pos])
    }

    /// Entries published by `payer`, plus payer-agnostic ones.
    pub fn for_payer<'a>(&'a self, payer: &'a str) -> impl Iterator<Item = &'a PolicyEntry> + 'a {
        self.config
            .policies
            .iter()
            .filter(move |p| p.payer.as_deref().map_or(true, |own| own.eq_ignore_ascii_case(payer)))
    }
}

impl PolicyResolver for TomlPolicyLibrary {
    fn resolve(&self, policy_id: &str) -> Option<PolicyReference> {
        let found = self.get(policy_id).map(PolicyEntry::to_reference);
        if found.is_none() {
            debug!(policy_id = %policy_id, "policy id not in library");
        }
        found
    }
}
