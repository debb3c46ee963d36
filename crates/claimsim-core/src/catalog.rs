//! Built-in reference data for claim synthesis.
//!
//! Procedure and diagnosis code pools per specialty, the default payer
//! mix, and patient name parts. All values are fictional pairings of real
//! code formats; no patient data.

use claimsim_contracts::{
    error::{SimError, SimResult},
    scenario::Provider,
};

/// Codes a provider of one specialty plausibly bills.
#[derive(Debug)]
pub struct SpecialtyCodes {
    pub specialty: &'static str,
    pub procedures: &'static [&'static str],
    pub diagnoses: &'static [&'static str],
}

pub const SPECIALTIES: &[SpecialtyCodes] = &[
    SpecialtyCodes {
        specialty: "cardiology",
        procedures: &["99213", "99214", "93000", "93306", "93350", "93015", "93224", "93880"],
        diagnoses: &["I10", "I25.10", "I48.91", "I50.9", "R07.9", "R00.2", "E78.5"],
    },
    SpecialtyCodes {
        specialty: "orthopedics",
        procedures: &["99203", "99213", "20610", "29881", "27447", "73721", "97110", "20550"],
        diagnoses: &["M17.11", "M17.12", "M25.561", "S83.241A", "M75.101", "M54.50"],
    },
    SpecialtyCodes {
        specialty: "family_medicine",
        procedures: &["99213", "99214", "99396", "90471", "90686", "81002", "36415", "85025"],
        diagnoses: &["Z00.00", "J06.9", "E11.9", "I10", "Z23", "M54.50", "F41.1"],
    },
    SpecialtyCodes {
        specialty: "internal_medicine",
        procedures: &["99214", "99215", "99397", "80053", "83036", "36415", "93000"],
        diagnoses: &["E11.65", "I10", "E78.5", "N18.3", "Z00.01", "D64.9"],
    },
    SpecialtyCodes {
        specialty: "dermatology",
        procedures: &["99203", "99213", "11102", "11104", "17000", "17003", "11442", "96910"],
        diagnoses: &["L57.0", "D22.5", "L82.1", "C44.91", "L70.0", "L40.0"],
    },
    SpecialtyCodes {
        specialty: "radiology",
        procedures: &["71046", "72148", "73721", "74177", "70553", "77067", "76700"],
        diagnoses: &["R91.8", "M54.16", "R10.9", "Z12.31", "G43.909", "M25.561"],
    },
    SpecialtyCodes {
        specialty: "physical_therapy",
        procedures: &["97161", "97162", "97110", "97112", "97140", "97530", "97035"],
        diagnoses: &["M54.50", "M25.511", "S93.401A", "M62.81", "Z96.651"],
    },
    SpecialtyCodes {
        specialty: "pediatrics",
        procedures: &["99392", "99393", "99213", "90460", "90700", "96110", "87880"],
        diagnoses: &["Z00.129", "J02.9", "H66.90", "J45.909", "Z23", "R50.9"],
    },
    SpecialtyCodes {
        specialty: "behavioral_health",
        procedures: &["90791", "90834", "90837", "90847", "96127", "99214"],
        diagnoses: &["F32.1", "F41.1", "F43.10", "F90.0", "F33.1"],
    },
];

/// Diagnosis pool for providers whose specialty has no catalog entry but
/// who list their own procedure codes.
pub const GENERAL_DIAGNOSES: &[&str] = &["Z00.00", "R69", "R53.83", "M79.7", "R51.9"];

/// Modifiers occasionally attached to synthesized lines.
pub const COMMON_MODIFIERS: &[&str] = &["25", "59", "RT", "LT", "76", "GT"];

/// Payer mix used when a practice declares none.
pub const DEFAULT_PAYERS: &[(&str, f64)] = &[
    ("Medicare", 0.30),
    ("Blue Cross Blue Shield", 0.22),
    ("UnitedHealthcare", 0.18),
    ("Aetna", 0.12),
    ("Cigna", 0.10),
    ("Medicaid", 0.08),
];

pub const FIRST_NAMES: &[&str] = &[
    "Avery", "Jordan", "Morgan", "Riley", "Casey", "Quinn", "Harper", "Rowan", "Emerson",
    "Hayden", "Parker", "Reese", "Sawyer", "Skyler", "Dakota", "Finley",
];

pub const LAST_NAMES: &[&str] = &[
    "Alvarez", "Brennan", "Castillo", "Dunmore", "Ellison", "Fairbanks", "Galloway", "Hollis",
    "Iverson", "Jarrett", "Kessler", "Lindqvist", "Moreau", "Nakamura", "Okafor", "Pruitt",
];

/// `"Family Medicine"` and `"family-medicine"` both become `"family_medicine"`.
pub fn normalize_specialty(specialty: &str) -> String {
    specialty
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

pub fn specialty_codes(specialty: &str) -> Option<&'static SpecialtyCodes> {
    let key = normalize_specialty(specialty);
    SPECIALTIES.iter().find(|s| s.specialty == key)
}

/// The code pools one provider draws from.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub procedures: Vec<String>,
    pub diagnoses: Vec<String>,
}

impl ProviderProfile {
    /// Resolve a provider's procedure pool: its explicit codes when given,
    /// otherwise its specialty's catalog entry.
    ///
    /// Returns `SimError::Synthesis` when neither yields any code.
    pub fn resolve(provider: &Provider) -> SimResult<Self> {
        let catalog = specialty_codes(&provider.specialty);

        let procedures: Vec<String> = if provider.procedure_codes.is_empty() {
            catalog
                .map(|c| c.procedures.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default()
        } else {
            provider.procedure_codes.clone()
        };
        if procedures.is_empty() {
            return Err(SimError::synthesis(format!(
                "provider '{}' has no procedure codes and specialty '{}' is not in the catalog",
                provider.id, provider.specialty
            )));
        }

        let diagnoses = catalog
            .map(|c| c.diagnoses)
            .unwrap_or(GENERAL_DIAGNOSES)
            .iter()
            .map(|s| s.to_string())
            .collect();

        Ok(Self {
            provider_id: provider.id.clone(),
            procedures,
            diagnoses,
        })
    }

    pub fn bills(&self, code: &str) -> bool {
        self.procedures.iter().any(|c| c == code)
    }
}
