//! Content fingerprints for generated batches.
//!
//! A retried batch is recognised by what it contains, not by its `BatchId`
//! or label. Hash input layout (bytes, in order):
//!   1. canonical JSON of `claims`
//!   2. canonical JSON of `appeals`
//!   3. canonical JSON of `events`
//!
//! Each part is prefixed with its length as 8-byte little-endian so the
//! boundaries between parts cannot shift.

use sha2::{Digest, Sha256};

use claimsim_contracts::{
    entity::GeneratedBatch,
    error::{SimError, SimResult},
};

/// Lowercase 64-character hex SHA-256 of the batch's entities.
pub fn batch_fingerprint(batch: &GeneratedBatch) -> SimResult<String> {
    let parts = [
        serde_json::to_vec(&batch.claims),
        serde_json::to_vec(&batch.appeals),
        serde_json::to_vec(&batch.events),
    ];

    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.map_err(|e| SimError::Persistence {
            reason: format!("batch '{}' could not be serialized: {e}", batch.label),
        })?;
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}
