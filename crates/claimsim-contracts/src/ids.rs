//! Identifier newtypes for generated entities and runs.
//!
//! Every generated entity carries a random v4 UUID so batches from separate
//! runs (or a retried batch) never collide on identity.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Create a new, unique identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Identity of one synthesized claim.
    ClaimId
);

uuid_id!(
    /// Identity of one synthesized appeal.
    AppealId
);

uuid_id!(
    /// Identity of one synthesized learning event.
    EventId
);

uuid_id!(
    /// Identity of one generated batch (a scenario month or a manager tick).
    ///
    /// Sinks use it in receipts; idempotency is keyed on batch content, not
    /// on this id.
    BatchId
);

uuid_id!(
    /// Identity of one pipeline run or one manager job.
    RunId
);
