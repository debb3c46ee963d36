//! Entity synthesizers.
//!
//! Each synthesizer turns a small request plus a random stream into one
//! kind of generated entity. None of them touch persistence.

pub mod appeal;
pub mod claim;
pub mod event;

pub use appeal::{synthesize_appeal, AppealOutcomeTable};
pub use claim::{synthesize_claim, ClaimRequest};
pub use event::{synthesize_events, EventMix, EventRequest};
