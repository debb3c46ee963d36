//! Random source construction.
//!
//! Every synthesizer takes `&mut impl Rng` so tests can pin a seed. Owners
//! of a stream (the pipeline, the generation manager) build theirs here.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// The engine's random stream type.
pub type SimRng = ChaCha8Rng;

/// A fixed-seed stream when `seed` is given, otherwise one seeded from the
/// operating system.
pub fn stream(seed: Option<u64>) -> SimRng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}
