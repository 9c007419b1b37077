//! Randomness Sources
//!
//! TigerStyle: Every hard disk draws from its own injected stream.
//!
//! Streams are derived from a single master seed by forking, so a run is
//! reproducible from one `u64` no matter how trials are scheduled.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Golden ratio increment used to spread fork seeds
const FORK_SEED_INCREMENT: u64 = 0x9E37_79B9_7F4A_7C15;

// =============================================================================
// RandomSource
// =============================================================================

/// A source of uniform samples, owned by exactly one drive.
pub trait RandomSource: Send {
    /// Draw the next sample in [0, 1).
    fn next_float(&mut self) -> f64;
}

// =============================================================================
// DeterministicRng
// =============================================================================

/// A seeded ChaCha20 stream.
///
/// TigerStyle:
/// - Same seed always produces same sequence
/// - Fork creates independent streams
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha20Rng,
    seed: u64,
    /// Counter for generating fork seeds
    fork_counter: u64,
}

impl DeterministicRng {
    /// Create a new stream with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            seed,
            fork_counter: 0,
        }
    }

    /// Get the original seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Create an independent stream derived from this one.
    ///
    /// Each call yields a different child; the parent's own sequence is not
    /// consumed. Child seeds are mixed so that forks of forks do not line up
    /// with their siblings' forks.
    pub fn fork(&mut self) -> Self {
        self.fork_counter += 1;
        let fork_seed = mix_seed(
            self.seed
                .wrapping_add(self.fork_counter.wrapping_mul(FORK_SEED_INCREMENT)),
        );
        Self::new(fork_seed)
    }
}

impl RandomSource for DeterministicRng {
    fn next_float(&mut self) -> f64 {
        let value = self.rng.gen::<f64>();

        // Postcondition
        assert!((0.0..1.0).contains(&value), "float must be in [0, 1)");
        value
    }
}

/// SplitMix64 finalizer
fn mix_seed(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// =============================================================================
// Tests
// =============================================================================
