// ============================================================
// Layer 6 — Execution Context (seeding)
// ============================================================
// Deterministic runs come from one optional seed in the config.
// Instead of seeding a global generator, every random-dependent
// collaborator asks the context for its own stream:
//
//   Augmentation → feature jitter in the dataset
//   Shuffle      → burn DataLoader shuffle seed
//   ModelInit    → initial regressor weights
//
// With a seed, each stream is a fixed StdRng derived from it, so
// adding a new consumer never perturbs the others. Without one,
// every stream is seeded from OS entropy.

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Independent random streams handed out by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngStream {
    Augmentation = 1,
    Shuffle      = 2,
    ModelInit    = 3,
}

// Odd 64-bit constant (golden ratio) to spread stream ids apart
const STREAM_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    seed: Option<u64>,
}

impl ExecutionContext {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// A fresh generator for the given stream.
    pub fn rng(&self, stream: RngStream) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ (stream as u64).wrapping_mul(STREAM_SPREAD)),
            None       => StdRng::from_entropy(),
        }
    }

    /// Seed for burn's DataLoaderBuilder::shuffle
    pub fn shuffle_seed(&self) -> u64 {
        self.rng(RngStream::Shuffle).gen()
    }
}
