//! Per-VM deterministic random generators.

use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rand_pcg::Pcg64;

use crate::core::config::{NoiseConfig, UniformRange};

/// Independent random streams of a single VM.
///
/// Each purpose gets its own generator so that, e.g., the number of noise samples drawn for a metrics window
/// does not shift the parameters of startup spikes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RandomStream {
    StartDelay = 1,
    DeallocateDelay = 2,
    Baseline = 3,
    Spikes = 4,
}

/// Creates a fresh generator for the stream of VM with the given seed.
///
/// Generators are never shared or cached: every call starts from the same state.
pub fn seeded_rng(seed: u32, stream: RandomStream) -> Pcg64 {
    Pcg64::seed_from_u64(((stream as u64) << 32) | seed as u64)
}

/// Samples a value uniformly from the closed range.
pub fn sample_uniform<R: Rng>(rng: &mut R, range: UniformRange) -> f64 {
    if range.min < range.max {
        rng.gen_range(range.min..=range.max)
    } else {
        range.min
    }
}

/// Samples a value from the normal distribution with given parameters.
pub fn sample_normal<R: Rng>(rng: &mut R, noise: NoiseConfig) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    noise.mean + noise.std_dev * z
}
