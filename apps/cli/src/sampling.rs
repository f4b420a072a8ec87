//! Seeded perturbation of scalar multipliers for Monte Carlo runs.

use cost_core::{ScalarConfig, ScalarValue};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Perturb every numeric scalar whose key mentions "mult" by a multiplicative
/// uniform factor in `[1 - noise, 1 + noise]`.
///
/// Each run draws from its own `ChaCha8Rng` derived from `seed` and the run
/// index, so a fixed seed reproduces the whole campaign. `noise` of zero
/// returns the configuration unchanged. Flags and non-multiplier numbers pass
/// through untouched.
pub fn perturb_multipliers(scalars: &ScalarConfig, noise: f64, seed: u64, run: u32) -> ScalarConfig {
    if noise <= 0.0 {
        return scalars.clone();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(u64::from(run)));
    let mut perturbed = scalars.clone();
    for (key, value) in perturbed.iter_mut() {
        if !key.to_ascii_lowercase().contains("mult") {
            continue;
        }
        if let ScalarValue::Number(n) = value {
            let u: f64 = rng.gen_range(-noise..=noise);
            *n *= 1.0 + u;
        }
    }
    perturbed
}
