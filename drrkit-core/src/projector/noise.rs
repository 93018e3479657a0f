//! Quantum (Poisson) noise.
//!
//! Every pixel draws from its own generator seeded by the projector seed and the pixel
//! index, so results do not depend on how pixels are spread over workers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Means above this use the normal approximation instead of Knuth's method.
const NORMAL_APPROXIMATION_THRESHOLD: f64 = 30.0;

fn pixel_rng(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Draws a Poisson-distributed count with mean `lambda`.
pub fn poisson<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> u64 {
    if !(lambda > 0.0) {
        return 0;
    }

    if lambda < NORMAL_APPROXIMATION_THRESHOLD {
        // Knuth: multiply uniforms until the product drops below e^-lambda
        let limit = (-lambda).exp();
        let mut count = 0;
        let mut product: f64 = rng.r#gen();
        while product > limit {
            count += 1;
            product *= rng.r#gen::<f64>();
        }
        return count;
    }

    // Box-Muller standard normal
    let u1: f64 = 1.0 - rng.r#gen::<f64>();
    let u2: f64 = rng.r#gen();
    let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    (lambda + lambda.sqrt() * z).round().max(0.0) as u64
}

/// Replaces each intensity `I` with `Poisson(photon_count · I) / photon_count`.
pub fn apply(values: &mut [f32], photon_count: u64, seed: u64) {
    let photons = photon_count as f64;
    values.par_iter_mut().enumerate().for_each(|(index, value)| {
        let mut rng = pixel_rng(seed, index);
        let counts = poisson(&mut rng, photons * value.max(0.0) as f64);
        *value = (counts as f64 / photons) as f32;
    });
}
