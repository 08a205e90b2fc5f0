//! Deterministic field seeding.
//!
//! Produces the initial, all-unclaimed star population: ids `1..=count`,
//! coordinates uniform inside a sphere.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use starbazaar_store::{Star, StarId};
use tracing::info;

/// Parameters for generating a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub count: u64,
    /// Sphere radius in logical units
    pub radius: f64,
    pub seed: u64,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            count: 10_000,
            radius: 40.0,
            seed: 0x57A2_BA2A,
        }
    }
}

/// Generate the field described by `spec`. Same spec, same stars.
pub fn generate(spec: &FieldSpec) -> Vec<Star> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let radius = spec.radius.abs();

    let stars: Vec<Star> = (1..=spec.count)
        .map(|id| {
            let [x, y, z] = point_in_sphere(&mut rng, radius);
            Star::unclaimed(StarId(id), x, y, z)
        })
        .collect();

    info!("Generated {} stars within radius {}", stars.len(), radius);
    stars
}

/// Rejection-sample a point in a ball.
fn point_in_sphere<R: Rng>(rng: &mut R, radius: f64) -> [f64; 3] {
    if radius == 0.0 {
        return [0.0; 3];
    }
    loop {
        let p = [
            rng.gen_range(-radius..=radius),
            rng.gen_range(-radius..=radius),
            rng.gen_range(-radius..=radius),
        ];
        if p[0] * p[0] + p[1] * p[1] + p[2] * p[2] <= radius * radius {
            return p;
        }
    }
}
