//! Random sampling for particle emission.
//!
//! Every particle system owns one [`ParticleRng`]. Seed it through
//! [`ParticleSystemConfig::seed`](crate::ParticleSystemConfig) to get
//! reproducible runs; otherwise it is seeded from entropy.

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

/// Random source with the sampling helpers emitters need.
#[derive(Clone, Debug)]
pub struct ParticleRng {
    rng: SmallRng,
}

impl ParticleRng {
    /// Create a generator from an explicit seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Create a generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is set, entropy otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Random f32 in `[0, 1)`.
    #[inline]
    pub fn unit(&mut self) -> f32 {
        self.rng.gen()
    }

    /// Random f32 between `min` and `max`.
    ///
    /// Returns `min` when both bounds are equal. Reversed bounds are not
    /// rejected; the result simply lies between them.
    #[inline]
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        if min == max {
            return min;
        }
        min + self.unit() * (max - min)
    }

    /// Random index in `0..len`. `len` must be non-zero.
    #[inline]
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Componentwise random vector between `a` and `b`.
    pub fn vec3_between(&mut self, a: Vec3, b: Vec3) -> Vec3 {
        Vec3::new(
            self.range(a.x, b.x),
            self.range(a.y, b.y),
            self.range(a.z, b.z),
        )
    }

    /// Random point inside a sphere of given radius, centered at origin.
    ///
    /// Distribution is uniform throughout the volume.
    pub fn in_sphere(&mut self, radius: f32) -> Vec3 {
        let theta = self.range(0.0, TAU);
        // Uniform in cos(phi), otherwise points bunch up at the poles.
        let phi = (1.0 - 2.0 * self.unit()).acos();
        let r = radius * self.unit().cbrt();

        Vec3::new(
            r * phi.sin() * theta.cos(),
            r * phi.cos(),
            r * phi.sin() * theta.sin(),
        )
    }
}

impl Default for ParticleRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_equal_bounds() {
        let mut rng = ParticleRng::seeded(1);
        for _ in 0..10 {
            assert_eq!(rng.range(0.25, 0.25), 0.25);
        }
    }

    #[test]
    fn test_range_within_bounds() {
        let mut rng = ParticleRng::seeded(7);
        for _ in 0..1000 {
            let v = rng.range(-2.0, 3.0);
            assert!((-2.0..=3.0).contains(&v));
        }
    }

    #[test]
    fn test_reversed_range_does_not_panic() {
        let mut rng = ParticleRng::seeded(3);
        let v = rng.range(5.0, 1.0);
        assert!(v <= 5.0 && v >= 1.0);
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = ParticleRng::seeded(42);
        let mut b = ParticleRng::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.unit(), b.unit());
        }
    }

    #[test]
    fn test_in_sphere_radius() {
        let mut rng = ParticleRng::seeded(9);
        for _ in 0..500 {
            assert!(rng.in_sphere(2.0).length() <= 2.0 + 1e-5);
        }
    }

    #[test]
    fn test_in_sphere_no_polar_clustering() {
        // Uniform directions put 10% of points within |cos| > 0.9 of the poles.
        let mut rng = ParticleRng::seeded(21);
        let samples = 10_000;
        let polar = (0..samples)
            .map(|_| rng.in_sphere(1.0))
            .filter(|p| p.length() > 0.0 && (p.y / p.length()).abs() > 0.9)
            .count();
        let fraction = polar as f32 / samples as f32;
        assert!((0.08..0.12).contains(&fraction), "polar fraction {fraction}");
    }
}
