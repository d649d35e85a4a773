//! Particle seeds and the fixed-size particle pool.
//!
//! A [`Particle`] only carries immutable seed data. Everything that moves is
//! derived from it each frame by [`flow_step`](crate::flow::flow_step), so the
//! pool itself never changes between rebuilds.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

use crate::error::PoolError;

/// Half the side of the cube particles are seeded in.
pub const SPAWN_HALF_EXTENT: f32 = 10.0;

/// Default particle capacity before a device reports its own limit.
pub const DEFAULT_CAPACITY: u32 = 1 << 22;

/// Immutable per-particle seed.
///
/// Laid out to match the WGSL `Seed` struct: a `vec3<f32>` followed by an
/// `f32` that fills its trailing padding (16 bytes total).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Seed position inside the spawn cube.
    pub base_position: [f32; 3],
    /// Uniform sample in `[0, 1)` used to desynchronize noise lookups.
    pub random_phase: f32,
}

impl Particle {
    /// Create a particle from a seed position and phase.
    pub fn new(base_position: Vec3, random_phase: f32) -> Self {
        Self {
            base_position: base_position.to_array(),
            random_phase,
        }
    }

    /// Seed position as a vector.
    #[inline]
    pub fn base_position(&self) -> Vec3 {
        Vec3::from_array(self.base_position)
    }

    /// Sample one particle uniformly inside the spawn cube.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let base_position = Vec3::new(
            rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT),
            rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT),
            rng.gen_range(-SPAWN_HALF_EXTENT..SPAWN_HALF_EXTENT),
        );
        Self::new(base_position, rng.gen::<f32>())
    }
}

/// Fixed-size collection of particle seeds.
///
/// The only way to change the pool is to replace it wholesale with
/// [`ParticlePool::rebuild`]; there is no partial resize.
#[derive(Debug, Clone, Default)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    /// Bumped on every successful rebuild so GPU mirrors can tell when to re-upload.
    generation: u64,
}

impl ParticlePool {
    /// Sample a fresh pool of `count` particles.
    ///
    /// Fails with [`PoolError::Empty`] for a zero count and with
    /// [`PoolError::CapacityExceeded`] if `count` is above `capacity`.
    /// Never returns a truncated pool.
    pub fn generate<R: Rng>(
        count: u32,
        capacity: u32,
        rng: &mut R,
    ) -> Result<Self, PoolError> {
        if count == 0 {
            return Err(PoolError::Empty);
        }
        if count > capacity {
            return Err(PoolError::CapacityExceeded {
                requested: count,
                capacity,
            });
        }

        let particles = (0..count).map(|_| Particle::random(rng)).collect();
        Ok(Self {
            particles,
            generation: 0,
        })
    }

    /// Discard every particle and sample `count` new ones.
    ///
    /// On error the current pool is left untouched.
    pub fn rebuild<R: Rng>(
        &mut self,
        count: u32,
        capacity: u32,
        rng: &mut R,
    ) -> Result<(), PoolError> {
        let fresh = Self::generate(count, capacity, rng)?;
        self.particles = fresh.particles;
        self.generation += 1;
        log::info!("Rebuilt particle pool with {} particles", count);
        Ok(())
    }

    /// Current particle count.
    #[inline]
    pub fn size(&self) -> u32 {
        self.particles.len() as u32
    }

    /// Whether the pool holds no particles (only before the first build).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of successful rebuilds so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Seed data in pool order.
    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Raw bytes for GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_particle_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<Particle>(), 16);
    }

    #[test]
    fn test_generate_exact_count_within_cube() {
        let mut rng = SmallRng::seed_from_u64(7);
        for count in [1000, 5000, 20_000] {
            let pool = ParticlePool::generate(count, DEFAULT_CAPACITY, &mut rng).unwrap();
            assert_eq!(pool.size(), count);
            for p in pool.particles() {
                for c in p.base_position {
                    assert!((-SPAWN_HALF_EXTENT..=SPAWN_HALF_EXTENT).contains(&c));
                }
                assert!((0.0..1.0).contains(&p.random_phase));
            }
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        let mut rng = SmallRng::seed_from_u64(1);
        let err = ParticlePool::generate(0, DEFAULT_CAPACITY, &mut rng).unwrap_err();
        assert_eq!(err, PoolError::Empty);
    }

    #[test]
    fn test_over_capacity_is_reported_not_truncated() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut pool = ParticlePool::generate(1000, 4000, &mut rng).unwrap();

        let err = pool.rebuild(5000, 4000, &mut rng).unwrap_err();
        assert_eq!(
            err,
            PoolError::CapacityExceeded {
                requested: 5000,
                capacity: 4000
            }
        );
        // Old pool survives a failed rebuild
        assert_eq!(pool.size(), 1000);
        assert_eq!(pool.generation(), 0);
    }

    #[test]
    fn test_rebuild_replaces_all_seeds() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut pool = ParticlePool::generate(1000, DEFAULT_CAPACITY, &mut rng).unwrap();
        let before = pool.particles().to_vec();

        pool.rebuild(1000, DEFAULT_CAPACITY, &mut rng).unwrap();
        assert_eq!(pool.size(), 1000);
        assert_eq!(pool.generation(), 1);
        assert_ne!(before, pool.particles());
    }

    #[test]
    fn test_same_seed_same_pool() {
        let a = ParticlePool::generate(1000, DEFAULT_CAPACITY, &mut SmallRng::seed_from_u64(42)).unwrap();
        let b = ParticlePool::generate(1000, DEFAULT_CAPACITY, &mut SmallRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.particles(), b.particles());
    }

    #[test]
    fn test_bytes_match_particle_layout() {
        let mut rng = SmallRng::seed_from_u64(9);
        let pool = ParticlePool::generate(1000, DEFAULT_CAPACITY, &mut rng).unwrap();
        assert_eq!(pool.as_bytes().len(), 1000 * 16);
    }
}
