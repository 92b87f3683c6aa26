use cgmath::Vector3;
use rand::prelude::*;

use crate::config::Bounds;
use crate::error::{Error, Result};

/// Whether a particle is flying freely or was recently pushed by a collider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    #[default]
    Free,
    /// Touched a collider: drags and drifts back toward its origin until respawned.
    Interacted,
}

impl Lifecycle {
    /// Float flag used by GPU-side consumers, `0.0` or `1.0`.
    pub fn as_flag(self) -> f32 {
        match self {
            Lifecycle::Free => 0.0,
            Lifecycle::Interacted => 1.0,
        }
    }
}

/// The part of a particle that changes from step to step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleState {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub lifecycle: Lifecycle,
    /// LCG state. Only advanced with [`RandomSource::PerParticle`](crate::RandomSource).
    pub seed: u32,
}

/// Initial values for one particle, as handed over by whoever builds the population.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleInit {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub origin: Vector3<f32>,
    pub seed: u32,
}

impl ParticleInit {
    /// Particle resting at `origin` with no velocity.
    pub fn at_rest(origin: Vector3<f32>, seed: u32) -> Self {
        Self {
            position: origin,
            velocity: Vector3::new(0.0, 0.0, 0.0),
            origin,
            seed,
        }
    }

    fn is_finite(&self) -> bool {
        [self.position, self.velocity, self.origin]
            .iter()
            .all(|v| v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
    }
}

/// A fixed set of particles ready to be loaded into a stage.
#[derive(Clone, Debug, Default)]
pub struct Population {
    particles: Vec<ParticleInit>,
}

impl Population {
    pub fn from_particles(particles: Vec<ParticleInit>) -> Result<Self> {
        if particles.is_empty() {
            return Err(Error::InvalidPopulation(
                "population must hold at least one particle".into(),
            ));
        }
        if let Some(index) = particles.iter().position(|p| !p.is_finite()) {
            return Err(Error::InvalidPopulation(format!(
                "particle {index} has a non-finite component"
            )));
        }
        Ok(Self { particles })
    }

    /// Scatters `count` origins uniformly through `bounds`. Each particle starts at
    /// its origin with a velocity drawn from `±jitter / 2` per axis, matching the
    /// respawn jitter so a fresh population looks like a freshly respawned one.
    pub fn scatter<R: Rng>(
        count: usize,
        bounds: &Bounds,
        jitter: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let h = bounds.half_extents;
        let half_jitter = jitter.abs() * 0.5;

        let particles = (0..count)
            .map(|_| {
                let origin = Vector3::new(axis(h.x, rng), axis(h.y, rng), axis(h.z, rng));
                let velocity = Vector3::new(
                    axis(half_jitter, rng),
                    axis(half_jitter, rng),
                    axis(half_jitter, rng),
                );
                ParticleInit {
                    position: origin,
                    velocity,
                    origin,
                    seed: rng.next_u32(),
                }
            })
            .collect();

        Self::from_particles(particles)
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[ParticleInit] {
        &self.particles
    }

    /// Splits into the mutable starting state and the immutable origins.
    pub(crate) fn into_parts(self) -> (Vec<ParticleState>, Vec<Vector3<f32>>) {
        self.particles
            .into_iter()
            .map(|p| {
                (
                    ParticleState {
                        position: p.position,
                        velocity: p.velocity,
                        lifecycle: Lifecycle::Free,
                        seed: p.seed,
                    },
                    p.origin,
                )
            })
            .unzip()
    }
}

fn axis<R: Rng>(extent: f32, rng: &mut R) -> f32 {
    if extent > 0.0 {
        rng.gen_range(-extent..=extent)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn empty_population_rejected() {
        assert!(matches!(
            Population::from_particles(vec![]),
            Err(Error::InvalidPopulation(_))
        ));
    }

    #[test]
    fn nan_origin_rejected() {
        let mut p = ParticleInit::at_rest(Vector3::new(0.0, 0.0, 0.0), 1);
        p.origin.y = f32::NAN;
        assert!(Population::from_particles(vec![p]).is_err());
    }

    #[test]
    fn scatter_stays_inside_bounds() -> Result<()> {
        let bounds = Bounds::default();
        let mut rng = StdRng::seed_from_u64(42);
        let population = Population::scatter(2_000, &bounds, 0.004, &mut rng)?;
        assert_eq!(population.len(), 2_000);
        for p in population.particles() {
            assert!(bounds.contains(p.origin));
            assert_eq!(p.position, p.origin);
            assert!(p.velocity.x.abs() <= 0.002);
            assert!(p.velocity.y.abs() <= 0.002);
            assert!(p.velocity.z.abs() <= 0.002);
        }
        Ok(())
    }

    #[test]
    fn scatter_is_reproducible_from_seed() -> Result<()> {
        let bounds = Bounds::default();
        let a = Population::scatter(64, &bounds, 0.004, &mut StdRng::seed_from_u64(7))?;
        let b = Population::scatter(64, &bounds, 0.004, &mut StdRng::seed_from_u64(7))?;
        assert_eq!(a.particles(), b.particles());
        Ok(())
    }

    #[test]
    fn parts_start_free() -> Result<()> {
        let origin = Vector3::new(1.0, 0.5, -0.25);
        let population = Population::from_particles(vec![ParticleInit::at_rest(origin, 9)])?;
        let (states, origins) = population.into_parts();
        assert_eq!(states[0].lifecycle, Lifecycle::Free);
        assert_eq!(states[0].seed, 9);
        assert_eq!(origins, vec![origin]);
        Ok(())
    }

    #[test]
    fn lifecycle_flags() {
        assert_eq!(Lifecycle::Free.as_flag(), 0.0);
        assert_eq!(Lifecycle::Interacted.as_flag(), 1.0);
    }
}
