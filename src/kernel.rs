use cgmath::prelude::*;
use cgmath::{Vector2, Vector3};

use crate::collider::Collider;
use crate::config::{Bounds, Dynamics, RandomSource, SimulationConfig, Timestep};
use crate::particle::{Lifecycle, ParticleState};
use crate::rng::ParticleRng;

/// Step-global inputs every particle sees identically.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct FrameInputs {
    pub time: f32,
    pub time_delta: f32,
}

/// Unit vector, or zero when the input has no usable direction.
pub fn normalize_or_zero(v: Vector3<f32>) -> Vector3<f32> {
    let len = v.magnitude();
    if len > 0.0 && len.is_finite() {
        v / len
    } else {
        Vector3::zero()
    }
}

fn normalize_or_zero_2d(v: Vector2<f32>) -> Vector2<f32> {
    let len = v.magnitude();
    if len > 0.0 && len.is_finite() {
        v / len
    } else {
        Vector2::zero()
    }
}

/// The per-particle transition. Holds only constants, so one instance is
/// shared by every worker thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationKernel {
    pub random_source: RandomSource,
    pub timestep: Timestep,
    pub bounds: Bounds,
    pub dynamics: Dynamics,
}

impl SimulationKernel {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            random_source: config.random_source,
            timestep: config.timestep,
            bounds: config.bounds,
            dynamics: config.dynamics,
        }
    }

    pub fn simulate(
        &self,
        particle: &ParticleState,
        origin: Vector3<f32>,
        colliders: &[Collider],
        frame: FrameInputs,
    ) -> ParticleState {
        let d = &self.dynamics;
        let mut rng = ParticleRng::for_particle(
            self.random_source,
            particle.seed,
            particle.position,
            origin,
            frame.time,
        );

        let reset_rate = match particle.lifecycle {
            Lifecycle::Interacted => d.interacted_reset_rate,
            Lifecycle::Free => d.free_reset_rate,
        };
        if rng.next_unit() > reset_rate {
            let velocity = Vector3::new(
                (rng.next_unit() - 0.5) * d.respawn_jitter,
                (rng.next_unit() - 0.5) * d.respawn_jitter,
                (rng.next_unit() - 0.5) * d.respawn_jitter,
            );
            return ParticleState {
                position: origin,
                velocity,
                lifecycle: Lifecycle::Free,
                seed: rng.carried_seed(particle.seed),
            };
        }

        let mut out = self.advance(particle, origin, colliders, frame);
        out.seed = rng.carried_seed(particle.seed);
        out
    }

    /// Everything after the respawn test: integration, colliders, walls.
    fn advance(
        &self,
        particle: &ParticleState,
        origin: Vector3<f32>,
        colliders: &[Collider],
        frame: FrameInputs,
    ) -> ParticleState {
        let d = &self.dynamics;
        let dt = self.timestep.step_length(frame.time_delta);

        let mut position = particle.position + particle.velocity * dt;
        let mut velocity = particle.velocity;
        let mut lifecycle = particle.lifecycle;

        if lifecycle == Lifecycle::Interacted {
            velocity *= d.drag;
            velocity += normalize_or_zero(origin - position) * d.return_strength;
        }

        // Distances are measured from where the particle was at the start of the step.
        for collider in colliders.iter().filter(|c| !c.is_inert()) {
            let offset = particle.position - collider.center;
            let dist = offset.magnitude();

            if dist < collider.radius {
                let movement = normalize_or_zero(offset) * collider.radius;
                position += movement;
                lifecycle = Lifecycle::Interacted;
                velocity += movement * d.push_velocity_scale;
            }

            if collider.radius * d.force_field_scale - dist > 0.0 {
                let tangent = normalize_or_zero_2d(Vector2::new(offset.y, -offset.x));
                velocity.x += tangent.x * d.swirl_strength;
                velocity.y += tangent.y * d.swirl_strength;
            }
        }

        let h = self.bounds.half_extents;
        reflect_axis(&mut position.x, &mut velocity.x, h.x);
        reflect_axis(&mut position.y, &mut velocity.y, h.y);
        reflect_axis(&mut position.z, &mut velocity.z, h.z);

        ParticleState {
            position,
            velocity,
            lifecycle,
            seed: particle.seed,
        }
    }
}

/// Mirrors a coordinate that left `[-bound, bound]` back inside and flips its velocity.
fn reflect_axis(coord: &mut f32, vel: &mut f32, bound: f32) {
    if *coord < -bound {
        *coord = -2.0 * bound - *coord;
        *vel = -*vel;
    }
    if *coord > bound {
        *coord = 2.0 * bound - *coord;
        *vel = -*vel;
    }
    // overshoot wider than the box
    *coord = coord.clamp(-bound, bound);
}
