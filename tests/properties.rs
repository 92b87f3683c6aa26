use cgmath::prelude::*;
use cgmath::Vector3;
use particle_field::rng::Lcg;
use particle_field::{
    Bounds, Collider, Dynamics, FrameInputs, Lifecycle, ParticleState, RandomSource,
    SimulationKernel, Timestep,
};
use proptest::prelude::*;

fn kernel(dynamics: Dynamics) -> SimulationKernel {
    SimulationKernel {
        random_source: RandomSource::PerParticle,
        timestep: Timestep::Fixed,
        bounds: Bounds::default(),
        dynamics,
    }
}

const FRAME: FrameInputs = FrameInputs {
    time: 4.0,
    time_delta: 1.0 / 60.0,
};

fn vec3(range_x: f32, range_y: f32, range_z: f32) -> impl Strategy<Value = Vector3<f32>> {
    (
        -range_x..=range_x,
        -range_y..=range_y,
        -range_z..=range_z,
    )
        .prop_map(|(x, y, z)| Vector3::new(x, y, z))
}

fn lifecycle() -> impl Strategy<Value = Lifecycle> {
    prop_oneof![Just(Lifecycle::Free), Just(Lifecycle::Interacted)]
}

fn collider() -> impl Strategy<Value = Collider> {
    (vec3(5.0, 2.0, 2.5), 0.0f32..1.2).prop_map(|(c, r)| Collider::new(c, r))
}

proptest! {
    #[test]
    fn every_step_ends_inside_the_volume(
        position in vec3(6.0, 3.0, 3.5),
        velocity in vec3(0.5, 0.5, 0.5),
        origin in vec3(5.2, 2.0, 2.56),
        lifecycle in lifecycle(),
        seed in any::<u32>(),
        colliders in prop::collection::vec(collider(), 0..8),
    ) {
        let k = kernel(Dynamics::default());
        let p = ParticleState { position, velocity, lifecycle, seed };
        let out = k.simulate(&p, origin, &colliders, FRAME);
        prop_assert!(k.bounds.contains(out.position), "{:?}", out.position);
        prop_assert!(out.velocity.x.is_finite() && out.velocity.y.is_finite() && out.velocity.z.is_finite());
    }

    #[test]
    fn respawn_returns_to_origin(
        position in vec3(5.0, 2.0, 2.5),
        velocity in vec3(0.5, 0.5, 0.5),
        origin in vec3(5.2, 2.0, 2.56),
        lifecycle in lifecycle(),
        seed in any::<u32>(),
    ) {
        prop_assume!(Lcg::new(seed).next_unit() > 0.0);
        let k = kernel(Dynamics {
            free_reset_rate: 0.0,
            interacted_reset_rate: 0.0,
            ..Dynamics::default()
        });
        let p = ParticleState { position, velocity, lifecycle, seed };
        let out = k.simulate(&p, origin, &[], FRAME);
        prop_assert_eq!(out.position, origin);
        prop_assert_eq!(out.lifecycle, Lifecycle::Free);
        for v in [out.velocity.x, out.velocity.y, out.velocity.z] {
            prop_assert!(v.abs() <= 0.002);
        }
    }

    #[test]
    fn particles_inside_a_collider_are_pushed_out(
        center in vec3(1.0, 0.3, 0.3),
        radius in 0.1f32..0.8,
        direction in vec3(1.0, 1.0, 1.0),
        depth in 0.001f32..0.95,
        lifecycle in lifecycle(),
        seed in any::<u32>(),
    ) {
        let dir = direction.normalize();
        prop_assume!(dir.x.is_finite() && direction.magnitude() > 0.1);
        let dist = radius * depth;
        prop_assume!(dist >= 1e-3);

        let k = kernel(Dynamics {
            free_reset_rate: 1.0,
            interacted_reset_rate: 1.0,
            ..Dynamics::default()
        });
        let p = ParticleState {
            position: center + dir * dist,
            velocity: Vector3::zero(),
            lifecycle,
            seed,
        };
        let out = k.simulate(&p, p.position, &[Collider::new(center, radius)], FRAME);
        prop_assert_eq!(out.lifecycle, Lifecycle::Interacted);
        prop_assert!((out.position - center).magnitude() >= radius - 1e-4);
    }

    #[test]
    fn far_colliders_change_nothing(
        position in vec3(1.0, 1.0, 1.0),
        velocity in vec3(0.01, 0.01, 0.01),
        seed in any::<u32>(),
    ) {
        let k = kernel(Dynamics {
            free_reset_rate: 1.0,
            interacted_reset_rate: 1.0,
            ..Dynamics::default()
        });
        let p = ParticleState { position, velocity, lifecycle: Lifecycle::Free, seed };
        let far = Collider::new(Vector3::new(4.5, 0.0, 0.0), 0.5);
        let with = k.simulate(&p, position, &[far], FRAME);
        let without = k.simulate(&p, position, &[], FRAME);
        prop_assert_eq!(with, without);
    }
}
