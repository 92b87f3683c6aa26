use cgmath::Vector3;

use crate::error::{Error, Result};

/// Where the kernel gets its randomness from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RandomSource {
    /// Per-particle LCG state carried from frame to frame.
    #[default]
    PerParticle,
    /// Hash of the particle's position, origin and the current time. Nothing is carried.
    Stateless,
}

/// How velocity is turned into displacement.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Timestep {
    /// One velocity unit per step regardless of wall-clock time.
    #[default]
    Fixed,
    /// `position += velocity * time_delta * factor`.
    Scaled { factor: f32 },
}

impl Timestep {
    pub fn step_length(self, time_delta: f32) -> f32 {
        match self {
            Timestep::Fixed => 1.0,
            Timestep::Scaled { factor } => time_delta * factor,
        }
    }
}

/// Axis-aligned simulation volume centered on the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub half_extents: Vector3<f32>,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            half_extents: Vector3::new(5.2, 2.0, 2.56),
        }
    }
}

impl Bounds {
    pub fn contains(&self, p: Vector3<f32>) -> bool {
        p.x.abs() <= self.half_extents.x
            && p.y.abs() <= self.half_extents.y
            && p.z.abs() <= self.half_extents.z
    }
}

/// Tunable constants of the particle transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dynamics {
    /// Respawn happens when the draw exceeds this, for free-flying particles.
    pub free_reset_rate: f32,
    /// Same, for particles that touched a collider. Higher means rarer.
    pub interacted_reset_rate: f32,
    /// Full span of the per-axis velocity jitter given on respawn.
    pub respawn_jitter: f32,
    pub drag: f32,
    pub return_strength: f32,
    pub push_velocity_scale: f32,
    pub swirl_strength: f32,
    /// Swirl acts inside `radius * force_field_scale`.
    pub force_field_scale: f32,
}

impl Default for Dynamics {
    fn default() -> Self {
        Self {
            free_reset_rate: 0.97,
            interacted_reset_rate: 0.998,
            respawn_jitter: 0.004,
            drag: 0.95,
            return_strength: 0.0005,
            push_velocity_scale: 0.1,
            swirl_strength: 0.0007,
            force_field_scale: 2.0,
        }
    }
}

/// How a step is spread over worker threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Execution {
    /// `None` lets rayon pick one thread per core.
    pub threads: Option<usize>,
    pub chunk_size: usize,
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            threads: None,
            chunk_size: 4096,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    pub max_colliders: usize,
    pub random_source: RandomSource,
    pub timestep: Timestep,
    pub bounds: Bounds,
    pub dynamics: Dynamics,
    pub execution: Execution,
}

impl SimulationConfig {
    pub const DEFAULT_MAX_COLLIDERS: usize = 8;

    pub fn new(max_colliders: usize, random_source: RandomSource) -> Self {
        Self {
            max_colliders,
            random_source,
            ..Self::default()
        }
    }

    /// Checks every value the kernel relies on being sane.
    pub fn validate(&self) -> Result<()> {
        if self.max_colliders == 0 {
            return Err(Error::InvalidConfig(
                "max_colliders must be at least 1".into(),
            ));
        }
        if self.execution.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be at least 1".into()));
        }
        if self.execution.threads == Some(0) {
            return Err(Error::InvalidConfig(
                "thread count must be at least 1 when given".into(),
            ));
        }
        let h = self.bounds.half_extents;
        if ![h.x, h.y, h.z].iter().all(|v| v.is_finite() && *v > 0.0) {
            return Err(Error::InvalidConfig(
                "bounds half extents must be finite and > 0".into(),
            ));
        }
        if let Timestep::Scaled { factor } = self.timestep {
            if !factor.is_finite() || factor <= 0.0 {
                return Err(Error::InvalidConfig(
                    "timestep factor must be finite and > 0".into(),
                ));
            }
        }
        let d = &self.dynamics;
        let constants = [
            d.free_reset_rate,
            d.interacted_reset_rate,
            d.respawn_jitter,
            d.drag,
            d.return_strength,
            d.push_velocity_scale,
            d.swirl_strength,
            d.force_field_scale,
        ];
        if !constants.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidConfig(
                "dynamics constants must be finite".into(),
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_colliders: Self::DEFAULT_MAX_COLLIDERS,
            random_source: RandomSource::default(),
            timestep: Timestep::default(),
            bounds: Bounds::default(),
            dynamics: Dynamics::default(),
            execution: Execution::default(),
        }
    }
}
