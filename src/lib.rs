//! Collider-driven particle field.
//!
//! A fixed population of particles drifts around a box-shaped volume, gets
//! pushed and swirled by a handful of moving spheres, and respawns at its
//! origin at random. [`SimulationStage`] owns the double-buffered state and
//! runs [`SimulationKernel`] over every particle once per step.

pub mod buffer;
pub mod collider;
pub mod config;
pub mod error;
pub mod gpu;
pub mod kernel;
pub mod particle;
pub mod rng;
pub mod stage;

pub use buffer::{DoubleBuffer, StateView};
pub use collider::{Collider, ColliderSet};
pub use config::{Bounds, Dynamics, Execution, RandomSource, SimulationConfig, Timestep};
pub use error::{Error, Result};
pub use kernel::{FrameInputs, SimulationKernel};
pub use particle::{Lifecycle, ParticleInit, ParticleState, Population};
pub use stage::{SimulationClock, SimulationStage, StepOutcome};
