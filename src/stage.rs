use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::buffer::{DoubleBuffer, StateView};
use crate::collider::{Collider, ColliderSet};
use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::kernel::{FrameInputs, SimulationKernel};
use crate::particle::Population;

/// Monotonic simulation time as handed in by the frame loop.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimulationClock {
    time: f32,
    time_delta: f32,
    previous: Option<f32>,
}

impl SimulationClock {
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn time_delta(&self) -> f32 {
        self.time_delta
    }

    /// Delta is zero on the first call and never negative.
    pub fn advance(&mut self, t: f32) {
        let mut delta = match self.previous {
            Some(previous) => t - previous,
            None => 0.0,
        };
        if delta < 0.0 {
            log::warn!(
                "simulation clock went backwards ({} -> {}), using a zero delta",
                self.time,
                t
            );
            delta = 0.0;
        }
        self.time = t;
        self.time_delta = delta;
        self.previous = Some(t);
    }

    pub fn frame_inputs(&self) -> FrameInputs {
        FrameInputs {
            time: self.time,
            time_delta: self.time_delta,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// The written region was thrown away and the current buffer is unchanged.
    Cancelled,
}

/// Owns the particle state and everything a step needs, and runs the kernel
/// over the whole population once per [`step`](Self::step).
pub struct SimulationStage {
    config: SimulationConfig,
    kernel: SimulationKernel,
    buffers: DoubleBuffer,
    colliders: ColliderSet,
    clock: SimulationClock,
    pool: rayon::ThreadPool,
    steps: u64,
}

impl SimulationStage {
    /// Builds a stage. Collider capacity and random source are fixed from here on.
    pub fn configure(config: SimulationConfig, population: Population) -> Result<Self> {
        config.validate()?;
        if population.is_empty() {
            return Err(Error::InvalidPopulation(
                "population must hold at least one particle".into(),
            ));
        }

        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("particle-step-{i}"));
        if let Some(threads) = config.execution.threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;

        let (initial, origins) = population.into_parts();
        log::info!(
            "simulation stage ready: {} particles, {} collider slots, {:?} randomness, {} threads",
            initial.len(),
            config.max_colliders,
            config.random_source,
            pool.current_num_threads()
        );

        Ok(Self {
            kernel: SimulationKernel::from_config(&config),
            buffers: DoubleBuffer::new(initial, origins),
            colliders: ColliderSet::new(config.max_colliders),
            clock: SimulationClock::default(),
            pool,
            steps: 0,
            config,
        })
    }

    /// Replaces this frame's colliders. Rejected lists leave the previous set in place.
    pub fn set_colliders(&mut self, colliders: &[Collider]) -> Result<()> {
        self.colliders.replace(colliders)?;
        log::debug!(
            "collider set replaced: {} active of {}",
            colliders.len(),
            self.colliders.capacity()
        );
        Ok(())
    }

    pub fn set_time(&mut self, t: f32) -> Result<()> {
        if !t.is_finite() {
            return Err(Error::InvalidTime(t));
        }
        self.clock.advance(t);
        Ok(())
    }

    /// Advances every particle by one step and makes the result current.
    pub fn step(&mut self) {
        let never = AtomicBool::new(false);
        self.step_cancellable(&never);
    }

    /// Like [`step`](Self::step), but gives up as soon as `cancel` is seen set.
    /// A cancelled step never becomes visible.
    pub fn step_cancellable(&mut self, cancel: &AtomicBool) -> StepOutcome {
        let started = Instant::now();
        let kernel = &self.kernel;
        let colliders = self.colliders.slots();
        let frame = self.clock.frame_inputs();
        let chunk_size = self.config.execution.chunk_size;
        let (src, dst, origins) = self.buffers.split();

        self.pool.install(|| {
            dst.par_chunks_mut(chunk_size)
                .zip(src.par_chunks(chunk_size))
                .zip(origins.par_chunks(chunk_size))
                .for_each(|((out, input), origins)| {
                    if cancel.load(Ordering::Relaxed) {
                        return;
                    }
                    for ((o, particle), origin) in out.iter_mut().zip(input).zip(origins) {
                        *o = kernel.simulate(particle, *origin, colliders, frame);
                    }
                });
        });

        if cancel.load(Ordering::Acquire) {
            log::debug!("step {} cancelled, keeping previous buffer", self.steps + 1);
            return StepOutcome::Cancelled;
        }

        self.buffers.swap();
        self.steps += 1;
        log::trace!(
            "step {} done in {:?} (t={}, dt={})",
            self.steps,
            started.elapsed(),
            frame.time,
            frame.time_delta
        );
        StepOutcome::Completed
    }

    /// The most recently completed state. Stable until the next successful step.
    pub fn current_buffer(&self) -> StateView<'_> {
        self.buffers.view()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    pub fn time(&self) -> f32 {
        self.clock.time()
    }

    pub fn time_delta(&self) -> f32 {
        self.clock.time_delta()
    }

    pub fn particle_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleInit;
    use cgmath::Vector3;

    fn single_particle_stage() -> Result<SimulationStage> {
        let population = Population::from_particles(vec![ParticleInit::at_rest(
            Vector3::new(0.0, 0.0, 0.0),
            1,
        )])?;
        SimulationStage::configure(SimulationConfig::default(), population)
    }

    #[test]
    fn first_time_has_zero_delta() {
        let mut clock = SimulationClock::default();
        clock.advance(12.5);
        assert_eq!(clock.time(), 12.5);
        assert_eq!(clock.time_delta(), 0.0);
        clock.advance(13.0);
        assert_eq!(clock.time_delta(), 0.5);
    }

    #[test]
    fn backwards_clock_clamps_delta() {
        let mut clock = SimulationClock::default();
        clock.advance(2.0);
        clock.advance(1.0);
        assert_eq!(clock.time(), 1.0);
        assert_eq!(clock.time_delta(), 0.0);
    }

    #[test]
    fn non_finite_time_rejected() -> Result<()> {
        let mut stage = single_particle_stage()?;
        stage.set_time(1.0)?;
        assert!(matches!(stage.set_time(f32::NAN), Err(Error::InvalidTime(_))));
        assert_eq!(stage.time(), 1.0);
        Ok(())
    }

    #[test]
    fn step_swaps_buffers_and_counts() -> Result<()> {
        let mut stage = single_particle_stage()?;
        assert_eq!(stage.buffers.current_index(), 0);
        stage.step();
        assert_eq!(stage.buffers.current_index(), 1);
        stage.step();
        assert_eq!(stage.buffers.current_index(), 0);
        assert_eq!(stage.steps_taken(), 2);
        Ok(())
    }

    #[test]
    fn pre_set_cancel_keeps_current() -> Result<()> {
        let mut stage = single_particle_stage()?;
        let before = stage.current_buffer().states().to_vec();
        let cancel = AtomicBool::new(true);
        assert_eq!(stage.step_cancellable(&cancel), StepOutcome::Cancelled);
        assert_eq!(stage.current_buffer().states(), before.as_slice());
        assert_eq!(stage.steps_taken(), 0);
        Ok(())
    }

    #[test]
    fn zero_thread_pool_rejected() {
        let mut config = SimulationConfig::default();
        config.execution.threads = Some(0);
        let population =
            Population::from_particles(vec![ParticleInit::at_rest(Vector3::new(0.0, 0.0, 0.0), 1)]);
        let result = population.and_then(|p| SimulationStage::configure(config, p));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
