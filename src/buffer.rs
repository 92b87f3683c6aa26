use cgmath::Vector3;

use crate::particle::{Lifecycle, ParticleState};

/// Two state regions plus the origins they share.
///
/// A step reads region `current` and writes region `current ^ 1`; [`swap`](Self::swap)
/// is the only way the roles change.
#[derive(Clone, Debug)]
pub struct DoubleBuffer {
    regions: [Vec<ParticleState>; 2],
    origins: Vec<Vector3<f32>>,
    current: usize,
}

impl DoubleBuffer {
    pub fn new(initial: Vec<ParticleState>, origins: Vec<Vector3<f32>>) -> Self {
        debug_assert_eq!(initial.len(), origins.len());
        let next = initial.clone();
        Self {
            regions: [initial, next],
            origins,
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn view(&self) -> StateView<'_> {
        StateView {
            states: &self.regions[self.current],
            origins: &self.origins,
        }
    }

    /// Current region to read, next region to write, and the origins.
    pub fn split(&mut self) -> (&[ParticleState], &mut [ParticleState], &[Vector3<f32>]) {
        let [first, second] = &mut self.regions;
        let (read, write) = if self.current == 0 {
            (first, second)
        } else {
            (second, first)
        };
        (read.as_slice(), write.as_mut_slice(), self.origins.as_slice())
    }

    pub fn swap(&mut self) {
        self.current ^= 1;
    }
}

/// Read-only view of the most recently completed step.
#[derive(Clone, Copy, Debug)]
pub struct StateView<'a> {
    states: &'a [ParticleState],
    origins: &'a [Vector3<f32>],
}

impl<'a> StateView<'a> {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &'a [ParticleState] {
        self.states
    }

    pub fn origins(&self) -> &'a [Vector3<f32>] {
        self.origins
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a ParticleState, &'a Vector3<f32>)> + 'a {
        self.states.iter().zip(self.origins.iter())
    }

    pub fn interacted_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.lifecycle == Lifecycle::Interacted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::prelude::*;

    fn state(x: f32) -> ParticleState {
        ParticleState {
            position: Vector3::new(x, 0.0, 0.0),
            velocity: Vector3::zero(),
            lifecycle: Lifecycle::Free,
            seed: 0,
        }
    }

    #[test]
    fn split_reads_current_and_writes_other() {
        let mut buffer = DoubleBuffer::new(vec![state(1.0)], vec![Vector3::zero()]);
        {
            let (src, dst, _) = buffer.split();
            dst[0] = state(src[0].position.x + 1.0);
        }
        assert_eq!(buffer.view().states()[0].position.x, 1.0);
        buffer.swap();
        assert_eq!(buffer.current_index(), 1);
        assert_eq!(buffer.view().states()[0].position.x, 2.0);

        let (src, dst, _) = buffer.split();
        assert_eq!(src[0].position.x, 2.0);
        assert_eq!(dst[0].position.x, 1.0);
    }

    #[test]
    fn view_counts_interacted() {
        let mut touched = state(0.0);
        touched.lifecycle = Lifecycle::Interacted;
        let buffer = DoubleBuffer::new(
            vec![state(0.0), touched, touched],
            vec![Vector3::zero(); 3],
        );
        assert_eq!(buffer.view().interacted_count(), 2);
        assert_eq!(buffer.view().iter().count(), 3);
    }
}
