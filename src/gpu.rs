//! Storage-buffer layout of the particle state for a renderer.
//!
//! The lifecycle travels as `position.w` (`0.0` free, `1.0` interacted), the
//! shape the particle shaders expect.

use cgmath::{Vector3, Vector4};
use encase::{ArrayLength, ShaderType, StorageBuffer};

use crate::buffer::StateView;
use crate::config::Bounds;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, ShaderType)]
pub struct GpuParticle {
    pub position: Vector4<f32>,
    pub velocity: Vector4<f32>,
    pub origin: Vector4<f32>,
    pub seed: u32,
}

#[derive(ShaderType)]
pub struct GpuParticles<'a> {
    pub half_extents: Vector3<f32>,
    pub length: ArrayLength,
    #[size(runtime)]
    pub particles: &'a [GpuParticle],
}

pub fn gpu_particles(view: &StateView<'_>) -> Vec<GpuParticle> {
    view.iter()
        .map(|(state, origin)| GpuParticle {
            position: state.position.extend(state.lifecycle.as_flag()),
            velocity: state.velocity.extend(0.0),
            origin: origin.extend(0.0),
            seed: state.seed,
        })
        .collect()
}

/// Encodes `view` into the bytes of a `Particles` storage buffer.
pub fn encode_particles(view: &StateView<'_>, bounds: &Bounds) -> Result<Vec<u8>> {
    let particles = gpu_particles(view);
    let mut storage = StorageBuffer::new(Vec::<u8>::new());
    storage
        .write(&GpuParticles {
            half_extents: bounds.half_extents,
            length: ArrayLength,
            particles: &particles,
        })
        .map_err(|e| Error::Encode(format!("{e:?}")))?;
    Ok(storage.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::DoubleBuffer;
    use crate::particle::{Lifecycle, ParticleState};
    use cgmath::prelude::*;

    #[test]
    fn encoded_size_follows_wgsl_layout() -> Result<()> {
        let touched = ParticleState {
            position: Vector3::new(1.0, 2.0, 3.0),
            velocity: Vector3::zero(),
            lifecycle: Lifecycle::Interacted,
            seed: 5,
        };
        let buffer = DoubleBuffer::new(vec![touched; 3], vec![Vector3::zero(); 3]);
        let bytes = encode_particles(&buffer.view(), &Bounds::default())?;
        // 16-byte header (vec3 + length), then 64-byte particle stride
        assert_eq!(bytes.len(), 16 + 3 * 64);
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16 + 12..16 + 16], &1.0f32.to_le_bytes());
        Ok(())
    }

    #[test]
    fn lifecycle_becomes_position_w() {
        let free = ParticleState {
            position: Vector3::new(1.0, 2.0, 3.0),
            velocity: Vector3::new(0.5, 0.0, 0.0),
            lifecycle: Lifecycle::Free,
            seed: 11,
        };
        let buffer = DoubleBuffer::new(vec![free], vec![Vector3::new(4.0, 5.0, 6.0)]);
        let gpu = gpu_particles(&buffer.view());
        assert_eq!(gpu[0].position, Vector4::new(1.0, 2.0, 3.0, 0.0));
        assert_eq!(gpu[0].origin, Vector4::new(4.0, 5.0, 6.0, 0.0));
        assert_eq!(gpu[0].seed, 11);
    }
}
