//! Random sources for the respawn test and respawn jitter.
//!
//! Both produce values in `[0, 1)` and are cheap enough to run once per
//! particle per frame. The LCG uses the Visual C++ `rand()` constants, so a
//! given seed yields the same sequence as that runtime.

use cgmath::Vector3;

use crate::config::RandomSource;

const LCG_MULTIPLIER: u32 = 214_013;
const LCG_INCREMENT: u32 = 2_531_011;

/// Linear congruential generator, modulus 2^32.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Advances once and returns 15 bits, `0..=32767`.
    pub fn next_raw(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        (self.state >> 16) & 0x7FFF
    }

    pub fn next_unit(&mut self) -> f32 {
        self.next_raw() as f32 / 32768.0
    }
}

/// PCG output permutation, used as a 32-bit integer hash.
fn permute(v: u32) -> u32 {
    let state = v.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Stateless generator keyed on what the particle looks like right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionHash {
    key: u32,
    draws: u32,
}

impl PositionHash {
    pub fn new(position: Vector3<f32>, origin: Vector3<f32>, time: f32) -> Self {
        let key = [
            position.x, position.y, position.z, origin.x, origin.y, origin.z, time,
        ]
        .iter()
        .fold(0u32, |h, v| permute(h ^ v.to_bits()));
        Self { key, draws: 0 }
    }

    pub fn next_unit(&mut self) -> f32 {
        let h = permute(self.key ^ permute(self.draws));
        self.draws = self.draws.wrapping_add(1);
        (h >> 8) as f32 / 16_777_216.0
    }
}

/// The random stream one particle consumes during one step.
#[derive(Clone, Copy, Debug)]
pub enum ParticleRng {
    Sequence(Lcg),
    Hashed(PositionHash),
}

impl ParticleRng {
    pub fn for_particle(
        source: RandomSource,
        seed: u32,
        position: Vector3<f32>,
        origin: Vector3<f32>,
        time: f32,
    ) -> Self {
        match source {
            RandomSource::PerParticle => ParticleRng::Sequence(Lcg::new(seed)),
            RandomSource::Stateless => {
                ParticleRng::Hashed(PositionHash::new(position, origin, time))
            }
        }
    }

    pub fn next_unit(&mut self) -> f32 {
        match self {
            ParticleRng::Sequence(lcg) => lcg.next_unit(),
            ParticleRng::Hashed(hash) => hash.next_unit(),
        }
    }

    /// Seed to carry into the next frame. The stateless source hands back `previous`.
    pub fn carried_seed(&self, previous: u32) -> u32 {
        match self {
            ParticleRng::Sequence(lcg) => lcg.state(),
            ParticleRng::Hashed(_) => previous,
        }
    }
}
