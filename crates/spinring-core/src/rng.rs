//! Per-particle random streams.
//!
//! Particle `id` draws its radiation noise from `StdRng` seeded with
//! `master_seed + id` (wrapping). Draws that must leave that sequence
//! untouched come from named substreams whose seeds hash the particle seed
//! and the stream tag with SipHash-1-3 under fixed zero keys, so they are
//! stable across platforms.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use siphasher::sip::SipHasher13;

/// Independent random streams of one particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Photon emission and the initial longitudinal phase-space draw.
    Radiation,
    /// Betatron amplitude and phase.
    Trajectory,
}

impl Stream {
    fn tag(self) -> u64 {
        match self {
            Stream::Radiation => 0,
            Stream::Trajectory => 1,
        }
    }
}

/// Seed of one particle within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleSeed(u64);

impl ParticleSeed {
    /// Seed of particle `particle` under `master_seed`.
    pub fn new(master_seed: u64, particle: u32) -> Self {
        Self(master_seed.wrapping_add(u64::from(particle)))
    }

    /// Raw value, the seed of the radiation stream.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Seed of `stream`.
    pub fn stream_seed(self, stream: Stream) -> u64 {
        match stream {
            Stream::Radiation => self.0,
            other => {
                let mut hasher = SipHasher13::new_with_keys(0, 0);
                hasher.write_u64(self.0);
                hasher.write_u64(other.tag());
                hasher.finish()
            }
        }
    }

    /// Generator of `stream`, positioned at its first draw.
    pub fn rng(self, stream: Stream) -> ParticleRng {
        ParticleRng::seeded(self.stream_seed(stream))
    }
}

/// Random generator of one particle stream.
#[derive(Debug, Clone)]
pub struct ParticleRng(StdRng);

impl ParticleRng {
    /// Generator seeded directly, outside any particle.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RngCore for ParticleRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.try_fill_bytes(dest)
    }
}
