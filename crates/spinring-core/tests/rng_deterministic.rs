use rand::RngCore;
use spinring_core::rng::{ParticleRng, ParticleSeed, Stream};

#[test]
fn rng_emits_reproducible_sequence() {
    let mut rng_a = ParticleRng::seeded(1234);
    let mut rng_b = ParticleRng::seeded(1234);

    let seq_a: Vec<u64> = (0..100).map(|_| rng_a.next_u64()).collect();
    let seq_b: Vec<u64> = (0..100).map(|_| rng_b.next_u64()).collect();

    assert_eq!(seq_a, seq_b);
}

#[test]
fn radiation_stream_is_seeded_with_master_seed_plus_id() {
    assert_eq!(ParticleSeed::new(100, 7).value(), 107);
    assert_eq!(ParticleSeed::new(u64::MAX, 1).value(), 0);

    let mut direct = ParticleRng::seeded(107);
    let mut particle = ParticleSeed::new(100, 7).rng(Stream::Radiation);
    assert_eq!(direct.next_u64(), particle.next_u64());
}

#[test]
fn trajectory_stream_is_independent_of_radiation() {
    let seed = ParticleSeed::new(42, 0);
    let trajectory = seed.stream_seed(Stream::Trajectory);
    assert_ne!(trajectory, seed.value());
    assert_eq!(trajectory, ParticleSeed::new(42, 0).stream_seed(Stream::Trajectory));
    assert_ne!(trajectory, ParticleSeed::new(42, 1).stream_seed(Stream::Trajectory));

    let mut radiation = seed.rng(Stream::Radiation);
    let mut betatron = seed.rng(Stream::Trajectory);
    assert_ne!(radiation.next_u64(), betatron.next_u64());
}
