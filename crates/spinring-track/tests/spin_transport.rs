use nalgebra::{Matrix3, Vector3};
use proptest::prelude::*;
use spinring_core::ParticleRng;
use spinring_track::spectrum::MEAN_PHOTON_ENERGY;
use spinring_track::transport::{precession_vector, rotation, MIN_ROTATION};
use spinring_track::PhotonSpectrum;

fn field() -> impl Strategy<Value = (f64, f64, f64)> {
    (-10.0f64..10.0, -10.0f64..10.0, -10.0f64..10.0)
}

proptest! {
    #[test]
    fn rotation_is_proper_and_orthogonal((x, s, z) in field(), gamma in 1.0f64..1e4) {
        let r = rotation(&Vector3::new(x, s, z), gamma);
        let residual = (r.transpose() * r - Matrix3::identity()).norm();
        prop_assert!(residual < 1e-12, "residual = {}", residual);
        prop_assert!((r.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_fields_give_identity(
        (x, s, z) in (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
        scale in 0.0f64..0.5,
    ) {
        let direction = Vector3::new(x, s, z);
        let norm = direction.norm();
        prop_assume!(norm > 0.0);
        let omega = direction / norm * (scale * MIN_ROTATION);
        prop_assert_eq!(rotation(&omega, 1.0), Matrix3::identity());
    }

    #[test]
    fn rotation_preserves_spin_length((x, s, z) in field(), gamma in 1.0f64..1e4) {
        let spin = Vector3::new(0.3, -0.4, 0.5).normalize();
        let rotated = rotation(&precession_vector(&Vector3::new(x, s, z), gamma), gamma) * spin;
        prop_assert!((rotated.norm() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn zero_field_leaves_spin_unchanged() {
    let start = Vector3::new(0.6, 0.0, 0.8);
    let mut spin = start;
    let r = rotation(&precession_vector(&Vector3::zeros(), 2000.0), 2000.0);
    for _ in 0..10_000 {
        spin = r * spin;
    }
    assert_eq!(spin, start);
}

#[test]
fn sampled_photon_energy_matches_closed_form_mean() {
    let spectrum = PhotonSpectrum::new();
    let mut rng = ParticleRng::seeded(0x5EED);
    let draws = 200_000;
    let sum: f64 = (0..draws).map(|_| spectrum.sample(&mut rng)).sum();
    let mean = sum / draws as f64;
    assert!(
        (mean - MEAN_PHOTON_ENERGY).abs() < 0.01,
        "mean = {mean}, expected {MEAN_PHOTON_ENERGY}"
    );
}
