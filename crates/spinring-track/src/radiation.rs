//! Stochastic synchrotron radiation and the closed forms of the RF bucket.

use std::f64::consts::PI;
use std::sync::Arc;

use rand_distr::{Distribution, Poisson};
use spinring_core::constants::{C_Q, E_REST_KEV, SPEED_OF_LIGHT};
use spinring_core::ParticleRng;
use spinring_lattice::Element;

use crate::spectrum::PhotonSpectrum;

/// Per-particle radiation model: Poisson photon counts with sampled energies.
#[derive(Debug, Clone)]
pub struct RadiationModel {
    spectrum: Arc<PhotonSpectrum>,
    rng: ParticleRng,
}

impl RadiationModel {
    /// Creates a model drawing from `rng`.
    pub fn new(spectrum: Arc<PhotonSpectrum>, rng: ParticleRng) -> Self {
        Self { spectrum, rng }
    }

    /// Random stream shared with the initial phase-space draw.
    pub fn rng_mut(&mut self) -> &mut ParticleRng {
        &mut self.rng
    }

    /// Energy radiated while crossing `element`, in units of gamma.
    ///
    /// Photon energies scale with the critical energy at `gamma0` corrected by
    /// `(gamma / gamma0)^2`, where `gamma` drops after every emitted photon.
    pub fn radiated_energy(&mut self, element: &Element, gamma0: f64, gamma: f64) -> f64 {
        let Some(critical) = element.critical_energy_kev(gamma0) else {
            return 0.0;
        };
        let photons = match Poisson::new(element.mean_photons(gamma)) {
            Ok(poisson) => poisson.sample(&mut self.rng) as u64,
            Err(_) => 0,
        };
        let mut current = gamma;
        for _ in 0..photons {
            let ratio = current / gamma0;
            let energy_kev = self.spectrum.sample(&mut self.rng) * critical * ratio * ratio;
            current -= energy_kev / E_REST_KEV;
        }
        gamma - current
    }
}

/// Synchronous phase above transition, `π - asin(1/q)`.
pub fn reference_phase(overvoltage: f64) -> f64 {
    PI - (1.0 / overvoltage).asin()
}

/// Equilibrium energy spread in units of gamma.
pub fn sigma_gamma(gamma0: f64, damping_partition: f64, bending_radius: f64) -> f64 {
    gamma0 * gamma0 * (C_Q / (damping_partition * bending_radius)).sqrt()
}

/// Synchrotron frequency in Hz.
///
/// `gamma_u0` is the energy lost per turn in units of gamma.
pub fn synchrotron_frequency(
    circumference: f64,
    overvoltage: f64,
    gamma_u0: f64,
    harmonic_number: f64,
    gamma0: f64,
    momentum_compaction: f64,
) -> f64 {
    let cos_phase = reference_phase(overvoltage).cos();
    SPEED_OF_LIGHT / circumference
        * (-overvoltage * gamma_u0 * harmonic_number * cos_phase * momentum_compaction
            / (2.0 * PI * gamma0))
            .sqrt()
}

/// RMS synchrotron phase deviation (bunch length in RF radians).
pub fn sigma_phase(
    momentum_compaction: f64,
    synchrotron_frequency: f64,
    sigma_gamma: f64,
    gamma0: f64,
    harmonic_number: f64,
    circumference: f64,
) -> f64 {
    momentum_compaction / synchrotron_frequency * (sigma_gamma / gamma0) * harmonic_number
        * SPEED_OF_LIGHT
        / circumference
}

/// Half height of the RF bucket in relative energy deviation.
///
/// `loss_ratio` is the energy lost per turn divided by the beam energy.
pub fn separatrix_half_height(
    overvoltage: f64,
    loss_ratio: f64,
    momentum_compaction: f64,
    harmonic_number: f64,
) -> f64 {
    let shape = (overvoltage * overvoltage - 1.0).sqrt() - (1.0 / overvoltage).acos();
    (2.0 * loss_ratio / (PI * momentum_compaction * harmonic_number) * shape).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinring_lattice::ElementKind;

    fn dipole() -> Element {
        Element {
            name: "B".into(),
            kind: ElementKind::Dipole,
            start: 0.0,
            length: 1.0,
            bend_radius: Some(3.0),
            entry_edge: 0.0,
            exit_edge: 0.0,
            theta_start: 0.0,
        }
    }

    #[test]
    fn synchronous_phase_balances_the_loss() {
        let q = 4.0;
        assert!((q * reference_phase(q).sin() - 1.0).abs() < 1e-12);
        assert!(reference_phase(q).cos() < 0.0);
    }

    #[test]
    fn non_radiating_elements_lose_nothing() {
        let mut model = RadiationModel::new(Arc::new(PhotonSpectrum::new()), ParticleRng::seeded(3));
        let mut element = dipole();
        element.kind = ElementKind::Other;
        assert_eq!(model.radiated_energy(&element, 2000.0, 2000.0), 0.0);
    }

    #[test]
    fn mean_loss_matches_classical_value() {
        let mut model = RadiationModel::new(Arc::new(PhotonSpectrum::new()), ParticleRng::seeded(11));
        let element = dipole();
        let gamma = 3000.0;
        let expected = element.energy_loss_kev(gamma).expect("dipole radiates") / E_REST_KEV;
        let crossings = 20_000;
        let total: f64 = (0..crossings)
            .map(|_| model.radiated_energy(&element, gamma, gamma))
            .sum();
        let mean = total / crossings as f64;
        assert!((mean - expected).abs() / expected < 0.03, "mean = {mean}, expected = {expected}");
    }

    #[test]
    fn bucket_height_grows_with_overvoltage() {
        let low = separatrix_half_height(2.0, 1e-5, 0.05, 100.0);
        let high = separatrix_half_height(6.0, 1e-5, 0.05, 100.0);
        assert!(high > low && low > 0.0);
    }
}
