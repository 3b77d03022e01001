use spinring_core::constants::{FINE_STRUCTURE, HBAR_C_KEV_M};

use crate::{Element, ElementKind};

/// Critical photon energy `3/2 ħc γ³ / R` in keV.
pub fn critical_energy_kev(radius: f64, gamma: f64) -> f64 {
    1.5 * HBAR_C_KEV_M * gamma.powi(3) / radius.abs()
}

/// Mean number of photons emitted along a bend of angle `bend_angle`.
pub fn mean_photons(bend_angle: f64, gamma: f64) -> f64 {
    5.0 * FINE_STRUCTURE * gamma * bend_angle.abs() / (2.0 * 3f64.sqrt())
}

/// Mean energy radiated along a bend, `2/3 α ħc γ⁴ L / R²`, in keV.
pub fn energy_loss_kev(length: f64, radius: f64, gamma: f64) -> f64 {
    2.0 / 3.0 * FINE_STRUCTURE * HBAR_C_KEV_M * gamma.powi(4) * length / (radius * radius)
}

impl Element {
    fn dipole_radius(&self) -> Option<f64> {
        match (self.kind, self.bend_radius) {
            (ElementKind::Dipole, Some(radius)) if radius != 0.0 => Some(radius),
            _ => None,
        }
    }

    /// Critical energy in keV, `None` for elements that do not radiate.
    pub fn critical_energy_kev(&self, gamma: f64) -> Option<f64> {
        self.dipole_radius()
            .map(|radius| critical_energy_kev(radius, gamma))
    }

    /// Mean photon count per crossing, zero for elements that do not radiate.
    pub fn mean_photons(&self, gamma: f64) -> f64 {
        match self.dipole_radius() {
            Some(_) => mean_photons(self.bend_angle(), gamma),
            None => 0.0,
        }
    }

    /// Mean radiated energy per crossing in keV.
    pub fn energy_loss_kev(&self, gamma: f64) -> Option<f64> {
        self.dipole_radius()
            .map(|radius| energy_loss_kev(self.length, radius, gamma))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photon_count_times_mean_energy_matches_loss() {
        let (length, radius, gamma) = (2.0, 11.0, 2500.0);
        let mean_u = 8.0 / (15.0 * 3f64.sqrt());
        let expected = mean_photons(length / radius, gamma)
            * mean_u
            * critical_energy_kev(radius, gamma);
        let loss = energy_loss_kev(length, radius, gamma);
        assert!((expected - loss).abs() / loss < 1e-12);
    }

    #[test]
    fn critical_energy_of_a_known_ring() {
        // 1.2 GeV, R = 10.88 m
        let gamma = 1.2e6 / spinring_core::constants::E_REST_KEV;
        let ec = critical_energy_kev(10.88, gamma);
        assert!((ec - 0.352).abs() < 0.005, "ec = {ec}");
    }
}
