//! Physical constants in the unit system used by the engine.
//!
//! Energies are kept in keV where photons are involved and in GeV in the
//! configuration; `gamma` is dimensionless throughout.

/// Speed of light in m/s. The beam is treated as moving at exactly this speed.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Electron gyromagnetic anomaly (g-2)/2.
pub const A_GYRO: f64 = 0.001_159_652;

/// Electron rest energy in keV.
pub const E_REST_KEV: f64 = 510.998_95;

/// Electron rest energy in GeV.
pub const E_REST_GEV: f64 = E_REST_KEV * 1e-6;

/// Fine structure constant.
pub const FINE_STRUCTURE: f64 = 1.0 / 137.035_999_084;

/// Reduced Planck constant times c in keV m.
pub const HBAR_C_KEV_M: f64 = 1.973_269_804e-10;

/// Quantum excitation constant C_q = 55 ħ / (32 √3 m_e c) in m.
pub const C_Q: f64 = 3.8319e-13;

/// Converts a longitudinal position to the time at which the beam reaches it.
pub fn pos_to_time(pos: f64) -> f64 {
    pos / SPEED_OF_LIGHT
}

/// Converts a time to the longitudinal position reached by the beam.
pub fn time_to_pos(time: f64) -> f64 {
    time * SPEED_OF_LIGHT
}
