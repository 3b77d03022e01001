use serde::{Deserialize, Serialize};
use tracing::info;

/// Longitudinal machine parameters. A value of exactly zero means "unset".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineParameters {
    /// RF overvoltage factor q = eV / U0.
    #[serde(default)]
    pub overvoltage: f64,
    /// First order momentum compaction factor.
    #[serde(default)]
    pub momentum_compaction: f64,
    /// Second order momentum compaction factor.
    #[serde(default)]
    pub momentum_compaction_2: f64,
    /// RF harmonic number.
    #[serde(default)]
    pub harmonic_number: f64,
    /// Isomagnetic bending radius in metres.
    #[serde(default)]
    pub bending_radius: f64,
    /// Longitudinal damping partition number J_s.
    #[serde(default)]
    pub damping_partition: f64,
}

impl MachineParameters {
    /// Fills every unset parameter from `derived`. Explicit values are kept.
    ///
    /// Returns the names of the parameters that were filled.
    pub fn autocomplete(&mut self, derived: &MachineParameters) -> Vec<&'static str> {
        let mut filled = Vec::new();
        let slots: [(&'static str, &mut f64, f64); 6] = [
            ("overvoltage", &mut self.overvoltage, derived.overvoltage),
            (
                "momentum_compaction",
                &mut self.momentum_compaction,
                derived.momentum_compaction,
            ),
            (
                "momentum_compaction_2",
                &mut self.momentum_compaction_2,
                derived.momentum_compaction_2,
            ),
            ("harmonic_number", &mut self.harmonic_number, derived.harmonic_number),
            ("bending_radius", &mut self.bending_radius, derived.bending_radius),
            (
                "damping_partition",
                &mut self.damping_partition,
                derived.damping_partition,
            ),
        ];
        for (name, slot, value) in slots {
            if *slot == 0.0 && value != 0.0 {
                *slot = value;
                info!(parameter = name, value, "machine parameter taken from lattice");
                filled.push(name);
            }
        }
        filled
    }
}
