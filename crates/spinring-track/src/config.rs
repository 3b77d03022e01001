use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use spinring_core::constants::{time_to_pos, A_GYRO, E_REST_GEV, SPEED_OF_LIGHT};
use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::SpinVector;
use spinring_lattice::MachineParameters;

use crate::longitudinal::EnergyRamp;

/// Number of output samples used when no spacing is configured.
pub const DEFAULT_STEPS: f64 = 200.0;

/// YAML-configurable parameters of a tracking or resonance run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Number of tracked particles, ids `0..particles`.
    #[serde(default = "default_particles")]
    pub particles: u32,
    /// Master seed of the per-particle random streams.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Tracked time window and output spacing.
    #[serde(default)]
    pub time: TimeConfig,
    /// Reference energy and its linear ramp.
    #[serde(default)]
    pub energy: EnergyConfig,
    /// Initial spin direction.
    #[serde(default)]
    pub spin: SpinConfig,
    /// Longitudinal (energy) model selection.
    #[serde(default)]
    pub longitudinal: LongitudinalConfig,
    /// Longitudinal machine parameters; zero values are taken from the lattice.
    #[serde(default)]
    pub machine: MachineParameters,
    /// Transverse trajectory model selection.
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
    /// Spin transport options.
    #[serde(default)]
    pub transport: TransportConfig,
    /// Resonance strength scan.
    #[serde(default)]
    pub resonance: ResonanceConfig,
    /// Auxiliary per-particle output.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

fn default_particles() -> u32 {
    1
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            particles: default_particles(),
            seed_policy: SeedPolicy::default(),
            time: TimeConfig::default(),
            energy: EnergyConfig::default(),
            spin: SpinConfig::default(),
            longitudinal: LongitudinalConfig::default(),
            machine: MachineParameters::default(),
            trajectory: TrajectoryConfig::default(),
            transport: TransportConfig::default(),
            resonance: ResonanceConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed; particle `i` uses `master_seed + i`.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded alongside the outputs.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Tracked time window in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Start time.
    #[serde(default)]
    pub start: f64,
    /// Stop time; must exceed `start`.
    #[serde(default = "default_stop")]
    pub stop: f64,
    /// Time between output samples; zero selects `duration / 200`.
    #[serde(default)]
    pub output_spacing: f64,
}

fn default_stop() -> f64 {
    1e-4
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: default_stop(),
            output_spacing: 0.0,
        }
    }
}

/// Reference energy in GeV and its ramp in GeV/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// Energy at t = 0.
    #[serde(default = "default_initial_energy")]
    pub initial: f64,
    /// Linear ramp rate.
    #[serde(default)]
    pub ramp_rate: f64,
    /// Optional upper limit of the ramp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

fn default_initial_energy() -> f64 {
    1.0
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_energy(),
            ramp_rate: 0.0,
            maximum: None,
        }
    }
}

/// Initial spin, components ordered (x, s, z).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinConfig {
    /// Start vector; normalised before tracking.
    #[serde(default = "default_spin_start")]
    pub start: [f64; 3],
}

fn default_spin_start() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            start: default_spin_start(),
        }
    }
}

/// Available longitudinal models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LongitudinalMode {
    /// Linear ramp from the energy section.
    #[default]
    Linear,
    /// Interpolated per-particle energy table.
    External,
    /// Energy table superposed with the linear ramp minus its central value.
    ExternalPlusLinear,
    /// Energy table sampled at the last entry at or before the position.
    ExternalNoInterpolation,
    /// Linear ramp plus a constant per-particle energy offset.
    Offset,
    /// Linear ramp plus an offset oscillating at the synchrotron frequency.
    Oscillation,
    /// RF cavities and stochastic synchrotron radiation.
    Radiation,
}

impl LongitudinalMode {
    /// True for the modes reading per-particle energy tables.
    pub fn is_external(self) -> bool {
        matches!(
            self,
            LongitudinalMode::External
                | LongitudinalMode::ExternalPlusLinear
                | LongitudinalMode::ExternalNoInterpolation
        )
    }

    /// True for the modes built on the analytic longitudinal phase space.
    pub fn needs_machine(self) -> bool {
        matches!(
            self,
            LongitudinalMode::Offset | LongitudinalMode::Oscillation | LongitudinalMode::Radiation
        )
    }
}

/// Longitudinal model section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongitudinalConfig {
    /// Selected model.
    #[serde(default)]
    pub model: LongitudinalMode,
}

/// Available trajectory models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrajectoryMode {
    /// Lattice closed orbit.
    #[default]
    ClosedOrbit,
    /// Per-particle trajectory tables from the external adapter.
    External,
    /// Closed orbit plus a synthesized vertical betatron oscillation.
    Oscillation,
}

/// Trajectory model section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    /// Selected model.
    #[serde(default)]
    pub model: TrajectoryMode,
    /// Vertical emittance in m rad (oscillation only).
    #[serde(default)]
    pub emittance: f64,
    /// Vertical beta function in m (oscillation only).
    #[serde(default)]
    pub beta: f64,
    /// Vertical betatron tune (oscillation only).
    #[serde(default)]
    pub tune: f64,
}

/// Spin transport options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Add the dipole pole face contribution to the horizontal field.
    #[serde(default)]
    pub edge_focusing: bool,
    /// Renormalise the spin after every element.
    #[serde(default)]
    pub renormalize: bool,
}

/// How the number of resonance turns is derived when not given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TurnBasis {
    /// `round(1 / |agamma_step|)`.
    SpinTuneStep,
    /// Revolutions covered by the tracked duration.
    Duration,
}

/// Resonance strength scan section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResonanceConfig {
    /// First spin tune of the scan.
    #[serde(default)]
    pub agamma_min: f64,
    /// Last spin tune of the scan (inclusive).
    #[serde(default = "default_agamma_max")]
    pub agamma_max: f64,
    /// Spin tune step.
    #[serde(default = "default_agamma_step")]
    pub agamma_step: f64,
    /// Explicit number of turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns: Option<u64>,
    /// Fallback used when `turns` is absent.
    #[serde(default = "default_turn_basis")]
    pub turn_basis: Option<TurnBasis>,
}

fn default_agamma_max() -> f64 {
    5.0
}

fn default_agamma_step() -> f64 {
    0.01
}

fn default_turn_basis() -> Option<TurnBasis> {
    Some(TurnBasis::SpinTuneStep)
}

impl Default for ResonanceConfig {
    fn default() -> Self {
        Self {
            agamma_min: 0.0,
            agamma_max: default_agamma_max(),
            agamma_step: default_agamma_step(),
            turns: None,
            turn_basis: default_turn_basis(),
        }
    }
}

/// Particles writing auxiliary phase-space output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Particle ids.
    #[serde(default)]
    pub particles: Vec<u32>,
}

fn config_error(code: &str, message: &str) -> SpinError {
    SpinError::Config(ErrorInfo::new(code, message))
}

impl Configuration {
    /// Parses a YAML document. Unknown mode strings are rejected here.
    pub fn from_yaml_str(contents: &str) -> Result<Self, SpinError> {
        serde_yaml::from_str(contents)
            .map_err(|err| SpinError::Config(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Reads a YAML configuration from disk.
    pub fn load(path: &Path) -> Result<Self, SpinError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            SpinError::Io(
                ErrorInfo::new("config-read", err.to_string()).with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Serializes the configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, SpinError> {
        serde_yaml::to_string(self)
            .map_err(|err| SpinError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Writes the configuration as YAML.
    pub fn save(&self, path: &Path) -> Result<(), SpinError> {
        let yaml = self.to_yaml_string()?;
        fs::write(path, yaml).map_err(|err| {
            SpinError::Io(
                ErrorInfo::new("config-write", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }

    /// Tracked duration in seconds.
    pub fn duration(&self) -> f64 {
        self.time.stop - self.time.start
    }

    /// Effective time between samples.
    pub fn output_spacing(&self) -> f64 {
        if self.time.output_spacing > 0.0 {
            self.time.output_spacing
        } else {
            self.duration() / DEFAULT_STEPS
        }
    }

    /// Number of recorded samples, including the one at the start time.
    pub fn num_samples(&self) -> u64 {
        let steps = (self.duration() / self.output_spacing() * (1.0 + 1e-12)).floor();
        steps.max(0.0) as u64 + 1
    }

    /// Nominal time of sample `k`.
    pub fn sample_time(&self, k: u64) -> f64 {
        self.time.start + k as f64 * self.output_spacing()
    }

    /// Position at the start time.
    pub fn pos_start(&self) -> f64 {
        time_to_pos(self.time.start)
    }

    /// Position at the stop time.
    pub fn pos_stop(&self) -> f64 {
        time_to_pos(self.time.stop)
    }

    /// Lorentz factor of the linear ramp at time `t`.
    pub fn gamma(&self, t: f64) -> f64 {
        self.ramp().gamma(t)
    }

    /// Linear energy ramp of the energy section.
    pub fn ramp(&self) -> EnergyRamp {
        EnergyRamp::new(&self.energy)
    }

    /// Spin tune of the linear ramp at time `t`.
    pub fn agamma(&self, t: f64) -> f64 {
        A_GYRO * self.gamma(t)
    }

    /// Normalised start spin.
    pub fn start_spin(&self) -> SpinVector {
        Vector3::from(self.spin.start).normalize()
    }

    /// True when particle `id` should write phase-space diagnostics.
    pub fn is_diagnostic(&self, id: u32) -> bool {
        self.diagnostics.particles.contains(&id)
    }

    /// Spin tunes of the resonance scan, `min + k * step` up to `max`.
    pub fn agamma_grid(&self) -> Vec<f64> {
        let ResonanceConfig {
            agamma_min: min,
            agamma_max: max,
            agamma_step: step,
            ..
        } = self.resonance;
        if !(step > 0.0) || max < min {
            return Vec::new();
        }
        let count = ((max - min) / step * (1.0 + 1e-12)).floor() as u64 + 1;
        (0..count).map(|k| min + k as f64 * step).collect()
    }

    /// Number of turns integrated per particle in the resonance estimate.
    pub fn resonance_turns(&self, circumference: f64) -> Result<u64, SpinError> {
        let turns = match (self.resonance.turns, self.resonance.turn_basis) {
            (Some(turns), _) => turns,
            (None, Some(TurnBasis::SpinTuneStep)) => {
                if self.resonance.agamma_step == 0.0 {
                    0
                } else {
                    (1.0 / self.resonance.agamma_step.abs()).round() as u64
                }
            }
            (None, Some(TurnBasis::Duration)) => {
                if circumference > 0.0 {
                    (SPEED_OF_LIGHT * self.duration() / circumference).round().max(0.0) as u64
                } else {
                    0
                }
            }
            (None, None) => {
                return Err(config_error(
                    "resonance-turns-unresolved",
                    "neither resonance.turns nor resonance.turn_basis is set",
                ))
            }
        };
        if turns == 0 {
            return Err(SpinError::Config(
                ErrorInfo::new("resonance-turns-zero", "resonance estimate needs at least one turn")
                    .with_hint("set resonance.turns explicitly"),
            ));
        }
        Ok(turns)
    }

    /// Restricts the resonance scan to a single spin tune.
    pub fn select_spin_tune(&mut self, agamma: f64) {
        self.resonance.agamma_min = agamma;
        self.resonance.agamma_max = agamma;
    }

    /// Human readable overview printed before a run starts.
    pub fn summary(&self) -> String {
        let (t_start, t_stop) = (self.time.start, self.time.stop);
        let spin = self.start_spin();
        let mut lines = vec![
            format!(
                "particles      {} (master seed {:#x})",
                self.particles, self.seed_policy.master_seed
            ),
            format!(
                "time           {t_start:e} s to {t_stop:e} s, {} samples every {:e} s",
                self.num_samples(),
                self.output_spacing()
            ),
            format!(
                "energy         {:.6} GeV to {:.6} GeV, ramp {} GeV/s",
                self.gamma(t_start) * E_REST_GEV,
                self.gamma(t_stop) * E_REST_GEV,
                self.energy.ramp_rate
            ),
            format!(
                "spin tune      {:.6} to {:.6}",
                self.agamma(t_start),
                self.agamma(t_stop)
            ),
            format!("start spin     ({:.4}, {:.4}, {:.4})", spin.x, spin.y, spin.z),
            format!(
                "models         longitudinal {:?}, trajectory {:?}",
                self.longitudinal.model, self.trajectory.model
            ),
        ];
        if let Some(label) = &self.seed_policy.label {
            lines.push(format!("label          {label}"));
        }
        lines.join("\n")
    }

    /// Checks the structural preconditions of a tracking run.
    ///
    /// Machine parameters are checked as given, so autocomplete them first.
    pub fn validate(&self) -> Result<(), SpinError> {
        if self.particles == 0 {
            return Err(config_error("particles-zero", "at least one particle is required"));
        }
        if !(self.time.stop > self.time.start) {
            return Err(SpinError::Config(
                ErrorInfo::new("time-range", "stop time must be after start time")
                    .with_context("start", self.time.start)
                    .with_context("stop", self.time.stop),
            ));
        }
        if self.time.output_spacing < 0.0 || !self.time.output_spacing.is_finite() {
            return Err(SpinError::Config(
                ErrorInfo::new("output-spacing", "output spacing must not be negative")
                    .with_context("output_spacing", self.time.output_spacing)
                    .with_hint("use 0 to sample the duration 200 times"),
            ));
        }
        let spacing = self.output_spacing();
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(config_error("output-spacing", "output spacing must be positive"));
        }
        if Vector3::from(self.spin.start).norm() == 0.0 {
            return Err(config_error("spin-zero", "start spin must be non-zero"));
        }
        if !(self.energy.initial > 0.0) {
            return Err(config_error("energy-initial", "initial energy must be positive"));
        }
        if self.longitudinal.model.needs_machine() {
            let machine = &self.machine;
            if !(machine.overvoltage > 1.0) {
                return Err(SpinError::Config(
                    ErrorInfo::new("machine-overvoltage", "overvoltage factor must exceed 1")
                        .with_context("overvoltage", machine.overvoltage),
                ));
            }
            let required = [
                ("momentum_compaction", machine.momentum_compaction),
                ("harmonic_number", machine.harmonic_number),
                ("bending_radius", machine.bending_radius),
                ("damping_partition", machine.damping_partition),
            ];
            for (name, value) in required {
                if value == 0.0 {
                    return Err(SpinError::Config(
                        ErrorInfo::new("machine-unset", "machine parameter is zero")
                            .with_context("parameter", name)
                            .with_context("model", format!("{:?}", self.longitudinal.model)),
                    ));
                }
            }
        }
        if self.trajectory.model == TrajectoryMode::Oscillation
            && !(self.trajectory.emittance > 0.0 && self.trajectory.beta > 0.0)
        {
            return Err(config_error(
                "trajectory-oscillation",
                "oscillation trajectory needs positive emittance and beta",
            ));
        }
        Ok(())
    }

    /// Checks the preconditions of a resonance scan.
    pub fn validate_resonance(&self) -> Result<(), SpinError> {
        if self.particles == 0 {
            return Err(config_error("particles-zero", "at least one particle is required"));
        }
        let resonance = &self.resonance;
        if !(resonance.agamma_step > 0.0) || resonance.agamma_max < resonance.agamma_min {
            return Err(SpinError::Config(
                ErrorInfo::new("resonance-range", "spin tune scan needs step > 0 and max >= min")
                    .with_context("min", resonance.agamma_min)
                    .with_context("max", resonance.agamma_max)
                    .with_context("step", resonance.agamma_step),
            ));
        }
        if self.trajectory.model == TrajectoryMode::Oscillation
            && !(self.trajectory.emittance > 0.0 && self.trajectory.beta > 0.0)
        {
            return Err(config_error(
                "trajectory-oscillation",
                "oscillation trajectory needs positive emittance and beta",
            ));
        }
        Ok(())
    }
}
