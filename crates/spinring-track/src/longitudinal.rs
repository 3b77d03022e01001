//! Energy models selected once per particle.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use rand_distr::{Distribution, Normal};
use spinring_core::constants::{pos_to_time, E_REST_GEV, E_REST_KEV};
use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::{ParticleRng, PositionTable};
use spinring_lattice::{Element, ElementKind, Lattice, MachineParameters};

use crate::config::{EnergyConfig, LongitudinalMode};
use crate::radiation::{self, RadiationModel};
use crate::spectrum::PhotonSpectrum;

/// Linear energy ramp `gamma(t) = (E0 + dE t) / E_rest`, optionally clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRamp {
    initial: f64,
    rate: f64,
    maximum: Option<f64>,
}

impl EnergyRamp {
    /// Ramp described by an energy section (GeV, GeV/s).
    pub fn new(energy: &EnergyConfig) -> Self {
        Self {
            initial: energy.initial,
            rate: energy.ramp_rate,
            maximum: energy.maximum,
        }
    }

    /// Lorentz factor at time `t`.
    pub fn gamma(&self, t: f64) -> f64 {
        let energy = self.initial + self.rate * t;
        match self.maximum {
            Some(maximum) => energy.min(maximum) / E_REST_GEV,
            None => energy / E_REST_GEV,
        }
    }
}

/// RF bucket quantities shared by every particle of a run.
///
/// Derived once from the machine parameters at the start energy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfBucket {
    /// Overvoltage factor q.
    pub overvoltage: f64,
    /// First order momentum compaction.
    pub momentum_compaction: f64,
    /// Second order momentum compaction.
    pub momentum_compaction_2: f64,
    /// RF harmonic number.
    pub harmonic_number: f64,
    /// Ring circumference.
    pub circumference: f64,
    /// Number of cavities sharing the voltage.
    pub cavities: usize,
    /// Synchronous phase.
    pub reference_phase: f64,
    /// Energy spread at the start energy, in gamma.
    pub sigma_gamma: f64,
    /// Synchrotron frequency at the start energy.
    pub synchrotron_frequency: f64,
    /// Phase spread at the start energy.
    pub sigma_phase: f64,
}

impl RfBucket {
    /// Derives the bucket at `gamma0`. Fails for lattices that cannot hold a beam.
    pub fn new(
        machine: &MachineParameters,
        lattice: &dyn Lattice,
        gamma0: f64,
    ) -> Result<Self, SpinError> {
        if lattice.count(ElementKind::Dipole) == 0 {
            return Err(SpinError::config(
                "lattice-no-dipoles",
                "the radiation model needs a lattice with dipoles",
            ));
        }
        let cavities = lattice.count(ElementKind::Cavity);
        if cavities == 0 {
            return Err(SpinError::config(
                "lattice-no-cavities",
                "the radiation model needs a lattice with rf cavities",
            ));
        }
        if !(machine.overvoltage > 1.0) {
            return Err(SpinError::Config(
                ErrorInfo::new("machine-overvoltage", "overvoltage factor must exceed 1")
                    .with_context("overvoltage", machine.overvoltage),
            ));
        }
        let circumference = lattice.circumference();
        let gamma_u0 = lattice.energy_loss_per_turn_kev(gamma0) / E_REST_KEV;
        let synchrotron_frequency = radiation::synchrotron_frequency(
            circumference,
            machine.overvoltage,
            gamma_u0,
            machine.harmonic_number,
            gamma0,
            machine.momentum_compaction,
        );
        if !(synchrotron_frequency.is_finite() && synchrotron_frequency > 0.0) {
            return Err(SpinError::Config(
                ErrorInfo::new("synchrotron-frequency", "longitudinal motion is not stable")
                    .with_context("momentum_compaction", machine.momentum_compaction)
                    .with_context("harmonic_number", machine.harmonic_number)
                    .with_hint("momentum compaction and harmonic number must be positive"),
            ));
        }
        let sigma_gamma =
            radiation::sigma_gamma(gamma0, machine.damping_partition, machine.bending_radius);
        let sigma_phase = radiation::sigma_phase(
            machine.momentum_compaction,
            synchrotron_frequency,
            sigma_gamma,
            gamma0,
            machine.harmonic_number,
            circumference,
        );
        if !(sigma_gamma.is_finite() && sigma_phase.is_finite()) {
            return Err(SpinError::config(
                "machine-spread",
                "bending radius and damping partition must be positive",
            ));
        }
        Ok(Self {
            overvoltage: machine.overvoltage,
            momentum_compaction: machine.momentum_compaction,
            momentum_compaction_2: machine.momentum_compaction_2,
            harmonic_number: machine.harmonic_number,
            circumference,
            cavities,
            reference_phase: radiation::reference_phase(machine.overvoltage),
            sigma_gamma,
            synchrotron_frequency,
            sigma_phase,
        })
    }
}

/// Stochastic longitudinal phase space driven by cavities and radiation.
#[derive(Debug, Clone)]
pub struct LongitudinalPhaseSpace {
    bucket: RfBucket,
    ramp: EnergyRamp,
    radiation: RadiationModel,
    gamma0: f64,
    gamma_u0: f64,
    gamma: f64,
    phase: f64,
    last_cavity: f64,
}

impl LongitudinalPhaseSpace {
    /// Draws the initial phase and energy from the equilibrium distribution.
    pub fn new(
        bucket: RfBucket,
        ramp: EnergyRamp,
        mut radiation: RadiationModel,
        lattice: &dyn Lattice,
        pos_start: f64,
    ) -> Result<Self, SpinError> {
        let gamma0 = ramp.gamma(pos_to_time(pos_start));
        let phase_dist = Normal::new(bucket.reference_phase, bucket.sigma_phase);
        let gamma_dist = Normal::new(gamma0, bucket.sigma_gamma);
        let (phase_dist, gamma_dist) = match (phase_dist, gamma_dist) {
            (Ok(phase), Ok(gamma)) => (phase, gamma),
            _ => {
                return Err(SpinError::particle(
                    "phase-space-draw",
                    "invalid spread of the initial phase space",
                ))
            }
        };
        let phase = phase_dist.sample(radiation.rng_mut());
        let gamma = gamma_dist.sample(radiation.rng_mut());
        let mut model = Self {
            bucket,
            ramp,
            radiation,
            gamma0,
            gamma_u0: 0.0,
            gamma,
            phase,
            last_cavity: pos_start,
        };
        model.update_cavity_voltage(lattice);
        Ok(model)
    }

    fn update_cavity_voltage(&mut self, lattice: &dyn Lattice) {
        self.gamma_u0 =
            self.bucket.overvoltage * lattice.energy_loss_per_turn_kev(self.gamma0) / E_REST_KEV;
    }

    /// Current Lorentz factor.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Reference Lorentz factor.
    pub fn gamma0(&self) -> f64 {
        self.gamma0
    }

    /// Current synchrotron phase.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Peak energy gain of all cavities in gamma.
    pub fn gamma_u0(&self) -> f64 {
        self.gamma_u0
    }

    /// Relative energy deviation from the reference.
    pub fn delta(&self) -> f64 {
        (self.gamma - self.gamma0) / self.gamma0
    }

    /// Current bucket half height in relative energy deviation.
    pub fn separatrix_half_height(&self) -> f64 {
        let loss_ratio = self.gamma_u0 / (self.bucket.overvoltage * self.gamma0);
        radiation::separatrix_half_height(
            self.bucket.overvoltage,
            loss_ratio,
            self.bucket.momentum_compaction,
            self.bucket.harmonic_number,
        )
    }

    /// Applies one element at absolute position `pos`.
    pub fn update(
        &mut self,
        lattice: &dyn Lattice,
        element: &Element,
        pos: f64,
    ) -> Result<(), SpinError> {
        match element.kind {
            ElementKind::Cavity => {
                let bucket = self.bucket;
                let delta = self.delta();
                let distance = pos - self.last_cavity;
                self.last_cavity = pos;
                self.phase += TAU
                    * bucket.harmonic_number
                    * (distance / bucket.circumference)
                    * (bucket.momentum_compaction * delta
                        + bucket.momentum_compaction_2 * delta * delta);
                self.gamma += self.gamma_u0 / bucket.cavities as f64 * self.phase.sin();
                self.gamma0 = self.ramp.gamma(pos_to_time(pos));
                self.update_cavity_voltage(lattice);
                self.check_stability(pos)
            }
            ElementKind::Dipole => {
                self.gamma -= self
                    .radiation
                    .radiated_energy(element, self.gamma0, self.gamma);
                Ok(())
            }
            ElementKind::Other => Ok(()),
        }
    }

    fn check_stability(&self, pos: f64) -> Result<(), SpinError> {
        let delta = self.delta();
        let limit = self.separatrix_half_height();
        if delta.abs() > limit || !delta.is_finite() {
            return Err(SpinError::Particle(
                ErrorInfo::new(
                    "longitudinal-instability",
                    "energy deviation left the rf bucket",
                )
                .with_context("delta", delta)
                .with_context("separatrix", limit)
                .with_context("pos", pos),
            ));
        }
        Ok(())
    }
}

/// Lookup of a per-particle external energy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLookup {
    /// Akima interpolation.
    Interpolated,
    /// Interpolation plus the linear ramp minus its central value.
    PlusLinear,
    /// Last sample at or before the position.
    AtOrBefore,
}

/// Energy model of one particle.
#[derive(Debug, Clone)]
pub enum LongitudinalModel {
    /// Configured linear ramp.
    Linear(EnergyRamp),
    /// External energy table keyed by the distance since tracking start.
    External {
        /// Gamma versus position.
        table: PositionTable,
        /// Table lookup.
        lookup: TableLookup,
        /// Configured ramp.
        ramp: EnergyRamp,
        /// Position at tracking start.
        pos_start: f64,
        /// Ramp value subtracted by [`TableLookup::PlusLinear`].
        central_gamma: f64,
    },
    /// Linear ramp plus a fixed offset.
    Offset {
        /// Configured ramp.
        ramp: EnergyRamp,
        /// Offset in gamma.
        offset: f64,
    },
    /// Linear ramp plus an offset oscillating at the synchrotron frequency.
    Oscillation {
        /// Configured ramp.
        ramp: EnergyRamp,
        /// Amplitude in gamma.
        offset: f64,
        /// Synchrotron frequency in Hz.
        frequency: f64,
        /// Per-particle phase.
        phase: f64,
    },
    /// Stochastic phase space.
    Radiation(Box<LongitudinalPhaseSpace>),
}

/// Inputs needed to build any [`LongitudinalModel`] of a particle.
pub struct LongitudinalSetup<'a> {
    /// Selected mode.
    pub mode: LongitudinalMode,
    /// Configured ramp.
    pub ramp: EnergyRamp,
    /// Run-wide bucket, present for the phase-space modes.
    pub bucket: Option<RfBucket>,
    /// Shared photon spectrum.
    pub spectrum: &'a Arc<PhotonSpectrum>,
    /// Per-particle energy table for the external modes.
    pub table: Option<PositionTable>,
    /// Lattice.
    pub lattice: &'a dyn Lattice,
    /// Tracking start and stop positions.
    pub pos_range: (f64, f64),
    /// Particle id.
    pub particle: u32,
    /// Number of particles.
    pub particles: u32,
    /// Radiation stream of the particle.
    pub rng: ParticleRng,
}

impl LongitudinalModel {
    /// Builds the model selected by `setup.mode`.
    pub fn build(setup: LongitudinalSetup<'_>) -> Result<Self, SpinError> {
        let LongitudinalSetup {
            mode,
            ramp,
            bucket,
            spectrum,
            table,
            lattice,
            pos_range: (pos_start, pos_stop),
            particle,
            particles,
            rng,
        } = setup;
        let phase_space = |bucket: Option<RfBucket>| -> Result<LongitudinalPhaseSpace, SpinError> {
            let bucket = bucket.ok_or_else(|| {
                SpinError::config("rf-bucket-missing", "rf bucket was not derived for this run")
            })?;
            let radiation = RadiationModel::new(Arc::clone(spectrum), rng.clone());
            LongitudinalPhaseSpace::new(bucket, ramp, radiation, lattice, pos_start)
        };
        let model = match mode {
            LongitudinalMode::Linear => LongitudinalModel::Linear(ramp),
            LongitudinalMode::External
            | LongitudinalMode::ExternalPlusLinear
            | LongitudinalMode::ExternalNoInterpolation => {
                let table = table.ok_or_else(|| {
                    SpinError::Particle(
                        ErrorInfo::new("external-energy-missing", "no energy table for particle")
                            .with_particle(particle),
                    )
                })?;
                let lookup = match mode {
                    LongitudinalMode::ExternalPlusLinear => TableLookup::PlusLinear,
                    LongitudinalMode::ExternalNoInterpolation => TableLookup::AtOrBefore,
                    _ => TableLookup::Interpolated,
                };
                LongitudinalModel::External {
                    table,
                    lookup,
                    ramp,
                    pos_start,
                    central_gamma: ramp.gamma(pos_to_time(0.5 * (pos_start + pos_stop))),
                }
            }
            LongitudinalMode::Offset => {
                let initial = phase_space(bucket)?;
                LongitudinalModel::Offset {
                    ramp,
                    offset: initial.gamma() - initial.gamma0(),
                }
            }
            LongitudinalMode::Oscillation => {
                let initial = phase_space(bucket)?;
                LongitudinalModel::Oscillation {
                    ramp,
                    offset: initial.gamma() - initial.gamma0(),
                    frequency: initial.bucket.synchrotron_frequency,
                    phase: TAU * f64::from(particle) / f64::from(particles.max(1)),
                }
            }
            LongitudinalMode::Radiation => {
                LongitudinalModel::Radiation(Box::new(phase_space(bucket)?))
            }
        };
        Ok(model)
    }

    /// Advances the model across `element`, reached at absolute position `pos`.
    pub fn update(
        &mut self,
        lattice: &dyn Lattice,
        element: &Element,
        pos: f64,
    ) -> Result<(), SpinError> {
        match self {
            LongitudinalModel::Radiation(phase_space) => phase_space.update(lattice, element, pos),
            _ => Ok(()),
        }
    }

    /// Lorentz factor at absolute position `pos`.
    pub fn gamma(&self, pos: f64) -> f64 {
        let t = pos_to_time(pos);
        match self {
            LongitudinalModel::Linear(ramp) => ramp.gamma(t),
            LongitudinalModel::External {
                table,
                lookup,
                ramp,
                pos_start,
                central_gamma,
            } => {
                let distance = pos - pos_start;
                match lookup {
                    TableLookup::Interpolated => table.interp(distance),
                    TableLookup::PlusLinear => {
                        table.interp(distance) + ramp.gamma(t) - central_gamma
                    }
                    TableLookup::AtOrBefore => table.at_or_before(distance),
                }
            }
            LongitudinalModel::Offset { ramp, offset } => ramp.gamma(t) + offset,
            LongitudinalModel::Oscillation {
                ramp,
                offset,
                frequency,
                phase,
            } => ramp.gamma(t) + offset * (2.0 * PI * frequency * t + phase).cos(),
            LongitudinalModel::Radiation(phase_space) => phase_space.gamma(),
        }
    }

    /// Reference Lorentz factor at `pos`, used for the relative deviation.
    pub fn reference_gamma(&self, pos: f64) -> f64 {
        let t = pos_to_time(pos);
        match self {
            LongitudinalModel::Linear(ramp)
            | LongitudinalModel::External { ramp, .. }
            | LongitudinalModel::Offset { ramp, .. }
            | LongitudinalModel::Oscillation { ramp, .. } => ramp.gamma(t),
            LongitudinalModel::Radiation(phase_space) => phase_space.gamma0(),
        }
    }

    /// Synchrotron phase, known only for the radiation model.
    pub fn phase(&self) -> Option<f64> {
        match self {
            LongitudinalModel::Radiation(phase_space) => Some(phase_space.phase()),
            _ => None,
        }
    }
}
