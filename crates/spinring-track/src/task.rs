//! Per-particle simulations run by the scheduler.

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use spinring_core::constants::{A_GYRO, SPEED_OF_LIGHT};
use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::{
    ParticleSeed, PhaseSpacePoint, PhaseSpaceSeries, SpinMotion, SpinVector, Stream,
};
use spinring_lattice::{ElementKind, Lattice, POSITION_TOLERANCE};
use tracing::debug;

use crate::config::{Configuration, TrajectoryMode};
use crate::external::PreparedTracking;
use crate::longitudinal::{LongitudinalModel, LongitudinalSetup, RfBucket};
use crate::resonance::ResonanceCache;
use crate::scheduler::{Progress, Task};
use crate::spectrum::PhotonSpectrum;
use crate::trajectory::Trajectory;
use crate::transport::{edge_focusing, precession_vector, rotation};

/// Spin tunes closer to zero use the limit of the dipole term.
pub const AGAMMA_ZERO: f64 = 1e-12;

/// Read-only state shared by all tasks of a run.
pub struct RunContext {
    /// Effective configuration (after autocomplete).
    pub config: Configuration,
    /// Lattice.
    pub lattice: Arc<dyn Lattice>,
    /// Prepared external adapter, if the run uses one.
    pub external: Option<Arc<PreparedTracking>>,
    /// Photon spectrum shared by every radiation model.
    pub spectrum: Arc<PhotonSpectrum>,
    /// RF bucket for the phase-space longitudinal modes.
    pub bucket: Option<RfBucket>,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("particles", &self.config.particles)
            .field("circumference", &self.lattice.circumference())
            .field("external", &self.external.is_some())
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl RunContext {
    fn external(&self) -> Result<&PreparedTracking, SpinError> {
        self.external.as_deref().ok_or_else(|| {
            SpinError::config(
                "external-adapter-missing",
                "the selected model needs an external tracking adapter",
            )
        })
    }

    fn particle_seed(&self, particle: u32) -> ParticleSeed {
        ParticleSeed::new(self.config.seed_policy.master_seed, particle)
    }

    fn trajectory(&self, particle: u32) -> Result<Trajectory, SpinError> {
        match self.config.trajectory.model {
            TrajectoryMode::ClosedOrbit => Ok(Trajectory::ClosedOrbit),
            TrajectoryMode::External => self.external()?.trajectory(
                particle,
                self.lattice.circumference(),
                self.config.pos_start(),
            ),
            TrajectoryMode::Oscillation => {
                Trajectory::oscillation(&self.config.trajectory, self.particle_seed(particle))
            }
        }
    }
}

/// Spin tracking of one particle from the start to the stop time.
#[derive(Debug)]
pub struct TrackingTask {
    particle: u32,
    context: Arc<RunContext>,
    progress: Arc<Progress>,
    motion: SpinMotion,
    phase_space: PhaseSpaceSeries,
    max_norm_drift: f64,
}

impl TrackingTask {
    /// Task for particle `particle`.
    pub fn new(particle: u32, context: Arc<RunContext>) -> Self {
        let progress = Arc::new(Progress::new(context.config.num_samples()));
        Self {
            particle,
            context,
            progress,
            motion: SpinMotion::new(),
            phase_space: PhaseSpaceSeries::new(),
            max_norm_drift: 0.0,
        }
    }

    /// Recorded spin series.
    pub fn motion(&self) -> &SpinMotion {
        &self.motion
    }

    /// Recorded longitudinal phase space (diagnostic particles only).
    pub fn phase_space(&self) -> &PhaseSpaceSeries {
        &self.phase_space
    }

    /// Largest deviation of the spin norm from one seen during tracking.
    pub fn max_norm_drift(&self) -> f64 {
        self.max_norm_drift
    }

    /// Consumes the task, returning its spin and phase-space series.
    pub fn into_series(self) -> (SpinMotion, PhaseSpaceSeries) {
        (self.motion, self.phase_space)
    }

    fn longitudinal(&self, context: &RunContext) -> Result<LongitudinalModel, SpinError> {
        let config = &context.config;
        let table = if config.longitudinal.model.is_external() {
            Some(context.external()?.energy_table(self.particle)?)
        } else {
            None
        };
        LongitudinalModel::build(LongitudinalSetup {
            mode: config.longitudinal.model,
            ramp: config.ramp(),
            bucket: context.bucket,
            spectrum: &context.spectrum,
            table,
            lattice: context.lattice.as_ref(),
            pos_range: (config.pos_start(), config.pos_stop()),
            particle: self.particle,
            particles: config.particles,
            rng: context.particle_seed(self.particle).rng(Stream::Radiation),
        })
    }
}

impl Task for TrackingTask {
    fn id(&self) -> u32 {
        self.particle
    }

    fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    fn run(&mut self) -> Result<(), SpinError> {
        let context = Arc::clone(&self.context);
        let config = &context.config;
        let lattice = context.lattice.as_ref();
        let mut longitudinal = self.longitudinal(&context)?;
        let trajectory = context.trajectory(self.particle)?;
        let diagnostic = config.is_diagnostic(self.particle);

        self.motion.clear();
        self.phase_space.clear();
        self.progress.reset();
        self.max_norm_drift = 0.0;

        let samples = config.num_samples();
        let pos_start = config.pos_start();
        let sample_spacing = config.output_spacing() * SPEED_OF_LIGHT;
        let sample_pos = |k: u64| pos_start + k as f64 * sample_spacing;
        let mut spin = config.start_spin();
        let mut next_sample = 0u64;

        let record = |task: &mut Self, k: u64, spin: SpinVector, model: &LongitudinalModel| {
            let time = config.sample_time(k);
            task.motion.insert(time, spin);
            if diagnostic {
                let pos = sample_pos(k);
                let gamma = model.gamma(pos);
                let reference = model.reference_gamma(pos);
                task.phase_space.push(PhaseSpacePoint {
                    time,
                    gamma,
                    delta: (gamma - reference) / reference,
                    phase: model.phase(),
                });
            }
            task.progress.advance();
        };

        record(self, next_sample, spin, &longitudinal);
        next_sample += 1;

        let elements = lattice.elements();
        if elements.is_empty() {
            return Err(SpinError::config("lattice-empty", "lattice has no elements"));
        }
        let mut cursor = lattice.next_element(pos_start);
        while next_sample < samples {
            let element = &elements[cursor.index];
            let start = lattice.absolute_start(&cursor);
            while next_sample < samples && sample_pos(next_sample) < start - POSITION_TOLERANCE {
                record(self, next_sample, spin, &longitudinal);
                next_sample += 1;
            }
            if next_sample >= samples {
                break;
            }
            let center = start + 0.5 * element.length;
            let point = trajectory.at(lattice, center);
            longitudinal.update(lattice, element, center)?;
            let gamma = longitudinal.gamma(center);
            if !(gamma.is_finite() && gamma > 0.0) {
                return Err(SpinError::Particle(
                    ErrorInfo::new("gamma-invalid", "energy model produced an invalid gamma")
                        .with_context("pos", center)
                        .with_context("gamma", gamma),
                ));
            }
            let mut field = lattice.field(cursor.index, &point);
            if config.transport.edge_focusing {
                edge_focusing(&mut field, element, point.z);
            }
            spin = rotation(&precession_vector(&field, gamma), gamma) * spin;
            if config.transport.renormalize {
                spin.normalize_mut();
            }
            let norm = spin.norm();
            if !norm.is_finite() {
                return Err(SpinError::Particle(
                    ErrorInfo::new("spin-non-finite", "spin vector became non-finite")
                        .with_context("element", &element.name)
                        .with_context("pos", center),
                ));
            }
            self.max_norm_drift = self.max_norm_drift.max((norm - 1.0).abs());

            let end = start + element.length;
            while next_sample < samples && end + POSITION_TOLERANCE >= sample_pos(next_sample) {
                record(self, next_sample, spin, &longitudinal);
                next_sample += 1;
            }
            cursor.advance(elements.len());
        }
        debug!(
            particle = self.particle,
            samples = self.motion.len(),
            max_norm_drift = self.max_norm_drift,
            "tracking finished"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    bx: f64,
    bs: f64,
}

/// Where the resonance integral takes its element fields from.
#[derive(Debug)]
enum FieldSource {
    /// One turn of fields, repeated identically every turn.
    Periodic(Vec<Crossing>),
    /// Fields evaluated along the trajectory turn by turn.
    Streamed(Trajectory),
}

impl FieldSource {
    fn new(context: &RunContext, particle: u32) -> Result<Self, SpinError> {
        let trajectory = context.trajectory(particle)?;
        Ok(match trajectory {
            Trajectory::ClosedOrbit => {
                FieldSource::Periodic(turn_fields(context.lattice.as_ref(), &trajectory, 0))
            }
            other => FieldSource::Streamed(other),
        })
    }

    fn integrate(&self, lattice: &dyn Lattice, turns: u64, agamma: f64) -> Complex64 {
        match self {
            FieldSource::Periodic(one_turn) => integrate_periodic(lattice, one_turn, turns, agamma),
            FieldSource::Streamed(trajectory) => {
                integrate_streamed(lattice, trajectory, turns, agamma)
            }
        }
    }
}

/// Resonance strength integral of one particle along its trajectory.
#[derive(Debug)]
pub struct ResonanceTask {
    particle: u32,
    context: Arc<RunContext>,
    turns: u64,
    progress: Arc<Progress>,
    source: Option<FieldSource>,
    cache: ResonanceCache,
}

impl ResonanceTask {
    /// Task integrating `turns` revolutions of particle `particle`.
    pub fn new(particle: u32, context: Arc<RunContext>, turns: u64) -> Self {
        let expected = context.config.agamma_grid().len() as u64;
        Self {
            particle,
            context,
            turns,
            progress: Arc::new(Progress::new(expected)),
            source: None,
            cache: ResonanceCache::new(),
        }
    }

    /// Particle id.
    pub fn particle(&self) -> u32 {
        self.particle
    }

    /// Per-particle strengths computed so far.
    pub fn cache(&self) -> &ResonanceCache {
        &self.cache
    }

    /// Strength of this particle at `agamma`, computed on first request.
    pub fn strength(&mut self, agamma: f64) -> Result<Complex64, SpinError> {
        let source = match self.source.take() {
            Some(source) => source,
            None => FieldSource::new(&self.context, self.particle)?,
        };
        let lattice = self.context.lattice.as_ref();
        let turns = self.turns;
        let result = self
            .cache
            .get_or_insert_with(agamma, || Ok(source.integrate(lattice, turns, agamma)));
        self.source = Some(source);
        result
    }
}

fn turn_fields(lattice: &dyn Lattice, trajectory: &Trajectory, turn: u64) -> Vec<Crossing> {
    let circumference = lattice.circumference();
    lattice
        .elements()
        .iter()
        .enumerate()
        .map(|(index, element)| {
            let pos = turn as f64 * circumference + element.center();
            let field = lattice.field(index, &trajectory.at(lattice, pos));
            Crossing {
                bx: field.x,
                bs: field.y,
            }
        })
        .collect()
}

/// Courant-Ruth sum over one turn of fields, phases shifted by `offset`.
///
/// Fields inside an element are taken as constant; edge focusing is ignored.
fn turn_sum(lattice: &dyn Lattice, crossings: &[Crossing], offset: f64, agamma: f64) -> Complex64 {
    let i = Complex64::i();
    let mut epsilon = Complex64::new(0.0, 0.0);
    for (element, crossing) in lattice.elements().iter().zip(crossings) {
        // omega = (1 + agamma) Bx - i (1 + a) Bs
        let omega = Complex64::new((1.0 + agamma) * crossing.bx, -(1.0 + A_GYRO) * crossing.bs);
        match element.bend_radius {
            Some(radius) if element.kind == ElementKind::Dipole && element.length > 0.0 => {
                let per_length = omega / element.length;
                if agamma.abs() < AGAMMA_ZERO {
                    epsilon += per_length * radius * (element.theta_end() - element.theta_start);
                } else {
                    let entry = (i * agamma * (element.theta_start + offset)).exp();
                    let exit = (i * agamma * (element.theta_end() + offset)).exp();
                    epsilon += per_length * radius / (i * agamma) * (exit - entry);
                }
            }
            _ => {
                epsilon += (i * agamma * (element.theta_start + offset)).exp() * omega;
            }
        }
    }
    epsilon
}

/// Sum of `exp(i agamma 2 pi t)` for `t = 0..turns`.
///
/// Only the fractional part of `agamma` enters, so integer spin tunes sum to
/// exactly `turns`.
fn turn_phase_sum(turns: u64, agamma: f64) -> Complex64 {
    let turns = turns as f64;
    let fraction = agamma - agamma.round();
    if fraction == 0.0 {
        return Complex64::new(turns, 0.0);
    }
    let half = PI * fraction;
    Complex64::from_polar((turns * half).sin() / half.sin(), half * (turns - 1.0))
}

/// Turn-repeating fields: each turn is the first one shifted by `2 pi agamma`.
fn integrate_periodic(
    lattice: &dyn Lattice,
    one_turn: &[Crossing],
    turns: u64,
    agamma: f64,
) -> Complex64 {
    let turns = turns.max(1);
    turn_sum(lattice, one_turn, 0.0, agamma) * turn_phase_sum(turns, agamma)
        / TAU
        / turns as f64
}

fn integrate_streamed(
    lattice: &dyn Lattice,
    trajectory: &Trajectory,
    turns: u64,
    agamma: f64,
) -> Complex64 {
    let turns = turns.max(1);
    let mut epsilon = Complex64::new(0.0, 0.0);
    for turn in 0..turns {
        let crossings = turn_fields(lattice, trajectory, turn);
        epsilon += turn_sum(lattice, &crossings, TAU * turn as f64, agamma);
    }
    epsilon / TAU / turns as f64
}

impl Task for ResonanceTask {
    fn id(&self) -> u32 {
        self.particle
    }

    fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    fn run(&mut self) -> Result<(), SpinError> {
        self.progress.reset();
        for agamma in self.context.config.agamma_grid() {
            self.strength(agamma)?;
            self.progress.advance();
        }
        debug!(
            particle = self.particle,
            strengths = self.cache.len(),
            "resonance strengths integrated"
        );
        Ok(())
    }
}
