//! Run drivers: validate, schedule, reduce.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::{PhaseSpaceSeries, SpinMotion};
use spinring_lattice::Lattice;
use tracing::{info, warn};

use crate::aggregate;
use crate::config::{Configuration, TrajectoryMode};
use crate::external::PreparedTracking;
use crate::longitudinal::RfBucket;
use crate::resonance::ResonanceEstimator;
use crate::scheduler::{ErrorLedger, ProgressReport, Scheduler, Task};
use crate::spectrum::PhotonSpectrum;
use crate::task::{ResonanceTask, RunContext, TrackingTask};

/// Outcome of a tracking run.
#[derive(Debug, Clone)]
pub struct TrackingReport {
    /// Configuration actually used, machine parameters completed.
    pub config: Configuration,
    /// Number of particles.
    pub total: usize,
    /// Number of particles finished without error.
    pub successful: usize,
    /// Failures keyed by particle id.
    pub errors: ErrorLedger,
    /// Ensemble averaged spin series.
    pub polarization: SpinMotion,
    /// Spin series of every successful particle.
    pub motions: BTreeMap<u32, SpinMotion>,
    /// Phase space of the successful diagnostic particles.
    pub phase_space: BTreeMap<u32, PhaseSpaceSeries>,
    /// Largest spin norm drift over all successful particles.
    pub max_norm_drift: f64,
}

fn check_lattice(lattice: &dyn Lattice) -> Result<(), SpinError> {
    if lattice.elements().is_empty() || !(lattice.circumference() > 0.0) {
        return Err(SpinError::config(
            "lattice-empty",
            "lattice needs elements and a positive circumference",
        ));
    }
    Ok(())
}

fn check_external(
    needed: bool,
    external: &Option<Arc<PreparedTracking>>,
) -> Result<(), SpinError> {
    if needed && external.is_none() {
        return Err(SpinError::Config(
            ErrorInfo::new(
                "external-adapter-missing",
                "the selected model needs an external tracking adapter",
            )
            .with_hint("prepare an adapter and pass it to the run"),
        ));
    }
    Ok(())
}

fn start<T: Task>(
    scheduler: &Scheduler<T>,
    monitor: Option<(Duration, &mut dyn FnMut(&ProgressReport))>,
) -> Result<(), SpinError> {
    match monitor {
        Some((interval, callback)) => scheduler.start_monitored(interval, callback),
        None => scheduler.start(),
    }
}

fn ledger_context(mut info: ErrorInfo, errors: &ErrorLedger) -> ErrorInfo {
    for (id, message) in errors {
        info = info.with_context(format!("particle.{id:04}"), message);
    }
    info
}

/// Spin tracking of the whole ensemble.
pub struct TrackingRun {
    config: Configuration,
    lattice: Arc<dyn Lattice>,
    external: Option<Arc<PreparedTracking>>,
}

impl TrackingRun {
    /// Prepares a run; nothing is validated until [`TrackingRun::run`].
    pub fn new(
        config: Configuration,
        lattice: Arc<dyn Lattice>,
        external: Option<Arc<PreparedTracking>>,
    ) -> Self {
        Self {
            config,
            lattice,
            external,
        }
    }

    /// Configuration with unset machine parameters taken from the lattice.
    pub fn effective_config(&self) -> Configuration {
        let mut config = self.config.clone();
        if config.longitudinal.model.needs_machine() {
            let gamma0 = config.gamma(config.time.start);
            let derived = self.lattice.machine_parameters(gamma0);
            config.machine.autocomplete(&derived);
        }
        config
    }

    fn context(&self) -> Result<RunContext, SpinError> {
        let config = self.effective_config();
        config.validate()?;
        check_lattice(self.lattice.as_ref())?;
        check_external(
            config.longitudinal.model.is_external()
                || config.trajectory.model == TrajectoryMode::External,
            &self.external,
        )?;
        let bucket = if config.longitudinal.model.needs_machine() {
            let gamma0 = config.gamma(config.time.start);
            Some(RfBucket::new(&config.machine, self.lattice.as_ref(), gamma0)?)
        } else {
            None
        };
        Ok(RunContext {
            config,
            lattice: Arc::clone(&self.lattice),
            external: self.external.clone(),
            spectrum: Arc::new(PhotonSpectrum::new()),
            bucket,
        })
    }

    /// Tracks every particle on `threads` workers and averages the spins.
    pub fn run(&self, threads: usize) -> Result<TrackingReport, SpinError> {
        self.execute(threads, None)
    }

    /// Like [`TrackingRun::run`], reporting progress to `monitor` every `interval`.
    pub fn run_with_progress<F>(
        &self,
        threads: usize,
        interval: Duration,
        mut monitor: F,
    ) -> Result<TrackingReport, SpinError>
    where
        F: FnMut(&ProgressReport),
    {
        let monitor: &mut dyn FnMut(&ProgressReport) = &mut monitor;
        self.execute(threads, Some((interval, monitor)))
    }

    fn execute(
        &self,
        threads: usize,
        monitor: Option<(Duration, &mut dyn FnMut(&ProgressReport))>,
    ) -> Result<TrackingReport, SpinError> {
        let context = Arc::new(self.context()?);
        let config = context.config.clone();
        let tasks = (0..config.particles)
            .map(|id| TrackingTask::new(id, Arc::clone(&context)))
            .collect();
        let scheduler = Scheduler::new(tasks, threads);
        info!(
            particles = config.particles,
            threads = scheduler.threads(),
            samples = config.num_samples(),
            model = ?config.longitudinal.model,
            "tracking started"
        );
        start(&scheduler, monitor)?;
        let (tasks, errors) = scheduler.into_parts();
        let total = tasks.len();

        let polarization =
            aggregate::polarization(tasks.iter().map(|task| (task.id(), task.motion())), &errors)
                .map_err(|err| match err {
                    SpinError::Aggregation(info) => {
                        SpinError::Aggregation(ledger_context(info, &errors))
                    }
                    other => other,
                })?;

        let mut motions = BTreeMap::new();
        let mut phase_space = BTreeMap::new();
        let mut max_norm_drift = 0.0f64;
        for task in tasks {
            let id = task.id();
            if errors.contains_key(&id) {
                continue;
            }
            max_norm_drift = max_norm_drift.max(task.max_norm_drift());
            let (motion, series) = task.into_series();
            if config.is_diagnostic(id) {
                phase_space.insert(id, series);
            }
            motions.insert(id, motion);
        }
        if !errors.is_empty() {
            warn!(failed = errors.len(), total, "some particles failed");
        }
        info!(successful = total - errors.len(), total, "tracking finished");
        Ok(TrackingReport {
            config,
            total,
            successful: total - errors.len(),
            errors,
            polarization,
            motions,
            phase_space,
            max_norm_drift,
        })
    }
}

/// Resonance strength estimate over the ensemble.
pub struct ResonanceRun {
    config: Configuration,
    lattice: Arc<dyn Lattice>,
    external: Option<Arc<PreparedTracking>>,
}

impl ResonanceRun {
    /// Prepares a resonance run.
    pub fn new(
        config: Configuration,
        lattice: Arc<dyn Lattice>,
        external: Option<Arc<PreparedTracking>>,
    ) -> Self {
        Self {
            config,
            lattice,
            external,
        }
    }

    /// Integrates every particle on the configured grid and returns the estimator.
    pub fn run(&self, threads: usize) -> Result<ResonanceEstimator, SpinError> {
        self.execute(threads, None)
    }

    /// Like [`ResonanceRun::run`], reporting progress to `monitor` every `interval`.
    pub fn run_with_progress<F>(
        &self,
        threads: usize,
        interval: Duration,
        mut monitor: F,
    ) -> Result<ResonanceEstimator, SpinError>
    where
        F: FnMut(&ProgressReport),
    {
        let monitor: &mut dyn FnMut(&ProgressReport) = &mut monitor;
        self.execute(threads, Some((interval, monitor)))
    }

    fn execute(
        &self,
        threads: usize,
        monitor: Option<(Duration, &mut dyn FnMut(&ProgressReport))>,
    ) -> Result<ResonanceEstimator, SpinError> {
        self.config.validate_resonance()?;
        check_lattice(self.lattice.as_ref())?;
        check_external(
            self.config.trajectory.model == TrajectoryMode::External,
            &self.external,
        )?;
        let turns = self.config.resonance_turns(self.lattice.circumference())?;
        let elements = self.lattice.elements().len();
        if turns.checked_mul(elements as u64).is_none() {
            return Err(SpinError::Config(
                ErrorInfo::new("resonance-turns-overflow", "turns times elements overflows")
                    .with_context("turns", turns)
                    .with_context("elements", elements),
            ));
        }
        let grid = self.config.agamma_grid();
        let context = Arc::new(RunContext {
            config: self.config.clone(),
            lattice: Arc::clone(&self.lattice),
            external: self.external.clone(),
            spectrum: Arc::new(PhotonSpectrum::new()),
            bucket: None,
        });
        let tasks = (0..self.config.particles)
            .map(|id| ResonanceTask::new(id, Arc::clone(&context), turns))
            .collect();
        let scheduler = Scheduler::new(tasks, threads);
        info!(
            particles = self.config.particles,
            turns,
            spin_tunes = grid.len(),
            threads = scheduler.threads(),
            "resonance estimate started"
        );
        start(&scheduler, monitor)?;
        let (tasks, errors) = scheduler.into_parts();
        if !errors.is_empty() {
            warn!(failed = errors.len(), "some particles failed");
        }
        Ok(ResonanceEstimator::new(tasks, errors, grid, turns))
    }
}
