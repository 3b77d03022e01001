//! Per-particle energy and trajectory tables from an external beam simulation.
//!
//! Adapters are prepared exactly once by [`PreparedTracking::new`] before any
//! task is queued. Tasks only ever see the prepared, shared handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::{Boundary, PositionTable};
use spinring_lattice::POSITION_TOLERANCE;
use tracing::info;

use crate::trajectory::Trajectory;

/// Energy sample, position measured from the tracking start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergySample {
    /// Distance since tracking start in metres.
    pub pos: f64,
    /// Lorentz factor.
    pub gamma: f64,
}

/// Transverse sample, position measured from the tracking start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    /// Distance since tracking start in metres.
    pub pos: f64,
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub z: f64,
}

/// Source of precomputed per-particle tables.
pub trait ExternalTracking: Send + Sync {
    /// One-time setup. Runs before any per-particle read.
    fn prepare(&mut self) -> Result<(), SpinError>;

    /// Energy samples of one particle.
    fn energy(&self, particle: u32) -> Result<Vec<EnergySample>, SpinError>;

    /// Trajectory samples of one particle.
    fn trajectory(&self, particle: u32) -> Result<Vec<TrajectorySample>, SpinError>;
}

fn not_prepared() -> SpinError {
    SpinError::Io(ErrorInfo::new(
        "adapter-not-prepared",
        "external tracking adapter was read before prepare()",
    ))
}

/// Tables held in memory, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracking {
    energies: BTreeMap<u32, Vec<EnergySample>>,
    trajectories: BTreeMap<u32, Vec<TrajectorySample>>,
    prepared: bool,
}

impl InMemoryTracking {
    /// Creates an empty adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the energy samples of a particle.
    pub fn with_energy(mut self, particle: u32, samples: Vec<EnergySample>) -> Self {
        self.energies.insert(particle, samples);
        self
    }

    /// Sets the trajectory samples of a particle.
    pub fn with_trajectory(mut self, particle: u32, samples: Vec<TrajectorySample>) -> Self {
        self.trajectories.insert(particle, samples);
        self
    }
}

fn missing(kind: &str, particle: u32) -> SpinError {
    SpinError::Io(
        ErrorInfo::new("external-missing", format!("no {kind} samples for particle"))
            .with_particle(particle),
    )
}

impl ExternalTracking for InMemoryTracking {
    fn prepare(&mut self) -> Result<(), SpinError> {
        self.prepared = true;
        Ok(())
    }

    fn energy(&self, particle: u32) -> Result<Vec<EnergySample>, SpinError> {
        if !self.prepared {
            return Err(not_prepared());
        }
        self.energies
            .get(&particle)
            .cloned()
            .ok_or_else(|| missing("energy", particle))
    }

    fn trajectory(&self, particle: u32) -> Result<Vec<TrajectorySample>, SpinError> {
        if !self.prepared {
            return Err(not_prepared());
        }
        self.trajectories
            .get(&particle)
            .cloned()
            .ok_or_else(|| missing("trajectory", particle))
    }
}

/// Directory of CSV files `energy/NNNN.csv` (`pos,gamma`) and
/// `trajectory/NNNN.csv` (`pos,x,z`), one pair per particle id.
#[derive(Debug, Clone)]
pub struct CsvDirectoryTracking {
    root: PathBuf,
    prepared: bool,
}

impl CsvDirectoryTracking {
    /// Adapter reading below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prepared: false,
        }
    }

    /// File holding the `kind` table of a particle.
    pub fn table_path(&self, kind: &str, particle: u32) -> PathBuf {
        self.root.join(kind).join(format!("{particle:04}.csv"))
    }

    fn read<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>, SpinError> {
        if !self.prepared {
            return Err(not_prepared());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|err| wrap_csv("external-open", path, err))?;
        reader
            .deserialize()
            .map(|row| row.map_err(|err| wrap_csv("external-record", path, err)))
            .collect()
    }
}

fn wrap_csv(code: &str, path: &Path, err: csv::Error) -> SpinError {
    SpinError::Io(
        ErrorInfo::new(code, "external table could not be read")
            .with_context("path", path.display())
            .with_hint(err.to_string()),
    )
}

impl ExternalTracking for CsvDirectoryTracking {
    fn prepare(&mut self) -> Result<(), SpinError> {
        if !self.root.is_dir() {
            return Err(SpinError::Io(
                ErrorInfo::new("external-root", "external tracking directory does not exist")
                    .with_context("path", self.root.display()),
            ));
        }
        info!(root = %self.root.display(), "reading external tables");
        self.prepared = true;
        Ok(())
    }

    fn energy(&self, particle: u32) -> Result<Vec<EnergySample>, SpinError> {
        self.read(&self.table_path("energy", particle))
    }

    fn trajectory(&self, particle: u32) -> Result<Vec<TrajectorySample>, SpinError> {
        self.read(&self.table_path("trajectory", particle))
    }
}

/// Adapter after its one-time setup, shared read-only by all tasks.
pub struct PreparedTracking {
    adapter: Box<dyn ExternalTracking>,
}

impl std::fmt::Debug for PreparedTracking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedTracking").finish_non_exhaustive()
    }
}

fn particle_failure(err: SpinError, particle: u32) -> SpinError {
    SpinError::Particle(err.info().clone().with_particle(particle))
}

impl PreparedTracking {
    /// Runs the adapter's setup.
    pub fn new(mut adapter: Box<dyn ExternalTracking>) -> Result<Self, SpinError> {
        adapter.prepare()?;
        info!("external tracking adapter prepared");
        Ok(Self { adapter })
    }

    /// Clamped energy table of a particle.
    pub fn energy_table(&self, particle: u32) -> Result<PositionTable, SpinError> {
        let samples = self
            .adapter
            .energy(particle)
            .map_err(|err| particle_failure(err, particle))?;
        PositionTable::new(
            samples.iter().map(|s| (s.pos, s.gamma)).collect(),
            Boundary::Clamped,
        )
        .map_err(|err| particle_failure(err, particle))
    }

    /// Periodic trajectory of a particle.
    ///
    /// The period is the smallest whole number of turns covering the samples.
    /// A closing sample one period after the first is dropped.
    pub fn trajectory(
        &self,
        particle: u32,
        circumference: f64,
        pos_start: f64,
    ) -> Result<Trajectory, SpinError> {
        let mut samples = self
            .adapter
            .trajectory(particle)
            .map_err(|err| particle_failure(err, particle))?;
        let first = samples.first().map(|s| s.pos).unwrap_or(0.0);
        let last = samples.last().map(|s| s.pos).unwrap_or(0.0);
        let turns = (last / circumference - POSITION_TOLERANCE / circumference).ceil();
        let period = circumference * turns.max(1.0);
        if samples.len() > 2 && (last - first - period).abs() <= POSITION_TOLERANCE {
            samples.pop();
        }
        let boundary = Boundary::Periodic { period };
        let build = |values: Vec<(f64, f64)>| {
            PositionTable::new(values, boundary).map_err(|err| particle_failure(err, particle))
        };
        Ok(Trajectory::External {
            x: build(samples.iter().map(|s| (s.pos, s.x)).collect())?,
            z: build(samples.iter().map(|s| (s.pos, s.z)).collect())?,
            pos_start,
        })
    }
}
