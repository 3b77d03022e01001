#![deny(missing_docs)]
#![doc = "Multi-particle electron spin tracking through a storage ring lattice."]

/// Ensemble averaging of per-particle spin series.
pub mod aggregate;
/// YAML configuration schema, defaults and validation.
pub mod config;
pub mod external;
pub mod longitudinal;
pub mod radiation;
pub mod resonance;
pub mod scheduler;
pub mod simulation;
pub mod spectrum;
pub mod task;
/// Transverse trajectory models.
pub mod trajectory;
pub mod transport;

pub use aggregate::polarization;
pub use config::{
    Configuration, LongitudinalMode, SeedPolicy, TrajectoryMode, TurnBasis,
};
pub use external::{
    CsvDirectoryTracking, EnergySample, ExternalTracking, InMemoryTracking, PreparedTracking,
    TrajectorySample,
};
pub use longitudinal::{EnergyRamp, LongitudinalModel, RfBucket};
pub use resonance::{ResonanceCache, ResonanceEstimator, SpinTune};
pub use scheduler::{ErrorLedger, Progress, ProgressReport, Scheduler, Task};
pub use simulation::{ResonanceRun, TrackingReport, TrackingRun};
pub use spectrum::PhotonSpectrum;
pub use task::{ResonanceTask, RunContext, TrackingTask};
