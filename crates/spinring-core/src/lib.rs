#![deny(missing_docs)]
#![doc = "Core data types, errors and seeding policy shared by the spinring crates."]

pub mod constants;
pub mod errors;
pub mod rng;
pub mod series;
pub mod table;

pub use errors::{ErrorInfo, SpinError};
pub use rng::{ParticleRng, ParticleSeed, Stream};
pub use series::{
    PhaseSpacePoint, PhaseSpaceSeries, SampleTime, SpinMotion, SpinVector, TransversePoint,
};
pub use table::{Boundary, PositionTable};
