use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{Distribution, Exp};
use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::{ParticleSeed, PositionTable, Stream, TransversePoint};
use spinring_lattice::Lattice;

use crate::config::TrajectoryConfig;

/// Transverse position of one particle as a function of absolute position.
#[derive(Debug, Clone)]
pub enum Trajectory {
    /// The lattice closed orbit.
    ClosedOrbit,
    /// Periodic tables keyed by the distance since tracking start.
    External {
        /// Horizontal offset.
        x: PositionTable,
        /// Vertical offset.
        z: PositionTable,
        /// Position at tracking start.
        pos_start: f64,
    },
    /// Closed orbit plus a vertical betatron oscillation.
    Oscillation {
        /// Peak vertical offset.
        amplitude: f64,
        /// Initial betatron phase.
        phase: f64,
        /// Vertical tune.
        tune: f64,
    },
}

impl Trajectory {
    /// Draws a betatron oscillation from the particle's trajectory substream.
    ///
    /// The action is exponentially distributed with mean `emittance`, the
    /// amplitude is `sqrt(2 J beta)` and the phase is uniform.
    pub fn oscillation(config: &TrajectoryConfig, seed: ParticleSeed) -> Result<Self, SpinError> {
        if !(config.emittance > 0.0 && config.beta > 0.0) {
            return Err(SpinError::Config(
                ErrorInfo::new(
                    "trajectory-oscillation",
                    "oscillation trajectory needs positive emittance and beta",
                )
                .with_context("emittance", config.emittance)
                .with_context("beta", config.beta),
            ));
        }
        let mut rng = seed.rng(Stream::Trajectory);
        let action = Exp::new(1.0 / config.emittance)
            .map_err(|err| SpinError::config("trajectory-oscillation", err.to_string()))?
            .sample(&mut rng);
        Ok(Trajectory::Oscillation {
            amplitude: (2.0 * action * config.beta).sqrt(),
            phase: rng.gen_range(0.0..TAU),
            tune: config.tune,
        })
    }

    /// Transverse offset at absolute position `pos`.
    pub fn at(&self, lattice: &dyn Lattice, pos: f64) -> TransversePoint {
        match self {
            Trajectory::ClosedOrbit => lattice.closed_orbit(lattice.pos_in_turn(pos)),
            Trajectory::External { x, z, pos_start } => {
                let distance = pos - pos_start;
                TransversePoint::new(x.interp(distance), z.interp(distance))
            }
            Trajectory::Oscillation {
                amplitude,
                phase,
                tune,
            } => {
                let mut point = lattice.closed_orbit(lattice.pos_in_turn(pos));
                point.z += amplitude * (TAU * tune * pos / lattice.circumference() + phase).cos();
                point
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oscillation_draw_is_deterministic() {
        let config = TrajectoryConfig {
            model: crate::config::TrajectoryMode::Oscillation,
            emittance: 1e-9,
            beta: 10.0,
            tune: 3.2,
        };
        let seed = ParticleSeed::new(42, 5);
        let a = Trajectory::oscillation(&config, seed).expect("trajectory");
        let b = Trajectory::oscillation(&config, seed).expect("trajectory");
        match (a, b) {
            (
                Trajectory::Oscillation {
                    amplitude: a1,
                    phase: p1,
                    ..
                },
                Trajectory::Oscillation {
                    amplitude: a2,
                    phase: p2,
                    ..
                },
            ) => {
                assert_eq!(a1, a2);
                assert_eq!(p1, p2);
                assert!(a1 > 0.0 && (0.0..TAU).contains(&p1));
            }
            _ => panic!("expected oscillation trajectories"),
        }
    }

    #[test]
    fn zero_emittance_is_rejected() {
        let config = TrajectoryConfig::default();
        assert!(matches!(
            Trajectory::oscillation(&config, ParticleSeed::new(0, 1)),
            Err(SpinError::Config(_))
        ));
    }
}
