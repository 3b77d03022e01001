use std::sync::Arc;

use spinring_core::SpinError;
use spinring_lattice::{Lattice, LatticeDescription, RingLattice};
use spinring_track::{Configuration, ResonanceRun, TrajectoryMode};

const FIELD_FREE: &str = r#"
elements:
  - kind: corrector
    name: C1
    length: 0.5
  - kind: drift
    length: 2.0
  - kind: solenoid
    name: S1
    length: 1.0
    field: 0.0
  - kind: cavity
    name: RF
    length: 0.2
  - kind: drift
    length: 3.0
"#;

fn scan_config(turns: u64) -> Configuration {
    let mut config = Configuration::default();
    config.particles = 2;
    config.resonance.agamma_min = 0.0;
    config.resonance.agamma_max = 3.0;
    config.resonance.agamma_step = 0.25;
    config.resonance.turns = Some(turns);
    config
}

#[test]
fn field_free_lattice_has_no_resonances() {
    let lattice: Arc<dyn Lattice> =
        Arc::new(RingLattice::from_yaml_str(FIELD_FREE).expect("lattice"));
    let mut estimator = ResonanceRun::new(scan_config(4), lattice, None)
        .run(2)
        .expect("run");
    assert_eq!(estimator.num_successful(), 2);
    let scan = estimator.scan().expect("scan");
    assert_eq!(scan.len(), 13);
    for (agamma, strength) in scan {
        assert_eq!(strength.norm(), 0.0, "agamma = {agamma}");
    }
    assert_eq!(estimator.strength(0.123).expect("strength").norm(), 0.0);
}

fn oscillating_ring_config() -> Configuration {
    let mut config = scan_config(20);
    config.trajectory.model = TrajectoryMode::Oscillation;
    config.trajectory.emittance = 1e-9;
    config.trajectory.beta = 8.0;
    config.trajectory.tune = 2.3;
    config
}

#[test]
fn ensemble_strength_is_computed_once_per_spin_tune() {
    let lattice: Arc<dyn Lattice> =
        Arc::new(RingLattice::new(LatticeDescription::sample_ring(8)).expect("ring"));
    let mut estimator = ResonanceRun::new(oscillating_ring_config(), lattice, None)
        .run(2)
        .expect("run");
    assert_eq!(estimator.turns(), 20);
    let first = estimator.strength(1.7).expect("first");
    let second = estimator.strength(1.7).expect("second");
    assert_eq!(first, second);
    assert_eq!(estimator.evaluations(), 1);
    assert!(first.norm() > 0.0);
    assert_eq!(estimator.cached(1.7).expect("cached"), first);
    match estimator.cached(2.9) {
        Err(SpinError::Cache(info)) => assert_eq!(info.code, "resonance-not-cached"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn invalid_scan_range_is_rejected() {
    let lattice: Arc<dyn Lattice> =
        Arc::new(RingLattice::from_yaml_str(FIELD_FREE).expect("lattice"));
    let mut config = scan_config(4);
    config.resonance.agamma_max = -1.0;
    match ResonanceRun::new(config, lattice, None).run(1) {
        Err(SpinError::Config(info)) => assert_eq!(info.code, "resonance-range"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn fine_spin_tune_step_integrates_many_turns_without_storing_them() {
    let lattice: Arc<dyn Lattice> =
        Arc::new(RingLattice::new(LatticeDescription::sample_ring(16)).expect("ring"));
    let mut config = Configuration::default();
    config.particles = 2;
    config.resonance.agamma_min = 1.0;
    config.resonance.agamma_max = 1.0;
    config.resonance.agamma_step = 1e-8;
    config.resonance.turns = None;
    let mut estimator = ResonanceRun::new(config, lattice, None)
        .run(2)
        .expect("run");
    assert_eq!(estimator.turns(), 100_000_000);
    assert_eq!(estimator.num_successful(), 2);
    let scan = estimator.scan().expect("scan");
    assert_eq!(scan.len(), 1);
    assert!(scan[0].1.norm().is_finite());
}

#[test]
fn overflowing_turn_count_is_rejected() {
    let lattice: Arc<dyn Lattice> =
        Arc::new(RingLattice::new(LatticeDescription::sample_ring(4)).expect("ring"));
    match ResonanceRun::new(scan_config(u64::MAX), lattice, None).run(1) {
        Err(SpinError::Config(info)) => assert_eq!(info.code, "resonance-turns-overflow"),
        other => panic!("unexpected result: {other:?}"),
    }
}
