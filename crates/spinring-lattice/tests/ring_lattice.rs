use spinring_core::constants::E_REST_GEV;
use spinring_core::{SpinError, TransversePoint};
use spinring_lattice::{ElementKind, Lattice, LatticeDescription, RingLattice};

const RING_YAML: &str = r#"
elements:
  - kind: drift
    length: 0.5
  - kind: dipole
    name: B1
    length: 2.0
    radius: 5.0
    entry_edge: 0.05
  - kind: drift
    length: 1.0
  - kind: quadrupole
    name: QF
    length: 0.3
    strength: 1.5
  - kind: drift
    length: 1.0
  - kind: dipole
    name: B2
    length: 2.0
    radius: 5.0
  - kind: cavity
    name: RF
  - kind: drift
    length: 3.2
rf:
  frequency_hz: 5.0e8
  voltage_kev: 600.0
optics:
  momentum_compaction: 0.03
closed_orbit:
  - { pos: 0.0, z: 1.0e-4 }
  - { pos: 5.0, z: 1.0e-4 }
"#;

#[test]
fn yaml_ring_lays_out_positions() {
    let lattice = RingLattice::from_yaml_str(RING_YAML).expect("lattice parses");
    assert!((lattice.circumference() - 10.0).abs() < 1e-12);
    let names: Vec<_> = lattice.elements().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["B1", "QF", "B2", "RF"]);
    let b2 = &lattice.elements()[2];
    assert!((b2.start - 4.8).abs() < 1e-12);
    assert!((b2.theta_start - 0.4).abs() < 1e-12);
    assert_eq!(lattice.elements()[0].entry_edge, 0.05);
    assert_eq!(lattice.count(ElementKind::Dipole), 2);
    assert_eq!(lattice.count(ElementKind::Cavity), 1);
    let orbit = lattice.closed_orbit(7.5);
    assert!((orbit.z - 1e-4).abs() < 1e-12);
}

#[test]
fn next_element_wraps_into_following_turn() {
    let lattice = RingLattice::from_yaml_str(RING_YAML).expect("lattice parses");
    let cursor = lattice.next_element(0.0);
    assert_eq!((cursor.turn, cursor.index), (0, 0));
    let cursor = lattice.next_element(0.5);
    assert_eq!((cursor.turn, cursor.index), (0, 0));
    let cursor = lattice.next_element(7.0);
    assert_eq!((cursor.turn, cursor.index), (1, 0));
    let cursor = lattice.next_element(12.6);
    assert_eq!((cursor.turn, cursor.index), (1, 1));
    assert!((lattice.absolute_start(&cursor) - 13.5).abs() < 1e-12);
}

#[test]
fn machine_parameters_from_sample_ring() {
    let lattice = RingLattice::new(LatticeDescription::sample_ring(16)).expect("valid ring");
    assert!((lattice.total_bend() - std::f64::consts::TAU).abs() < 1e-12);
    let gamma = 1.0 / E_REST_GEV;
    let params = lattice.machine_parameters(gamma);
    let radius = 16.0 / std::f64::consts::TAU;
    assert!((params.bending_radius - radius).abs() < 1e-12);
    assert_eq!(params.harmonic_number, 100.0);
    assert_eq!(params.damping_partition, 2.0);
    assert_eq!(params.momentum_compaction, 0.05);
    // Sands: U0 = 88.46 keV E[GeV]^4 / R[m]
    let loss = lattice.energy_loss_per_turn_kev(gamma);
    assert!((loss - 88.463 / radius).abs() / loss < 1e-3, "loss = {loss}");
    assert!((params.overvoltage - 400.0 / loss).abs() < 1e-9);
}

#[test]
fn field_of_dipole_is_normalised_bend() {
    let lattice = RingLattice::from_yaml_str(RING_YAML).expect("lattice parses");
    let field = lattice.field(0, &TransversePoint::default());
    assert!((field.z - 0.4).abs() < 1e-15);
    assert_eq!(field.x, 0.0);
}

#[test]
fn invalid_descriptions_are_config_errors() {
    let zero_radius = "elements:\n  - kind: dipole\n    length: 1.0\n    radius: 0.0\n";
    match RingLattice::from_yaml_str(zero_radius) {
        Err(SpinError::Config(info)) => assert_eq!(info.code, "lattice-radius"),
        other => panic!("unexpected result: {other:?}"),
    }
    let only_drift = "elements:\n  - kind: drift\n    length: 3.0\n";
    match RingLattice::from_yaml_str(only_drift) {
        Err(SpinError::Config(info)) => assert_eq!(info.code, "lattice-empty"),
        other => panic!("unexpected result: {other:?}"),
    }
    match RingLattice::from_yaml_str("elements: 7") {
        Err(SpinError::Serde(info)) => assert_eq!(info.code, "lattice-parse"),
        other => panic!("unexpected result: {other:?}"),
    }
}
