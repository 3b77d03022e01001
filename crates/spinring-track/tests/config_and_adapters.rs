use std::fs;

use spinring_core::SpinError;
use spinring_track::trajectory::Trajectory;
use spinring_track::{
    Configuration, CsvDirectoryTracking, ExternalTracking, InMemoryTracking, LongitudinalMode,
    PreparedTracking, TrajectoryMode, TrajectorySample,
};

const CONFIG_YAML: &str = r#"
particles: 4
seed_policy:
  master_seed: 42
time:
  stop: 2.0e-5
  output_spacing: 1.0e-7
energy:
  initial: 1.5
  ramp_rate: 2.0
spin:
  start: [0.0, 1.0, 1.0]
longitudinal:
  model: external-plus-linear
trajectory:
  model: closed-orbit
resonance:
  agamma_step: 0.05
  turn_basis: duration
diagnostics:
  particles: [0, 3]
"#;

#[test]
fn yaml_document_fills_remaining_defaults() {
    let config = Configuration::from_yaml_str(CONFIG_YAML).expect("config");
    assert_eq!(config.particles, 4);
    assert_eq!(config.seed_policy.master_seed, 42);
    assert_eq!(config.longitudinal.model, LongitudinalMode::ExternalPlusLinear);
    assert_eq!(config.trajectory.model, TrajectoryMode::ClosedOrbit);
    assert_eq!(config.num_samples(), 201);
    assert_eq!(config.resonance.agamma_max, 5.0);
    assert!(config.is_diagnostic(3));
    assert!(!config.is_diagnostic(1));
    assert!((config.start_spin().norm() - 1.0).abs() < 1e-15);
    config.validate().expect("valid");
}

#[test]
fn configuration_survives_a_yaml_round_trip() {
    let config = Configuration::from_yaml_str(CONFIG_YAML).expect("config");
    let yaml = config.to_yaml_string().expect("yaml");
    let restored = Configuration::from_yaml_str(&yaml).expect("restored");
    assert_eq!(restored, config);

    let defaults = Configuration::default();
    let restored = Configuration::from_yaml_str(&defaults.to_yaml_string().expect("yaml"))
        .expect("restored defaults");
    assert_eq!(restored, defaults);
}

#[test]
fn saved_configuration_loads_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("currentconfig.yaml");
    let config = Configuration::from_yaml_str(CONFIG_YAML).expect("config");
    config.save(&path).expect("save");
    assert_eq!(Configuration::load(&path).expect("load"), config);
}

#[test]
fn unknown_mode_is_a_config_error() {
    let yaml = "longitudinal:\n  model: warp-drive\n";
    match Configuration::from_yaml_str(yaml) {
        Err(SpinError::Config(info)) => {
            assert_eq!(info.code, "config-parse");
            assert!(info.message.contains("warp-drive"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn inverted_time_window_fails_validation() {
    let mut config = Configuration::default();
    config.time.start = 1e-3;
    config.time.stop = 1e-4;
    match config.validate() {
        Err(SpinError::Config(info)) => assert_eq!(info.code, "time-range"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn phase_space_modes_need_machine_parameters() {
    let mut config = Configuration::default();
    config.longitudinal.model = LongitudinalMode::Radiation;
    config.machine.overvoltage = 4.0;
    match config.validate() {
        Err(SpinError::Config(info)) => {
            assert_eq!(info.code, "machine-unset");
            assert_eq!(info.context["parameter"], "momentum_compaction");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

fn write_tables(root: &std::path::Path) {
    fs::create_dir_all(root.join("energy")).expect("energy dir");
    fs::create_dir_all(root.join("trajectory")).expect("trajectory dir");
    fs::write(
        root.join("energy/0000.csv"),
        "pos,gamma\n0.0, 2000.0\n50.0, 2001.0\n100.0, 2002.0\n",
    )
    .expect("energy table");
    fs::write(
        root.join("trajectory/0000.csv"),
        "pos,x,z\n0.0,0.0,1.0e-4\n4.0,0.0,1.0e-4\n8.0,0.0,1.0e-4\n",
    )
    .expect("trajectory table");
}

#[test]
fn csv_directory_tables_are_read_per_particle() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_tables(dir.path());
    let adapter = CsvDirectoryTracking::new(dir.path());
    assert_eq!(
        adapter.table_path("energy", 7),
        dir.path().join("energy").join("0007.csv")
    );
    let prepared = PreparedTracking::new(Box::new(adapter)).expect("prepared");

    let energy = prepared.energy_table(0).expect("energy");
    assert!((energy.interp(25.0) - 2000.5).abs() < 1e-9);
    assert!((energy.interp(500.0) - 2002.0).abs() < 1e-12);

    match prepared.trajectory(0, 10.0, 0.0).expect("trajectory") {
        Trajectory::External { z, .. } => assert!((z.interp(6.0) - 1e-4).abs() < 1e-15),
        other => panic!("unexpected trajectory: {other:?}"),
    }

    match prepared.energy_table(1) {
        Err(SpinError::Particle(info)) => {
            assert_eq!(info.code, "external-open");
            assert_eq!(info.context["particle"], "1");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn adapter_reads_require_prepare() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_tables(dir.path());
    let adapter = CsvDirectoryTracking::new(dir.path());
    match adapter.energy(0) {
        Err(SpinError::Io(info)) => assert_eq!(info.code, "adapter-not-prepared"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn missing_directory_fails_preparation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let adapter = CsvDirectoryTracking::new(dir.path().join("absent"));
    match PreparedTracking::new(Box::new(adapter)) {
        Err(SpinError::Io(info)) => assert_eq!(info.code, "external-root"),
        other => panic!("unexpected result: {other:?}"),
    }
}

fn trajectory_through(points: &[(f64, f64)]) -> Trajectory {
    let samples = points
        .iter()
        .map(|&(pos, z)| TrajectorySample { pos, x: 0.0, z })
        .collect();
    let adapter = InMemoryTracking::new().with_trajectory(0, samples);
    let prepared = PreparedTracking::new(Box::new(adapter)).expect("prepared");
    prepared.trajectory(0, 10.0, 0.0).expect("trajectory")
}

#[test]
fn trajectory_ending_on_a_turn_boundary_repeats_every_turn() {
    match trajectory_through(&[(0.0, 0.0), (2.5, 1.0), (5.0, 0.0), (7.5, -1.0), (10.0, 0.0)]) {
        Trajectory::External { z, .. } => {
            assert_eq!(z.len(), 4);
            assert!((z.interp(12.5) - 1.0).abs() < 1e-12);
            assert!((z.interp(17.5) + 1.0).abs() < 1e-12);
        }
        other => panic!("unexpected trajectory: {other:?}"),
    }
}

#[test]
fn trajectory_past_a_turn_boundary_spans_the_next_turn() {
    match trajectory_through(&[(0.0, 0.0), (5.0, 1.0), (12.0, 2.0)]) {
        Trajectory::External { z, .. } => {
            assert_eq!(z.len(), 3);
            assert!((z.interp(25.0) - 1.0).abs() < 1e-12);
        }
        other => panic!("unexpected trajectory: {other:?}"),
    }
}
