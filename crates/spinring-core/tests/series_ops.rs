use spinring_core::{SpinMotion, SpinVector};

fn series(values: &[(f64, [f64; 3])]) -> SpinMotion {
    let mut motion = SpinMotion::new();
    for (time, spin) in values {
        motion.insert(*time, SpinVector::new(spin[0], spin[1], spin[2]));
    }
    motion
}

#[test]
fn pointwise_sum_and_division_average() {
    let mut total = series(&[(0.0, [1.0, 0.0, 0.0]), (1.0, [0.0, 1.0, 0.0])]);
    let other = series(&[(0.0, [0.0, 0.0, 1.0]), (1.0, [0.0, 1.0, 0.0])]);
    total += &other;
    total /= 2.0;
    assert_eq!(total.get(0.0), Some(&SpinVector::new(0.5, 0.0, 0.5)));
    assert_eq!(total.get(1.0), Some(&SpinVector::new(0.0, 1.0, 0.0)));
}

#[test]
fn same_times_detects_mismatch() {
    let a = series(&[(0.0, [1.0, 0.0, 0.0]), (1.0, [1.0, 0.0, 0.0])]);
    let b = series(&[(0.0, [1.0, 0.0, 0.0]), (2.0, [1.0, 0.0, 0.0])]);
    let c = series(&[(0.0, [0.0, 0.0, 1.0]), (1.0, [0.0, 0.0, 1.0])]);
    assert!(!a.same_times(&b));
    assert!(a.same_times(&c));
}

#[test]
fn iteration_is_time_ordered() {
    let motion = series(&[(2.0, [0.0; 3]), (0.5, [0.0; 3]), (1.0, [0.0; 3])]);
    let times: Vec<f64> = motion.iter().map(|(t, _)| t).collect();
    assert_eq!(times, vec![0.5, 1.0, 2.0]);
    assert_eq!(motion.last().map(|(t, _)| t), Some(2.0));
}
