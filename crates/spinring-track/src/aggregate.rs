use spinring_core::errors::{ErrorInfo, SpinError};
use spinring_core::SpinMotion;

use crate::scheduler::ErrorLedger;

/// Ensemble average of the spin series of all particles not in `errors`.
///
/// Every averaged series must carry the same ordered sample times.
pub fn polarization<'a, I>(motions: I, errors: &ErrorLedger) -> Result<SpinMotion, SpinError>
where
    I: IntoIterator<Item = (u32, &'a SpinMotion)>,
{
    let mut sum: Option<(u32, SpinMotion)> = None;
    let mut count = 0usize;
    for (id, motion) in motions {
        if errors.contains_key(&id) {
            continue;
        }
        match &mut sum {
            None => sum = Some((id, motion.clone())),
            Some((first, total)) => {
                if !total.same_times(motion) {
                    return Err(SpinError::Aggregation(
                        ErrorInfo::new(
                            "sample-times-mismatch",
                            "spin series do not share the same sample times",
                        )
                        .with_particle(id)
                        .with_context("reference", *first)
                        .with_context("samples", motion.len())
                        .with_context("reference_samples", total.len()),
                    ));
                }
                *total += motion;
            }
        }
        count += 1;
    }
    let Some((_, mut total)) = sum else {
        return Err(SpinError::Aggregation(
            ErrorInfo::new("no-successful-particles", "no particle finished without error")
                .with_context("failed", errors.len()),
        ));
    };
    total /= count as f64;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spinring_core::SpinVector;

    fn motion(values: &[(f64, SpinVector)]) -> SpinMotion {
        let mut motion = SpinMotion::new();
        for (time, spin) in values {
            motion.insert(*time, *spin);
        }
        motion
    }

    #[test]
    fn average_of_two_series() {
        let a = motion(&[(0.0, SpinVector::new(1.0, 0.0, 0.0))]);
        let b = motion(&[(0.0, SpinVector::new(0.0, 0.0, 1.0))]);
        let average = polarization([(0, &a), (1, &b)], &ErrorLedger::new()).expect("average");
        assert_eq!(average.get(0.0), Some(&SpinVector::new(0.5, 0.0, 0.5)));
    }

    #[test]
    fn mismatched_times_are_rejected() {
        let a = motion(&[(0.0, SpinVector::z()), (1.0, SpinVector::z())]);
        let b = motion(&[(0.0, SpinVector::z()), (2.0, SpinVector::z())]);
        match polarization([(0, &a), (1, &b)], &ErrorLedger::new()) {
            Err(SpinError::Aggregation(info)) => assert_eq!(info.code, "sample-times-mismatch"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
