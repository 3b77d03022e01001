//! Per-particle sample series produced during tracking.

use std::cmp::Ordering;
use std::collections::btree_map::{self, BTreeMap};
use std::ops::{AddAssign, DivAssign};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Spin vector in the beam frame, components ordered (x, s, z).
pub type SpinVector = Vector3<f64>;

/// Transverse offset of a particle from the design orbit, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransversePoint {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub z: f64,
}

impl TransversePoint {
    /// Creates a new point.
    pub fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }
}

/// Time of a recorded sample in seconds, totally ordered so it can key a map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleTime(pub f64);

impl SampleTime {
    /// Returns the raw time in seconds.
    pub fn seconds(&self) -> f64 {
        self.0
    }
}

impl PartialEq for SampleTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for SampleTime {}

impl PartialOrd for SampleTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SampleTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Ordered spin-vs-time series of one particle (or of an ensemble average).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpinMotion {
    samples: BTreeMap<SampleTime, SpinVector>,
}

impl SpinMotion {
    /// Creates an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the spin at the given time, replacing an earlier value at the same time.
    pub fn insert(&mut self, time: f64, spin: SpinVector) {
        self.samples.insert(SampleTime(time), spin);
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Spin recorded at exactly `time`.
    pub fn get(&self, time: f64) -> Option<&SpinVector> {
        self.samples.get(&SampleTime(time))
    }

    /// Latest sample.
    pub fn last(&self) -> Option<(f64, &SpinVector)> {
        self.samples
            .iter()
            .next_back()
            .map(|(time, spin)| (time.seconds(), spin))
    }

    /// Iterates over `(time, spin)` in increasing time order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &SpinVector)> + '_ {
        self.samples.iter().map(|(time, spin)| (time.seconds(), spin))
    }

    /// Iterates over the sample times.
    pub fn times(&self) -> btree_map::Keys<'_, SampleTime, SpinVector> {
        self.samples.keys()
    }

    /// Returns true when both series hold exactly the same ordered sample times.
    pub fn same_times(&self, other: &SpinMotion) -> bool {
        self.samples.len() == other.samples.len() && self.times().eq(other.times())
    }

    /// Removes all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Pointwise sum. Times missing in `self` are inserted from `rhs`.
impl AddAssign<&SpinMotion> for SpinMotion {
    fn add_assign(&mut self, rhs: &SpinMotion) {
        for (time, spin) in &rhs.samples {
            *self.samples.entry(*time).or_insert_with(SpinVector::zeros) += spin;
        }
    }
}

impl DivAssign<f64> for SpinMotion {
    fn div_assign(&mut self, rhs: f64) {
        for spin in self.samples.values_mut() {
            *spin /= rhs;
        }
    }
}

/// One diagnostic sample of the longitudinal phase space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpacePoint {
    /// Sample time in seconds.
    pub time: f64,
    /// Particle energy in units of the rest energy.
    pub gamma: f64,
    /// Relative energy deviation from the reference energy.
    pub delta: f64,
    /// Synchrotron phase, only known for the radiation model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<f64>,
}

/// Longitudinal phase space recorded for particles flagged for diagnostics.
pub type PhaseSpaceSeries = Vec<PhaseSpacePoint>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_and_zero_are_distinct_keys() {
        let mut motion = SpinMotion::new();
        motion.insert(0.0, SpinVector::x());
        motion.insert(-0.0, SpinVector::z());
        assert_eq!(motion.len(), 2);
    }

    #[test]
    fn division_scales_every_sample() {
        let mut motion = SpinMotion::new();
        motion.insert(1.0, SpinVector::new(2.0, 4.0, 6.0));
        motion /= 2.0;
        assert_eq!(motion.get(1.0), Some(&SpinVector::new(1.0, 2.0, 3.0)));
    }
}
