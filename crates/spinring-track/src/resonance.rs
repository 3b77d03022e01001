//! Resonance strength cache and ensemble estimator.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use num_complex::Complex64;
use spinring_core::errors::{ErrorInfo, SpinError};
use tracing::debug;

use crate::scheduler::ErrorLedger;
use crate::task::ResonanceTask;

/// Spin tune `a * gamma` used as a totally ordered map key.
#[derive(Debug, Clone, Copy)]
pub struct SpinTune(pub f64);

impl PartialEq for SpinTune {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for SpinTune {}

impl PartialOrd for SpinTune {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SpinTune {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Resonance strengths keyed by spin tune. Entries are never replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResonanceCache {
    entries: BTreeMap<SpinTune, Complex64>,
}

impl ResonanceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value, or the result of `calculate` which is then cached.
    pub fn get_or_insert_with<F>(&mut self, agamma: f64, calculate: F) -> Result<Complex64, SpinError>
    where
        F: FnOnce() -> Result<Complex64, SpinError>,
    {
        if let Some(value) = self.entries.get(&SpinTune(agamma)) {
            return Ok(*value);
        }
        let value = calculate()?;
        self.entries.insert(SpinTune(agamma), value);
        Ok(value)
    }

    /// Cached value; a missing entry is a [`SpinError::Cache`] error.
    pub fn get(&self, agamma: f64) -> Result<Complex64, SpinError> {
        self.entries.get(&SpinTune(agamma)).copied().ok_or_else(|| {
            SpinError::Cache(
                ErrorInfo::new(
                    "resonance-not-cached",
                    "resonance strength not known for requested spin tune",
                )
                .with_context("agamma", agamma),
            )
        })
    }

    /// True if a value is cached for `agamma`.
    pub fn contains(&self, agamma: f64) -> bool {
        self.entries.contains_key(&SpinTune(agamma))
    }

    /// Number of cached spin tunes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in increasing spin tune order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, Complex64)> + '_ {
        self.entries.iter().map(|(tune, value)| (tune.0, *value))
    }
}

/// Ensemble average of per-particle resonance strengths.
#[derive(Debug)]
pub struct ResonanceEstimator {
    tasks: Vec<ResonanceTask>,
    errors: ErrorLedger,
    total: usize,
    grid: Vec<f64>,
    turns: u64,
    cache: ResonanceCache,
    evaluations: u64,
}

impl ResonanceEstimator {
    /// Keeps the tasks that are not in the error ledger.
    pub fn new(
        tasks: Vec<ResonanceTask>,
        errors: ErrorLedger,
        grid: Vec<f64>,
        turns: u64,
    ) -> Self {
        let total = tasks.len();
        let tasks = tasks
            .into_iter()
            .filter(|task| !errors.contains_key(&task.particle()))
            .collect();
        Self {
            tasks,
            errors,
            total,
            grid,
            turns,
            cache: ResonanceCache::new(),
            evaluations: 0,
        }
    }

    /// Number of particles of the run.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of particles contributing to the average.
    pub fn num_successful(&self) -> usize {
        self.tasks.len()
    }

    /// Failures recorded while the tasks ran.
    pub fn errors(&self) -> &ErrorLedger {
        &self.errors
    }

    /// Turns integrated per particle.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Configured spin tune grid.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Number of ensemble averages computed so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Averaged strengths computed so far.
    pub fn cache(&self) -> &ResonanceCache {
        &self.cache
    }

    /// Ensemble strength at `agamma`, computed on first request.
    pub fn strength(&mut self, agamma: f64) -> Result<Complex64, SpinError> {
        let Self {
            tasks,
            cache,
            evaluations,
            ..
        } = self;
        cache.get_or_insert_with(agamma, || {
            if tasks.is_empty() {
                return Err(SpinError::Aggregation(
                    ErrorInfo::new(
                        "no-successful-particles",
                        "no particle is available for the resonance estimate",
                    )
                    .with_context("agamma", agamma),
                ));
            }
            debug!(agamma, particles = tasks.len(), "averaging resonance strength");
            let mut sum = Complex64::new(0.0, 0.0);
            for task in tasks.iter_mut() {
                sum += task.strength(agamma)?;
            }
            *evaluations += 1;
            Ok(sum / tasks.len() as f64)
        })
    }

    /// Strength that must already have been computed.
    pub fn cached(&self, agamma: f64) -> Result<Complex64, SpinError> {
        self.cache.get(agamma)
    }

    /// Strengths over the whole configured grid.
    pub fn scan(&mut self) -> Result<Vec<(f64, Complex64)>, SpinError> {
        let grid = self.grid.clone();
        grid.into_iter()
            .map(|agamma| Ok((agamma, self.strength(agamma)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculate_runs_once_per_key() {
        let mut cache = ResonanceCache::new();
        let mut calls = 0;
        let first = cache
            .get_or_insert_with(0.5, || {
                calls += 1;
                Ok(Complex64::new(1.0, 2.0))
            })
            .expect("value");
        let second = cache
            .get_or_insert_with(0.5, || {
                calls += 1;
                Ok(Complex64::new(9.0, 9.0))
            })
            .expect("value");
        assert_eq!(calls, 1);
        assert_eq!(first, second);
        assert_eq!(cache.get(0.5).expect("cached"), first);
    }

    #[test]
    fn missing_key_is_cache_error() {
        let cache = ResonanceCache::new();
        match cache.get(1.25) {
            Err(SpinError::Cache(info)) => assert_eq!(info.code, "resonance-not-cached"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn failed_calculation_is_not_cached() {
        let mut cache = ResonanceCache::new();
        let result = cache.get_or_insert_with(2.0, || Err(SpinError::particle("boom", "boom")));
        assert!(result.is_err());
        assert!(!cache.contains(2.0));
    }
}
