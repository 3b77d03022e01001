//! Position-indexed sample tables with Akima spline interpolation.

use crate::errors::{ErrorInfo, SpinError};

/// Behaviour of a table outside the sampled range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    /// Values are held constant beyond the first and last sample.
    Clamped,
    /// The table repeats with the given period.
    Periodic {
        /// Repetition length; must exceed the sampled span.
        period: f64,
    },
}

/// Sorted `(position, value)` samples of a scalar function of position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTable {
    positions: Vec<f64>,
    values: Vec<f64>,
    derivatives: Vec<f64>,
    boundary: Boundary,
}

impl PositionTable {
    /// Builds a table from samples sorted by strictly increasing position.
    pub fn new(samples: Vec<(f64, f64)>, boundary: Boundary) -> Result<Self, SpinError> {
        if samples.is_empty() {
            return Err(SpinError::Serde(ErrorInfo::new(
                "table-empty",
                "position table needs at least one sample",
            )));
        }
        for (index, pair) in samples.windows(2).enumerate() {
            if !(pair[1].0 > pair[0].0) {
                return Err(SpinError::Serde(
                    ErrorInfo::new("table-unsorted", "positions must increase strictly")
                        .with_context("index", index + 1)
                        .with_context("position", pair[1].0),
                ));
            }
        }
        if samples.iter().any(|(pos, value)| !pos.is_finite() || !value.is_finite()) {
            return Err(SpinError::Serde(ErrorInfo::new(
                "table-non-finite",
                "position table contains non-finite samples",
            )));
        }
        let (positions, values): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
        if let Boundary::Periodic { period } = boundary {
            let span = positions[positions.len() - 1] - positions[0];
            if !(period > span) {
                return Err(SpinError::Serde(
                    ErrorInfo::new("table-period", "period must exceed the sampled span")
                        .with_context("period", period)
                        .with_context("span", span),
                ));
            }
        }
        let derivatives = akima_derivatives(&positions, &values, boundary);
        Ok(Self {
            positions,
            values,
            derivatives,
            boundary,
        })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Always false; construction rejects empty tables.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Sampled positions.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Sampled values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Akima spline value at `pos`.
    pub fn interp(&self, pos: f64) -> f64 {
        let n = self.positions.len();
        if n == 1 {
            return self.values[0];
        }
        let first = self.positions[0];
        let last = self.positions[n - 1];
        let pos = match self.boundary {
            Boundary::Clamped => {
                if pos <= first {
                    return self.values[0];
                }
                if pos >= last {
                    return self.values[n - 1];
                }
                pos
            }
            Boundary::Periodic { period } => {
                let wrapped = first + (pos - first).rem_euclid(period);
                if wrapped >= last {
                    return hermite(
                        last,
                        first + period,
                        self.values[n - 1],
                        self.values[0],
                        self.derivatives[n - 1],
                        self.derivatives[0],
                        wrapped,
                    );
                }
                wrapped
            }
        };
        let upper = self.positions.partition_point(|&x| x <= pos).min(n - 1);
        let lower = upper - 1;
        hermite(
            self.positions[lower],
            self.positions[upper],
            self.values[lower],
            self.values[upper],
            self.derivatives[lower],
            self.derivatives[upper],
            pos,
        )
    }

    /// Value of the last sample at or before `pos` (the first sample before the table starts).
    pub fn at_or_before(&self, pos: f64) -> f64 {
        let pos = match self.boundary {
            Boundary::Clamped => pos,
            Boundary::Periodic { period } => {
                self.positions[0] + (pos - self.positions[0]).rem_euclid(period)
            }
        };
        let count = self.positions.partition_point(|&x| x <= pos);
        self.values[count.saturating_sub(1)]
    }
}

fn hermite(x0: f64, x1: f64, y0: f64, y1: f64, d0: f64, d1: f64, x: f64) -> f64 {
    let h = x1 - x0;
    let t = (x - x0) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * y0 + h10 * h * d0 + h01 * y1 + h11 * h * d1
}

fn akima_derivatives(positions: &[f64], values: &[f64], boundary: Boundary) -> Vec<f64> {
    let n = positions.len();
    if n == 1 {
        return vec![0.0];
    }
    let mut slopes: Vec<f64> = positions
        .windows(2)
        .zip(values.windows(2))
        .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
        .collect();

    // extended[k + 2] is the slope of segment k
    let extended: Vec<f64> = match boundary {
        Boundary::Periodic { period } => {
            slopes.push((values[0] - values[n - 1]) / (positions[0] + period - positions[n - 1]));
            let segments = slopes.len() as isize;
            (-2..segments + 2)
                .map(|k| slopes[k.rem_euclid(segments) as usize])
                .collect()
        }
        Boundary::Clamped => {
            let segments = slopes.len();
            let m0 = slopes[0];
            let ml = slopes[segments - 1];
            let (m1, ml1) = if segments >= 2 {
                (slopes[1], slopes[segments - 2])
            } else {
                (m0, ml)
            };
            let mut extended = Vec::with_capacity(segments + 4);
            extended.push(3.0 * m0 - 2.0 * m1);
            extended.push(2.0 * m0 - m1);
            extended.extend_from_slice(&slopes);
            extended.push(2.0 * ml - ml1);
            extended.push(3.0 * ml - 2.0 * ml1);
            extended
        }
    };

    (0..n)
        .map(|i| {
            // slopes around node i: m_{i-2}, m_{i-1}, m_i, m_{i+1}
            let m_a = extended[i];
            let m_b = extended[i + 1];
            let m_c = extended[i + 2];
            let m_d = extended[i + 3];
            let w1 = (m_d - m_c).abs();
            let w2 = (m_b - m_a).abs();
            if w1 + w2 < 1e-300 {
                0.5 * (m_b + m_c)
            } else {
                (w1 * m_b + w2 * m_c) / (w1 + w2)
            }
        })
        .collect()
}
