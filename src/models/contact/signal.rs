//! Experimental force signal as a query-by-time natural cubic spline.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("need at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("{times} sample times but {values} sample values")]
    LengthMismatch { times: usize, values: usize },

    #[error("sample times must be finite and strictly increasing (index {0})")]
    NonIncreasingTime(usize),
}

/// Immutable, pre-smoothed reference force `F(t)`.
///
/// The samples are interpolated with a natural cubic spline. Queries outside
/// the sampled range continue along the end tangent. Non-finite sample values
/// are kept. The spline solve couples every knot, so a single NaN sample
/// poisons the curvature of every interior knot and with it every query
/// inside the sampled range.
#[derive(Debug, Clone)]
pub struct ForceSignal {
    times: Vec<f64>,
    values: Vec<f64>,
    /// Second derivatives at the knots
    curvature: Vec<f64>,
}

impl ForceSignal {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Result<Self, SignalError> {
        if times.len() != values.len() {
            return Err(SignalError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if times.len() < 2 {
            return Err(SignalError::TooFewSamples(times.len()));
        }
        for i in 0..times.len() {
            let ok = times[i].is_finite() && (i == 0 || times[i] > times[i - 1]);
            if !ok {
                return Err(SignalError::NonIncreasingTime(i));
            }
        }
        let curvature = natural_spline_curvature(&times, &values);
        Ok(Self {
            times,
            values,
            curvature,
        })
    }

    /// Build from `(time, force)` pairs.
    pub fn from_samples(samples: &[(f64, f64)]) -> Result<Self, SignalError> {
        let (times, values) = samples.iter().copied().unzip();
        Self::new(times, values)
    }

    /// A signal that is zero over `[start, end]` (and everywhere else).
    pub fn zero(start: f64, end: f64) -> Result<Self, SignalError> {
        Self::new(vec![start, end], vec![0.0, 0.0])
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Sampled time range.
    pub fn span(&self) -> (f64, f64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    /// Force at time `t`.
    pub fn at(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        let n = self.times.len();
        if t <= self.times[0] {
            return self.values[0] + self.slope(0) * (t - self.times[0]);
        }
        if t >= self.times[n - 1] {
            return self.values[n - 1] + self.slope(n - 1) * (t - self.times[n - 1]);
        }

        // Interval [i, i+1] containing t
        let i = self.times.partition_point(|&knot| knot <= t) - 1;
        let (t0, t1) = (self.times[i], self.times[i + 1]);
        let h = t1 - t0;
        let a = (t1 - t) / h;
        let b = (t - t0) / h;
        a * self.values[i]
            + b * self.values[i + 1]
            + ((a * a * a - a) * self.curvature[i] + (b * b * b - b) * self.curvature[i + 1])
                * (h * h)
                / 6.0
    }

    /// First derivative at knot `i`.
    fn slope(&self, i: usize) -> f64 {
        let n = self.times.len();
        if i + 1 < n {
            let h = self.times[i + 1] - self.times[i];
            (self.values[i + 1] - self.values[i]) / h
                - h * (2.0 * self.curvature[i] + self.curvature[i + 1]) / 6.0
        } else {
            let h = self.times[i] - self.times[i - 1];
            (self.values[i] - self.values[i - 1]) / h
                + h * (self.curvature[i - 1] + 2.0 * self.curvature[i]) / 6.0
        }
    }
}

/// Second derivatives of the natural cubic spline through `(x, y)`, solved
/// with the tridiagonal (Thomas) algorithm.
fn natural_spline_curvature(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }

    // Interior equations i = 1..n-1:
    // h[i-1] m[i-1] + 2(h[i-1]+h[i]) m[i] + h[i] m[i+1] = 6 (d[i] - d[i-1])
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];
    for i in 1..n - 1 {
        let h_lo = x[i] - x[i - 1];
        let h_hi = x[i + 1] - x[i];
        let rhs = 6.0 * ((y[i + 1] - y[i]) / h_hi - (y[i] - y[i - 1]) / h_lo);
        let diag = 2.0 * (h_lo + h_hi) - h_lo * c_prime[i - 1];
        c_prime[i] = h_hi / diag;
        d_prime[i] = (rhs - h_lo * d_prime[i - 1]) / diag;
    }
    for i in (1..n - 1).rev() {
        m[i] = d_prime[i] - c_prime[i] * m[i + 1];
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_knots() {
        let times = vec![0.0, 0.1, 0.25, 0.4, 0.6];
        let values = vec![0.0, 300.0, 800.0, 650.0, 10.0];
        let signal = ForceSignal::new(times.clone(), values.clone()).unwrap();
        for (t, v) in times.iter().zip(&values) {
            assert!((signal.at(*t) - v).abs() < 1e-9);
        }
    }

    #[test]
    fn reproduces_linear_data() {
        let samples: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 0.1, 3.0 * i as f64)).collect();
        let signal = ForceSignal::from_samples(&samples).unwrap();
        assert!((signal.at(0.35) - 10.5).abs() < 1e-9);
        // Linear extrapolation past the end
        assert!((signal.at(1.0) - 30.0).abs() < 1e-9);
        assert!((signal.at(-0.1) + 3.0).abs() < 1e-9);
    }

    #[test]
    fn smooth_between_knots() {
        let samples: Vec<(f64, f64)> = (0..40)
            .map(|i| {
                let t = i as f64 * 0.05;
                (t, t.sin())
            })
            .collect();
        let signal = ForceSignal::from_samples(&samples).unwrap();
        for k in 0..30 {
            let t = 0.1 + k as f64 * 0.0573;
            assert!((signal.at(t) - t.sin()).abs() < 1e-4);
        }
    }

    #[test]
    fn zero_signal_is_zero() {
        let signal = ForceSignal::zero(0.0, 1.0).unwrap();
        assert_eq!(signal.at(0.5), 0.0);
        assert_eq!(signal.at(2.0), 0.0);
    }

    #[test]
    fn rejects_bad_samples() {
        assert_eq!(
            ForceSignal::new(vec![0.0], vec![1.0]).unwrap_err(),
            SignalError::TooFewSamples(1)
        );
        assert_eq!(
            ForceSignal::new(vec![0.0, 0.1], vec![1.0]).unwrap_err(),
            SignalError::LengthMismatch {
                times: 2,
                values: 1
            }
        );
        assert_eq!(
            ForceSignal::new(vec![0.0, 0.2, 0.1], vec![1.0; 3]).unwrap_err(),
            SignalError::NonIncreasingTime(2)
        );
    }

    #[test]
    fn non_finite_values_poison_queries() {
        let signal = ForceSignal::new(vec![0.0, 0.1, 0.2], vec![0.0, f64::NAN, 0.0]).unwrap();
        assert!(signal.at(0.15).is_nan());
        assert!(signal.at(f64::NAN).is_nan());
    }

    #[test]
    fn non_finite_value_spreads_to_distant_intervals() {
        let times: Vec<f64> = (0..11).map(|i| i as f64 * 0.1).collect();
        let mut values = vec![100.0; 11];
        values[1] = f64::NAN;
        let signal = ForceSignal::new(times, values).unwrap();
        assert!(signal.at(0.55).is_nan());
        assert!(signal.at(0.85).is_nan());
    }
}
