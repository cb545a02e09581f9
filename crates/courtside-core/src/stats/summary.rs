// Mean / standard deviation primitives shared by the aggregation, rolling
// and outlier engines.

use serde::{Deserialize, Serialize};

/// Threshold below which a standard deviation (or a mean, for CV purposes)
/// is treated as zero.
pub const STDDEV_EPSILON: f64 = 1e-9;

/// Which standard deviation estimator to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispersion {
    /// `n - 1` denominator. Undefined for a single value.
    #[default]
    Sample,
    /// `n` denominator.
    Population,
}

/// Mean and standard deviation over a set of observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// `None` when the estimator is undefined for `count` (a sample estimate
    /// from one value).
    pub stddev: Option<f64>,
}

/// Compute mean and standard deviation for a slice of values.
///
/// Returns `None` for an empty slice: there is no mean to report, and callers
/// propagate that as a missing value rather than a zero.
pub fn summarize(values: &[f64], dispersion: Dispersion) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let squares = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let stddev = match dispersion {
        Dispersion::Population => Some((squares / n).sqrt()),
        Dispersion::Sample if values.len() > 1 => Some((squares / (n - 1.0)).sqrt()),
        Dispersion::Sample => None,
    };
    Some(Summary {
        count: values.len(),
        mean,
        stddev,
    })
}

/// Coefficient of variation as a percentage: `stddev / mean * 100`.
///
/// Undefined when the mean is zero or the standard deviation is undefined.
pub fn coefficient_of_variation(summary: &Summary) -> Option<f64> {
    let stddev = summary.stddev?;
    if summary.mean.abs() < STDDEV_EPSILON {
        return None;
    }
    Some(stddev / summary.mean * 100.0)
}

/// Compute a z-score given a value and the subject's own summary.
///
/// Undefined with fewer than two observations or a (near) zero standard
/// deviation.
pub fn zscore(value: f64, summary: &Summary) -> Option<f64> {
    if summary.count < 2 {
        return None;
    }
    let stddev = summary.stddev?;
    if stddev < STDDEV_EPSILON {
        return None;
    }
    Some((value - summary.mean) / stddev)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn population_known_values() {
        // Mean = 40/8 = 5.0, population variance = 32/8 = 4.0
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = summarize(&values, Dispersion::Population).unwrap();
        assert_eq!(s.count, 8);
        assert!(approx_eq(s.mean, 5.0, 1e-10));
        assert!(approx_eq(s.stddev.unwrap(), 2.0, 1e-10));
    }

    #[test]
    fn sample_known_values() {
        // Squared deviations sum to 50, sample variance = 50 / 2 = 25
        let s = summarize(&[20.0, 25.0, 15.0], Dispersion::Sample).unwrap();
        assert!(approx_eq(s.mean, 20.0, 1e-10));
        assert!(approx_eq(s.stddev.unwrap(), 5.0, 1e-10));
    }

    #[test]
    fn empty_slice_has_no_summary() {
        assert!(summarize(&[], Dispersion::Sample).is_none());
        assert!(summarize(&[], Dispersion::Population).is_none());
    }

    #[test]
    fn single_value() {
        let sample = summarize(&[42.0], Dispersion::Sample).unwrap();
        assert!(approx_eq(sample.mean, 42.0, 1e-10));
        assert!(sample.stddev.is_none());

        let population = summarize(&[42.0], Dispersion::Population).unwrap();
        assert!(approx_eq(population.stddev.unwrap(), 0.0, 1e-10));
    }

    #[test]
    fn cv_of_known_summary() {
        let s = summarize(&[20.0, 25.0, 15.0], Dispersion::Sample).unwrap();
        assert!(approx_eq(coefficient_of_variation(&s).unwrap(), 25.0, 1e-10));
    }

    #[test]
    fn cv_undefined_for_zero_mean() {
        let s = summarize(&[-3.0, 3.0, 0.0], Dispersion::Population).unwrap();
        assert!(coefficient_of_variation(&s).is_none());
    }

    #[test]
    fn cv_grows_with_stddev_at_equal_mean() {
        let steady = summarize(&[9.0, 10.0, 11.0], Dispersion::Sample).unwrap();
        let streaky = summarize(&[0.0, 10.0, 20.0], Dispersion::Sample).unwrap();
        assert!(approx_eq(steady.mean, streaky.mean, 1e-10));
        let steady_cv = coefficient_of_variation(&steady).unwrap();
        let streaky_cv = coefficient_of_variation(&streaky).unwrap();
        assert!(streaky_cv > steady_cv);
    }

    #[test]
    fn zscore_known_inputs() {
        let s = Summary {
            count: 10,
            mean: 5.0,
            stddev: Some(2.0),
        };
        assert!(approx_eq(zscore(9.0, &s).unwrap(), 2.0, 1e-10));
        assert!(approx_eq(zscore(1.0, &s).unwrap(), -2.0, 1e-10));
        assert!(approx_eq(zscore(5.0, &s).unwrap(), 0.0, 1e-10));
    }

    #[test]
    fn zscore_zero_stdev_is_undefined() {
        let s = summarize(&[7.0, 7.0, 7.0], Dispersion::Sample).unwrap();
        assert!(zscore(7.0, &s).is_none());
    }

    #[test]
    fn zscore_single_observation_is_undefined() {
        let s = summarize(&[7.0], Dispersion::Population).unwrap();
        assert!(zscore(7.0, &s).is_none());
    }
}
