//! Inference timing statistics.

use serde::Serialize;

/// Summary of repeated inference timings, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Timings {
    /// Time to read the model file.
    pub load: f64,
    /// Time to prepare the network and bind its buffers.
    pub init: f64,
    /// Fastest run.
    pub min: f64,
    /// Median run (upper median for even counts).
    pub median: f64,
    /// Slowest run.
    pub max: f64,
    /// Population standard deviation of the runs.
    pub stddev: f64,
    /// Mean run time.
    pub mean: f64,
}

impl Timings {
    /// Summarize `runs`. An empty slice is treated as a single zero sample.
    pub fn from_runs(load: f64, init: f64, runs: &[f64]) -> Self {
        let mut sorted = if runs.is_empty() {
            vec![0.0]
        } else {
            runs.to_vec()
        };
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let mean_sq = sorted.iter().map(|t| t * t).sum::<f64>() / n;
        // Rounding can push the variance slightly below zero.
        let stddev = (mean_sq - mean * mean).max(0.0).sqrt();

        Self {
            load,
            init,
            min: sorted[0],
            median: sorted[sorted.len() / 2],
            max: sorted[sorted.len() - 1],
            stddev,
            mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_statistics() {
        let t = Timings::from_runs(1.5, 2.5, &[4.0, 2.0, 6.0, 8.0]);
        assert_eq!(t.load, 1.5);
        assert_eq!(t.init, 2.5);
        assert_eq!(t.min, 2.0);
        assert_eq!(t.max, 8.0);
        assert_eq!(t.median, 6.0);
        assert_abs_diff_eq!(t.mean, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t.stddev, 5.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_runs() {
        let t = Timings::from_runs(0.0, 0.0, &[]);
        assert_eq!(t.min, 0.0);
        assert_eq!(t.max, 0.0);
        assert_abs_diff_eq!(t.stddev, 0.0);
    }

    #[test]
    fn test_constant_runs_have_no_spread() {
        let t = Timings::from_runs(0.0, 0.0, &[0.1, 0.1, 0.1]);
        assert_abs_diff_eq!(t.mean, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(t.stddev, 0.0, epsilon = 1e-6);
    }
}
