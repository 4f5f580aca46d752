//! Aggregate statistics over the runs of an experiment.

use serde::{Deserialize, Serialize};
use tdadp_core::RunMetrics;
use tracing::info;

/// Mean and standard error of one metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std_error: f64,
}

impl MetricSummary {
    /// Standard error is `sqrt(Σ(x − x̄)² / (n − 1)) / sqrt(n)`, 0 below two samples.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        if samples.len() < 2 {
            return Self { mean, std_error: 0.0 };
        }
        let squares: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
        Self {
            mean,
            std_error: (squares / (n - 1.0)).sqrt() / n.sqrt(),
        }
    }
}

/// Summary of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub runs: usize,
    pub accuracy: MetricSummary,
    pub exposed_golden: MetricSummary,
    pub testing_cost: MetricSummary,
    pub elapsed_ms: MetricSummary,
}

impl Report {
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        let collect = |f: fn(&RunMetrics) -> f64| -> Vec<f64> { runs.iter().map(f).collect() };
        Self {
            runs: runs.len(),
            accuracy: MetricSummary::from_samples(&collect(|m| m.accuracy)),
            exposed_golden: MetricSummary::from_samples(&collect(|m| m.exposed_golden as f64)),
            testing_cost: MetricSummary::from_samples(&collect(|m| m.testing_cost)),
            elapsed_ms: MetricSummary::from_samples(&collect(|m| m.elapsed_ms)),
        }
    }

    /// Logs the averages block.
    pub fn log(&self) {
        info!("Average over {} runs:", self.runs);
        info!(
            "  A-Accuracy: {:.4}  Standard Error: {:.4}",
            self.accuracy.mean, self.accuracy.std_error
        );
        info!(
            "  E-Number:   {:.2}  Standard Error: {:.4}",
            self.exposed_golden.mean, self.exposed_golden.std_error
        );
        info!(
            "  T-Cost:     {:.3}  Standard Error: {:.4}",
            self.testing_cost.mean, self.testing_cost.std_error
        );
        info!(
            "  Time:       {:.1}ms  Standard Error: {:.1}",
            self.elapsed_ms.mean, self.elapsed_ms.std_error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_error() {
        // mean 2.5, sample variance 5/3, std error sqrt(5/3)/2
        let summary = MetricSummary::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert!((summary.mean - 2.5).abs() < 1e-12);
        assert!((summary.std_error - (5.0f64 / 3.0).sqrt() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_sample_has_no_error() {
        let summary = MetricSummary::from_samples(&[0.75]);
        assert_eq!(summary, MetricSummary { mean: 0.75, std_error: 0.0 });
        assert_eq!(MetricSummary::from_samples(&[]), MetricSummary::default());
    }

    #[test]
    fn test_report_from_runs() {
        let runs = vec![
            RunMetrics {
                accuracy: 0.8,
                exposed_golden: 2,
                testing_cost: 3.0,
                ..RunMetrics::default()
            },
            RunMetrics {
                accuracy: 0.9,
                exposed_golden: 4,
                testing_cost: 5.0,
                ..RunMetrics::default()
            },
        ];
        let report = Report::from_runs(&runs);
        assert_eq!(report.runs, 2);
        assert!((report.accuracy.mean - 0.85).abs() < 1e-12);
        assert!((report.exposed_golden.mean - 3.0).abs() < 1e-12);
        assert!((report.testing_cost.std_error - 1.0).abs() < 1e-12);
    }
}
