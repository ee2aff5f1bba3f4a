//! Session-wide result accumulator.

use crate::types::BenchmarkResult;
use serde::Serialize;

/// Ordered results plus running counters.
///
/// `total_runs == successful_runs + failed_runs == results.len()` holds after
/// every call to [`BenchmarkSummary::add_result`], which is the only mutation
/// of the counters. Stored runs come back through [`BenchmarkSummary::from_results`].
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BenchmarkSummary {
    total_runs: u64,
    successful_runs: u64,
    failed_runs: u64,
    results: Vec<BenchmarkResult>,
}

impl BenchmarkSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a summary from stored results, in canonical cell order.
    pub fn from_results(results: impl IntoIterator<Item = BenchmarkResult>) -> Self {
        let mut summary = Self::new();
        for r in results {
            summary.add_result(r);
        }
        summary.sort_canonical();
        summary
    }

    pub fn add_result(&mut self, result: BenchmarkResult) {
        self.total_runs += 1;
        if result.success {
            self.successful_runs += 1;
        } else {
            self.failed_runs += 1;
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    pub fn total_runs(&self) -> u64 {
        self.total_runs
    }

    pub fn successful_runs(&self) -> u64 {
        self.successful_runs
    }

    pub fn failed_runs(&self) -> u64 {
        self.failed_runs
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Success rate over all runs, `None` when nothing has run.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_runs == 0 {
            None
        } else {
            Some(self.successful_runs as f64 / self.total_runs as f64)
        }
    }

    /// Strategy names in order of first appearance.
    pub fn strategies(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for r in &self.results {
            if !seen.iter().any(|s| s == &r.strategy) {
                seen.push(r.strategy.clone());
            }
        }
        seen
    }

    /// Restore (strategy, model, task) declaration order after out-of-order
    /// completion. Stable, so equal indices keep insertion order.
    pub fn sort_canonical(&mut self) {
        self.results.sort_by_key(|r| r.cell_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn result(index: usize, strategy: &str, success: bool) -> BenchmarkResult {
        BenchmarkResult {
            cell_index: index,
            strategy: strategy.into(),
            model: "m".into(),
            task_id: "t".into(),
            tokens: 1,
            latency_ms: 1.0,
            throughput: 1000.0,
            cost_multiplier: 1.0,
            success,
            error: (!success).then(|| "boom".to_string()),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn counters_track_results() {
        let mut s = BenchmarkSummary::new();
        assert_eq!(s.success_rate(), None);
        s.add_result(result(0, "a", true));
        s.add_result(result(1, "a", false));
        s.add_result(result(2, "b", true));
        assert_eq!(s.total_runs(), 3);
        assert_eq!(s.successful_runs() + s.failed_runs(), s.total_runs());
        assert_eq!(s.results().len() as u64, s.total_runs());
        assert!((s.success_rate().unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn from_results_restores_cell_order() {
        let s = BenchmarkSummary::from_results(vec![
            result(2, "b", true),
            result(0, "a", true),
            result(1, "a", false),
        ]);
        let order: Vec<usize> = s.results().iter().map(|r| r.cell_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(s.strategies(), vec!["a", "b"]);
        assert_eq!(s.failed_runs(), 1);
    }
}
