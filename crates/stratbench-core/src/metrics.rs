//! Metrics aggregation utilities.

use crate::summary::BenchmarkSummary;
use crate::types::BenchmarkResult;
use serde::{Deserialize, Serialize};

pub const ALL_RUNS_FAILED: &str = "All runs failed";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyAverages {
    pub avg_tokens: f64,
    pub avg_latency_ms: f64,
    pub avg_throughput: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
}

/// Per-strategy view over a summary. `averages` is `None` exactly when no run
/// of the strategy succeeded, in which case `error` says so. The cost
/// multiplier is the declared one and is present either way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategySummaryStats {
    pub strategy: String,
    pub runs: u64,
    pub successful_runs: u64,
    pub success_rate: f64,
    pub cost_multiplier: f64,
    #[serde(default)]
    pub averages: Option<StrategyAverages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn percentile(data: &mut [f64], pct: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.sort_by(|a, b| a.total_cmp(b));
    let idx = (data.len() - 1) as f64 * pct;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        data[lower]
    } else {
        let w = idx - lower as f64;
        data[lower] * (1.0 - w) + data[upper] * w
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    values.sum::<f64>() / n as f64
}

fn averages(successful: &[&BenchmarkResult]) -> Option<StrategyAverages> {
    if successful.is_empty() {
        return None;
    }
    let n = successful.len();

    let mut latencies: Vec<f64> = successful.iter().map(|r| r.latency_ms).collect();
    let p50_latency_ms = percentile(&mut latencies.clone(), 0.5);
    let p95_latency_ms = percentile(&mut latencies, 0.95);

    Some(StrategyAverages {
        avg_tokens: mean(successful.iter().map(|r| r.tokens as f64), n),
        avg_latency_ms: mean(successful.iter().map(|r| r.latency_ms), n),
        avg_throughput: mean(successful.iter().map(|r| r.throughput), n),
        p50_latency_ms,
        p95_latency_ms,
    })
}

/// Summarize one strategy. Returns `None` when the strategy has no results.
pub fn summarize(summary: &BenchmarkSummary, strategy: &str) -> Option<StrategySummaryStats> {
    let results: Vec<&BenchmarkResult> = summary
        .results()
        .iter()
        .filter(|r| r.strategy == strategy)
        .collect();
    let cost_multiplier = results.first()?.cost_multiplier;

    let successful: Vec<&BenchmarkResult> = results.iter().copied().filter(|r| r.success).collect();
    let runs = results.len() as u64;
    let successful_runs = successful.len() as u64;
    let averages = averages(&successful);

    Some(StrategySummaryStats {
        strategy: strategy.to_string(),
        runs,
        successful_runs,
        success_rate: successful_runs as f64 / runs as f64,
        cost_multiplier,
        error: averages.is_none().then(|| ALL_RUNS_FAILED.to_string()),
        averages,
    })
}

/// Summaries for every strategy present, in order of first appearance.
pub fn summarize_all(summary: &BenchmarkSummary) -> Vec<StrategySummaryStats> {
    summary
        .strategies()
        .iter()
        .filter_map(|s| summarize(summary, s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let mut data = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&mut data, 0.5), 25.0);
        assert_eq!(percentile(&mut [], 0.5), 0.0);
        assert_eq!(percentile(&mut [7.0], 0.95), 7.0);
    }
}
