//! Report rendering.
//!
//! [`render`] turns a finished [`BenchmarkSummary`] into a [`ReportDocument`]
//! with five parts, in order:
//!
//! 1. session summary (counts and overall success rate),
//! 2. strategy comparison, one row per strategy in declared order,
//! 3. per-model breakdown,
//! 4. best-of analysis over successful results,
//! 5. raw results for downstream tooling.
//!
//! [`ReportDocument::to_markdown`] is the human-readable form; the document
//! itself serializes to JSON.

use crate::metrics::{summarize_all, StrategySummaryStats};
use crate::summary::BenchmarkSummary;
use crate::types::BenchmarkResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write;

pub const REPORT_TITLE: &str = "Strategy Benchmark Results";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    /// `None` when there were no runs at all.
    pub success_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelBreakdown {
    pub model: String,
    pub rows: Vec<BenchmarkResult>,
}

/// A single result picked by the analysis section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pick {
    pub strategy: String,
    pub model: String,
    pub task_id: String,
    pub latency_ms: f64,
    pub throughput: f64,
    pub cost_adjusted_latency_ms: f64,
}

impl From<&BenchmarkResult> for Pick {
    fn from(r: &BenchmarkResult) -> Self {
        Self {
            strategy: r.strategy.clone(),
            model: r.model.clone(),
            task_id: r.task_id.clone(),
            latency_ms: r.latency_ms,
            throughput: r.throughput,
            cost_adjusted_latency_ms: r.cost_adjusted_latency_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub fastest: Pick,
    pub highest_throughput: Pick,
    pub most_efficient: Pick,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawCounts {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
}

/// Flat per-result record of the raw dump. Latency and throughput are rounded
/// to one decimal place and `error` is empty for successful results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub strategy: String,
    pub model: String,
    pub task: String,
    pub tokens: u64,
    pub latency_ms: f64,
    pub throughput: f64,
    pub cost_multiplier: f64,
    pub success: bool,
    pub error: String,
}

impl From<&BenchmarkResult> for ResultRecord {
    fn from(r: &BenchmarkResult) -> Self {
        Self {
            strategy: r.strategy.clone(),
            model: r.model.clone(),
            task: r.task_id.clone(),
            tokens: r.tokens,
            latency_ms: round1(r.latency_ms),
            throughput: round1(r.throughput),
            cost_multiplier: r.cost_multiplier,
            success: r.success,
            error: r.error.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawDump {
    pub summary: RawCounts,
    pub results: Vec<ResultRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportDocument {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub session: SessionSummary,
    pub comparison: Vec<StrategySummaryStats>,
    pub by_model: Vec<ModelBreakdown>,
    #[serde(default)]
    pub analysis: Option<Analysis>,
    pub raw: RawDump,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// First element minimizing `key`. Ties keep the earliest element.
fn first_min_by<'a>(
    items: &[&'a BenchmarkResult],
    key: impl Fn(&BenchmarkResult) -> f64,
) -> Option<&'a BenchmarkResult> {
    let mut best: Option<(&'a BenchmarkResult, f64)> = None;
    for &r in items {
        let k = key(r);
        match best {
            Some((_, bk)) if k.total_cmp(&bk) != Ordering::Less => {}
            _ => best = Some((r, k)),
        }
    }
    best.map(|(r, _)| r)
}

pub fn analyze(summary: &BenchmarkSummary) -> Option<Analysis> {
    let successful: Vec<&BenchmarkResult> =
        summary.results().iter().filter(|r| r.success).collect();
    let fastest = first_min_by(&successful, |r| r.latency_ms)?;
    let highest_throughput = first_min_by(&successful, |r| -r.throughput)?;
    let most_efficient = first_min_by(&successful, |r| r.cost_adjusted_latency_ms())?;
    Some(Analysis {
        fastest: fastest.into(),
        highest_throughput: highest_throughput.into(),
        most_efficient: most_efficient.into(),
    })
}

fn by_model(summary: &BenchmarkSummary) -> Vec<ModelBreakdown> {
    let mut models: Vec<&str> = summary.results().iter().map(|r| r.model.as_str()).collect();
    models.sort_unstable();
    models.dedup();

    models
        .into_iter()
        .map(|model| {
            let mut rows: Vec<BenchmarkResult> = summary
                .results()
                .iter()
                .filter(|r| r.model == model)
                .cloned()
                .collect();
            rows.sort_by(|a, b| {
                a.strategy
                    .cmp(&b.strategy)
                    .then_with(|| a.task_id.cmp(&b.task_id))
            });
            ModelBreakdown {
                model: model.to_string(),
                rows,
            }
        })
        .collect()
}

pub fn render(summary: &BenchmarkSummary) -> ReportDocument {
    render_at(summary, Utc::now())
}

pub fn render_at(summary: &BenchmarkSummary, generated_at: DateTime<Utc>) -> ReportDocument {
    ReportDocument {
        title: REPORT_TITLE.to_string(),
        generated_at,
        session: SessionSummary {
            total_runs: summary.total_runs(),
            successful_runs: summary.successful_runs(),
            failed_runs: summary.failed_runs(),
            success_rate: summary.success_rate(),
        },
        comparison: summarize_all(summary),
        by_model: by_model(summary),
        analysis: analyze(summary),
        raw: RawDump {
            summary: RawCounts {
                total_runs: summary.total_runs(),
                successful_runs: summary.successful_runs(),
                failed_runs: summary.failed_runs(),
            },
            results: summary.results().iter().map(ResultRecord::from).collect(),
        },
    }
}

impl ReportDocument {
    pub fn raw_json(&self) -> String {
        serde_json::to_string_pretty(&self.raw).unwrap_or_default()
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_markdown(&mut md);
        md
    }

    fn write_markdown(&self, md: &mut String) -> std::fmt::Result {
        writeln!(md, "# {}\n", self.title)?;
        writeln!(md, "Generated: {}\n", self.generated_at.to_rfc3339())?;

        writeln!(md, "## Summary\n")?;
        writeln!(md, "- Total benchmark runs: {}", self.session.total_runs)?;
        writeln!(md, "- Successful runs: {}", self.session.successful_runs)?;
        writeln!(md, "- Failed runs: {}", self.session.failed_runs)?;
        match self.session.success_rate {
            Some(rate) => writeln!(md, "- Success rate: {:.1}%\n", rate * 100.0)?,
            None => writeln!(md, "- Success rate: n/a (no runs)\n")?,
        }

        writeln!(md, "## Strategy Comparison\n")?;
        writeln!(
            md,
            "| Strategy | Runs | Success | Avg Tokens | Avg Latency (ms) | Throughput (tok/s) | Cost |"
        )?;
        writeln!(
            md,
            "|----------|------|---------|------------|------------------|-------------------|------|"
        )?;
        for stats in &self.comparison {
            let success = format!("{:.0}%", stats.success_rate * 100.0);
            match &stats.averages {
                Some(avg) => writeln!(
                    md,
                    "| {} | {} | {} | {:.0} | {:.0} | {:.1} | {:.1}x |",
                    stats.strategy,
                    stats.runs,
                    success,
                    avg.avg_tokens,
                    avg.avg_latency_ms,
                    avg.avg_throughput,
                    stats.cost_multiplier
                )?,
                None => writeln!(
                    md,
                    "| {} | {} | {} | - | - | - | {:.1}x |",
                    stats.strategy, stats.runs, success, stats.cost_multiplier
                )?,
            }
        }
        writeln!(md)?;

        writeln!(md, "## Results by Model\n")?;
        for breakdown in &self.by_model {
            writeln!(md, "### {}\n", breakdown.model)?;
            writeln!(
                md,
                "| Strategy | Task | Tokens | Latency (ms) | Throughput | Success |"
            )?;
            writeln!(
                md,
                "|----------|------|--------|--------------|------------|---------|"
            )?;
            for r in &breakdown.rows {
                let status = if r.success { "✓" } else { "✗" };
                writeln!(
                    md,
                    "| {} | {} | {} | {:.0} | {:.1} | {} |",
                    r.strategy, r.task_id, r.tokens, r.latency_ms, r.throughput, status
                )?;
            }
            writeln!(md)?;
        }

        if let Some(analysis) = &self.analysis {
            writeln!(md, "## Analysis\n")?;
            let f = &analysis.fastest;
            writeln!(
                md,
                "**Fastest Strategy (by latency):** {} on {}",
                f.strategy, f.model
            )?;
            writeln!(md, "  - Latency: {:.0}ms", f.latency_ms)?;
            writeln!(md, "  - Throughput: {:.1} tok/s\n", f.throughput)?;

            let t = &analysis.highest_throughput;
            writeln!(md, "**Best Throughput:** {} on {}", t.strategy, t.model)?;
            writeln!(md, "  - Throughput: {:.1} tok/s", t.throughput)?;
            writeln!(md, "  - Latency: {:.0}ms\n", t.latency_ms)?;

            let e = &analysis.most_efficient;
            writeln!(
                md,
                "**Most Efficient (latency/cost ratio):** {} on {}",
                e.strategy, e.model
            )?;
            writeln!(
                md,
                "  - Cost-adjusted latency: {:.0}ms equivalent\n",
                e.cost_adjusted_latency_ms
            )?;
        }

        writeln!(md, "## Recommendations\n")?;
        writeln!(md, "1. **For latency-critical applications:** Use baseline strategy")?;
        writeln!(md, "2. **For quality optimization:** Use self-consistency with larger models")?;
        writeln!(md, "3. **For balanced performance:** Use diverse sampling")?;
        writeln!(md, "4. **For resource-constrained systems:** Use baseline or reread only\n")?;

        writeln!(md, "## Detailed Results JSON\n")?;
        writeln!(md, "```json")?;
        writeln!(md, "{}", self.raw_json())?;
        writeln!(md, "```")?;
        Ok(())
    }
}
