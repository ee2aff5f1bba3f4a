//! Progress reporting trait and types for benchmark execution.

use serde::{Deserialize, Serialize};

/// Events emitted while a session runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProgressEvent {
    /// Session started with the full cross-product size.
    RunStarted {
        run_id: String,
        total_cells: u64,
        strategies: Vec<String>,
        models: Vec<String>,
        tasks: Vec<String>,
        concurrency: usize,
    },
    /// A cell finished, successfully or not.
    CellCompleted {
        completed: u64,
        total_cells: u64,
        strategy: String,
        model: String,
        task_id: String,
        success: bool,
        tokens: u64,
        latency_ms: f64,
        throughput: f64,
        error: Option<String>,
    },
    /// Every cell has a result.
    RunCompleted {
        run_id: String,
        total_runs: u64,
        successful_runs: u64,
        failed_runs: u64,
    },
}

/// Trait for progress reporters.
///
/// Implementors receive events during benchmark execution and can
/// display progress, log to file, etc.
pub trait ProgressReporter: Send + Sync {
    /// Called when a progress event occurs.
    fn report(&self, event: ProgressEvent);
}

/// A no-op reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _event: ProgressEvent) {}
}
