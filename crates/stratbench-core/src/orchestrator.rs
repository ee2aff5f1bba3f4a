//! Cross-product orchestration: run every (strategy, model, task) cell exactly once.

use crate::config::{validate_config, BenchConfig, ConfigError};
use crate::error::{Result, StratbenchError};
use crate::executor::StrategyExecutor;
use crate::policy::PolicyTable;
use crate::provider::InferenceProvider;
use crate::reporter::{NullReporter, ProgressEvent, ProgressReporter};
use crate::summary::BenchmarkSummary;
use crate::types::{BenchmarkResult, Cell, ModelConfig, TaskConfig};
use crate::worker::WorkerPool;
use anyhow::anyhow;
use std::sync::Arc;
use tracing::info;

pub struct Orchestrator {
    policies: PolicyTable,
    strategies: Vec<String>,
    models: Vec<ModelConfig>,
    tasks: Vec<TaskConfig>,
    executor: Arc<StrategyExecutor>,
    concurrency: usize,
    run_id: String,
    reporter: Arc<dyn ProgressReporter>,
}

impl Orchestrator {
    /// Build an orchestrator over explicit registries. Fails if any registry
    /// is empty or a strategy has no policy.
    pub fn new(
        policies: PolicyTable,
        strategies: Vec<String>,
        models: Vec<ModelConfig>,
        tasks: Vec<TaskConfig>,
        executor: Arc<StrategyExecutor>,
    ) -> Result<Self> {
        if strategies.is_empty() || models.is_empty() || tasks.is_empty() {
            return Err(StratbenchError::Config(ConfigError::Invalid(
                format!(
                    "empty registry: {} strategies, {} models, {} tasks",
                    strategies.len(),
                    models.len(),
                    tasks.len()
                ),
            )));
        }
        for strategy in &strategies {
            policies.policy_for(strategy)?;
        }

        Ok(Self {
            policies,
            strategies,
            models,
            tasks,
            executor,
            concurrency: 1,
            run_id: "adhoc".to_string(),
            reporter: Arc::new(NullReporter),
        })
    }

    pub fn from_config(config: &BenchConfig, provider: Arc<dyn InferenceProvider>) -> Result<Self> {
        validate_config(config)?;
        let executor = Arc::new(StrategyExecutor::new(provider, config.global.call_timeout()?));
        Ok(Self::new(
            config.policy_table()?,
            config.strategies.clone(),
            config.models.clone(),
            config.tasks.clone(),
            executor,
        )?
        .with_concurrency(config.global.concurrency))
    }

    /// Set a custom progress reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Number of cells run in parallel. 1 runs cells strictly one at a time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn total_cells(&self) -> usize {
        self.strategies.len() * self.models.len() * self.tasks.len()
    }

    /// Every cell in canonical order: strategies, then models, then tasks.
    pub fn cells(&self) -> Result<Vec<Cell>> {
        let mut cells = Vec::with_capacity(self.total_cells());
        for strategy in &self.strategies {
            let policy = self.policies.policy_for(strategy)?;
            for model in &self.models {
                for task in &self.tasks {
                    cells.push(Cell {
                        index: cells.len(),
                        policy: policy.clone(),
                        model: model.clone(),
                        task: task.clone(),
                    });
                }
            }
        }
        Ok(cells)
    }

    /// Run the whole cross-product and return the finished summary, with
    /// results in canonical cell order regardless of completion order.
    ///
    /// Each call owns its summary, so overlapping calls on one orchestrator
    /// are independent sessions.
    pub async fn run_all(&self) -> Result<BenchmarkSummary> {
        let cells = self.cells()?;
        let total = cells.len() as u64;
        let mut summary = BenchmarkSummary::new();

        info!(
            run_id = %self.run_id,
            cells = total,
            concurrency = self.concurrency,
            provider = self.executor.provider_name(),
            "Starting benchmark run"
        );
        self.reporter.report(ProgressEvent::RunStarted {
            run_id: self.run_id.clone(),
            total_cells: total,
            strategies: self.strategies.clone(),
            models: self.models.iter().map(|m| m.name.clone()).collect(),
            tasks: self.tasks.iter().map(|t| t.id.clone()).collect(),
            concurrency: self.concurrency,
        });

        if self.concurrency <= 1 {
            for cell in &cells {
                let result = self.executor.execute_cell(cell).await;
                self.record(&mut summary, result, total);
            }
        } else {
            let mut pool = WorkerPool::start(self.concurrency, self.executor.clone());
            pool.submit_all(cells).await;
            while let Some(result) = pool.recv().await {
                self.record(&mut summary, result, total);
            }
            pool.shutdown().await;
            summary.sort_canonical();
        }

        if summary.total_runs() != total {
            return Err(StratbenchError::Internal(anyhow!(
                "expected {total} results but collected {}",
                summary.total_runs()
            )));
        }

        info!(
            run_id = %self.run_id,
            successful = summary.successful_runs(),
            failed = summary.failed_runs(),
            "Benchmark run finished"
        );
        self.reporter.report(ProgressEvent::RunCompleted {
            run_id: self.run_id.clone(),
            total_runs: summary.total_runs(),
            successful_runs: summary.successful_runs(),
            failed_runs: summary.failed_runs(),
        });

        Ok(summary)
    }

    fn record(&self, summary: &mut BenchmarkSummary, result: BenchmarkResult, total: u64) {
        let event = ProgressEvent::CellCompleted {
            completed: summary.total_runs() + 1,
            total_cells: total,
            strategy: result.strategy.clone(),
            model: result.model.clone(),
            task_id: result.task_id.clone(),
            success: result.success,
            tokens: result.tokens,
            latency_ms: result.latency_ms,
            throughput: result.throughput,
            error: result.error.clone(),
        };
        summary.add_result(result);
        self.reporter.report(event);
    }
}
