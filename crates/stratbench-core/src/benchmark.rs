//! Benchmark - the main entry point for running a session.

use crate::config::BenchConfig;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::persistence::{
    compute_config_fingerprint, generate_run_id, iso_timestamp_now, RunMetadata, RunStore,
};
use crate::provider::{get_provider, InferenceProvider};
use crate::report::{render, ReportDocument};
use crate::reporter::{NullReporter, ProgressReporter};
use crate::summary::BenchmarkSummary;
use crate::types::RunStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub summary: BenchmarkSummary,
    pub report: ReportDocument,
}

pub struct Benchmark {
    config: BenchConfig,
    provider: Arc<dyn InferenceProvider>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Benchmark {
    /// Create a benchmark using the provider named in the config.
    pub fn new(config: BenchConfig) -> Self {
        let provider = get_provider(&config.global.provider);
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: BenchConfig, provider: Arc<dyn InferenceProvider>) -> Self {
        Self {
            config,
            provider,
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Run every cell, persist the results and render the report.
    ///
    /// Failed cells do not fail the session. Errors here are configuration
    /// or I/O problems.
    pub async fn run(&self, run_id: Option<String>) -> Result<SessionOutcome> {
        let run_id = run_id.unwrap_or_else(|| generate_run_id(&self.config.name));
        let orchestrator = Orchestrator::from_config(&self.config, self.provider.clone())?
            .with_reporter(self.reporter.clone())
            .with_run_id(run_id.clone());

        let run_dir = self.config.runs_dir().join(&run_id);
        let store = RunStore::new(&run_dir)?;

        let mut metadata =
            RunMetadata::new(run_id.clone(), &self.config, compute_config_fingerprint(&self.config)?);
        metadata.status = RunStatus::Running;
        metadata.start_time = Some(iso_timestamp_now());
        store.write_metadata(&metadata)?;

        let summary = match orchestrator.run_all().await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(run_id = %run_id, "Benchmark run failed: {e}");
                metadata.status = RunStatus::Failed;
                metadata.completed_time = Some(iso_timestamp_now());
                store.write_metadata(&metadata)?;
                return Err(e);
            }
        };

        for result in summary.results() {
            store.append_result(result)?;
        }

        let report = render(&summary);
        store.write_report(&report.to_markdown())?;

        metadata.status = RunStatus::Completed;
        metadata.completed_cells = summary.total_runs();
        metadata.completed_time = Some(iso_timestamp_now());
        store.write_metadata(&metadata)?;

        info!(run_id = %run_id, dir = %run_dir.display(), "Run stored");

        Ok(SessionOutcome {
            run_id,
            run_dir,
            summary,
            report,
        })
    }
}

/// Load a stored run and re-render its report.
pub fn load_run(run_dir: impl Into<PathBuf>) -> Result<(Option<RunMetadata>, ReportDocument)> {
    let store = RunStore::open(run_dir.into());
    let metadata = store.read_metadata()?;
    let summary = BenchmarkSummary::from_results(store.load_results()?);
    Ok((metadata, render(&summary)))
}
