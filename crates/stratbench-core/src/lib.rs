//! Core library for stratbench, a benchmark of inference strategies.
//!
//! A session runs every (strategy, model, task) cell of the configured
//! registries, times the provider calls each strategy issues, and renders a
//! comparison report.
//!
//! - [`policy`]: Strategy policies (run count, temperatures, cost multiplier)
//! - [`provider`]: The inference provider seam plus simulated and Ollama backends
//! - [`executor`]: Runs one cell under its policy
//! - [`orchestrator`]: Walks the cross-product, sequentially or on a worker pool
//! - [`summary`] / [`metrics`]: Result accumulation and per-strategy stats
//! - [`report`]: Report document and markdown rendering
//! - [`config`]: Configuration loading and validation
//! - [`persistence`]: Run directories on disk
//! - [`benchmark`]: End-to-end session entry point
//! - [`error`]: Unified error types

// Foundation modules
pub mod policy;
pub mod types;

pub mod config;
pub mod error;

// Execution
pub mod executor;
pub mod orchestrator;
pub mod provider;
pub mod reporter;
pub mod worker;

// Results
pub mod metrics;
pub mod report;
pub mod summary;

pub mod benchmark;
pub mod persistence;

pub use benchmark::{load_run, Benchmark, SessionOutcome};
pub use config::{load_config, load_config_with_overrides, BenchConfig, ConfigOverrides};
pub use error::{Result, StratbenchError};
pub use executor::StrategyExecutor;
pub use orchestrator::Orchestrator;
pub use policy::{PolicyTable, StrategyPolicy, TemperatureSchedule};
pub use provider::{InferenceProvider, InferenceRequest, InferenceResponse};
pub use report::{render, ReportDocument};
pub use summary::BenchmarkSummary;
pub use types::{BenchmarkResult, ModelConfig, TaskConfig};
