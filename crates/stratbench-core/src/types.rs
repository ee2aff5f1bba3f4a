//! Shared data types for stratbench.

use crate::policy::StrategyPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

type JsonMap = BTreeMap<String, Value>;

/// Sampling parameters configured for a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelParams {
    pub temperature: f64,
    #[serde(alias = "num_predict")]
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub params: ModelParams,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>, temperature: f64, max_output_tokens: u32) -> Self {
        Self {
            name: name.into(),
            size: None,
            category: None,
            params: ModelParams {
                temperature,
                max_output_tokens,
            },
        }
    }

    /// Name with the size suffix used in progress output, e.g. `tinyllama (1.1B)`.
    pub fn label(&self) -> String {
        match &self.size {
            Some(size) => format!("{} ({size})", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskConfig {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub system: String,
}

impl TaskConfig {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            system: system.into(),
        }
    }
}

/// One (strategy, model, task) combination, with the strategy already resolved
/// to its policy. `index` is the cell's position in canonical order.
#[derive(Debug, Clone)]
pub struct Cell {
    pub index: usize,
    pub policy: StrategyPolicy,
    pub model: ModelConfig,
    pub task: TaskConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub strategy: String,
    pub model: String,
    pub task_id: String,
}

impl CellKey {
    pub fn new(strategy: &str, model: &str, task_id: &str) -> Self {
        Self {
            strategy: strategy.to_string(),
            model: model.to_string(),
            task_id: task_id.to_string(),
        }
    }
}

/// Outcome of a single cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkResult {
    #[serde(default)]
    pub cell_index: usize,
    pub strategy: String,
    pub model: String,
    pub task_id: String,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub throughput: f64,
    pub cost_multiplier: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl BenchmarkResult {
    pub fn succeeded(cell: &Cell, tokens: u64, latency_ms: f64, metadata: JsonMap) -> Self {
        Self {
            cell_index: cell.index,
            strategy: cell.policy.name.clone(),
            model: cell.model.name.clone(),
            task_id: cell.task.id.clone(),
            tokens,
            latency_ms,
            throughput: throughput(tokens, latency_ms),
            cost_multiplier: cell.policy.cost_multiplier,
            success: true,
            error: None,
            metadata,
        }
    }

    /// A failed cell keeps whatever was accumulated before the failure, but
    /// never reports throughput.
    pub fn failed(
        cell: &Cell,
        tokens: u64,
        latency_ms: f64,
        error: String,
        metadata: JsonMap,
    ) -> Self {
        Self {
            cell_index: cell.index,
            strategy: cell.policy.name.clone(),
            model: cell.model.name.clone(),
            task_id: cell.task.id.clone(),
            tokens,
            latency_ms,
            throughput: 0.0,
            cost_multiplier: cell.policy.cost_multiplier,
            success: false,
            error: Some(error),
            metadata,
        }
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(&self.strategy, &self.model, &self.task_id)
    }

    /// Latency weighted by the strategy's declared cost.
    pub fn cost_adjusted_latency_ms(&self) -> f64 {
        self.latency_ms * self.cost_multiplier
    }
}

/// Tokens per second of accumulated latency; zero when no latency was recorded.
pub fn throughput(tokens: u64, latency_ms: f64) -> f64 {
    if latency_ms > 0.0 {
        tokens as f64 / latency_ms * 1000.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}
