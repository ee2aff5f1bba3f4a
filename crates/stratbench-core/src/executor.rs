//! Strategy executor: run one cell's provider calls and reduce them to a result.

use crate::error::{Result, StratbenchError};
use crate::policy::StrategyPolicy;
use crate::provider::{InferenceProvider, InferenceRequest, InferenceResponse};
use crate::types::{BenchmarkResult, Cell, ModelConfig, TaskConfig};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

pub struct StrategyExecutor {
    provider: Arc<dyn InferenceProvider>,
    call_timeout: Duration,
}

impl StrategyExecutor {
    pub fn new(provider: Arc<dyn InferenceProvider>, call_timeout: Duration) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run `policy` for a single (model, task) pair outside any session.
    pub async fn execute(
        &self,
        policy: &StrategyPolicy,
        model: &ModelConfig,
        task: &TaskConfig,
    ) -> BenchmarkResult {
        let cell = Cell {
            index: 0,
            policy: policy.clone(),
            model: model.clone(),
            task: task.clone(),
        };
        self.execute_cell(&cell).await
    }

    /// Issue the policy's calls strictly in order and sum their tokens and
    /// latencies. The first failed call ends the cell; nothing is retried.
    pub async fn execute_cell(&self, cell: &Cell) -> BenchmarkResult {
        let temperatures = cell.policy.temperatures_for(cell.model.params.temperature);

        let mut total_tokens: u64 = 0;
        let mut total_latency_ms = 0.0;
        let mut calls_completed: u32 = 0;
        let mut failure = None;

        for (run_idx, &temperature) in temperatures.iter().enumerate() {
            let request = InferenceRequest {
                model: cell.model.name.clone(),
                prompt: cell.task.prompt.clone(),
                system: cell.task.system.clone(),
                temperature,
                max_output_tokens: cell.model.params.max_output_tokens,
            };

            match self.call(&request).await {
                Ok(resp) => {
                    debug!(
                        strategy = %cell.policy.name,
                        model = %cell.model.name,
                        task = %cell.task.id,
                        run = run_idx,
                        temperature,
                        tokens = resp.token_count,
                        latency_ms = resp.latency_ms,
                        "provider call completed"
                    );
                    total_tokens += resp.token_count;
                    total_latency_ms += resp.latency_ms;
                    calls_completed += 1;
                }
                Err(err) => {
                    warn!(
                        strategy = %cell.policy.name,
                        model = %cell.model.name,
                        task = %cell.task.id,
                        run = run_idx,
                        "provider call failed: {err}"
                    );
                    failure = Some(err);
                    break;
                }
            }
        }

        let metadata = cell_metadata(cell, &temperatures, calls_completed);
        match failure {
            None => BenchmarkResult::succeeded(cell, total_tokens, total_latency_ms, metadata),
            Some(err) => BenchmarkResult::failed(
                cell,
                total_tokens,
                total_latency_ms,
                err.to_string(),
                metadata,
            ),
        }
    }

    async fn call(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        match timeout(self.call_timeout, self.provider.call(request)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(StratbenchError::provider(&request.model, e)),
            Err(_) => Err(StratbenchError::Timeout {
                seconds: self.call_timeout.as_secs_f64(),
            }),
        }
    }
}

fn cell_metadata(
    cell: &Cell,
    temperatures: &[f64],
    calls_completed: u32,
) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert("runs".into(), json!(cell.policy.run_count));
    metadata.insert("temperatures".into(), json!(temperatures));
    metadata.insert(
        "model_params".into(),
        json!({
            "temperature": cell.model.params.temperature,
            "max_output_tokens": cell.model.params.max_output_tokens,
        }),
    );
    metadata.insert("calls_completed".into(), json!(calls_completed));
    metadata
}
