//! End-to-end tests for the orchestrator and strategy executor.

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use stratbench_core::metrics::summarize;
use stratbench_core::policy::{PolicyTable, StrategyPolicy, TemperatureSchedule};
use stratbench_core::provider::{InferenceProvider, InferenceRequest, InferenceResponse};
use stratbench_core::report::render;
use stratbench_core::{ModelConfig, Orchestrator, StratbenchError, StrategyExecutor, TaskConfig};

/// Provider whose behavior is decided per call, recording every request.
struct ScriptedProvider {
    calls: Mutex<Vec<InferenceRequest>>,
    script: Box<dyn Fn(usize, &InferenceRequest) -> anyhow::Result<InferenceResponse> + Send + Sync>,
}

impl ScriptedProvider {
    fn new(
        script: impl Fn(usize, &InferenceRequest) -> anyhow::Result<InferenceResponse>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    fn fixed(tokens: u64, latency_ms: f64) -> Arc<Self> {
        Self::new(move |_, _| Ok(response(tokens, latency_ms)))
    }

    fn calls(&self) -> Vec<InferenceRequest> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    async fn call(&self, request: &InferenceRequest) -> anyhow::Result<InferenceResponse> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(request.clone());
            calls.len() - 1
        };
        (self.script)(n, request)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn response(tokens: u64, latency_ms: f64) -> InferenceResponse {
    InferenceResponse {
        text: "text".into(),
        token_count: tokens,
        latency_ms,
    }
}

fn executor(provider: Arc<dyn InferenceProvider>) -> Arc<StrategyExecutor> {
    Arc::new(StrategyExecutor::new(provider, Duration::from_secs(5)))
}

fn m1() -> ModelConfig {
    ModelConfig::new("m1", 0.3, 256)
}

fn t1() -> TaskConfig {
    TaskConfig::new("t1", "Write a function.", "You are a programmer.")
}

fn orchestrator(
    strategies: &[&str],
    models: Vec<ModelConfig>,
    tasks: Vec<TaskConfig>,
    provider: Arc<dyn InferenceProvider>,
) -> Orchestrator {
    Orchestrator::new(
        PolicyTable::builtin(),
        strategies.iter().map(|s| s.to_string()).collect(),
        models,
        tasks,
        executor(provider),
    )
    .unwrap()
}

#[tokio::test]
async fn scenario_a_reread_doubles_tokens_and_latency() {
    let provider = ScriptedProvider::fixed(10, 100.0);
    let orch = orchestrator(&["baseline", "reread"], vec![m1()], vec![t1()], provider.clone());

    let summary = orch.run_all().await.unwrap();
    assert_eq!(summary.total_runs(), 2);

    let baseline = &summary.results()[0];
    assert_eq!(baseline.strategy, "baseline");
    assert_eq!(baseline.tokens, 10);
    assert_eq!(baseline.latency_ms, 100.0);
    assert_eq!(baseline.throughput, 100.0);
    assert_eq!(baseline.cost_multiplier, 1.0);

    let reread = &summary.results()[1];
    assert_eq!(reread.strategy, "reread");
    assert_eq!(reread.tokens, 20);
    assert_eq!(reread.latency_ms, 200.0);
    assert_eq!(reread.throughput, 100.0);
    assert_eq!(reread.cost_multiplier, 1.5);

    // reread runs twice at the model's own temperature
    let temps: Vec<f64> = provider.calls().iter().map(|c| c.temperature).collect();
    assert_eq!(temps, vec![0.3, 0.3, 0.3]);
}

#[tokio::test]
async fn scenario_b_every_call_fails() {
    let provider = ScriptedProvider::new(|_, _| Err(anyhow!("connection refused")));
    let orch = orchestrator(
        &["baseline", "reread", "diverse_sampling", "best_of_n", "self_consistency"],
        vec![m1(), ModelConfig::new("m2", 0.3, 256)],
        vec![t1()],
        provider,
    );

    let summary = orch.run_all().await.unwrap();
    assert_eq!(summary.total_runs(), 10);
    assert_eq!(summary.total_runs(), summary.failed_runs());
    assert_eq!(summary.successful_runs(), 0);
    assert!(summary.results().iter().all(|r| !r.success));
    assert!(summary.results().iter().all(|r| r.throughput == 0.0));
    assert!(summary.results()[0]
        .error
        .as_deref()
        .unwrap()
        .contains("connection refused"));

    let doc = render(&summary);
    assert!(doc.analysis.is_none());
    assert_eq!(doc.comparison.len(), 5);
    for stats in &doc.comparison {
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.averages.is_none());
    }
    let md = doc.to_markdown();
    assert!(md.contains("| baseline | 2 | 0% | - | - | - | 1.0x |"));
    assert!(md.contains("| self_consistency | 2 | 0% | - | - | - | 5.0x |"));
    assert!(!md.contains("## Analysis"));
}

#[tokio::test]
async fn scenario_c_first_failure_ends_cell_with_partial_totals() {
    let provider = ScriptedProvider::new(|n, _| {
        if n % 2 == 0 {
            Ok(response(10, 100.0))
        } else {
            Err(anyhow!("flaky backend"))
        }
    });
    let orch = orchestrator(&["best_of_n"], vec![m1()], vec![t1()], provider.clone());

    let summary = orch.run_all().await.unwrap();
    assert_eq!(summary.total_runs(), 1);

    let result = &summary.results()[0];
    assert!(!result.success);
    assert_eq!(result.tokens, 10);
    assert_eq!(result.latency_ms, 100.0);
    assert_eq!(result.throughput, 0.0);
    assert!(result.error.as_deref().unwrap().contains("flaky backend"));
    assert_eq!(result.metadata["calls_completed"], 1);

    // the third run never happens
    assert_eq!(provider.calls().len(), 2);
}

#[tokio::test]
async fn scenario_d_latency_tie_goes_to_first_declared_strategy() {
    let mut policies = PolicyTable::builtin();
    policies
        .register(StrategyPolicy::new("single_pass", 1, TemperatureSchedule::Base, 2.0))
        .unwrap();
    let orch = Orchestrator::new(
        policies,
        vec!["single_pass".into(), "baseline".into()],
        vec![m1()],
        vec![t1()],
        executor(ScriptedProvider::fixed(10, 100.0)),
    )
    .unwrap();

    let summary = orch.run_all().await.unwrap();
    let analysis = render(&summary).analysis.unwrap();
    assert_eq!(analysis.fastest.strategy, "single_pass");
    assert_eq!(analysis.highest_throughput.strategy, "single_pass");
    // cost breaks the tie for efficiency
    assert_eq!(analysis.most_efficient.strategy, "baseline");
}

#[tokio::test]
async fn baseline_issues_one_call_and_self_consistency_five_at_point_seven() {
    let provider = ScriptedProvider::fixed(5, 50.0);
    let orch = orchestrator(&["baseline"], vec![m1()], vec![t1()], provider.clone());
    orch.run_all().await.unwrap();
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(provider.calls()[0].temperature, 0.3);
    assert_eq!(provider.calls()[0].max_output_tokens, 256);

    let provider = ScriptedProvider::fixed(5, 50.0);
    let orch = orchestrator(&["self_consistency"], vec![m1()], vec![t1()], provider.clone());
    let summary = orch.run_all().await.unwrap();
    let calls = provider.calls();
    assert_eq!(calls.len(), 5);
    assert!(calls.iter().all(|c| c.temperature == 0.7));
    assert_eq!(summary.results()[0].tokens, 25);
    assert_eq!(summary.results()[0].cost_multiplier, 5.0);
}

#[tokio::test]
async fn diverse_sampling_uses_fixed_temperatures_in_order() {
    let provider = ScriptedProvider::fixed(1, 10.0);
    let orch = orchestrator(&["diverse_sampling"], vec![m1()], vec![t1()], provider.clone());
    orch.run_all().await.unwrap();

    let temps: Vec<f64> = provider.calls().iter().map(|c| c.temperature).collect();
    assert_eq!(temps, vec![0.1, 0.5, 0.9]);
    let calls = provider.calls();
    assert!(calls.iter().all(|c| c.prompt == "Write a function."));
    assert!(calls.iter().all(|c| c.system == "You are a programmer."));
}

#[tokio::test]
async fn cells_run_in_strategy_model_task_order() {
    let provider = ScriptedProvider::fixed(1, 10.0);
    let orch = orchestrator(
        &["reread", "baseline"],
        vec![ModelConfig::new("b-model", 0.3, 64), ModelConfig::new("a-model", 0.3, 64)],
        vec![t1(), TaskConfig::new("t0", "p", "s")],
        provider,
    );

    let summary = orch.run_all().await.unwrap();
    let keys: Vec<(String, String, String)> = summary
        .results()
        .iter()
        .map(|r| (r.strategy.clone(), r.model.clone(), r.task_id.clone()))
        .collect();
    let expected = [
        ("reread", "b-model", "t1"),
        ("reread", "b-model", "t0"),
        ("reread", "a-model", "t1"),
        ("reread", "a-model", "t0"),
        ("baseline", "b-model", "t1"),
        ("baseline", "b-model", "t0"),
        ("baseline", "a-model", "t1"),
        ("baseline", "a-model", "t0"),
    ];
    assert_eq!(keys.len(), expected.len());
    for (got, want) in keys.iter().zip(expected) {
        assert_eq!((got.0.as_str(), got.1.as_str(), got.2.as_str()), want);
    }
    let indices: Vec<usize> = summary.results().iter().map(|r| r.cell_index).collect();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn slow_call_times_out_as_failure() {
    struct SlowProvider;

    #[async_trait]
    impl InferenceProvider for SlowProvider {
        async fn call(&self, _request: &InferenceRequest) -> anyhow::Result<InferenceResponse> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(response(10, 100.0))
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    let exec = Arc::new(StrategyExecutor::new(
        Arc::new(SlowProvider),
        Duration::from_millis(20),
    ));
    let orch = Orchestrator::new(
        PolicyTable::builtin(),
        vec!["baseline".into()],
        vec![m1()],
        vec![t1()],
        exec,
    )
    .unwrap();

    let summary = orch.run_all().await.unwrap();
    assert_eq!(summary.failed_runs(), 1);
    let result = &summary.results()[0];
    assert!(!result.success);
    assert_eq!(result.tokens, 0);
    assert!(result.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn worker_pool_matches_sequential_results() {
    // Latency varies by model and temperature so cells finish out of order.
    let script = |_: usize, req: &InferenceRequest| -> anyhow::Result<InferenceResponse> {
        Ok(response(
            req.model.len() as u64 + (req.temperature * 10.0) as u64,
            100.0 + req.model.len() as f64 * 10.0,
        ))
    };

    struct Jittered(Arc<ScriptedProvider>);

    #[async_trait]
    impl InferenceProvider for Jittered {
        async fn call(&self, request: &InferenceRequest) -> anyhow::Result<InferenceResponse> {
            let delay = 25 - (request.model.len() as u64 * 3).min(24);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.0.call(request).await
        }

        fn name(&self) -> &str {
            "jittered"
        }
    }

    let models = vec![
        ModelConfig::new("m", 0.3, 64),
        ModelConfig::new("medium-model", 0.3, 64),
        ModelConfig::new("mm", 0.2, 64),
    ];
    let tasks = vec![t1(), TaskConfig::new("t2", "p2", "s2")];
    let strategies = ["baseline", "reread", "diverse_sampling", "best_of_n"];

    let sequential = orchestrator(
        &strategies,
        models.clone(),
        tasks.clone(),
        Arc::new(Jittered(ScriptedProvider::new(script))),
    )
    .run_all()
    .await
    .unwrap();

    let parallel = orchestrator(
        &strategies,
        models,
        tasks,
        Arc::new(Jittered(ScriptedProvider::new(script))),
    )
    .with_concurrency(4)
    .run_all()
    .await
    .unwrap();

    assert_eq!(parallel.total_runs(), 24);
    assert_eq!(sequential, parallel);
}

#[tokio::test]
async fn overlapping_sessions_on_one_orchestrator_stay_isolated() {
    struct Sleepy;

    #[async_trait]
    impl InferenceProvider for Sleepy {
        async fn call(&self, _request: &InferenceRequest) -> anyhow::Result<InferenceResponse> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(response(3, 30.0))
        }

        fn name(&self) -> &str {
            "sleepy"
        }
    }

    let orch = orchestrator(
        &["baseline", "reread"],
        vec![m1()],
        vec![t1()],
        Arc::new(Sleepy),
    );
    let (a, b) = tokio::join!(orch.run_all(), orch.run_all());
    let (a, b) = (a.unwrap(), b.unwrap());

    for summary in [&a, &b] {
        assert_eq!(summary.total_runs(), 2);
        let indices: Vec<usize> = summary.results().iter().map(|r| r.cell_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }
    assert_eq!(a, b);

    let pooled = orch.with_concurrency(2);
    let (c, d) = tokio::join!(pooled.run_all(), pooled.run_all());
    assert_eq!(c.unwrap(), a);
    assert_eq!(d.unwrap(), b);
}

#[tokio::test]
async fn counters_stay_consistent_with_mixed_outcomes() {
    let provider = ScriptedProvider::new(|_, req| {
        if req.model == "broken" {
            Err(anyhow!("model not found"))
        } else {
            Ok(response(8, 80.0))
        }
    });
    let orch = orchestrator(
        &["baseline", "best_of_n"],
        vec![m1(), ModelConfig::new("broken", 0.3, 64)],
        vec![t1()],
        provider,
    );

    let summary = orch.run_all().await.unwrap();
    assert_eq!(summary.total_runs(), 4);
    assert_eq!(summary.successful_runs(), 2);
    assert_eq!(summary.failed_runs(), 2);
    assert_eq!(summary.total_runs(), summary.results().len() as u64);
    assert_eq!(summary.success_rate(), Some(0.5));

    let stats = summarize(&summary, "best_of_n").unwrap();
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.success_rate, 0.5);
    assert_eq!(stats.cost_multiplier, 3.0);
    let avg = stats.averages.unwrap();
    assert_eq!(avg.avg_tokens, 24.0);
    assert_eq!(avg.avg_latency_ms, 240.0);
}

#[tokio::test]
async fn unknown_strategy_is_rejected_up_front() {
    let err = Orchestrator::new(
        PolicyTable::builtin(),
        vec!["baseline".into(), "tree_of_thought".into()],
        vec![m1()],
        vec![t1()],
        executor(ScriptedProvider::fixed(1, 1.0)),
    )
    .err()
    .unwrap();
    assert!(matches!(err, StratbenchError::UnknownStrategy(ref s) if s == "tree_of_thought"));
}

#[tokio::test]
async fn empty_registry_is_rejected() {
    let result = Orchestrator::new(
        PolicyTable::builtin(),
        vec!["baseline".into()],
        Vec::new(),
        vec![t1()],
        executor(ScriptedProvider::fixed(1, 1.0)),
    );
    assert!(matches!(result, Err(StratbenchError::Config(_))));
}

#[tokio::test]
async fn executor_runs_single_pair_outside_a_session() {
    let provider = ScriptedProvider::fixed(12, 120.0);
    let exec = executor(provider.clone());
    let policy = PolicyTable::builtin().policy_for("reread").unwrap().clone();

    let result = exec.execute(&policy, &m1(), &t1()).await;
    assert!(result.success);
    assert_eq!(result.tokens, 24);
    assert_eq!(result.latency_ms, 240.0);
    assert_eq!(result.metadata["runs"], 2);
    assert_eq!(provider.calls().len(), 2);
}
