//! Inference providers.
//!
//! The benchmark engine only needs one capability from a model backend: run a
//! single completed call and report the text, the number of tokens produced
//! and how long it took. [`InferenceProvider`] is that seam. Two
//! implementations ship with the crate:
//!
//! - [`SimulatedProvider`]: deterministic canned outputs, no network.
//! - [`OllamaProvider`]: the `/api/generate` endpoint of an Ollama server.

use crate::config::ProviderConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceResponse {
    pub text: String,
    pub token_count: u64,
    pub latency_ms: f64,
}

#[async_trait]
pub trait InferenceProvider: Send + Sync {
    async fn call(&self, request: &InferenceRequest) -> Result<InferenceResponse>;

    fn name(&self) -> &str;
}

// ============================================================================
// SIMULATED
// ============================================================================

const FALLBACK_OUTPUT: &str = "fn solution() {}";

/// Canned responses keyed by model name.
///
/// Token count is the whitespace-separated word count of the output and
/// latency is `500 + 2 * len(output)` milliseconds, so repeated calls are
/// reproducible.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    outputs: HashMap<String, String>,
}

impl SimulatedProvider {
    pub fn new() -> Self {
        let mut outputs = HashMap::new();
        outputs.insert(
            "tinyllama".to_string(),
            "fn is_prime(num: i32) -> bool {\n    if num <= 1 { return false; }\n    for i in 2..num { if num % i == 0 { return false; } }\n    true\n}"
                .to_string(),
        );
        outputs.insert(
            "neural-chat".to_string(),
            "fn is_prime(num: i32) -> bool {\n    if num < 2 { return false; }\n    if num == 2 { return true; }\n    if num % 2 == 0 { return false; }\n    for i in (3..=((num as f64).sqrt() as i32)).step_by(2) {\n        if num % i == 0 { return false; }\n    }\n    true\n}"
                .to_string(),
        );
        Self { outputs }
    }

    pub fn with_output(mut self, model: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.insert(model.into(), output.into());
        self
    }

    fn output_for(&self, model: &str) -> &str {
        self.outputs
            .get(model)
            .map(String::as_str)
            .unwrap_or(FALLBACK_OUTPUT)
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceProvider for SimulatedProvider {
    async fn call(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let text = self.output_for(&request.model).to_string();
        let token_count = text.split_whitespace().count() as u64;
        let latency_ms = 500.0 + text.chars().count() as f64 * 2.0;
        Ok(InferenceResponse {
            text,
            token_count,
            latency_ms,
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// ============================================================================
// OLLAMA
// ============================================================================

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    total_duration: Option<u64>,
}

impl OllamaProvider {
    /// Resolve the server from the explicit URL, then `OLLAMA_HOST`, then the
    /// local default.
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .or_else(|| env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InferenceProvider for OllamaProvider {
    async fn call(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "system": request.system,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_output_tokens,
            }
        });

        let url = format!("{}/api/generate", self.base_url);
        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("ollama returned {status}: {}", text.trim()));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .context("invalid ollama response body")?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let token_count = parsed
            .eval_count
            .unwrap_or_else(|| parsed.response.split_whitespace().count() as u64);
        let latency_ms = parsed
            .total_duration
            .map(|ns| ns as f64 / 1_000_000.0)
            .unwrap_or(elapsed_ms);

        Ok(InferenceResponse {
            text: parsed.response,
            token_count,
            latency_ms,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

pub fn get_provider(cfg: &ProviderConfig) -> Arc<dyn InferenceProvider> {
    match cfg {
        ProviderConfig::Simulated => Arc::new(SimulatedProvider::new()),
        ProviderConfig::Ollama { base_url } => Arc::new(OllamaProvider::new(base_url.clone())),
    }
}
