//! Configuration loading and models for stratbench.
//!
//! Configuration is loaded via figment from multiple layers:
//! 1. Built-in defaults (the standard strategy/model/task registries)
//! 2. YAML file, if one is given
//! 3. Environment variables (STRATBENCH_ prefix, __ as nested separator)
//! 4. CLI overrides (passed programmatically)

use crate::policy::{PolicyTable, StrategyPolicy};
use crate::types::{ModelConfig, ModelParams, TaskConfig};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Figment(#[from] figment::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// DEFAULTS (all in one place)
// ============================================================================

fn default_name() -> String {
    "stratbench".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_call_timeout_seconds() -> f64 {
    120.0
}

fn default_output_directory() -> String {
    "./runs".to_string()
}

fn default_report_file() -> String {
    "BENCHMARK_RESULTS.md".to_string()
}

fn default_strategies() -> Vec<String> {
    PolicyTable::builtin().names()
}

fn default_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            name: "tinyllama".into(),
            size: Some("1.1B".into()),
            category: Some("tiny".into()),
            params: ModelParams {
                temperature: 0.3,
                max_output_tokens: 512,
            },
        },
        ModelConfig {
            name: "neural-chat".into(),
            size: Some("7B".into()),
            category: Some("medium".into()),
            params: ModelParams {
                temperature: 0.3,
                max_output_tokens: 1024,
            },
        },
    ]
}

fn default_tasks() -> Vec<TaskConfig> {
    vec![
        TaskConfig::new(
            "prime_check",
            "Write a Rust function that checks if a number is prime. Keep it under 15 lines.",
            "You are a Rust programmer. Write clean, correct, idiomatic code.",
        ),
        TaskConfig::new(
            "fibonacci",
            "Write a Rust function that returns the nth Fibonacci number. Keep it under 10 lines.",
            "You are a Rust programmer. Write efficient code.",
        ),
    ]
}

// ============================================================================
// PROVIDER CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    #[default]
    Simulated,
    Ollama {
        #[serde(default)]
        base_url: Option<String>,
    },
}

// ============================================================================
// GLOBAL CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_call_timeout_seconds")]
    pub call_timeout_seconds: f64,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl GlobalConfig {
    /// Per-call timeout. Rejects values `Duration` cannot hold (negative,
    /// non-finite, zero after rounding, or past its range).
    pub fn call_timeout(&self) -> Result<Duration, ConfigError> {
        match Duration::try_from_secs_f64(self.call_timeout_seconds) {
            Ok(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(ConfigError::Invalid(format!(
                "call_timeout_seconds must be a positive number of seconds, got {}",
                self.call_timeout_seconds
            ))),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            call_timeout_seconds: default_call_timeout_seconds(),
            provider: ProviderConfig::default(),
        }
    }
}

// ============================================================================
// OUTPUT CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            report_file: default_report_file(),
        }
    }
}

// ============================================================================
// BENCHMARK CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub global: GlobalConfig,
    /// Strategies to run, in order.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<String>,
    /// Extra policies, or overrides of built-in ones with the same name.
    #[serde(default)]
    pub policies: Vec<StrategyPolicy>,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default = "default_tasks")]
    pub tasks: Vec<TaskConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            global: GlobalConfig::default(),
            strategies: default_strategies(),
            policies: Vec::new(),
            models: default_models(),
            tasks: default_tasks(),
            output: OutputConfig::default(),
        }
    }
}

impl BenchConfig {
    /// Load from an optional YAML file plus environment and overrides.
    pub fn from_file(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        load_config_with_overrides(path, overrides)
    }

    /// Built-in policies with any configured policies registered on top.
    pub fn policy_table(&self) -> Result<PolicyTable, ConfigError> {
        let mut table = PolicyTable::builtin();
        for policy in &self.policies {
            table
                .register(policy.clone())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(table)
    }

    pub fn runs_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.directory)
    }

    pub fn report_path(&self) -> PathBuf {
        PathBuf::from(&self.output.report_file)
    }
}

// ============================================================================
// CLI OVERRIDES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_timeout_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<String>,
}

// ============================================================================
// LOADING
// ============================================================================

pub fn load_config(path: impl AsRef<Path>) -> Result<BenchConfig, ConfigError> {
    load_config_with_overrides(Some(path.as_ref()), ConfigOverrides::default())
}

pub fn load_config_with_overrides(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<BenchConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(BenchConfig::default()));

    if let Some(path) = path {
        let contents = std::fs::read_to_string(path)?;
        let interpolated = interpolate_env_vars(&contents);
        figment = figment.merge(Yaml::string(&interpolated));
    }

    figment = figment.merge(Env::prefixed("STRATBENCH_").split("__"));

    if overrides.concurrency.is_some() || overrides.call_timeout_seconds.is_some() {
        let mut global_overrides = HashMap::new();
        if let Some(c) = overrides.concurrency {
            global_overrides.insert("concurrency".to_string(), serde_json::json!(c));
        }
        if let Some(t) = overrides.call_timeout_seconds {
            global_overrides.insert("call_timeout_seconds".to_string(), serde_json::json!(t));
        }

        #[derive(Serialize)]
        struct GlobalOverride {
            global: HashMap<String, serde_json::Value>,
        }

        figment = figment.merge(Serialized::defaults(GlobalOverride {
            global: global_overrides,
        }));
    }

    if let Some(strategies) = overrides.strategies {
        #[derive(Serialize)]
        struct StrategiesOverride {
            strategies: Vec<String>,
        }

        figment = figment.merge(Serialized::defaults(StrategiesOverride { strategies }));
    }

    if overrides.runs_dir.is_some() || overrides.report_file.is_some() {
        let mut output_overrides = HashMap::new();
        if let Some(dir) = overrides.runs_dir {
            output_overrides.insert("directory".to_string(), dir);
        }
        if let Some(file) = overrides.report_file {
            output_overrides.insert("report_file".to_string(), file);
        }

        #[derive(Serialize)]
        struct OutputOverride {
            output: HashMap<String, String>,
        }

        figment = figment.merge(Serialized::defaults(OutputOverride {
            output: output_overrides,
        }));
    }

    let cfg: BenchConfig = figment.extract()?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn interpolate_env_vars(input: &str) -> String {
    use once_cell::sync::Lazy;
    use regex::Regex;
    use std::env;

    static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("valid regex")
    });

    ENV_VAR_RE
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_val = caps.get(2).map(|m| m.as_str());
            match env::var(var_name) {
                Ok(val) => val,
                Err(_) => default_val.unwrap_or("").to_string(),
            }
        })
        .to_string()
}

pub fn validate_config(cfg: &BenchConfig) -> Result<(), ConfigError> {
    if cfg.strategies.is_empty() {
        return Err(ConfigError::Invalid("at least one strategy is required".into()));
    }
    if cfg.models.is_empty() {
        return Err(ConfigError::Invalid("at least one model is required".into()));
    }
    if cfg.tasks.is_empty() {
        return Err(ConfigError::Invalid("at least one task is required".into()));
    }
    if cfg.models.iter().any(|m| m.name.trim().is_empty()) {
        return Err(ConfigError::Invalid("models must have a non-empty name".into()));
    }
    if cfg.tasks.iter().any(|t| t.id.trim().is_empty()) {
        return Err(ConfigError::Invalid("tasks must have a non-empty id".into()));
    }
    if cfg.global.concurrency == 0 {
        return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
    }
    cfg.global.call_timeout()?;

    let table = cfg.policy_table()?;
    if let Some(unknown) = cfg.strategies.iter().find(|s| !table.contains(s)) {
        return Err(ConfigError::Invalid(format!(
            "unknown strategy: {unknown} (available: {})",
            table.names().join(", ")
        )));
    }
    Ok(())
}
