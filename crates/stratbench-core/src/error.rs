//! Unified error types.

use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T, E = StratbenchError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StratbenchError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid policy '{name}': {reason}")]
    InvalidPolicy { name: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("provider call failed for model '{model}': {source}")]
    Provider {
        model: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("provider call timed out after {seconds}s")]
    Timeout { seconds: f64 },

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StratbenchError {
    pub fn provider(model: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Provider {
            model: model.into(),
            source: source.into(),
        }
    }

    pub fn invalid_policy(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
