//! Strategy policy table.
//!
//! A policy declares how many provider calls a strategy issues, at which
//! temperatures, and how expensive the strategy is relative to a single
//! baseline call. The cost multiplier is declared alongside the run count
//! rather than derived from it, so strategies with cheaper individual passes
//! can be modeled without changing how many calls they make.

use crate::error::{Result, StratbenchError};
use serde::{Deserialize, Serialize};

/// Temperatures used for a policy's runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureSchedule {
    /// Every run uses the model's configured temperature.
    Base,
    /// Every run uses the same fixed temperature.
    Repeat(f64),
    /// One explicit temperature per run.
    Fixed(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyPolicy {
    pub name: String,
    pub run_count: u32,
    pub temperatures: TemperatureSchedule,
    pub cost_multiplier: f64,
}

impl StrategyPolicy {
    pub fn new(
        name: impl Into<String>,
        run_count: u32,
        temperatures: TemperatureSchedule,
        cost_multiplier: f64,
    ) -> Self {
        Self {
            name: name.into(),
            run_count,
            temperatures,
            cost_multiplier,
        }
    }

    /// Expand the schedule into one temperature per run.
    pub fn temperatures_for(&self, base_temperature: f64) -> Vec<f64> {
        let runs = self.run_count as usize;
        match &self.temperatures {
            TemperatureSchedule::Base => vec![base_temperature; runs],
            TemperatureSchedule::Repeat(t) => vec![*t; runs],
            TemperatureSchedule::Fixed(ts) => ts.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StratbenchError::invalid_policy(
                &self.name,
                "name must not be empty",
            ));
        }
        if self.run_count == 0 {
            return Err(StratbenchError::invalid_policy(
                &self.name,
                "run_count must be positive",
            ));
        }
        if !self.cost_multiplier.is_finite() || self.cost_multiplier <= 0.0 {
            return Err(StratbenchError::invalid_policy(
                &self.name,
                "cost_multiplier must be a finite positive number",
            ));
        }
        let declared: &[f64] = match &self.temperatures {
            TemperatureSchedule::Base => &[][..],
            TemperatureSchedule::Repeat(t) => std::slice::from_ref(t),
            TemperatureSchedule::Fixed(ts) => {
                if ts.len() != self.run_count as usize {
                    return Err(StratbenchError::invalid_policy(
                        &self.name,
                        format!(
                            "schedule has {} temperatures but run_count is {}",
                            ts.len(),
                            self.run_count
                        ),
                    ));
                }
                ts.as_slice()
            }
        };
        if let Some(bad) = declared.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(StratbenchError::invalid_policy(
                &self.name,
                format!("temperature {bad} must be a finite non-negative number"),
            ));
        }
        Ok(())
    }
}

pub const BASELINE: &str = "baseline";
pub const REREAD: &str = "reread";
pub const DIVERSE_SAMPLING: &str = "diverse_sampling";
pub const BEST_OF_N: &str = "best_of_n";
pub const SELF_CONSISTENCY: &str = "self_consistency";

/// Ordered registry of strategy policies. Insertion order is the declared
/// strategy order used by reports.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    policies: Vec<StrategyPolicy>,
}

impl PolicyTable {
    pub fn empty() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    pub fn builtin() -> Self {
        use TemperatureSchedule::*;
        Self {
            policies: vec![
                StrategyPolicy::new(BASELINE, 1, Base, 1.0),
                StrategyPolicy::new(REREAD, 2, Base, 1.5),
                StrategyPolicy::new(DIVERSE_SAMPLING, 3, Fixed(vec![0.1, 0.5, 0.9]), 3.0),
                StrategyPolicy::new(BEST_OF_N, 3, Base, 3.0),
                StrategyPolicy::new(SELF_CONSISTENCY, 5, Repeat(0.7), 5.0),
            ],
        }
    }

    /// Add a policy, replacing any existing policy with the same name in place.
    pub fn register(&mut self, policy: StrategyPolicy) -> Result<()> {
        policy.validate()?;
        match self.policies.iter_mut().find(|p| p.name == policy.name) {
            Some(existing) => *existing = policy,
            None => self.policies.push(policy),
        }
        Ok(())
    }

    pub fn policy_for(&self, strategy: &str) -> Result<&StrategyPolicy> {
        self.policies
            .iter()
            .find(|p| p.name == strategy)
            .ok_or_else(|| StratbenchError::UnknownStrategy(strategy.to_string()))
    }

    pub fn contains(&self, strategy: &str) -> bool {
        self.policies.iter().any(|p| p.name == strategy)
    }

    pub fn names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyPolicy> {
        self.policies.iter()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::builtin()
    }
}
