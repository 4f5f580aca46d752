//! Engine configuration.

use crate::error::{Result, TdadpError};
use serde::{Deserialize, Serialize};

/// How reliability and golden accuracy are derived from golden answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityMode {
    /// `r = (2/(1+e^(-n/3)) - 1) * c/n`, `p = c/n`
    #[default]
    Fractional,

    /// Floor-division arithmetic: `r` collapses to 0 and `p` to 0 or 1.
    ///
    /// Kept to reproduce published figures of the floor-division variant.
    Truncated,
}

/// Configuration for the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of promotable tasks that closes a truth-inference batch (B)
    pub batch_size: usize,

    /// Mix between unreliability and trust risk in the testing probability (α)
    pub alpha: f64,

    /// Trust score at which a worker is banned (τ)
    pub tau: f64,

    /// Reliability at which a worker (or a task's assignees) counts as reliable (δ)
    pub delta: f64,

    /// Probability an attacker answers honestly once it detects a golden task
    pub honesty_probability: f64,

    /// Iteration cap for truth inference
    pub max_iterations: usize,

    /// Reliability arithmetic
    pub reliability_mode: ReliabilityMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            alpha: 0.5,
            tau: 0.9,
            delta: 0.5,
            honesty_probability: 0.8,
            max_iterations: 1000,
            reliability_mode: ReliabilityMode::Fractional,
        }
    }
}

impl EngineConfig {
    /// Parses a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets α.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets the ban threshold τ.
    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    /// Sets the reliability threshold δ.
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// Sets the reliability arithmetic.
    pub fn with_reliability_mode(mut self, mode: ReliabilityMode) -> Self {
        self.reliability_mode = mode;
        self
    }

    /// Checks every threshold and size.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(TdadpError::config("batch_size must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(TdadpError::config("max_iterations must be positive"));
        }
        for (name, value) in [
            ("alpha", self.alpha),
            ("tau", self.tau),
            ("delta", self.delta),
            ("honesty_probability", self.honesty_probability),
        ] {
            check_unit(name, value)?;
        }
        Ok(())
    }
}

/// Rejects values outside [0, 1] (NaN included).
pub(crate) fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(TdadpError::config(format!("{} must be in [0, 1], got {}", name, value)))
    }
}
