use crate::config::ConfigError;
use crate::core::model::{FeatureVector, StrategyClass};
use crate::traits::{DecisionError, DecisionFunction};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Linear decision model: `tanh(w · x + b)`, so outputs stay in [-1, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    pub weights: [f64; 5],
    pub bias: f64,
}

impl LinearPolicy {
    pub fn new(weights: [f64; 5], bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let activation = self
            .weights
            .iter()
            .zip(features.iter())
            .fold(self.bias, |acc, (w, x)| w.mul_add(*x, acc));
        activation.tanh()
    }
}

/// One loaded policy per strategy class
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<StrategyClass, LinearPolicy>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, class: StrategyClass, policy: LinearPolicy) -> Self {
        self.policies.insert(class, policy);
        self
    }

    /// Loads every artifact up front. A missing or unreadable file is fatal.
    pub fn load<P: AsRef<Path>>(paths: &[(StrategyClass, P)]) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (class, path) in paths {
            let path = path.as_ref();
            let display = path.display().to_string();
            if !path.exists() {
                return Err(ConfigError::MissingArtifact(display));
            }

            let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Artifact {
                path: display.clone(),
                reason: e.to_string(),
            })?;
            let policy = LinearPolicy::from_json(&raw).map_err(|e| ConfigError::Artifact {
                path: display.clone(),
                reason: e.to_string(),
            })?;
            if policy.weights.iter().any(|w| !w.is_finite()) || !policy.bias.is_finite() {
                return Err(ConfigError::Artifact {
                    path: display,
                    reason: "non-finite parameters".to_string(),
                });
            }

            info!("Loaded {} policy from {}", class, display);
            registry.policies.insert(*class, policy);
        }
        Ok(registry)
    }

    pub fn get(&self, class: StrategyClass) -> Option<&LinearPolicy> {
        self.policies.get(&class)
    }
}

impl DecisionFunction for PolicyRegistry {
    fn predict(&self, class: StrategyClass, features: &FeatureVector) -> Result<f64, DecisionError> {
        let policy = self.get(class).ok_or(DecisionError::NoModel(class))?;
        let confidence = policy.predict(features);
        if confidence.is_finite() {
            Ok(confidence)
        } else {
            Err(DecisionError::NonFinite)
        }
    }
}
