//! Turns a churn probability into the flag and risk tier returned to callers.

use crate::config::ChurnConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Strict comparisons: a probability equal to a threshold stays in the lower tier.
    pub fn from_probability(probability: f64, config: &ChurnConfig) -> Self {
        if probability > config.high_threshold {
            RiskLevel::High
        } else if probability > config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-processed churn output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnAssessment {
    pub churn_probability: f64,
    pub is_churned: bool,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: ChurnConfig,
}

impl RiskEngine {
    pub fn new(config: ChurnConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, probability: f64) -> ChurnAssessment {
        ChurnAssessment {
            churn_probability: probability,
            is_churned: probability > self.config.decision_threshold,
            risk_level: RiskLevel::from_probability(probability, &self.config),
        }
    }

    pub fn config(&self) -> &ChurnConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_thresholds() {
        let engine = RiskEngine::new(ChurnConfig::default());
        assert_eq!(engine.assess(0.3).risk_level, RiskLevel::Low);
        assert_eq!(engine.assess(0.4).risk_level, RiskLevel::Low);
        assert_eq!(engine.assess(0.41).risk_level, RiskLevel::Medium);
        assert_eq!(engine.assess(0.7).risk_level, RiskLevel::Medium);
        assert_eq!(engine.assess(0.71).risk_level, RiskLevel::High);
    }

    #[test]
    fn churn_flag_is_strictly_above_half() {
        let engine = RiskEngine::new(ChurnConfig::default());
        assert!(!engine.assess(0.5).is_churned);
        assert!(engine.assess(0.5001).is_churned);
        let a = engine.assess(0.45);
        assert!(!a.is_churned);
        assert_eq!(a.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
        assert_eq!(RiskLevel::Medium.to_string(), "medium");
    }
}
