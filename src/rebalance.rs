//! Rebalancing policies.
//!
//! A policy only decides *whether* to rebalance. The reallocation itself is
//! instantaneous and frictionless: every holding is reset to
//! `total_value * target_weight`.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decision rule consulted once per simulated period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RebalancePolicy {
    /// Never rebalance; holdings drift with returns.
    #[default]
    None,
    /// Rebalance every `interval` elapsed periods.
    Periodic { interval: usize },
    /// Rebalance when any weight drifts more than `tolerance` from its target.
    Threshold { tolerance: f64 },
}

impl RebalancePolicy {
    /// Create a periodic policy, rejecting a zero interval.
    pub fn periodic(interval: usize) -> Result<Self> {
        let policy = RebalancePolicy::Periodic { interval };
        policy.validate()?;
        Ok(policy)
    }

    /// Create a threshold policy; `tolerance` must lie in (0, 1).
    pub fn threshold(tolerance: f64) -> Result<Self> {
        let policy = RebalancePolicy::Threshold { tolerance };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            RebalancePolicy::None => Ok(()),
            RebalancePolicy::Periodic { interval } if interval == 0 => Err(
                SimError::InvalidConfiguration("Rebalance interval must be positive".to_string()),
            ),
            RebalancePolicy::Periodic { .. } => Ok(()),
            RebalancePolicy::Threshold { tolerance } if !(tolerance > 0.0 && tolerance < 1.0) => {
                Err(SimError::InvalidConfiguration(format!(
                    "Rebalance tolerance must be in (0, 1), got {}",
                    tolerance
                )))
            }
            RebalancePolicy::Threshold { .. } => Ok(()),
        }
    }

    /// Decide whether to rebalance.
    ///
    /// `period_index` is the number of periods elapsed since the start of the
    /// run. A periodic policy only ever rebalances on its own schedule, so the
    /// periods since its last rebalance reach `interval` exactly when
    /// `period_index` is a positive multiple of it.
    pub fn should_rebalance(
        &self,
        period_index: usize,
        current_weights: &[f64],
        target_weights: &[f64],
    ) -> bool {
        match *self {
            RebalancePolicy::None => false,
            RebalancePolicy::Periodic { interval } => {
                interval > 0 && period_index > 0 && period_index % interval == 0
            }
            RebalancePolicy::Threshold { tolerance } => current_weights
                .iter()
                .zip(target_weights.iter())
                .any(|(c, t)| (c - t).abs() > tolerance),
        }
    }

    pub fn label(&self) -> String {
        match self {
            RebalancePolicy::None => "none".to_string(),
            RebalancePolicy::Periodic { interval } => format!("every {} periods", interval),
            RebalancePolicy::Threshold { tolerance } => {
                format!("threshold {:.1}%", tolerance * 100.0)
            }
        }
    }
}

impl fmt::Display for RebalancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Current weights implied by holding values. All zero when the total is zero.
pub fn current_weights(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v / total).collect()
}

/// Reset each holding value to `total * target` in place.
pub fn rebalance_values(values: &mut [f64], target_weights: &[f64]) {
    let total: f64 = values.iter().sum();
    for (v, t) in values.iter_mut().zip(target_weights.iter()) {
        *v = total * t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_rebalances() {
        let policy = RebalancePolicy::None;
        for t in 0..50 {
            assert!(!policy.should_rebalance(t, &[0.9, 0.1], &[0.5, 0.5]));
        }
    }

    #[test]
    fn test_periodic_schedule() {
        let policy = RebalancePolicy::periodic(3).unwrap();
        let fired: Vec<usize> = (0..10)
            .filter(|&t| policy.should_rebalance(t, &[], &[]))
            .collect();
        assert_eq!(fired, vec![3, 6, 9]);

        let every = RebalancePolicy::periodic(1).unwrap();
        assert!((1..5).all(|t| every.should_rebalance(t, &[], &[])));
        assert!(!every.should_rebalance(0, &[], &[]));
    }

    #[test]
    fn test_threshold_trigger() {
        let policy = RebalancePolicy::threshold(0.05).unwrap();
        assert!(!policy.should_rebalance(1, &[0.63, 0.37], &[0.6, 0.4]));
        assert!(policy.should_rebalance(1, &[0.70, 0.30], &[0.6, 0.4]));
        assert!(policy.should_rebalance(1, &[0.52, 0.48], &[0.6, 0.4]));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            RebalancePolicy::periodic(0),
            Err(SimError::InvalidConfiguration(_))
        ));
        assert!(RebalancePolicy::threshold(0.0).is_err());
        assert!(RebalancePolicy::threshold(1.0).is_err());
        assert!(RebalancePolicy::threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_rebalance_values() {
        let mut values = vec![7_000.0, 3_000.0];
        rebalance_values(&mut values, &[0.6, 0.4]);
        assert_eq!(values, vec![6_000.0, 4_000.0]);
        assert_eq!(current_weights(&values), vec![0.6, 0.4]);
        assert_eq!(current_weights(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_policy_deserialization() {
        let p: RebalancePolicy =
            serde_json::from_str(r#"{"policy":"threshold","tolerance":0.05}"#).unwrap();
        assert_eq!(p, RebalancePolicy::Threshold { tolerance: 0.05 });
        let bad = serde_json::from_str::<RebalancePolicy>(r#"{"policy":"monthly"}"#);
        assert!(bad.is_err());
    }
}
