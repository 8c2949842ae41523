//! Savings goal arithmetic.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

/// A target amount in today's money, reached after `years`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsGoal {
    pub target_value: f64,
    pub years: u32,
    pub expected_return: f64,
    pub inflation_rate: f64,
}

/// Derived figures for a [`SavingsGoal`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavingsPlan {
    /// Target value in money of the goal year.
    pub future_value: f64,
    /// Amount that must be invested today to reach `future_value`.
    pub required_savings: f64,
    /// `(1 + r) / (1 + i) - 1`.
    pub real_return: f64,
}

impl SavingsGoal {
    pub fn new(target_value: f64, years: u32, expected_return: f64, inflation_rate: f64) -> Self {
        Self {
            target_value,
            years,
            expected_return,
            inflation_rate,
        }
    }

    /// Years between two ages; fails if the target age is not after the current one.
    pub fn years_between(current_age: u32, target_age: u32) -> Result<u32> {
        if target_age <= current_age {
            return Err(SimError::InvalidConfiguration(format!(
                "Target age {} must be after current age {}",
                target_age, current_age
            )));
        }
        Ok(target_age - current_age)
    }

    pub fn plan(&self) -> Result<SavingsPlan> {
        if !(self.target_value.is_finite() && self.target_value >= 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "Target value must be non-negative, got {}",
                self.target_value
            )));
        }
        if self.expected_return <= -1.0 || self.inflation_rate <= -1.0 {
            return Err(SimError::InvalidConfiguration(
                "Rates must be above -100%".to_string(),
            ));
        }

        let n = self.years as i32;
        let future_value = self.target_value * (1.0 + self.inflation_rate).powi(n);
        Ok(SavingsPlan {
            future_value,
            required_savings: future_value / (1.0 + self.expected_return).powi(n),
            real_return: (1.0 + self.expected_return) / (1.0 + self.inflation_rate) - 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan() {
        let plan = SavingsGoal::new(1_000.0, 10, 0.07, 0.015).plan().unwrap();
        let fv = 1_000.0 * 1.015_f64.powi(10);
        assert!((plan.future_value - fv).abs() < 1e-9);
        assert!((plan.required_savings - fv / 1.07_f64.powi(10)).abs() < 1e-9);
        assert!((plan.real_return - (1.07 / 1.015 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_years_needs_full_target() {
        let plan = SavingsGoal::new(500.0, 0, 0.05, 0.02).plan().unwrap();
        assert_eq!(plan.future_value, 500.0);
        assert_eq!(plan.required_savings, 500.0);
    }

    #[test]
    fn test_years_between() {
        assert_eq!(SavingsGoal::years_between(30, 65).unwrap(), 35);
        assert!(SavingsGoal::years_between(65, 30).is_err());
    }

    #[test]
    fn test_rejects_bad_rates() {
        assert!(SavingsGoal::new(100.0, 5, -1.0, 0.02).plan().is_err());
        assert!(SavingsGoal::new(-1.0, 5, 0.05, 0.02).plan().is_err());
    }
}
