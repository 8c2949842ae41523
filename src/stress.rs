//! Stress scenarios layered on top of a baseline Monte Carlo run.

use crate::error::{Result, SimError};
use crate::monte_carlo::{PathSimulator, ReturnProcess, SimulationConfig, SimulationResult};
use crate::rebalance::RebalancePolicy;
use crate::types::AllocationVector;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Adverse market regime applied to a return process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scenario", rename_all = "snake_case")]
pub enum StressScenario {
    /// Immediate 30% drop, then half the expected return at 1.5x volatility.
    MarketCrash,
    /// 30% of the expected return at 1.2x volatility.
    ProlongedRecession,
    /// Expected return reduced by the annual inflation rate.
    HighInflation { annual_inflation: f64 },
}

impl StressScenario {
    /// Fraction of the initial investment lost to the scenario's opening shock.
    pub fn initial_loss(&self) -> f64 {
        match self {
            StressScenario::MarketCrash => 0.3,
            _ => 0.0,
        }
    }

    /// Stressed version of a return process.
    pub fn apply(&self, process: &ReturnProcess) -> ReturnProcess {
        match *self {
            StressScenario::MarketCrash => process.scaled(0.5, 1.5),
            StressScenario::ProlongedRecession => process.scaled(0.3, 1.2),
            StressScenario::HighInflation { annual_inflation } => process.shifted(-annual_inflation),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let StressScenario::HighInflation { annual_inflation } = *self {
            if !annual_inflation.is_finite() || annual_inflation <= -1.0 {
                return Err(SimError::InvalidConfiguration(format!(
                    "Inflation rate must be finite and above -100%, got {}",
                    annual_inflation
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            StressScenario::MarketCrash => "market_crash",
            StressScenario::ProlongedRecession => "prolonged_recession",
            StressScenario::HighInflation { .. } => "high_inflation",
        }
    }
}

impl fmt::Display for StressScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StressScenario::HighInflation { annual_inflation } => {
                write!(f, "high_inflation ({:.1}%)", annual_inflation * 100.0)
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for StressScenario {
    type Err = SimError;

    /// Parses `market_crash`, `prolonged_recession` or `high_inflation:<rate>`.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let (name, arg) = match lower.split_once(':') {
            Some((n, a)) => (n, Some(a)),
            None => (lower.as_str(), None),
        };
        let scenario = match (name, arg) {
            ("market_crash", None) => StressScenario::MarketCrash,
            ("prolonged_recession", None) => StressScenario::ProlongedRecession,
            ("high_inflation", Some(rate)) => StressScenario::HighInflation {
                annual_inflation: rate.parse().map_err(|_| {
                    SimError::InvalidConfiguration(format!("Invalid inflation rate '{}'", rate))
                })?,
            },
            _ => {
                return Err(SimError::InvalidConfiguration(format!(
                    "Unknown stress scenario '{}'",
                    s
                )))
            }
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

/// Baseline and stressed runs under the same configuration and policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressComparison {
    pub scenario: StressScenario,
    pub baseline: SimulationResult,
    pub stressed: SimulationResult,
}

impl StressComparison {
    /// Mean stressed terminal value minus mean baseline terminal value.
    pub fn mean_terminal_shortfall(&self) -> f64 {
        let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        mean(&self.stressed.terminal_values) - mean(&self.baseline.terminal_values)
    }
}

/// Simulate the baseline process and its stressed counterpart.
///
/// Both runs draw their path seeds from `rng`, baseline first. The stressed
/// run keeps the baseline's invested amount, so losses are measured against
/// what was put in before any opening shock.
pub fn run_stress_test<R: Rng + ?Sized>(
    config: &SimulationConfig,
    allocation: &AllocationVector,
    process: &ReturnProcess,
    policy: RebalancePolicy,
    scenario: StressScenario,
    rng: &mut R,
) -> Result<StressComparison> {
    scenario.validate()?;
    info!("Running stress test: {}", scenario);

    let baseline = PathSimulator::new(config.clone())?.simulate(allocation, process, policy, rng)?;

    let stressed_config = config.clone().with_initial_loss(scenario.initial_loss());
    let stressed = PathSimulator::new(stressed_config)?.simulate(
        allocation,
        &scenario.apply(process),
        policy,
        rng,
    )?;

    Ok(StressComparison {
        scenario,
        baseline,
        stressed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskReport;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(process: ReturnProcess) -> (f64, f64) {
        match process {
            ReturnProcess::Portfolio {
                annual_return,
                annual_volatility,
            } => (annual_return, annual_volatility),
            other => panic!("unexpected process {:?}", other),
        }
    }

    #[test]
    fn test_scenario_adjustments() {
        let base = ReturnProcess::portfolio(0.08, 0.12);

        let (r, v) = params(StressScenario::MarketCrash.apply(&base));
        assert!((r - 0.04).abs() < 1e-12);
        assert!((v - 0.18).abs() < 1e-12);

        let (r, v) = params(StressScenario::ProlongedRecession.apply(&base));
        assert!((r - 0.024).abs() < 1e-12);
        assert!((v - 0.144).abs() < 1e-12);

        let inflation = StressScenario::HighInflation {
            annual_inflation: 0.05,
        };
        let (r, v) = params(inflation.apply(&base));
        assert!((r - 0.03).abs() < 1e-12);
        assert_eq!(v, 0.12);
    }

    #[test]
    fn test_parse_scenarios() {
        assert_eq!(
            "market_crash".parse::<StressScenario>().unwrap(),
            StressScenario::MarketCrash
        );
        assert_eq!(
            "High_Inflation:0.04".parse::<StressScenario>().unwrap(),
            StressScenario::HighInflation {
                annual_inflation: 0.04
            }
        );
        assert!("meteor".parse::<StressScenario>().is_err());
        assert!("high_inflation".parse::<StressScenario>().is_err());
        assert!("high_inflation:-2".parse::<StressScenario>().is_err());
    }

    #[test]
    fn test_market_crash_starts_lower() {
        let config = SimulationConfig::new(10_000.0, 12, 20);
        let alloc = AllocationVector::single("A");
        let mut rng = StdRng::seed_from_u64(8);
        let cmp = run_stress_test(
            &config,
            &alloc,
            &ReturnProcess::portfolio(0.06, 0.0),
            RebalancePolicy::None,
            StressScenario::MarketCrash,
            &mut rng,
        )
        .unwrap();

        assert!((cmp.stressed.paths[0][0] - 7_000.0).abs() < 1e-9);
        assert_eq!(cmp.baseline.paths[0][0], 10_000.0);
        assert!(cmp.mean_terminal_shortfall() < 0.0);
    }

    #[test]
    fn test_market_crash_loss_measured_against_invested() {
        let config = SimulationConfig::new(10_000.0, 12, 20);
        let alloc = AllocationVector::single("A");
        let mut rng = StdRng::seed_from_u64(4);
        let cmp = run_stress_test(
            &config,
            &alloc,
            &ReturnProcess::portfolio(0.06, 0.0),
            RebalancePolicy::None,
            StressScenario::MarketCrash,
            &mut rng,
        )
        .unwrap();

        assert_eq!(cmp.stressed.total_invested(), 10_000.0);
        let report = RiskReport::from_simulation(&cmp.stressed, 0.95).unwrap();
        let terminal = 7_000.0 * (1.0 + 0.03 / 12.0_f64).powi(12);
        assert!((report.value_at_risk - (10_000.0 - terminal)).abs() < 1e-6);
        assert_eq!(report.probability_of_loss, 1.0);
    }
}
