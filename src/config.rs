//! Configuration file support.
//!
//! Simulations, stress tests and optimizer runs can be described in a TOML
//! file for reproducibility. Conversion methods validate the file and produce
//! the core structures.

use crate::error::{Result, SimError};
use crate::monte_carlo::{ReturnProcess, SimulationConfig};
use crate::rebalance::RebalancePolicy;
use crate::return_model::{assumption_estimate, scaled_assumptions, AssumptionTable};
use crate::stress::StressScenario;
use crate::types::{AllocationVector, AssetAssumption, Frequency, RiskTolerance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete run configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsimFileConfig {
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Target weight per asset.
    #[serde(default = "default_allocation")]
    pub allocation: BTreeMap<String, f64>,
    /// Annual return and volatility per asset.
    #[serde(default = "default_assumptions")]
    pub assumptions: AssumptionTable,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub rebalance: RebalancePolicy,
    /// Optional stress scenario for the `stress` command.
    #[serde(default)]
    pub stress: Option<StressScenario>,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
}

impl Default for PortsimFileConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            allocation: default_allocation(),
            assumptions: default_assumptions(),
            risk: RiskSettings::default(),
            rebalance: RebalancePolicy::None,
            stress: None,
            optimizer: OptimizerSettings::default(),
        }
    }
}

fn default_allocation() -> BTreeMap<String, f64> {
    [("stocks", 0.6), ("bonds", 0.3), ("cash", 0.1)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn default_assumptions() -> AssumptionTable {
    [
        ("stocks", AssetAssumption::new(0.10, 0.20)),
        ("bonds", AssetAssumption::new(0.05, 0.05)),
        ("cash", AssetAssumption::new(0.02, 0.01)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Monte Carlo settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_investment")]
    pub initial_investment: f64,
    #[serde(default = "default_horizon")]
    pub horizon_periods: usize,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default = "default_paths")]
    pub num_paths: usize,
    #[serde(default)]
    pub contribution_per_period: f64,
    /// Draw each asset independently instead of one portfolio-level return.
    #[serde(default)]
    pub per_asset: bool,
    pub seed: Option<u64>,
}

fn default_investment() -> f64 { 10_000.0 }
fn default_horizon() -> usize { 120 }
fn default_paths() -> usize { 1000 }

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_investment: 10_000.0,
            horizon_periods: 120,
            frequency: Frequency::Monthly,
            num_paths: 1000,
            contribution_per_period: 0.0,
            per_asset: false,
            seed: None,
        }
    }
}

/// Risk profile and reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSettings {
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    #[serde(default = "default_risk_free")]
    pub risk_free_rate: f64,
    #[serde(default = "default_confidence")]
    pub confidence_level: f64,
}

fn default_risk_free() -> f64 { 0.02 }
fn default_confidence() -> f64 { 0.95 }

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            risk_tolerance: RiskTolerance::Moderate,
            risk_free_rate: 0.02,
            confidence_level: 0.95,
        }
    }
}

/// Mean-variance optimizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    #[serde(default = "default_frontier_points")]
    pub frontier_points: usize,
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    /// Number of random portfolios to sample for comparison.
    #[serde(default)]
    pub sample_portfolios: usize,
    #[serde(default = "default_optimizer_seed")]
    pub seed: u64,
}

fn default_frontier_points() -> usize { 50 }
fn default_restarts() -> usize { 8 }
fn default_max_iter() -> u32 { 100 }
fn default_optimizer_seed() -> u64 { 42 }

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            frontier_points: 50,
            restarts: 8,
            max_iter: 100,
            sample_portfolios: 0,
            seed: 42,
        }
    }
}

impl PortsimFileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: PortsimFileConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SimError::InvalidConfiguration(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn to_simulation_config(&self) -> Result<SimulationConfig> {
        let s = &self.simulation;
        let mut config = SimulationConfig::new(s.initial_investment, s.horizon_periods, s.num_paths)
            .with_frequency(s.frequency)
            .with_contribution(s.contribution_per_period);
        if let Some(seed) = s.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_allocation(&self) -> Result<AllocationVector> {
        if self.allocation.is_empty() {
            return Err(SimError::InvalidAllocation(
                "Allocation table is empty".to_string(),
            ));
        }
        AllocationVector::new(self.allocation.iter().map(|(k, v)| (k.clone(), *v)))
    }

    /// Return process implied by the assumptions and risk tolerance.
    ///
    /// Portfolio-level draws use the independent-asset combination of the
    /// assumptions; per-asset draws use each scaled assumption directly.
    pub fn to_return_process(&self) -> Result<ReturnProcess> {
        let allocation = self.to_allocation()?;
        let tolerance = self.risk.risk_tolerance;
        if self.simulation.per_asset {
            let table = scaled_assumptions(&self.assumptions, tolerance);
            if let Some(missing) = allocation.assets().iter().find(|a| !table.contains_key(*a)) {
                return Err(SimError::InvalidAllocation(format!(
                    "No return assumption for asset '{}'",
                    missing
                )));
            }
            Ok(ReturnProcess::per_asset(table))
        } else {
            Ok(assumption_estimate(&self.assumptions, &allocation, tolerance)?.into())
        }
    }

    pub fn to_rebalance_policy(&self) -> Result<RebalancePolicy> {
        self.rebalance.validate()?;
        Ok(self.rebalance)
    }

    pub fn confidence_level(&self) -> Result<f64> {
        let level = self.risk.confidence_level;
        if !(level > 0.0 && level < 1.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "Confidence level must be in (0, 1), got {}",
                level
            )));
        }
        Ok(level)
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# portsim configuration file

[simulation]
initial_investment = 10000.0
horizon_periods = 120        # 10 years of monthly periods
frequency = "monthly"        # daily | weekly | monthly | quarterly | annual
num_paths = 1000
contribution_per_period = 0.0
per_asset = false            # true: independent draw per asset
seed = 42

[allocation]
stocks = 0.6
bonds = 0.3
cash = 0.1

[assumptions.stocks]
annual_return = 0.10
annual_volatility = 0.20

[assumptions.bonds]
annual_return = 0.05
annual_volatility = 0.05

[assumptions.cash]
annual_return = 0.02
annual_volatility = 0.01

[risk]
risk_tolerance = "moderate"  # conservative | moderate | aggressive
risk_free_rate = 0.02
confidence_level = 0.95

[rebalance]
policy = "periodic"          # none | periodic | threshold
interval = 12
# policy = "threshold"
# tolerance = 0.05

[stress]
scenario = "market_crash"    # market_crash | prolonged_recession | high_inflation
# scenario = "high_inflation"
# annual_inflation = 0.05

[optimizer]
frontier_points = 50
restarts = 8
max_iter = 100
sample_portfolios = 0
seed = 42
"#
        .to_string()
    }
}
