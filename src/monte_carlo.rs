//! Monte Carlo simulation of portfolio value paths.
//!
//! Each path starts from the initial investment split by target weight,
//! then for every period draws returns, applies them, adds any periodic
//! contribution, consults the [`RebalancePolicy`] and records the period-end
//! value.
//!
//! Paths are independent and run in parallel with rayon. The caller-owned
//! generator is only used to draw one seed per path up front, so a seeded run
//! is bit-for-bit reproducible regardless of thread scheduling.
//!
//! # Example
//!
//! ```
//! use portsim::monte_carlo::{PathSimulator, ReturnProcess, SimulationConfig};
//! use portsim::rebalance::RebalancePolicy;
//! use portsim::types::AllocationVector;
//!
//! let config = SimulationConfig::default()
//!     .with_paths(200)
//!     .with_horizon(24)
//!     .with_seed(42);
//! let simulator = PathSimulator::new(config).unwrap();
//! let allocation = AllocationVector::new([("VT", 0.6), ("EDV", 0.4)]).unwrap();
//! let process = ReturnProcess::portfolio(0.07, 0.15);
//!
//! let result = simulator
//!     .run(&allocation, &process, RebalancePolicy::None)
//!     .unwrap();
//! assert_eq!(result.terminal_values.len(), 200);
//! ```

use crate::error::{Result, SimError};
use crate::portfolio::PortfolioState;
use crate::rebalance::RebalancePolicy;
use crate::return_model::{AssumptionTable, ReturnEstimate};
use crate::types::{AllocationVector, Frequency};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How period returns are generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnProcess {
    /// One portfolio-level draw per period, applied to every asset.
    Portfolio {
        annual_return: f64,
        annual_volatility: f64,
    },
    /// Independent draws per asset from their own assumptions.
    PerAsset { assumptions: AssumptionTable },
}

impl ReturnProcess {
    pub fn portfolio(annual_return: f64, annual_volatility: f64) -> Self {
        ReturnProcess::Portfolio {
            annual_return,
            annual_volatility,
        }
    }

    pub fn per_asset(assumptions: AssumptionTable) -> Self {
        ReturnProcess::PerAsset { assumptions }
    }

    /// Scale expected return and volatility, keeping the process kind.
    pub fn scaled(&self, return_factor: f64, volatility_factor: f64) -> Self {
        self.map(|r, v| (r * return_factor, v * volatility_factor))
    }

    /// Subtract a constant from every expected return.
    pub fn shifted(&self, return_shift: f64) -> Self {
        self.map(|r, v| (r + return_shift, v))
    }

    fn map(&self, f: impl Fn(f64, f64) -> (f64, f64)) -> Self {
        match self {
            ReturnProcess::Portfolio {
                annual_return,
                annual_volatility,
            } => {
                let (r, v) = f(*annual_return, *annual_volatility);
                ReturnProcess::portfolio(r, v)
            }
            ReturnProcess::PerAsset { assumptions } => ReturnProcess::PerAsset {
                assumptions: assumptions
                    .iter()
                    .map(|(k, a)| {
                        let (r, v) = f(a.annual_return, a.annual_volatility);
                        (k.clone(), crate::types::AssetAssumption::new(r, v))
                    })
                    .collect(),
            },
        }
    }

    /// Build the per-period samplers for an allocation.
    fn sampler(&self, allocation: &AllocationVector, periods_per_year: f64) -> Result<PeriodSampler> {
        let normal = |annual_return: f64, annual_volatility: f64| {
            let est = ReturnEstimate::new(annual_return, annual_volatility);
            Normal::new(
                est.period_mean(periods_per_year),
                est.period_volatility(periods_per_year),
            )
            .map_err(|e| {
                SimError::InvalidConfiguration(format!(
                    "Invalid return distribution (return {}, volatility {}): {}",
                    annual_return, annual_volatility, e
                ))
            })
        };

        match self {
            ReturnProcess::Portfolio {
                annual_return,
                annual_volatility,
            } => Ok(PeriodSampler::Shared(normal(*annual_return, *annual_volatility)?)),
            ReturnProcess::PerAsset { assumptions } => allocation
                .assets()
                .iter()
                .map(|asset| {
                    let a = assumptions.get(asset).ok_or_else(|| {
                        SimError::InvalidAllocation(format!(
                            "No return assumption for asset '{}'",
                            asset
                        ))
                    })?;
                    normal(a.annual_return, a.annual_volatility)
                })
                .collect::<Result<Vec<_>>>()
                .map(PeriodSampler::PerAsset),
        }
    }
}

impl From<ReturnEstimate> for ReturnProcess {
    fn from(est: ReturnEstimate) -> Self {
        ReturnProcess::portfolio(est.annual_return, est.annual_volatility)
    }
}

enum PeriodSampler {
    Shared(Normal<f64>),
    PerAsset(Vec<Normal<f64>>),
}

impl PeriodSampler {
    fn fill<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut [f64]) {
        match self {
            PeriodSampler::Shared(d) => out.fill(d.sample(rng)),
            PeriodSampler::PerAsset(ds) => {
                for (slot, d) in out.iter_mut().zip(ds.iter()) {
                    *slot = d.sample(rng);
                }
            }
        }
    }
}

/// Configuration for a Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Starting portfolio value.
    pub initial_investment: f64,
    /// Number of periods simulated per path.
    pub horizon_periods: usize,
    /// Number of independent paths.
    pub num_paths: usize,
    /// Period granularity.
    pub frequency: Frequency,
    /// Amount added at the end of every period, split by target weight.
    pub contribution_per_period: f64,
    /// Fraction of the initial investment lost before the first period.
    #[serde(default)]
    pub initial_loss: f64,
    /// Master seed for reproducibility (None for entropy).
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_investment: 10_000.0,
            horizon_periods: 120,
            num_paths: 1000,
            frequency: Frequency::Monthly,
            contribution_per_period: 0.0,
            initial_loss: 0.0,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn new(initial_investment: f64, horizon_periods: usize, num_paths: usize) -> Self {
        Self {
            initial_investment,
            horizon_periods,
            num_paths,
            ..Default::default()
        }
    }

    pub fn with_investment(mut self, amount: f64) -> Self {
        self.initial_investment = amount;
        self
    }

    pub fn with_horizon(mut self, periods: usize) -> Self {
        self.horizon_periods = periods;
        self
    }

    pub fn with_paths(mut self, n: usize) -> Self {
        self.num_paths = n;
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_contribution(mut self, amount: f64) -> Self {
        self.contribution_per_period = amount;
        self
    }

    /// Start every path below the amount invested, e.g. after a crash.
    pub fn with_initial_loss(mut self, fraction: f64) -> Self {
        self.initial_loss = fraction;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn periods_per_year(&self) -> f64 {
        self.frequency.periods_per_year()
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.initial_investment.is_finite() && self.initial_investment > 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "Initial investment must be positive, got {}",
                self.initial_investment
            )));
        }
        if self.horizon_periods == 0 {
            return Err(SimError::InvalidConfiguration(
                "Horizon must be at least one period".to_string(),
            ));
        }
        if self.num_paths == 0 {
            return Err(SimError::InvalidConfiguration(
                "Number of paths must be positive".to_string(),
            ));
        }
        if !self.contribution_per_period.is_finite() || self.contribution_per_period < 0.0 {
            return Err(SimError::InvalidConfiguration(format!(
                "Contribution must be a non-negative amount, got {}",
                self.contribution_per_period
            )));
        }
        if !(0.0..1.0).contains(&self.initial_loss) {
            return Err(SimError::InvalidConfiguration(format!(
                "Initial loss must be in [0, 1), got {}",
                self.initial_loss
            )));
        }
        Ok(())
    }
}

/// All simulated trajectories plus the terminal-value distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Configuration used.
    pub config: SimulationConfig,
    /// Value history per path; `horizon_periods + 1` points including the start.
    pub paths: Vec<Vec<f64>>,
    /// Final value of each path, same order as `paths`.
    pub terminal_values: Vec<f64>,
    /// Number of rebalances performed on each path.
    pub rebalance_counts: Vec<usize>,
}

impl SimulationResult {
    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    pub fn initial_investment(&self) -> f64 {
        self.config.initial_investment
    }

    pub fn periods_per_year(&self) -> f64 {
        self.config.periods_per_year()
    }

    /// Total money put in over the horizon (initial plus contributions).
    ///
    /// An initial loss does not reduce this amount.
    pub fn total_invested(&self) -> f64 {
        self.config.initial_investment
            + self.config.contribution_per_period * self.config.horizon_periods as f64
    }

    /// Mean value across paths at every period.
    pub fn mean_path(&self) -> Vec<f64> {
        let len = self.paths.first().map(|p| p.len()).unwrap_or(0);
        let n = self.paths.len() as f64;
        (0..len)
            .map(|t| self.paths.iter().map(|p| p[t]).sum::<f64>() / n)
            .collect()
    }

    /// Period-over-period returns of one path. Periods starting at zero are skipped.
    pub fn path_returns(&self, index: usize) -> Vec<f64> {
        self.paths
            .get(index)
            .map(|p| {
                p.windows(2)
                    .filter(|w| w[0] > 0.0)
                    .map(|w| w[1] / w[0] - 1.0)
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct PathOutcome {
    values: Vec<f64>,
    rebalances: usize,
}

/// Monte Carlo engine for portfolio value paths.
pub struct PathSimulator {
    config: SimulationConfig,
}

impl PathSimulator {
    /// Create a simulator, validating the configuration.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run using the configured seed, or fresh entropy when none is set.
    pub fn run(
        &self,
        allocation: &AllocationVector,
        process: &ReturnProcess,
        policy: RebalancePolicy,
    ) -> Result<SimulationResult> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.simulate(allocation, process, policy, &mut rng)
    }

    /// Run with a caller-owned generator.
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        allocation: &AllocationVector,
        process: &ReturnProcess,
        policy: RebalancePolicy,
        rng: &mut R,
    ) -> Result<SimulationResult> {
        policy.validate()?;
        let ppy = self.config.periods_per_year();
        let sampler = process.sampler(allocation, ppy)?;

        info!(
            "Simulating {} paths over {} {} periods (rebalance: {})",
            self.config.num_paths, self.config.horizon_periods, self.config.frequency, policy
        );

        let seeds: Vec<u64> = (0..self.config.num_paths).map(|_| rng.gen()).collect();

        let outcomes: Vec<PathOutcome> = seeds
            .par_iter()
            .map(|&seed| self.simulate_path(seed, allocation, &sampler, policy))
            .collect();

        let mut paths = Vec::with_capacity(outcomes.len());
        let mut rebalance_counts = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            rebalance_counts.push(outcome.rebalances);
            paths.push(outcome.values);
        }
        let terminal_values: Vec<f64> = paths
            .iter()
            .map(|p| p.last().copied().unwrap_or(0.0))
            .collect();

        debug!(
            "Simulation finished: mean terminal value {:.2}",
            terminal_values.iter().sum::<f64>() / terminal_values.len() as f64
        );

        Ok(SimulationResult {
            config: self.config.clone(),
            paths,
            terminal_values,
            rebalance_counts,
        })
    }

    fn simulate_path(
        &self,
        seed: u64,
        allocation: &AllocationVector,
        sampler: &PeriodSampler,
        policy: RebalancePolicy,
    ) -> PathOutcome {
        let mut rng = StdRng::seed_from_u64(seed);
        let opening = self.config.initial_investment * (1.0 - self.config.initial_loss);
        let mut state = PortfolioState::new(opening, allocation);
        let mut returns = vec![0.0; allocation.len()];

        for period in 1..=self.config.horizon_periods {
            sampler.fill(&mut rng, &mut returns);
            state.apply_returns(&returns);
            state.contribute(self.config.contribution_per_period);

            if policy.should_rebalance(period, &state.current_weights(), &state.effective_targets())
            {
                state.rebalance(period);
            }
            state.record();
        }

        let rebalances = state.rebalance_periods().len();
        PathOutcome {
            values: state.into_history(),
            rebalances,
        }
    }
}

/// One-call Monte Carlo run with a caller-owned generator.
#[allow(clippy::too_many_arguments)]
pub fn simulate<R: Rng + ?Sized>(
    initial_investment: f64,
    target_allocation: &AllocationVector,
    horizon_periods: usize,
    num_paths: usize,
    frequency: Frequency,
    process: &ReturnProcess,
    policy: RebalancePolicy,
    rng: &mut R,
) -> Result<SimulationResult> {
    let config = SimulationConfig::new(initial_investment, horizon_periods, num_paths)
        .with_frequency(frequency);
    PathSimulator::new(config)?.simulate(target_allocation, process, policy, rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetAssumption;

    fn two_assets() -> AllocationVector {
        AllocationVector::new([("A", 0.6), ("B", 0.4)]).unwrap()
    }

    fn assumptions() -> AssumptionTable {
        let mut t = AssumptionTable::new();
        t.insert("A".into(), AssetAssumption::new(0.08, 0.18));
        t.insert("B".into(), AssetAssumption::new(0.03, 0.05));
        t
    }

    #[test]
    fn test_config_validation() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert!(SimulationConfig::default().with_paths(0).validate().is_err());
        assert!(SimulationConfig::default().with_horizon(0).validate().is_err());
        assert!(SimulationConfig::default().with_investment(0.0).validate().is_err());
        assert!(SimulationConfig::default().with_contribution(-1.0).validate().is_err());
        assert!(SimulationConfig::default().with_initial_loss(1.0).validate().is_err());
        assert!(SimulationConfig::default().with_initial_loss(-0.1).validate().is_err());
    }

    #[test]
    fn test_result_shape() {
        let config = SimulationConfig::default()
            .with_paths(50)
            .with_horizon(12)
            .with_seed(7);
        let result = PathSimulator::new(config)
            .unwrap()
            .run(&two_assets(), &ReturnProcess::portfolio(0.07, 0.15), RebalancePolicy::None)
            .unwrap();

        assert_eq!(result.num_paths(), 50);
        assert_eq!(result.terminal_values.len(), 50);
        for path in &result.paths {
            assert_eq!(path.len(), 13);
            assert_eq!(path[0], 10_000.0);
        }
        assert_eq!(result.mean_path().len(), 13);
        assert_eq!(result.path_returns(0).len(), 12);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let config = SimulationConfig::default()
            .with_paths(100)
            .with_horizon(36)
            .with_seed(12345);
        let simulator = PathSimulator::new(config).unwrap();
        let process = ReturnProcess::per_asset(assumptions());
        let policy = RebalancePolicy::threshold(0.05).unwrap();

        let r1 = simulator.run(&two_assets(), &process, policy).unwrap();
        let r2 = simulator.run(&two_assets(), &process, policy).unwrap();
        assert_eq!(r1.paths, r2.paths);
        assert_eq!(r1.rebalance_counts, r2.rebalance_counts);
    }

    #[test]
    fn test_different_seeds_differ() {
        let process = ReturnProcess::portfolio(0.07, 0.15);
        let run = |seed| {
            PathSimulator::new(SimulationConfig::default().with_paths(20).with_seed(seed))
                .unwrap()
                .run(&two_assets(), &process, RebalancePolicy::None)
                .unwrap()
        };
        assert_ne!(run(1).terminal_values, run(2).terminal_values);
    }

    #[test]
    fn test_deterministic_growth_with_zero_volatility() {
        let config = SimulationConfig::new(10_000.0, 12, 3).with_seed(1);
        let result = PathSimulator::new(config)
            .unwrap()
            .run(
                &AllocationVector::single("A"),
                &ReturnProcess::portfolio(0.10, 0.0),
                RebalancePolicy::periodic(1).unwrap(),
            )
            .unwrap();

        let expected = 10_000.0 * (1.0 + 0.10 / 12.0_f64).powi(12);
        for v in &result.terminal_values {
            assert!((v - expected).abs() < 1e-6);
        }
        assert!(result.rebalance_counts.iter().all(|&c| c == 12));
    }

    #[test]
    fn test_contributions_accumulate() {
        let config = SimulationConfig::new(1_000.0, 10, 1)
            .with_contribution(100.0)
            .with_seed(3);
        let result = PathSimulator::new(config)
            .unwrap()
            .run(
                &two_assets(),
                &ReturnProcess::portfolio(0.0, 0.0),
                RebalancePolicy::None,
            )
            .unwrap();
        assert!((result.terminal_values[0] - 2_000.0).abs() < 1e-9);
        assert!((result.total_invested() - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_initial_loss_keeps_invested_amount() {
        let config = SimulationConfig::new(10_000.0, 12, 2)
            .with_initial_loss(0.3)
            .with_seed(5);
        let result = PathSimulator::new(config)
            .unwrap()
            .run(
                &AllocationVector::single("A"),
                &ReturnProcess::portfolio(0.0, 0.0),
                RebalancePolicy::None,
            )
            .unwrap();
        assert!((result.paths[0][0] - 7_000.0).abs() < 1e-9);
        assert_eq!(result.total_invested(), 10_000.0);
    }

    #[test]
    fn test_contributions_after_total_wipeout_are_invested() {
        let config = SimulationConfig::new(10_000.0, 10, 1)
            .with_frequency(Frequency::Annual)
            .with_contribution(1_000.0)
            .with_seed(2);
        let mut table = AssumptionTable::new();
        table.insert("A".into(), AssetAssumption::new(-3.0, 0.0));
        table.insert("B".into(), AssetAssumption::new(-3.0, 0.0));
        let process = ReturnProcess::per_asset(table);
        let result = PathSimulator::new(config)
            .unwrap()
            .run(&two_assets(), &process, RebalancePolicy::None)
            .unwrap();

        // Each contribution re-funds the wiped assets and is lost again the next period.
        let path = &result.paths[0];
        assert_eq!(path[0], 10_000.0);
        for v in &path[1..] {
            assert!((v - 1_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_extreme_draws_never_go_negative() {
        let config = SimulationConfig::new(10_000.0, 60, 200)
            .with_frequency(Frequency::Annual)
            .with_seed(99);
        let result = PathSimulator::new(config)
            .unwrap()
            .run(
                &two_assets(),
                &ReturnProcess::portfolio(0.0, 1.5),
                RebalancePolicy::periodic(1).unwrap(),
            )
            .unwrap();
        assert!(result.paths.iter().flatten().all(|&v| v >= 0.0));
        assert!(result.terminal_values.iter().any(|&v| v == 0.0));
    }

    #[test]
    fn test_missing_assumption_is_rejected() {
        let alloc = AllocationVector::new([("A", 0.5), ("C", 0.5)]).unwrap();
        let err = PathSimulator::new(SimulationConfig::default().with_seed(1))
            .unwrap()
            .run(&alloc, &ReturnProcess::per_asset(assumptions()), RebalancePolicy::None)
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidAllocation(_)));
    }

    #[test]
    fn test_negative_volatility_is_rejected() {
        let err = PathSimulator::new(SimulationConfig::default().with_seed(1))
            .unwrap()
            .run(&two_assets(), &ReturnProcess::portfolio(0.05, -0.1), RebalancePolicy::None)
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_free_function_uses_caller_rng() {
        let mut rng1 = StdRng::seed_from_u64(5);
        let mut rng2 = StdRng::seed_from_u64(5);
        let process = ReturnProcess::portfolio(0.06, 0.12);
        let a = simulate(5_000.0, &two_assets(), 24, 30, Frequency::Monthly, &process, RebalancePolicy::None, &mut rng1).unwrap();
        let b = simulate(5_000.0, &two_assets(), 24, 30, Frequency::Monthly, &process, RebalancePolicy::None, &mut rng2).unwrap();
        assert_eq!(a.terminal_values, b.terminal_values);
    }
}
