//! Portsim - Monte Carlo portfolio simulation, risk metrics and mean-variance optimization.
//!
//! # Overview
//!
//! Portsim projects the value of a multi-asset portfolio forward under a
//! stochastic return model, measures the risk of the resulting distribution
//! and searches for efficient allocations:
//!
//! - **Return models**: portfolio moments from historical series or from per-asset assumptions
//! - **Monte Carlo paths**: seeded, parallel simulation with contributions and rebalancing
//! - **Rebalancing policies**: none, periodic or drift threshold
//! - **Risk metrics**: VaR, CVaR, probability of loss, percentile bands, Sharpe, drawdown
//! - **Stress scenarios**: market crash, prolonged recession, high inflation
//! - **Historical replay**: compare rebalancing policies on observed prices
//! - **Optimization**: minimum variance, efficient frontier and tangency portfolios
//! - **Configuration files**: TOML-based configuration for reproducible runs
//!
//! # Quick Start
//!
//! ```no_run
//! use portsim::{
//!     monte_carlo::{PathSimulator, ReturnProcess, SimulationConfig},
//!     rebalance::RebalancePolicy,
//!     risk::RiskReport,
//!     types::AllocationVector,
//! };
//!
//! let allocation = AllocationVector::new([("stocks", 0.6), ("bonds", 0.4)]).unwrap();
//! let config = SimulationConfig::new(10_000.0, 120, 1_000).with_seed(42);
//!
//! let result = PathSimulator::new(config)
//!     .unwrap()
//!     .run(&allocation, &ReturnProcess::portfolio(0.07, 0.12), RebalancePolicy::None)
//!     .unwrap();
//!
//! let report = RiskReport::from_simulation(&result, 0.95).unwrap();
//! println!("95% VaR: {:.2}", report.value_at_risk);
//! ```
//!
//! # Modules
//!
//! - [`types`]: Allocations, return series, covariance matrices
//! - [`return_model`]: Portfolio return moments
//! - [`portfolio`]: Holdings and value tracking along one path
//! - [`rebalance`]: Rebalancing policies
//! - [`monte_carlo`]: Path simulation
//! - [`risk`]: Risk and performance metrics
//! - [`stress`]: Stress scenarios
//! - [`replay`]: Historical policy replay
//! - [`optimizer`]: Mean-variance optimization
//! - [`planning`]: Savings goal arithmetic
//! - [`data`]: CSV loading
//! - [`config`]: TOML configuration file support
//! - [`report`]: Terminal and JSON output

pub mod config;
pub mod data;
pub mod error;
pub mod monte_carlo;
pub mod optimizer;
pub mod planning;
pub mod portfolio;
pub mod rebalance;
pub mod replay;
pub mod report;
pub mod return_model;
pub mod risk;
pub mod stress;
pub mod types;

// Re-exports for convenience
pub use config::PortsimFileConfig;
pub use error::{Result, SimError};
pub use monte_carlo::{simulate, PathSimulator, ReturnProcess, SimulationConfig, SimulationResult};
pub use optimizer::{MeanVarianceOptimizer, Objective, OptimizationResult};
pub use rebalance::RebalancePolicy;
pub use replay::{compare_policies, replay, PriceHistory, ReplayResult};
pub use report::ReportFormatter;
pub use return_model::{assumption_estimate, historical_estimate, ReturnEstimate};
pub use risk::{
    conditional_value_at_risk, max_drawdown, percentile_bands, probability_of_loss, sharpe_ratio,
    value_at_risk, PerformanceSummary, RiskReport,
};
pub use stress::{run_stress_test, StressComparison, StressScenario};
pub use types::{
    AllocationVector, AssetAssumption, AssetReturnSeries, CovarianceMatrix, Frequency,
    RiskTolerance,
};
