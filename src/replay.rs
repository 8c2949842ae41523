//! Deterministic replay of a rebalancing policy over observed prices.
//!
//! The first row of prices sets the initial unit counts. Every later row is
//! one period: prices move, the policy is consulted with the number of
//! elapsed periods, and the period-end value is recorded.

use crate::error::{Result, SimError};
use crate::portfolio::PortfolioState;
use crate::rebalance::RebalancePolicy;
use crate::risk::PerformanceSummary;
use crate::types::{AllocationVector, AssetReturnSeries};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Aligned price rows for a fixed set of assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    assets: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl PriceHistory {
    pub fn new(assets: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if assets.is_empty() {
            return Err(SimError::DataError("Price history has no assets".to_string()));
        }
        if rows.is_empty() {
            return Err(SimError::DataError("Price history has no rows".to_string()));
        }
        if let Some((i, _)) = rows.iter().enumerate().find(|(_, r)| r.len() != assets.len()) {
            return Err(SimError::DataError(format!(
                "Row {} has a different number of prices than assets ({})",
                i,
                assets.len()
            )));
        }
        if rows.iter().flatten().any(|p| !p.is_finite()) {
            return Err(SimError::DataError("Price history contains missing values".to_string()));
        }
        if rows[0].iter().any(|p| *p <= 0.0) {
            return Err(SimError::DataError(
                "Starting prices must be positive".to_string(),
            ));
        }
        Ok(Self { assets, rows })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_periods(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// Period returns implied by the prices.
    pub fn to_returns(&self) -> Result<AssetReturnSeries> {
        AssetReturnSeries::from_prices(self.assets.clone(), &self.rows)
    }

    /// Column indices of `allocation`'s assets within this history.
    fn columns_for(&self, allocation: &AllocationVector) -> Result<Vec<usize>> {
        allocation
            .assets()
            .iter()
            .map(|a| {
                self.assets.iter().position(|x| x == a).ok_or_else(|| {
                    SimError::InvalidAllocation(format!(
                        "Asset '{}' is not present in the price history",
                        a
                    ))
                })
            })
            .collect()
    }
}

/// Outcome of replaying one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    pub policy: RebalancePolicy,
    /// Assets in allocation order.
    pub assets: Vec<String>,
    /// Total value per row, starting with the initial investment.
    pub values: Vec<f64>,
    /// Per-asset values, same indexing as `values`.
    pub asset_values: Vec<Vec<f64>>,
    /// Periods at which a rebalance happened.
    pub rebalance_periods: Vec<usize>,
}

impl ReplayResult {
    pub fn final_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    pub fn performance(&self, risk_free_rate: f64, periods_per_year: f64) -> Result<PerformanceSummary> {
        PerformanceSummary::from_values(
            &self.values,
            risk_free_rate,
            periods_per_year,
            self.rebalance_periods.len(),
        )
    }
}

/// Replay `policy` over `history` starting from `initial_investment`.
pub fn replay(
    initial_investment: f64,
    allocation: &AllocationVector,
    history: &PriceHistory,
    policy: RebalancePolicy,
) -> Result<ReplayResult> {
    if !(initial_investment.is_finite() && initial_investment > 0.0) {
        return Err(SimError::InvalidConfiguration(format!(
            "Initial investment must be positive, got {}",
            initial_investment
        )));
    }
    policy.validate()?;
    let columns = history.columns_for(allocation)?;
    let select = |row: &[f64]| columns.iter().map(|&c| row[c]).collect::<Vec<f64>>();

    let mut state = PortfolioState::with_prices(initial_investment, allocation, &select(&history.rows[0]));

    for (period, row) in history.rows.iter().enumerate().skip(1) {
        state.set_prices(&select(row));
        if policy.should_rebalance(period, &state.current_weights(), &state.effective_targets()) {
            state.rebalance(period);
        }
        state.record();
    }

    debug!(
        "Replay with policy {} rebalanced {} times",
        policy,
        state.rebalance_periods().len()
    );

    Ok(ReplayResult {
        policy,
        assets: allocation.assets().to_vec(),
        values: state.history().to_vec(),
        asset_values: state.asset_history().to_vec(),
        rebalance_periods: state.rebalance_periods().to_vec(),
    })
}

/// Replay several policies over the same history, in the given order.
pub fn compare_policies(
    initial_investment: f64,
    allocation: &AllocationVector,
    history: &PriceHistory,
    policies: &[RebalancePolicy],
) -> Result<Vec<ReplayResult>> {
    info!(
        "Replaying {} policies over {} periods",
        policies.len(),
        history.num_periods()
    );
    policies
        .iter()
        .map(|&p| replay(initial_investment, allocation, history, p))
        .collect()
}
