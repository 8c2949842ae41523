//! Portfolio-level return and volatility estimation.
//!
//! Two separate risk models live here and are deliberately not unified:
//!
//! - **Historical mode** ([`historical_estimate`]) builds the realized
//!   portfolio return series as the weighted sum of asset returns, so
//!   correlations are captured implicitly.
//! - **Assumption mode** ([`assumption_estimate`]) combines per-asset
//!   volatilities as if the assets were independent (no cross terms). This is
//!   a simplification; the optimizer always uses the full covariance matrix.
//!
//! Annualization uses square-root-of-time scaling, which assumes i.i.d.
//! periods.

use crate::error::{Result, SimError};
use crate::types::{AllocationVector, AssetAssumption, AssetReturnSeries, CovarianceMatrix, RiskTolerance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-asset return assumptions keyed by asset id.
pub type AssumptionTable = BTreeMap<String, AssetAssumption>;

/// Annualized expected return and volatility of a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnEstimate {
    pub annual_return: f64,
    pub annual_volatility: f64,
}

impl ReturnEstimate {
    pub fn new(annual_return: f64, annual_volatility: f64) -> Self {
        Self {
            annual_return,
            annual_volatility,
        }
    }

    /// Mean return of one period.
    pub fn period_mean(&self, periods_per_year: f64) -> f64 {
        self.annual_return / periods_per_year
    }

    /// Standard deviation of one period's return.
    pub fn period_volatility(&self, periods_per_year: f64) -> f64 {
        self.annual_volatility / periods_per_year.sqrt()
    }
}

/// Weighted per-period portfolio returns of a historical series.
pub fn portfolio_returns(
    series: &AssetReturnSeries,
    allocation: &AllocationVector,
) -> Result<Vec<f64>> {
    let weights = allocation.aligned_to(series.assets())?;
    Ok(series
        .rows()
        .iter()
        .map(|row| row.iter().zip(weights.iter()).map(|(r, w)| r * w).sum())
        .collect())
}

/// Annualized estimate from a historical return series.
pub fn historical_estimate(
    series: &AssetReturnSeries,
    allocation: &AllocationVector,
    periods_per_year: f64,
) -> Result<ReturnEstimate> {
    if periods_per_year <= 0.0 {
        return Err(SimError::InvalidConfiguration(
            "periods_per_year must be positive".to_string(),
        ));
    }
    if series.num_periods() < 2 {
        return Err(SimError::DataError(
            "Need at least two periods to estimate volatility".to_string(),
        ));
    }

    let returns = portfolio_returns(series, allocation)?;
    let mean = mean(&returns);
    let std = sample_std(&returns, mean);

    let estimate = ReturnEstimate::new(mean * periods_per_year, std * periods_per_year.sqrt());
    debug!(
        "Historical estimate over {} periods: return {:.4}, volatility {:.4}",
        returns.len(),
        estimate.annual_return,
        estimate.annual_volatility
    );
    Ok(estimate)
}

/// Annualized estimate from explicit per-asset assumptions.
///
/// Portfolio variance is `Σ (wᵢσᵢ)²`, i.e. assets are treated as independent.
/// The risk profile multiplier scales both return and volatility.
pub fn assumption_estimate(
    assumptions: &AssumptionTable,
    allocation: &AllocationVector,
    tolerance: RiskTolerance,
) -> Result<ReturnEstimate> {
    let mut annual_return = 0.0;
    let mut variance = 0.0;

    for (asset, weight) in allocation.iter() {
        let a = assumptions.get(asset).ok_or_else(|| {
            SimError::InvalidAllocation(format!("No return assumption for asset '{}'", asset))
        })?;
        annual_return += weight * a.annual_return;
        variance += (weight * a.annual_volatility).powi(2);
    }

    let m = tolerance.multiplier();
    Ok(ReturnEstimate::new(annual_return * m, variance.sqrt() * m))
}

/// Per-asset assumptions scaled by a risk profile, for per-asset simulation.
pub fn scaled_assumptions(assumptions: &AssumptionTable, tolerance: RiskTolerance) -> AssumptionTable {
    let m = tolerance.multiplier();
    assumptions
        .iter()
        .map(|(k, a)| {
            (
                k.clone(),
                AssetAssumption::new(a.annual_return * m, a.annual_volatility * m),
            )
        })
        .collect()
}

/// Per-period mean vector and sample covariance matrix (n - 1 denominator).
pub fn estimate_moments(series: &AssetReturnSeries) -> Result<(Vec<f64>, CovarianceMatrix)> {
    let t = series.num_periods();
    if t < 2 {
        return Err(SimError::DataError(
            "Need at least two periods to estimate covariance".to_string(),
        ));
    }
    let n = series.num_assets();
    let rows = series.rows();

    let means: Vec<f64> = (0..n)
        .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / t as f64)
        .collect();

    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let c = rows
                .iter()
                .map(|r| (r[i] - means[i]) * (r[j] - means[j]))
                .sum::<f64>()
                / (t - 1) as f64;
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }

    Ok((means, CovarianceMatrix::new(cov)?))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> AssumptionTable {
        let mut t = AssumptionTable::new();
        t.insert("stocks".into(), AssetAssumption::new(0.10, 0.20));
        t.insert("bonds".into(), AssetAssumption::new(0.05, 0.05));
        t.insert("cash".into(), AssetAssumption::new(0.02, 0.01));
        t
    }

    #[test]
    fn test_assumption_estimate_independent_assets() {
        let alloc =
            AllocationVector::new([("stocks", 0.6), ("bonds", 0.3), ("cash", 0.1)]).unwrap();
        let est = assumption_estimate(&table(), &alloc, RiskTolerance::Moderate).unwrap();

        let expected_ret = 0.6 * 0.10 + 0.3 * 0.05 + 0.1 * 0.02;
        let expected_vol = ((0.6_f64 * 0.20).powi(2) + (0.3_f64 * 0.05).powi(2) + (0.1_f64 * 0.01).powi(2)).sqrt();
        assert!((est.annual_return - expected_ret).abs() < 1e-12);
        assert!((est.annual_volatility - expected_vol).abs() < 1e-12);
    }

    #[test]
    fn test_risk_tolerance_scales_return_and_volatility() {
        let alloc = AllocationVector::single("stocks");
        let moderate = assumption_estimate(&table(), &alloc, RiskTolerance::Moderate).unwrap();
        let aggressive = assumption_estimate(&table(), &alloc, RiskTolerance::Aggressive).unwrap();
        let conservative =
            assumption_estimate(&table(), &alloc, RiskTolerance::Conservative).unwrap();

        assert!((aggressive.annual_return - moderate.annual_return * 1.2).abs() < 1e-12);
        assert!((aggressive.annual_volatility - moderate.annual_volatility * 1.2).abs() < 1e-12);
        assert!((conservative.annual_return - moderate.annual_return * 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_assumption_estimate_unknown_asset() {
        let alloc = AllocationVector::new([("stocks", 0.5), ("gold", 0.5)]).unwrap();
        let err = assumption_estimate(&table(), &alloc, RiskTolerance::Moderate).unwrap_err();
        assert!(matches!(err, SimError::InvalidAllocation(_)));
    }

    #[test]
    fn test_historical_estimate() {
        let series = AssetReturnSeries::from_columns(
            vec!["A".into(), "B".into()],
            vec![vec![0.01, 0.03, -0.01, 0.01], vec![0.00, 0.01, 0.01, 0.02]],
        )
        .unwrap();
        let alloc = AllocationVector::new([("A", 0.5), ("B", 0.5)]).unwrap();
        let est = historical_estimate(&series, &alloc, 252.0).unwrap();

        let port = [0.005, 0.02, 0.0, 0.015];
        let m = port.iter().sum::<f64>() / 4.0;
        let sd = (port.iter().map(|r| (r - m).powi(2)).sum::<f64>() / 3.0).sqrt();
        assert!((est.annual_return - m * 252.0).abs() < 1e-12);
        assert!((est.annual_volatility - sd * 252.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_historical_estimate_unknown_asset() {
        let series =
            AssetReturnSeries::from_columns(vec!["A".into()], vec![vec![0.01, 0.02]]).unwrap();
        let alloc = AllocationVector::new([("A", 0.5), ("Z", 0.5)]).unwrap();
        assert!(matches!(
            historical_estimate(&series, &alloc, 12.0),
            Err(SimError::InvalidAllocation(_))
        ));
    }

    #[test]
    fn test_estimate_moments() {
        let series = AssetReturnSeries::from_columns(
            vec!["A".into(), "B".into()],
            vec![vec![0.01, 0.03, 0.02], vec![0.02, 0.00, 0.01]],
        )
        .unwrap();
        let (means, cov) = estimate_moments(&series).unwrap();
        assert!((means[0] - 0.02).abs() < 1e-12);
        assert!((means[1] - 0.01).abs() < 1e-12);
        assert!((cov.variance(0) - 0.0001).abs() < 1e-12);
        assert!((cov.get(0, 1) + 0.0001).abs() < 1e-12);
    }

    #[test]
    fn test_period_scaling() {
        let est = ReturnEstimate::new(0.12, 0.24);
        assert!((est.period_mean(12.0) - 0.01).abs() < 1e-12);
        assert!((est.period_volatility(4.0) - 0.12).abs() < 1e-12);
    }
}
