//! Core data types shared by the simulator, risk metrics and optimizer.

use crate::error::{Result, SimError};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Tolerance applied when checking that weights sum to one.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Relative tolerance for symmetry and positive-semidefiniteness checks.
pub const COVARIANCE_TOLERANCE: f64 = 1e-9;

/// Sampling granularity of a return series or simulated path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Trading days (252 per year).
    Daily,
    /// Weeks (52 per year).
    Weekly,
    /// Calendar months (12 per year).
    #[default]
    Monthly,
    /// Quarters (4 per year).
    Quarterly,
    /// Years.
    Annual,
}

impl Frequency {
    /// Number of periods in one year.
    pub fn periods_per_year(self) -> f64 {
        match self {
            Frequency::Daily => 252.0,
            Frequency::Weekly => 52.0,
            Frequency::Monthly => 12.0,
            Frequency::Quarterly => 4.0,
            Frequency::Annual => 1.0,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Annual => "annual",
        };
        write!(f, "{}", label)
    }
}

/// Investor risk profile used to scale assumption-mode returns and volatilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    /// Multiplier applied to both expected return and volatility.
    pub fn multiplier(self) -> f64 {
        match self {
            RiskTolerance::Conservative => 0.8,
            RiskTolerance::Moderate => 1.0,
            RiskTolerance::Aggressive => 1.2,
        }
    }
}

/// Explicit annualized return and volatility assumption for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetAssumption {
    pub annual_return: f64,
    pub annual_volatility: f64,
}

impl AssetAssumption {
    pub fn new(annual_return: f64, annual_volatility: f64) -> Self {
        Self {
            annual_return,
            annual_volatility,
        }
    }
}

/// Per-period returns for a fixed, ordered set of assets.
///
/// Rows are periods, columns follow [`AssetReturnSeries::assets`]. Every asset
/// has a value for every period; the series is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetReturnSeries {
    assets: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl AssetReturnSeries {
    /// Build a series from period rows aligned with `assets`.
    pub fn new(assets: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        validate_asset_ids(&assets)?;
        if rows.is_empty() {
            return Err(SimError::DataError(
                "Return series must contain at least one period".to_string(),
            ));
        }
        for (period, row) in rows.iter().enumerate() {
            if row.len() != assets.len() {
                return Err(SimError::DataError(format!(
                    "Period {} has {} returns, expected {}",
                    period,
                    row.len(),
                    assets.len()
                )));
            }
            if let Some(v) = row.iter().find(|v| !v.is_finite()) {
                return Err(SimError::DataError(format!(
                    "Non-finite return {} at period {}",
                    v, period
                )));
            }
        }
        Ok(Self { assets, rows })
    }

    /// Build a series from one column of returns per asset.
    pub fn from_columns(assets: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if columns.len() != assets.len() {
            return Err(SimError::DataError(format!(
                "{} columns supplied for {} assets",
                columns.len(),
                assets.len()
            )));
        }
        let periods = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some((i, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != periods) {
            return Err(SimError::DataError(format!(
                "Asset {} has {} periods, expected {}",
                assets[i],
                c.len(),
                periods
            )));
        }
        let rows = (0..periods)
            .map(|t| columns.iter().map(|c| c[t]).collect())
            .collect();
        Self::new(assets, rows)
    }

    /// Convert an aligned price table into simple period returns.
    pub fn from_prices(assets: Vec<String>, prices: &[Vec<f64>]) -> Result<Self> {
        if prices.len() < 2 {
            return Err(SimError::DataError(
                "Need at least two price rows to compute returns".to_string(),
            ));
        }
        let rows = prices
            .windows(2)
            .enumerate()
            .map(|(t, w)| {
                w[0].iter()
                    .zip(w[1].iter())
                    .map(|(&p0, &p1)| {
                        if p0 <= 0.0 {
                            Err(SimError::DataError(format!(
                                "Non-positive price {} at row {}",
                                p0, t
                            )))
                        } else {
                            Ok(p1 / p0 - 1.0)
                        }
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(assets, rows)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn num_periods(&self) -> usize {
        self.rows.len()
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    /// Index of an asset in column order.
    pub fn index_of(&self, asset: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    /// All returns for a single asset.
    pub fn column(&self, asset: &str) -> Option<Vec<f64>> {
        let idx = self.index_of(asset)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }
}

/// Non-negative target weights keyed by asset, summing to one.
///
/// Asset order is preserved from construction so that optimizer results line
/// up with the mean vector and covariance matrix they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationVector {
    assets: Vec<String>,
    weights: Vec<f64>,
}

impl AllocationVector {
    /// Build an allocation whose weights already sum to one.
    pub fn new<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Result<Self> {
        let (assets, weights) = split_pairs(pairs)?;
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(SimError::InvalidAllocation(format!(
                "Weights sum to {:.8}, expected 1.0",
                total
            )));
        }
        Ok(Self { assets, weights })
    }

    /// Build an allocation by scaling weights to sum to one.
    ///
    /// Fails when any weight is negative or the total is not positive.
    pub fn normalized<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Result<Self> {
        let (assets, mut weights) = split_pairs(pairs)?;
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(SimError::InvalidAllocation(format!(
                "Cannot normalize weights with total {}",
                total
            )));
        }
        for w in weights.iter_mut() {
            *w /= total;
        }
        Ok(Self { assets, weights })
    }

    /// Allocate everything to one asset.
    pub fn single(asset: impl Into<String>) -> Self {
        Self {
            assets: vec![asset.into()],
            weights: vec![1.0],
        }
    }

    /// Equal weight across the given assets.
    pub fn equal_weight(assets: &[String]) -> Result<Self> {
        Self::normalized(assets.iter().map(|a| (a.clone(), 1.0)))
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn weight(&self, asset: &str) -> Option<f64> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|i| self.weights[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.assets
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().copied())
    }

    /// Weights re-ordered to match `universe`, zero for assets not held.
    ///
    /// Fails when the allocation names an asset absent from `universe`.
    pub fn aligned_to(&self, universe: &[String]) -> Result<Vec<f64>> {
        if let Some(missing) = self.assets.iter().find(|a| !universe.contains(a)) {
            return Err(SimError::InvalidAllocation(format!(
                "Asset '{}' is not present in the input data",
                missing
            )));
        }
        Ok(universe
            .iter()
            .map(|a| self.weight(a).unwrap_or(0.0))
            .collect())
    }
}

fn split_pairs<S: Into<String>>(
    pairs: impl IntoIterator<Item = (S, f64)>,
) -> Result<(Vec<String>, Vec<f64>)> {
    let (assets, weights): (Vec<String>, Vec<f64>) =
        pairs.into_iter().map(|(a, w)| (a.into(), w)).unzip();
    validate_asset_ids(&assets).map_err(|e| SimError::InvalidAllocation(e.to_string()))?;
    for (asset, &w) in assets.iter().zip(weights.iter()) {
        if !w.is_finite() {
            return Err(SimError::InvalidAllocation(format!(
                "Weight for '{}' is not finite",
                asset
            )));
        }
        if w < 0.0 {
            return Err(SimError::InvalidAllocation(format!(
                "Negative weight {} for '{}'",
                w, asset
            )));
        }
    }
    Ok((assets, weights))
}

fn validate_asset_ids(assets: &[String]) -> Result<()> {
    if assets.is_empty() {
        return Err(SimError::DataError("At least one asset is required".to_string()));
    }
    let mut seen = HashSet::new();
    for a in assets {
        if !seen.insert(a.as_str()) {
            return Err(SimError::DataError(format!("Duplicate asset '{}'", a)));
        }
    }
    Ok(())
}

/// Symmetric positive-semidefinite covariance matrix of per-asset returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    matrix: DMatrix<f64>,
}

impl CovarianceMatrix {
    /// Build from row vectors, checking shape, symmetry and semidefiniteness.
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(SimError::InvalidConfiguration(
                "Covariance matrix must not be empty".to_string(),
            ));
        }
        if rows.iter().any(|r| r.len() != n) {
            return Err(SimError::InvalidConfiguration(
                "Covariance matrix must be square".to_string(),
            ));
        }
        if rows.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SimError::SingularCovariance(
                "Covariance matrix contains non-finite entries".to_string(),
            ));
        }
        let matrix = DMatrix::from_fn(n, n, |i, j| rows[i][j]);
        Self::from_matrix(matrix)
    }

    /// Diagonal matrix for uncorrelated assets.
    pub fn from_variances(variances: &[f64]) -> Result<Self> {
        let n = variances.len();
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { variances[i] } else { 0.0 }).collect())
            .collect();
        Self::new(rows)
    }

    fn from_matrix(matrix: DMatrix<f64>) -> Result<Self> {
        let n = matrix.nrows();
        let scale = matrix.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-12);

        for i in 0..n {
            if matrix[(i, i)] < 0.0 {
                return Err(SimError::SingularCovariance(format!(
                    "Negative variance {} on diagonal {}",
                    matrix[(i, i)],
                    i
                )));
            }
            for j in (i + 1)..n {
                if (matrix[(i, j)] - matrix[(j, i)]).abs() > COVARIANCE_TOLERANCE * scale {
                    return Err(SimError::SingularCovariance(format!(
                        "Matrix is not symmetric at ({}, {})",
                        i, j
                    )));
                }
            }
        }

        let eigen = SymmetricEigen::new(matrix.clone());
        let min_eigen = eigen.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
        if min_eigen < -COVARIANCE_TOLERANCE * scale * n as f64 {
            return Err(SimError::SingularCovariance(format!(
                "Matrix is not positive semidefinite (min eigenvalue {:.3e})",
                min_eigen
            )));
        }

        Ok(Self { matrix })
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[(i, j)]
    }

    pub fn variance(&self, i: usize) -> f64 {
        self.matrix[(i, i)]
    }

    /// Smallest eigenvalue, useful to tell singular from merely ill-conditioned inputs.
    pub fn min_eigenvalue(&self) -> f64 {
        SymmetricEigen::new(self.matrix.clone())
            .eigenvalues
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }

    /// `wᵗΣw`.
    pub fn quad_form(&self, weights: &[f64]) -> f64 {
        let w = DVector::from_column_slice(weights);
        w.dot(&(&self.matrix * &w))
    }

    /// `Σw`.
    pub fn mul_vec(&self, weights: &[f64]) -> Vec<f64> {
        let w = DVector::from_column_slice(weights);
        (&self.matrix * w).iter().copied().collect()
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.dim())
            .map(|i| (0..self.dim()).map(|j| self.matrix[(i, j)]).collect())
            .collect()
    }
}
