//! Long-only mean-variance optimization.
//!
//! Inputs are per-period mean returns and a per-period covariance matrix;
//! everything reported is annualized (`μ·ppy`, `Σ·ppy`). Weights are
//! constrained to `Σw = 1`, `0 ≤ wᵢ ≤ 1`.
//!
//! The minimum-variance and frontier problems are convex QPs solved with
//! clarabel. The tangency portfolio is non-convex in general; it is located by
//! comparing a convex reformulation (when some asset beats the risk-free rate)
//! against a projected-gradient ascent on the Sharpe ratio started from equal
//! weights, every single-asset corner, and a set of seeded random weights.

use crate::error::{Result, SimError};
use crate::return_model::estimate_moments;
use crate::types::{AllocationVector, AssetReturnSeries, CovarianceMatrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const GRADIENT_MAX_ITER: usize = 5_000;
const MIN_STEP: f64 = 1e-14;
const MAX_STEP: f64 = 16.0;
const CONVERGENCE_TOL: f64 = 1e-10;
const TARGET_TOL: f64 = 1e-9;

/// Which problem produced an [`OptimizationResult`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "objective", rename_all = "snake_case")]
pub enum Objective {
    MinVariance,
    MaxSharpe { risk_free_rate: f64 },
    FrontierPoint { target_return: f64 },
}

/// An allocation with its annualized return and volatility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub allocation: AllocationVector,
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub objective: Objective,
}

impl OptimizationResult {
    /// `(return - rf) / volatility`, or None for a riskless portfolio.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> Option<f64> {
        if self.annual_volatility > 0.0 {
            Some((self.annual_return - risk_free_rate) / self.annual_volatility)
        } else {
            None
        }
    }
}

/// A random long-only portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledPortfolio {
    pub weights: Vec<f64>,
    pub annual_return: f64,
    pub annual_volatility: f64,
}

/// Mean-variance optimizer over a fixed asset universe.
#[derive(Debug, Clone)]
pub struct MeanVarianceOptimizer {
    assets: Vec<String>,
    mean_returns: Vec<f64>,
    covariance: CovarianceMatrix,
    periods_per_year: f64,
    max_iter: u32,
    restarts: usize,
    seed: u64,
}

impl MeanVarianceOptimizer {
    /// Create an optimizer from per-period moments.
    pub fn new(
        assets: Vec<String>,
        mean_returns: Vec<f64>,
        covariance: CovarianceMatrix,
        periods_per_year: f64,
    ) -> Result<Self> {
        let n = assets.len();
        if n == 0 {
            return Err(SimError::InvalidConfiguration(
                "Optimizer needs at least one asset".to_string(),
            ));
        }
        if mean_returns.len() != n || covariance.dim() != n {
            return Err(SimError::InvalidConfiguration(format!(
                "Dimension mismatch: {} assets, {} mean returns, {}x{} covariance",
                n,
                mean_returns.len(),
                covariance.dim(),
                covariance.dim()
            )));
        }
        if mean_returns.iter().any(|m| !m.is_finite()) {
            return Err(SimError::InvalidConfiguration(
                "Mean returns must be finite".to_string(),
            ));
        }
        if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "periods_per_year must be positive, got {}",
                periods_per_year
            )));
        }

        Ok(Self {
            assets,
            mean_returns,
            covariance,
            periods_per_year,
            max_iter: 100,
            restarts: 8,
            seed: 42,
        })
    }

    /// Estimate moments from a return series and build the optimizer.
    pub fn from_series(series: &AssetReturnSeries, periods_per_year: f64) -> Result<Self> {
        let (means, cov) = estimate_moments(series)?;
        Self::new(series.assets().to_vec(), means, cov, periods_per_year)
    }

    /// Iteration cap for the QP solver.
    pub fn with_max_iter(mut self, max_iter: u32) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Number of random starting points for the tangency search.
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    fn num_assets(&self) -> usize {
        self.assets.len()
    }

    fn annual_means(&self) -> Vec<f64> {
        self.mean_returns
            .iter()
            .map(|m| m * self.periods_per_year)
            .collect()
    }

    /// Annualized expected return `wᵗμ·ppy`.
    pub fn portfolio_return(&self, weights: &[f64]) -> f64 {
        weights
            .iter()
            .zip(self.mean_returns.iter())
            .map(|(w, m)| w * m)
            .sum::<f64>()
            * self.periods_per_year
    }

    /// Annualized variance `wᵗΣw·ppy`.
    pub fn portfolio_variance(&self, weights: &[f64]) -> f64 {
        self.covariance.quad_form(weights) * self.periods_per_year
    }

    pub fn portfolio_volatility(&self, weights: &[f64]) -> f64 {
        self.portfolio_variance(weights).max(0.0).sqrt()
    }

    fn sharpe_of(&self, weights: &[f64], risk_free_rate: f64) -> Option<f64> {
        let var = self.portfolio_variance(weights);
        if var <= 1e-18 {
            return None;
        }
        Some((self.portfolio_return(weights) - risk_free_rate) / var.sqrt())
    }

    fn to_result(&self, weights: &[f64], objective: Objective) -> Result<OptimizationResult> {
        let clean: Vec<f64> = weights.iter().map(|w| w.max(0.0)).collect();
        let allocation =
            AllocationVector::normalized(self.assets.iter().cloned().zip(clean.iter().copied()))?;
        let w = allocation.weights();
        Ok(OptimizationResult {
            annual_return: self.portfolio_return(w),
            annual_volatility: self.portfolio_volatility(w),
            allocation,
            objective,
        })
    }

    /// Minimize `wᵗΣw` over the long-only simplex.
    pub fn min_variance_portfolio(&self) -> Result<OptimizationResult> {
        let all: Vec<usize> = (0..self.num_assets()).collect();
        let weights = self.solve_qp(&all, &[vec![1.0; all.len()]], &[1.0], "min-variance")?;
        let result = self.to_result(&weights, Objective::MinVariance)?;
        info!(
            "Min-variance portfolio: return {:.4}, volatility {:.4}",
            result.annual_return, result.annual_volatility
        );
        Ok(result)
    }

    /// Minimum-variance portfolio with annualized return equal to `target_return`.
    pub fn frontier_portfolio(&self, target_return: f64) -> Result<OptimizationResult> {
        let means = self.annual_means();
        let lo = means.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let slack = TARGET_TOL * hi.abs().max(1.0);
        if !target_return.is_finite() || target_return > hi + slack || target_return < lo - slack {
            return Err(SimError::OptimizationFailure(format!(
                "Target return {:.4} is infeasible; achievable range is [{:.4}, {:.4}]",
                target_return, lo, hi
            )));
        }

        // At either end of the range only the assets attaining it can be held.
        let boundary = if target_return >= hi - slack {
            Some(hi)
        } else if target_return <= lo + slack {
            Some(lo)
        } else {
            None
        };
        let weights = match boundary {
            Some(edge) => {
                let idx: Vec<usize> = (0..means.len())
                    .filter(|&i| (means[i] - edge).abs() <= slack)
                    .collect();
                self.solve_qp(&idx, &[vec![1.0; idx.len()]], &[1.0], "frontier")?
            }
            None => {
                let all: Vec<usize> = (0..means.len()).collect();
                self.solve_qp(
                    &all,
                    &[vec![1.0; all.len()], means],
                    &[1.0, target_return],
                    "frontier",
                )?
            }
        };
        self.to_result(&weights, Objective::FrontierPoint { target_return })
    }

    /// Frontier portfolios for every target, solved in parallel, in input order.
    pub fn frontier_portfolios(&self, target_returns: &[f64]) -> Result<Vec<OptimizationResult>> {
        target_returns
            .par_iter()
            .map(|&t| self.frontier_portfolio(t))
            .collect()
    }

    /// `(volatility, return)` pairs tracing the efficient frontier.
    pub fn efficient_frontier(&self, target_returns: &[f64]) -> Result<Vec<(f64, f64)>> {
        let points = self.frontier_portfolios(target_returns)?;
        Ok(points
            .iter()
            .map(|p| (p.annual_volatility, p.annual_return))
            .collect())
    }

    /// Evenly spaced targets from the min-variance return to the best single-asset return.
    pub fn frontier_targets(&self, points: usize) -> Result<Vec<f64>> {
        if points < 2 {
            return Err(SimError::InvalidConfiguration(
                "Frontier needs at least two points".to_string(),
            ));
        }
        let start = self.min_variance_portfolio()?.annual_return;
        let end = self
            .annual_means()
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max);
        let step = (end - start) / (points - 1) as f64;
        Ok((0..points).map(|i| start + step * i as f64).collect())
    }

    /// Maximize `(wᵗμ·ppy - rf) / sqrt(wᵗΣw·ppy)` over the long-only simplex.
    pub fn tangency_portfolio(&self, risk_free_rate: f64) -> Result<OptimizationResult> {
        let mut candidates: Vec<(Vec<f64>, f64)> = Vec::new();

        match self.convex_tangency(risk_free_rate) {
            Ok(Some(w)) => {
                if let Some(s) = self.sharpe_of(&w, risk_free_rate) {
                    debug!("Convex tangency candidate: sharpe {:.6}", s);
                    candidates.push((w, s));
                }
            }
            Ok(None) => debug!("No asset beats the risk-free rate; skipping convex reformulation"),
            Err(e) => warn!("Convex tangency solve failed: {}", e),
        }

        let starts = self.starting_points();
        let ascents: Vec<Option<(Vec<f64>, f64)>> = starts
            .par_iter()
            .map(|start| self.sharpe_ascent(start, risk_free_rate))
            .collect();
        let converged = ascents.iter().filter(|a| a.is_some()).count();
        debug!("Sharpe ascent: {}/{} starts converged", converged, starts.len());
        candidates.extend(ascents.into_iter().flatten());

        let (weights, sharpe) = candidates
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| {
                SimError::OptimizationFailure(
                    "Tangency search did not converge from any starting point".to_string(),
                )
            })?;

        let result = self.to_result(&weights, Objective::MaxSharpe { risk_free_rate })?;
        info!(
            "Tangency portfolio: return {:.4}, volatility {:.4}, sharpe {:.4}",
            result.annual_return, result.annual_volatility, sharpe
        );
        Ok(result)
    }

    /// Random long-only portfolios with their annualized return and volatility.
    pub fn sample_portfolios<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<SampledPortfolio> {
        (0..count)
            .map(|_| {
                let weights = random_weights(self.num_assets(), rng);
                SampledPortfolio {
                    annual_return: self.portfolio_return(&weights),
                    annual_volatility: self.portfolio_volatility(&weights),
                    weights,
                }
            })
            .collect()
    }

    /// Charnes-Cooper form: min `yᵗΣy` s.t. `(μ - rf)ᵗy = 1`, `y ≥ 0`, then `w = y / Σy`.
    fn convex_tangency(&self, risk_free_rate: f64) -> Result<Option<Vec<f64>>> {
        let excess: Vec<f64> = self
            .annual_means()
            .iter()
            .map(|m| m - risk_free_rate)
            .collect();
        if excess.iter().all(|&e| e <= 0.0) {
            return Ok(None);
        }
        let all: Vec<usize> = (0..excess.len()).collect();
        let y = self.solve_qp(&all, &[excess], &[1.0], "tangency")?;
        let total: f64 = y.iter().sum();
        if total <= 0.0 {
            return Ok(None);
        }
        Ok(Some(y.iter().map(|v| v / total).collect()))
    }

    fn starting_points(&self) -> Vec<Vec<f64>> {
        let n = self.num_assets();
        let mut starts = vec![vec![1.0 / n as f64; n]];
        for i in 0..n {
            let mut corner = vec![0.0; n];
            corner[i] = 1.0;
            starts.push(corner);
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.restarts {
            starts.push(random_weights(n, &mut rng));
        }
        starts
    }

    /// Projected-gradient ascent on the Sharpe ratio with backtracking.
    ///
    /// Returns None if the iteration cap is hit or the start has zero variance.
    fn sharpe_ascent(&self, start: &[f64], risk_free_rate: f64) -> Option<(Vec<f64>, f64)> {
        let mut w = project_to_simplex(start);
        let mut sharpe = self.sharpe_of(&w, risk_free_rate)?;
        let mut step = 1.0;

        for _ in 0..GRADIENT_MAX_ITER {
            let grad = self.sharpe_gradient(&w, risk_free_rate)?;

            let mut trial = step;
            let mut accepted = None;
            while trial > MIN_STEP {
                let moved: Vec<f64> = w.iter().zip(grad.iter()).map(|(x, g)| x + trial * g).collect();
                let candidate = project_to_simplex(&moved);
                match self.sharpe_of(&candidate, risk_free_rate) {
                    Some(s) if s > sharpe => {
                        accepted = Some((candidate, s));
                        break;
                    }
                    _ => trial *= 0.5,
                }
            }

            let Some((next, next_sharpe)) = accepted else {
                // No ascent direction left on the simplex.
                return Some((w, sharpe));
            };

            let delta = w
                .iter()
                .zip(next.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            let gain = next_sharpe - sharpe;
            w = next;
            sharpe = next_sharpe;
            step = (trial * 2.0).min(MAX_STEP);

            if delta < CONVERGENCE_TOL || gain < CONVERGENCE_TOL * sharpe.abs().max(1.0) * 1e-4 {
                return Some((w, sharpe));
            }
        }
        None
    }

    fn sharpe_gradient(&self, w: &[f64], risk_free_rate: f64) -> Option<Vec<f64>> {
        let var = self.portfolio_variance(w);
        if var <= 1e-18 {
            return None;
        }
        let sd = var.sqrt();
        let excess = self.portfolio_return(w) - risk_free_rate;
        let sigma_w = self.covariance.mul_vec(w);
        Some(
            self.mean_returns
                .iter()
                .zip(sigma_w.iter())
                .map(|(m, sw)| {
                    let dm = m * self.periods_per_year;
                    let dv = sw * self.periods_per_year;
                    dm / sd - excess * dv / (sd * var)
                })
                .collect(),
        )
    }

    /// Minimize `wᵗΣw` over the assets in `idx` subject to `rows·w = rhs` and
    /// `w ≥ 0`. Assets outside `idx` get zero weight; rows are indexed like `idx`.
    fn solve_qp(&self, idx: &[usize], eq_rows: &[Vec<f64>], eq_rhs: &[f64], label: &str) -> Result<Vec<f64>> {
        use clarabel::algebra::*;
        use clarabel::solver::*;

        let n = idx.len();
        let k = eq_rows.len();

        // Objective is ½xᵗPx; P = 2Σ·ppy, upper triangle only.
        let mut p_data = Vec::new();
        let mut p_indices = Vec::new();
        let mut p_indptr = vec![0];
        for j in 0..n {
            for i in 0..=j {
                let val = 2.0 * self.covariance.get(idx[i], idx[j]) * self.periods_per_year;
                if val.abs() > 1e-15 {
                    p_data.push(val);
                    p_indices.push(i);
                }
            }
            p_indptr.push(p_data.len());
        }
        let p = CscMatrix::new(n, n, p_indptr, p_indices, p_data);
        let q = vec![0.0; n];

        // Constraints: k equality rows, then -w <= 0.
        let mut a_data = Vec::new();
        let mut a_indices = Vec::new();
        let mut a_indptr = vec![0];
        for j in 0..n {
            for (r, row) in eq_rows.iter().enumerate() {
                if row[j] != 0.0 {
                    a_data.push(row[j]);
                    a_indices.push(r);
                }
            }
            a_data.push(-1.0);
            a_indices.push(k + j);
            a_indptr.push(a_data.len());
        }
        let a = CscMatrix::new(k + n, n, a_indptr, a_indices, a_data);

        let mut b = eq_rhs.to_vec();
        b.extend(vec![0.0; n]);

        let cones = [ZeroConeT(k), NonnegativeConeT(n)];

        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.max_iter)
            .verbose(false)
            .build()
            .map_err(|e| {
                SimError::OptimizationFailure(format!("Failed to build settings: {}", e))
            })?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings).map_err(|e| {
            SimError::OptimizationFailure(format!("Failed to create solver: {:?}", e))
        })?;

        solver.solve();

        if !matches!(solver.solution.status, SolverStatus::Solved) {
            return Err(SimError::OptimizationFailure(format!(
                "{} solve did not converge: {:?}",
                label, solver.solution.status
            )));
        }
        debug!(
            "{} solve finished in {} iterations",
            label, solver.solution.iterations
        );

        let mut weights = vec![0.0; self.num_assets()];
        for (&i, w) in idx.iter().zip(solver.solution.x.iter()) {
            weights[i] = w.max(0.0);
        }
        Ok(weights)
    }
}

fn random_weights<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<f64> {
    let raw: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / n as f64; n];
    }
    raw.iter().map(|v| v / total).collect()
}

/// Euclidean projection onto `{w : w ≥ 0, Σw = 1}`.
pub fn project_to_simplex(v: &[f64]) -> Vec<f64> {
    let mut u = v.to_vec();
    u.sort_by(|a, b| b.total_cmp(a));
    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (i, &ui) in u.iter().enumerate() {
        cumulative += ui;
        let t = (cumulative - 1.0) / (i + 1) as f64;
        if ui - t > 0.0 {
            theta = t;
        }
    }
    v.iter().map(|x| (x - theta).max(0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("A{}", i)).collect()
    }

    fn uncorrelated() -> MeanVarianceOptimizer {
        let cov = CovarianceMatrix::from_variances(&[0.04, 0.01, 0.0001]).unwrap();
        MeanVarianceOptimizer::new(names(3), vec![0.05, 0.05, 0.05], cov, 1.0).unwrap()
    }

    fn two_asset() -> MeanVarianceOptimizer {
        let cov = CovarianceMatrix::from_variances(&[0.04, 0.01]).unwrap();
        MeanVarianceOptimizer::new(names(2), vec![0.10, 0.05], cov, 1.0).unwrap()
    }

    #[test]
    fn test_min_variance_prefers_low_variance_asset() {
        let result = uncorrelated().min_variance_portfolio().unwrap();
        let w = result.allocation.weights();
        assert!(w[2] > w[1] && w[1] > w[0]);

        // Closed form for uncorrelated assets: w ∝ 1/σ².
        let inv = [25.0, 100.0, 10_000.0];
        let total: f64 = inv.iter().sum();
        for (wi, vi) in w.iter().zip(inv.iter()) {
            assert!((wi - vi / total).abs() < 1e-4);
        }
        assert_eq!(result.objective, Objective::MinVariance);
    }

    #[test]
    fn test_frontier_minimality() {
        let cov = CovarianceMatrix::new(vec![
            vec![0.04, 0.006, 0.0],
            vec![0.006, 0.0225, 0.003],
            vec![0.0, 0.003, 0.01],
        ])
        .unwrap();
        let opt = MeanVarianceOptimizer::new(names(3), vec![0.12, 0.08, 0.04], cov, 1.0).unwrap();
        let min_vol = opt.min_variance_portfolio().unwrap().annual_volatility;
        let targets = opt.frontier_targets(10).unwrap();
        let frontier = opt.efficient_frontier(&targets).unwrap();

        assert_eq!(frontier.len(), 10);
        for (i, (vol, ret)) in frontier.iter().enumerate() {
            assert!(*vol >= min_vol - 1e-6);
            assert!((ret - targets[i]).abs() < 1e-5);
        }
        // Volatility rises along the upper frontier.
        for pair in frontier.windows(2) {
            assert!(pair[1].0 >= pair[0].0 - 1e-6);
        }
    }

    #[test]
    fn test_infeasible_target_is_reported() {
        let err = two_asset().frontier_portfolio(0.5).unwrap_err();
        assert!(matches!(err, SimError::OptimizationFailure(_)));
        assert!(two_asset().efficient_frontier(&[0.06, 0.5]).is_err());
    }

    #[test]
    fn test_tangency_matches_closed_form() {
        // Unconstrained tangency w ∝ Σ⁻¹(μ - rf) = (2.5, 5.0) is already long-only.
        let result = two_asset().tangency_portfolio(0.0).unwrap();
        let w = result.allocation.weights();
        assert!((w[0] - 1.0 / 3.0).abs() < 1e-3);
        assert!((w[1] - 2.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_tangency_beats_random_portfolios() {
        let cov = CovarianceMatrix::new(vec![
            vec![0.09, 0.02, 0.01],
            vec![0.02, 0.04, 0.0],
            vec![0.01, 0.0, 0.0225],
        ])
        .unwrap();
        let opt = MeanVarianceOptimizer::new(names(3), vec![0.14, 0.07, 0.06], cov, 1.0).unwrap();
        let rf = 0.02;
        let best = opt.tangency_portfolio(rf).unwrap();
        let best_sharpe = best.sharpe_ratio(rf).unwrap();

        let mut rng = StdRng::seed_from_u64(11);
        for p in opt.sample_portfolios(500, &mut rng) {
            let s = (p.annual_return - rf) / p.annual_volatility;
            assert!(s <= best_sharpe + 1e-6);
        }
    }

    #[test]
    fn test_tangency_when_nothing_beats_risk_free() {
        let result = two_asset().tangency_portfolio(0.2).unwrap();
        let total: f64 = result.allocation.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_annualization() {
        let cov = CovarianceMatrix::from_variances(&[0.0001]).unwrap();
        let opt = MeanVarianceOptimizer::new(names(1), vec![0.001], cov, 252.0).unwrap();
        assert!((opt.portfolio_return(&[1.0]) - 0.252).abs() < 1e-12);
        assert!((opt.portfolio_volatility(&[1.0]) - (0.0252_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let cov = CovarianceMatrix::from_variances(&[0.04, 0.01]).unwrap();
        let err = MeanVarianceOptimizer::new(names(3), vec![0.1, 0.1, 0.1], cov, 12.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_project_to_simplex() {
        let p = project_to_simplex(&[0.5, 0.5]);
        assert_eq!(p, vec![0.5, 0.5]);
        let p = project_to_simplex(&[2.0, 0.0, -1.0]);
        assert_eq!(p, vec![1.0, 0.0, 0.0]);
        let p = project_to_simplex(&[0.4, 0.4, 0.4]);
        assert!(p.iter().all(|v| (v - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_frontier_targets_grid() {
        let opt = two_asset();
        let targets = opt.frontier_targets(5).unwrap();
        assert_eq!(targets.len(), 5);
        assert!((targets[4] - 0.10).abs() < 1e-12);
        assert!(opt.frontier_targets(1).is_err());
    }
}
