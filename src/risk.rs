//! Risk metrics over simulated outcome distributions and value trajectories.
//!
//! All functions are pure. Percentiles use linear interpolation between the
//! closest ranks, so `percentile(v, 0.0)` is the minimum and
//! `percentile(v, 1.0)` the maximum.

use crate::error::{Result, SimError};
use crate::monte_carlo::SimulationResult;
use crate::return_model::mean;
use serde::{Deserialize, Serialize};

/// Central statistics of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

/// Value of one percentile at every period of a set of paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub percentile: f64,
    pub values: Vec<f64>,
}

fn require_non_empty(values: &[f64]) -> Result<()> {
    if values.is_empty() {
        return Err(SimError::DegenerateSeries(
            "Empty value distribution".to_string(),
        ));
    }
    Ok(())
}

fn validate_level(level: f64) -> Result<()> {
    if !(level > 0.0 && level < 1.0) {
        return Err(SimError::InvalidConfiguration(format!(
            "Confidence level must be in (0, 1), got {}",
            level
        )));
    }
    Ok(())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
    }
}

/// Percentile `q` in [0, 1] with linear interpolation.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    require_non_empty(values)?;
    if !(0.0..=1.0).contains(&q) {
        return Err(SimError::InvalidConfiguration(format!(
            "Percentile must be in [0, 1], got {}",
            q
        )));
    }
    Ok(percentile_of_sorted(&sorted(values), q))
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn summary(values: &[f64]) -> Result<Summary> {
    require_non_empty(values)?;
    let s = sorted(values);
    let m = mean(values);
    Ok(Summary {
        mean: m,
        median: percentile_of_sorted(&s, 0.5),
        min: s[0],
        max: s[s.len() - 1],
        std_dev: population_std(values, m),
    })
}

/// Two-sided interval: the `(1 - level) / 2` and `1 - (1 - level) / 2` percentiles.
pub fn confidence_interval(values: &[f64], level: f64) -> Result<(f64, f64)> {
    require_non_empty(values)?;
    validate_level(level)?;
    let tail = (1.0 - level) / 2.0;
    let s = sorted(values);
    Ok((percentile_of_sorted(&s, tail), percentile_of_sorted(&s, 1.0 - tail)))
}

/// Loss threshold exceeded with probability `1 - level`, floored at zero.
pub fn value_at_risk(values: &[f64], initial_investment: f64, level: f64) -> Result<f64> {
    validate_level(level)?;
    let threshold = percentile(values, 1.0 - level)?;
    Ok((initial_investment - threshold).max(0.0))
}

/// Expected loss over the outcomes at or below the VaR percentile.
pub fn conditional_value_at_risk(values: &[f64], initial_investment: f64, level: f64) -> Result<f64> {
    validate_level(level)?;
    let threshold = percentile(values, 1.0 - level)?;
    Ok(expected_shortfall(values, initial_investment, threshold))
}

/// `max(0, initial - mean(values <= threshold))`, or 0 when the tail is empty.
pub fn expected_shortfall(values: &[f64], initial_investment: f64, threshold: f64) -> f64 {
    let tail: Vec<f64> = values.iter().copied().filter(|v| *v <= threshold).collect();
    if tail.is_empty() {
        return 0.0;
    }
    (initial_investment - mean(&tail)).max(0.0)
}

/// Normal-approximation VaR from the mean and standard deviation of the outcomes.
pub fn parametric_var(values: &[f64], initial_investment: f64, level: f64) -> Result<f64> {
    validate_level(level)?;
    let s = summary(values)?;
    let z = inverse_normal_cdf(1.0 - level);
    Ok((initial_investment - (s.mean + z * s.std_dev)).max(0.0))
}

/// Fraction of outcomes that end below the amount invested.
pub fn probability_of_loss(values: &[f64], invested: f64) -> Result<f64> {
    require_non_empty(values)?;
    Ok(values.iter().filter(|v| **v < invested).count() as f64 / values.len() as f64)
}

/// Annualized Sharpe ratio of per-period returns.
///
/// The annual risk-free rate is converted to a per-period rate by
/// compounding: `(1 + rf)^(1 / periods_per_year) - 1`. Uses the population
/// standard deviation of excess returns.
pub fn sharpe_ratio(period_returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Result<f64> {
    if !(periods_per_year.is_finite() && periods_per_year > 0.0) {
        return Err(SimError::InvalidConfiguration(format!(
            "Periods per year must be positive, got {}",
            periods_per_year
        )));
    }
    if period_returns.len() < 2 {
        return Err(SimError::DegenerateSeries(
            "Need at least two returns for a Sharpe ratio".to_string(),
        ));
    }
    let rf = (1.0 + risk_free_rate).powf(1.0 / periods_per_year) - 1.0;
    let excess: Vec<f64> = period_returns.iter().map(|r| r - rf).collect();
    let m = mean(&excess);
    let sd = population_std(&excess, m);
    if !sd.is_finite() || sd < 1e-12 {
        return Err(SimError::DegenerateSeries(
            "Return series has zero variance".to_string(),
        ));
    }
    Ok(periods_per_year.sqrt() * m / sd)
}

/// Largest peak-to-trough decline as a fraction of the running peak.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd: f64 = 0.0;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

/// Simple returns between consecutive values; periods starting at zero are skipped.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Per-period percentile bands across equally long paths.
pub fn percentile_bands(paths: &[Vec<f64>], percentiles: &[f64]) -> Result<Vec<PercentileBand>> {
    let len = paths.first().map(|p| p.len()).ok_or_else(|| {
        SimError::DegenerateSeries("No paths to compute bands over".to_string())
    })?;
    if paths.iter().any(|p| p.len() != len) {
        return Err(SimError::DataError("Paths have different lengths".to_string()));
    }
    if let Some(q) = percentiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
        return Err(SimError::InvalidConfiguration(format!(
            "Percentile must be in [0, 1], got {}",
            q
        )));
    }

    let columns: Vec<Vec<f64>> = (0..len)
        .map(|t| sorted(&paths.iter().map(|p| p[t]).collect::<Vec<_>>()))
        .collect();

    Ok(percentiles
        .iter()
        .map(|&q| PercentileBand {
            percentile: q,
            values: columns.iter().map(|c| percentile_of_sorted(c, q)).collect(),
        })
        .collect())
}

/// Standard normal quantile (Abramowitz & Stegun 26.2.23, |error| < 4.5e-4).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p == 0.5 {
        return 0.0;
    }

    let (tail, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * tail.ln()).sqrt();

    let (c0, c1, c2) = (2.515517, 0.802853, 0.010328);
    let (d1, d2, d3) = (1.432788, 0.189269, 0.001308);
    let z = t - (c0 + t * (c1 + t * c2)) / (1.0 + t * (d1 + t * (d2 + t * d3)));
    sign * z
}

/// Performance of a single value trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub start_value: f64,
    pub end_value: f64,
    pub total_return: f64,
    /// `(end / start)^(periods_per_year / periods) - 1`.
    pub annualized_return: f64,
    /// None when the trajectory's returns have zero variance.
    pub sharpe_ratio: Option<f64>,
    pub max_drawdown: f64,
    pub rebalance_count: usize,
}

impl PerformanceSummary {
    pub fn from_values(
        values: &[f64],
        risk_free_rate: f64,
        periods_per_year: f64,
        rebalance_count: usize,
    ) -> Result<Self> {
        if values.len() < 2 {
            return Err(SimError::DegenerateSeries(
                "Need at least two values to measure performance".to_string(),
            ));
        }
        let start = values[0];
        let end = values[values.len() - 1];
        if start <= 0.0 {
            return Err(SimError::DegenerateSeries(format!(
                "Start value must be positive, got {}",
                start
            )));
        }

        let periods = (values.len() - 1) as f64;
        let growth = end / start;
        let sharpe = match sharpe_ratio(&period_returns(values), risk_free_rate, periods_per_year) {
            Ok(s) => Some(s),
            Err(SimError::DegenerateSeries(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(Self {
            start_value: start,
            end_value: end,
            total_return: growth - 1.0,
            annualized_return: growth.powf(periods_per_year / periods) - 1.0,
            sharpe_ratio: sharpe,
            max_drawdown: max_drawdown(values),
            rebalance_count,
        })
    }
}

/// Aggregated risk view of a Monte Carlo run.
///
/// Loss-based figures are measured against the total amount invested
/// (initial investment plus contributions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub confidence_level: f64,
    pub invested: f64,
    pub summary: Summary,
    pub confidence_interval: (f64, f64),
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
    pub parametric_var: f64,
    pub probability_of_loss: f64,
    /// Average of every path's max drawdown.
    pub mean_max_drawdown: f64,
    pub mean_rebalances: f64,
}

impl RiskReport {
    pub fn from_simulation(result: &SimulationResult, confidence_level: f64) -> Result<Self> {
        validate_level(confidence_level)?;
        let terminal = &result.terminal_values;
        let invested = result.total_invested();

        let drawdowns: Vec<f64> = result.paths.iter().map(|p| max_drawdown(p)).collect();
        let rebalances: Vec<f64> = result.rebalance_counts.iter().map(|&c| c as f64).collect();

        Ok(Self {
            confidence_level,
            invested,
            summary: summary(terminal)?,
            confidence_interval: confidence_interval(terminal, confidence_level)?,
            value_at_risk: value_at_risk(terminal, invested, confidence_level)?,
            conditional_value_at_risk: conditional_value_at_risk(terminal, invested, confidence_level)?,
            parametric_var: parametric_var(terminal, invested, confidence_level)?,
            probability_of_loss: probability_of_loss(terminal, invested)?,
            mean_max_drawdown: mean(&drawdowns),
            mean_rebalances: mean(&rebalances),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_linear_interpolation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.0).unwrap(), 1.0);
        assert_eq!(percentile(&v, 1.0).unwrap(), 4.0);
        assert!((percentile(&v, 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile(&v, 0.1).unwrap() - 1.3).abs() < 1e-12);
        assert!(percentile(&[], 0.5).is_err());
        assert!(percentile(&v, 1.5).is_err());
    }

    #[test]
    fn test_summary() {
        let s = summary(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(s.mean, 2.5);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!((s.std_dev - 1.25_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_interval_90() {
        let values: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let (lo, hi) = confidence_interval(&values, 0.90).unwrap();
        assert!((lo - 5.0).abs() < 1e-9);
        assert!((hi - 95.0).abs() < 1e-9);
        assert!(confidence_interval(&values, 1.0).is_err());
    }

    #[test]
    fn test_var_and_cvar() {
        let values: Vec<f64> = (0..=100).map(|i| 9_000.0 + 20.0 * i as f64).collect();
        let var = value_at_risk(&values, 10_000.0, 0.95).unwrap();
        let cvar = conditional_value_at_risk(&values, 10_000.0, 0.95).unwrap();
        // 5th percentile is 9_100.
        assert!((var - 900.0).abs() < 1e-9);
        // Tail is 9_000..=9_100, mean 9_050.
        assert!((cvar - 950.0).abs() < 1e-9);
        assert!(cvar >= var);
    }

    #[test]
    fn test_var_floored_at_zero_when_all_gains() {
        let values = [11_000.0, 12_000.0, 13_000.0];
        assert_eq!(value_at_risk(&values, 10_000.0, 0.95).unwrap(), 0.0);
        assert_eq!(conditional_value_at_risk(&values, 10_000.0, 0.95).unwrap(), 0.0);
    }

    #[test]
    fn test_expected_shortfall_empty_tail_is_zero() {
        let values = [9_000.0, 9_500.0];
        assert_eq!(expected_shortfall(&values, 10_000.0, 8_000.0), 0.0);
        assert_eq!(expected_shortfall(&values, 10_000.0, 9_000.0), 1_000.0);
    }

    #[test]
    fn test_sharpe_ratio() {
        let returns = [0.01, 0.02, -0.01, 0.03];
        let s = sharpe_ratio(&returns, 0.0, 12.0).unwrap();
        let m = 0.0125;
        let sd = ((0.0025f64.powi(2) + 0.0075f64.powi(2) + 0.0225f64.powi(2) + 0.0175f64.powi(2)) / 4.0).sqrt();
        assert!((s - 12.0_f64.sqrt() * m / sd).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_zero_variance_is_degenerate() {
        let err = sharpe_ratio(&[0.01; 10], 0.02, 12.0).unwrap_err();
        assert!(matches!(err, SimError::DegenerateSeries(_)));
    }

    #[test]
    fn test_sharpe_rejects_non_positive_periods() {
        let returns = [0.01, 0.02, -0.01, 0.03];
        for ppy in [0.0, -12.0, f64::NAN] {
            let err = sharpe_ratio(&returns, 0.0, ppy).unwrap_err();
            assert!(matches!(err, SimError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown(&[100.0, 110.0, 120.0, 130.0]), 0.0);
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]);
        assert!((dd - 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[100.0, 0.0, 0.0]), 1.0);
    }

    #[test]
    fn test_inverse_normal_cdf() {
        assert!((inverse_normal_cdf(0.05) + 1.6449).abs() < 1e-3);
        assert!((inverse_normal_cdf(0.975) - 1.96).abs() < 1e-3);
        assert_eq!(inverse_normal_cdf(0.5), 0.0);
    }

    #[test]
    fn test_parametric_var() {
        let values = [9_000.0, 11_000.0];
        // mean 10_000, std 1_000
        let var = parametric_var(&values, 10_000.0, 0.95).unwrap();
        assert!((var - 1_644.9).abs() < 1.0);
    }

    #[test]
    fn test_percentile_bands() {
        let paths = vec![vec![100.0, 90.0], vec![100.0, 110.0], vec![100.0, 130.0]];
        let bands = percentile_bands(&paths, &[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(bands[0].values, vec![100.0, 90.0]);
        assert_eq!(bands[1].values, vec![100.0, 110.0]);
        assert_eq!(bands[2].values, vec![100.0, 130.0]);
        assert!(percentile_bands(&[vec![1.0], vec![1.0, 2.0]], &[0.5]).is_err());
    }

    #[test]
    fn test_performance_summary() {
        let values = [100.0, 110.0, 99.0, 121.0];
        let perf = PerformanceSummary::from_values(&values, 0.0, 1.0, 2).unwrap();
        assert!((perf.total_return - 0.21).abs() < 1e-12);
        assert!((perf.annualized_return - (1.21_f64.powf(1.0 / 3.0) - 1.0)).abs() < 1e-12);
        assert!((perf.max_drawdown - 0.1).abs() < 1e-12);
        assert!(perf.sharpe_ratio.is_some());
        assert_eq!(perf.rebalance_count, 2);

        let flat = PerformanceSummary::from_values(&[100.0, 100.0, 100.0], 0.0, 12.0, 0).unwrap();
        assert!(flat.sharpe_ratio.is_none());
    }

    #[test]
    fn test_probability_of_loss() {
        let p = probability_of_loss(&[90.0, 100.0, 110.0, 80.0], 100.0).unwrap();
        assert_eq!(p, 0.5);
    }
}
