//! Mutable per-run portfolio state.
//!
//! Each asset is held as a unit count priced by a running unit price. In a
//! Monte Carlo run the unit prices start at 1.0 and evolve with the drawn
//! returns; in a historical replay they are the observed prices.

use crate::rebalance;
use crate::types::AllocationVector;

/// Holdings and value history of one simulated or replayed path.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    /// Target weights aligned with the allocation's asset order.
    targets: Vec<f64>,
    /// Units held per asset.
    units: Vec<f64>,
    /// Current unit price per asset.
    prices: Vec<f64>,
    /// Assets whose value hit zero; they stay at zero for the rest of the path.
    wiped: Vec<bool>,
    /// Total value at the end of every period, starting with the initial value.
    history: Vec<f64>,
    /// Per-asset value history, same indexing as `history`.
    asset_history: Vec<Vec<f64>>,
    /// Elapsed-period indices at which a rebalance happened.
    rebalance_periods: Vec<usize>,
}

impl PortfolioState {
    /// Split the initial investment by target weight at unit prices of 1.0.
    pub fn new(initial_investment: f64, allocation: &AllocationVector) -> Self {
        let n = allocation.len();
        Self::with_prices(initial_investment, allocation, &vec![1.0; n])
    }

    /// Split the initial investment by target weight at the given prices.
    ///
    /// Prices must be positive and aligned with the allocation's assets.
    pub fn with_prices(initial_investment: f64, allocation: &AllocationVector, prices: &[f64]) -> Self {
        let targets = allocation.weights().to_vec();
        let units = targets
            .iter()
            .zip(prices.iter())
            .map(|(w, p)| initial_investment * w / p)
            .collect();
        let n = targets.len();

        let mut state = Self {
            targets,
            units,
            prices: prices.to_vec(),
            wiped: vec![false; n],
            history: Vec::new(),
            asset_history: vec![Vec::new(); n],
            rebalance_periods: Vec::new(),
        };
        state.record();
        state
    }

    /// Apply one period of simple returns to the unit prices.
    ///
    /// A holding whose value would fall to zero or below is clamped to zero
    /// and the asset is marked wiped out for the remainder of the path.
    pub fn apply_returns(&mut self, returns: &[f64]) {
        for (i, &r) in returns.iter().enumerate().take(self.prices.len()) {
            if self.wiped[i] {
                continue;
            }
            let next = self.prices[i] * (1.0 + r);
            if next <= 0.0 {
                self.wiped[i] = true;
                self.units[i] = 0.0;
            } else {
                self.prices[i] = next;
            }
        }
    }

    /// Move to observed prices. Non-positive prices wipe the asset out.
    pub fn set_prices(&mut self, prices: &[f64]) {
        for (i, &p) in prices.iter().enumerate().take(self.prices.len()) {
            if self.wiped[i] {
                continue;
            }
            if p <= 0.0 {
                self.wiped[i] = true;
                self.units[i] = 0.0;
            } else {
                self.prices[i] = p;
            }
        }
    }

    /// Add new money split by the effective target weights.
    ///
    /// When nothing is left in the portfolio, new money re-funds every asset
    /// with a positive target instead of being dropped.
    pub fn contribute(&mut self, amount: f64) {
        if amount == 0.0 {
            return;
        }
        if amount > 0.0 && self.total_value() <= 0.0 {
            for (wiped, t) in self.wiped.iter_mut().zip(self.targets.iter()) {
                if *t > 0.0 {
                    *wiped = false;
                }
            }
        }
        let targets = self.effective_targets();
        for i in 0..self.units.len() {
            if !self.wiped[i] {
                self.units[i] = (self.units[i] + amount * targets[i] / self.prices[i]).max(0.0);
            }
        }
    }

    /// Reset holdings to the effective target weights at current prices.
    pub fn rebalance(&mut self, period_index: usize) {
        let mut values = self.values();
        rebalance::rebalance_values(&mut values, &self.effective_targets());
        for i in 0..self.units.len() {
            self.units[i] = if self.wiped[i] { 0.0 } else { values[i] / self.prices[i] };
        }
        self.rebalance_periods.push(period_index);
    }

    /// Push current total and per-asset values onto the history.
    pub fn record(&mut self) {
        let values = self.values();
        self.history.push(values.iter().sum());
        for (h, v) in self.asset_history.iter_mut().zip(values) {
            h.push(v);
        }
    }

    /// Current value of each holding.
    pub fn values(&self) -> Vec<f64> {
        self.units
            .iter()
            .zip(self.prices.iter())
            .map(|(u, p)| u * p)
            .collect()
    }

    pub fn total_value(&self) -> f64 {
        self.values().iter().sum()
    }

    pub fn current_weights(&self) -> Vec<f64> {
        rebalance::current_weights(&self.values())
    }

    /// Target weights renormalized over the assets that are not wiped out.
    ///
    /// When no surviving asset has a positive target, the current weights are
    /// returned so that a rebalance leaves holdings unchanged.
    pub fn effective_targets(&self) -> Vec<f64> {
        let surviving: f64 = self
            .targets
            .iter()
            .zip(self.wiped.iter())
            .filter(|(_, wiped)| !**wiped)
            .map(|(t, _)| t)
            .sum();
        if surviving <= 0.0 {
            return self.current_weights();
        }
        self.targets
            .iter()
            .zip(self.wiped.iter())
            .map(|(t, &w)| if w { 0.0 } else { t / surviving })
            .collect()
    }

    pub fn units(&self) -> &[f64] {
        &self.units
    }

    pub fn is_wiped(&self, asset_index: usize) -> bool {
        self.wiped.get(asset_index).copied().unwrap_or(false)
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn asset_history(&self) -> &[Vec<f64>] {
        &self.asset_history
    }

    pub fn rebalance_periods(&self) -> &[usize] {
        &self.rebalance_periods
    }

    /// Consume the state, keeping only the value history.
    pub fn into_history(self) -> Vec<f64> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sixty_forty() -> AllocationVector {
        AllocationVector::new([("A", 0.6), ("B", 0.4)]).unwrap()
    }

    #[test]
    fn test_initial_split() {
        let state = PortfolioState::new(10_000.0, &sixty_forty());
        assert_eq!(state.values(), vec![6_000.0, 4_000.0]);
        assert_eq!(state.history(), &[10_000.0]);
    }

    #[test]
    fn test_with_prices_computes_units() {
        let state = PortfolioState::with_prices(10_000.0, &sixty_forty(), &[100.0, 50.0]);
        assert_eq!(state.units(), &[60.0, 80.0]);
        assert!((state.total_value() - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_returns_and_rebalance() {
        let mut state = PortfolioState::new(10_000.0, &sixty_forty());
        state.apply_returns(&[0.5, 0.0]);
        state.record();
        let w = state.current_weights();
        assert!((w[0] - 9_000.0 / 13_000.0).abs() < 1e-12);

        state.rebalance(1);
        let values = state.values();
        assert!((values[0] - 13_000.0 * 0.6).abs() < 1e-9);
        assert!((values[1] - 13_000.0 * 0.4).abs() < 1e-9);
        assert_eq!(state.rebalance_periods(), &[1]);
    }

    #[test]
    fn test_zero_floor_clamp() {
        let mut state = PortfolioState::new(10_000.0, &sixty_forty());
        state.apply_returns(&[-1.5, 0.1]);
        assert!(state.is_wiped(0));
        assert_eq!(state.values()[0], 0.0);
        assert!((state.total_value() - 4_400.0).abs() < 1e-9);

        // A wiped asset stays at zero even after a positive return.
        state.apply_returns(&[0.5, 0.0]);
        assert_eq!(state.values()[0], 0.0);
    }

    #[test]
    fn test_rebalance_skips_wiped_assets() {
        let mut state = PortfolioState::new(10_000.0, &sixty_forty());
        state.apply_returns(&[-1.0, 0.0]);
        assert_eq!(state.effective_targets(), vec![0.0, 1.0]);

        state.rebalance(1);
        assert_eq!(state.values()[0], 0.0);
        assert!((state.values()[1] - 4_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_wiped_stays_zero() {
        let mut state = PortfolioState::new(10_000.0, &sixty_forty());
        state.apply_returns(&[-2.0, -2.0]);
        state.rebalance(1);
        state.apply_returns(&[0.5, 0.5]);
        assert_eq!(state.total_value(), 0.0);
    }

    #[test]
    fn test_contribution_after_wipeout_is_kept() {
        let mut state = PortfolioState::new(10_000.0, &sixty_forty());
        state.apply_returns(&[-1.5, -1.5]);
        assert_eq!(state.total_value(), 0.0);

        state.contribute(500.0);
        assert!((state.total_value() - 500.0).abs() < 1e-9);
        assert!(!state.is_wiped(0) && !state.is_wiped(1));
        let values = state.values();
        assert!((values[0] - 300.0).abs() < 1e-9);
        assert!((values[1] - 200.0).abs() < 1e-9);

        // The re-funded holdings earn returns again.
        state.apply_returns(&[0.1, 0.0]);
        assert!((state.total_value() - 530.0).abs() < 1e-9);
    }

    #[test]
    fn test_contribution_split_by_target() {
        let mut state = PortfolioState::new(1_000.0, &sixty_forty());
        state.contribute(100.0);
        let values = state.values();
        assert!((values[0] - 660.0).abs() < 1e-9);
        assert!((values[1] - 440.0).abs() < 1e-9);
    }
}
