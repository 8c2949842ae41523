//! Terminal and JSON rendering of simulation, stress, replay and optimizer output.

use crate::error::Result;
use crate::monte_carlo::SimulationResult;
use crate::optimizer::OptimizationResult;
use crate::replay::ReplayResult;
use crate::risk::{PerformanceSummary, RiskReport};
use crate::stress::StressComparison;
use colored::Colorize;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

/// Formats results for display.
pub struct ReportFormatter;

impl ReportFormatter {
    fn banner(title: &str) {
        println!();
        println!("{}", "═".repeat(60).blue());
        println!("{}", format!(" {} ", title).bold().blue());
        println!("{}", "═".repeat(60).blue());
        println!();
    }

    fn format_pct_change(pct: f64) -> String {
        if pct >= 0.0 {
            format!("(+{:.2}%)", pct).green().to_string()
        } else {
            format!("({:.2}%)", pct).red().to_string()
        }
    }

    /// Print a Monte Carlo run and its risk report.
    pub fn print_simulation(result: &SimulationResult, report: &RiskReport) {
        Self::banner("SIMULATION RESULTS");

        let config = &result.config;
        println!("{}", "Overview".bold().underline());
        println!("  Paths:           {:>12}", result.num_paths());
        println!(
            "  Horizon:         {:>12}  ({})",
            config.horizon_periods, config.frequency
        );
        println!("  Initial:         ${:>11.2}", config.initial_investment);
        if config.contribution_per_period > 0.0 {
            println!("  Contribution:    ${:>11.2}  per period", config.contribution_per_period);
        }
        println!("  Total Invested:  ${:>11.2}", report.invested);
        println!();

        Self::print_risk_report(report);
    }

    /// Print the distribution and risk block of a report.
    pub fn print_risk_report(report: &RiskReport) {
        let s = &report.summary;
        let change = if report.invested > 0.0 {
            (s.mean / report.invested - 1.0) * 100.0
        } else {
            0.0
        };

        println!("{}", "Terminal Values".bold().underline());
        println!("  Mean:            ${:>11.2}  {}", s.mean, Self::format_pct_change(change));
        println!("  Median:          ${:>11.2}", s.median);
        println!("  Min:             ${:>11.2}", s.min);
        println!("  Max:             ${:>11.2}", s.max);
        println!("  Std Dev:         ${:>11.2}", s.std_dev);
        println!(
            "  {:.0}% Interval:    ${:.2} to ${:.2}",
            report.confidence_level * 100.0,
            report.confidence_interval.0,
            report.confidence_interval.1
        );
        println!();

        println!("{}", "Risk Metrics".bold().underline());
        println!(
            "  VaR ({:.0}%):       ${:>11.2}",
            report.confidence_level * 100.0,
            report.value_at_risk
        );
        println!(
            "  CVaR ({:.0}%):      ${:>11.2}",
            report.confidence_level * 100.0,
            report.conditional_value_at_risk
        );
        println!("  Parametric VaR:  ${:>11.2}", report.parametric_var);
        let loss = format!("{:>11.2}%", report.probability_of_loss * 100.0);
        let loss = if report.probability_of_loss > 0.5 {
            loss.red().to_string()
        } else {
            loss
        };
        println!("  P(loss):          {}", loss);
        println!("  Avg Max DD:      {:>11.2}%", report.mean_max_drawdown * 100.0);
        println!("  Avg Rebalances:  {:>12.1}", report.mean_rebalances);
        println!();
    }

    /// Print baseline and stressed reports side by side.
    pub fn print_stress(comparison: &StressComparison, baseline: &RiskReport, stressed: &RiskReport) {
        Self::banner(&format!("STRESS TEST: {}", comparison.scenario));

        let mut builder = Builder::new();
        builder.push_record(["Metric", "Baseline", "Stressed"]);
        let rows: [(&str, f64, f64); 6] = [
            ("Mean", baseline.summary.mean, stressed.summary.mean),
            ("Median", baseline.summary.median, stressed.summary.median),
            ("Min", baseline.summary.min, stressed.summary.min),
            ("VaR", baseline.value_at_risk, stressed.value_at_risk),
            ("CVaR", baseline.conditional_value_at_risk, stressed.conditional_value_at_risk),
            ("Parametric VaR", baseline.parametric_var, stressed.parametric_var),
        ];
        for (name, b, s) in rows {
            builder.push_record([name.to_string(), format!("{:.2}", b), format!("{:.2}", s)]);
        }
        builder.push_record([
            "P(loss)".to_string(),
            format!("{:.1}%", baseline.probability_of_loss * 100.0),
            format!("{:.1}%", stressed.probability_of_loss * 100.0),
        ]);

        let mut table = builder.build();
        table.with(Style::rounded());
        println!("{}", table);

        let shortfall = comparison.mean_terminal_shortfall();
        let line = format!("Mean terminal shortfall: {:.2}", shortfall);
        if shortfall < 0.0 {
            println!("{}", line.red());
        } else {
            println!("{}", line.green());
        }
        println!();
    }

    /// Print one row per replayed policy.
    pub fn print_replay_table(results: &[(ReplayResult, PerformanceSummary)]) {
        Self::banner("HISTORICAL REPLAY");

        let mut builder = Builder::new();
        builder.push_record([
            "Policy", "Final Value", "Return %", "Annual %", "Max DD %", "Sharpe", "Rebalances",
        ]);

        for (result, perf) in results {
            builder.push_record([
                result.policy.to_string(),
                format!("{:.2}", perf.end_value),
                format!("{:.2}", perf.total_return * 100.0),
                format!("{:.2}", perf.annualized_return * 100.0),
                format!("{:.2}", perf.max_drawdown * 100.0),
                perf.sharpe_ratio
                    .map(|s| format!("{:.2}", s))
                    .unwrap_or_else(|| "n/a".to_string()),
                perf.rebalance_count.to_string(),
            ]);
        }

        let mut table = builder.build();
        table.with(Style::rounded());
        println!("{}", table);
    }

    /// Print an optimized allocation.
    pub fn print_allocation(title: &str, result: &OptimizationResult, risk_free_rate: f64) {
        println!("{}", title.bold().underline());
        for (asset, weight) in result.allocation.iter() {
            println!("  {:<16} {:>8.2}%", asset, weight * 100.0);
        }
        println!("  Return:          {:>8.2}%", result.annual_return * 100.0);
        println!("  Volatility:      {:>8.2}%", result.annual_volatility * 100.0);
        if let Some(sharpe) = result.sharpe_ratio(risk_free_rate) {
            println!("  Sharpe:          {:>8.2}", sharpe);
        }
        println!();
    }

    /// Print the frontier as a volatility/return table.
    pub fn print_frontier(frontier: &[(f64, f64)]) {
        let mut builder = Builder::new();
        builder.push_record(["#", "Volatility %", "Return %"]);
        for (i, (vol, ret)) in frontier.iter().enumerate() {
            builder.push_record([
                (i + 1).to_string(),
                format!("{:.2}", vol * 100.0),
                format!("{:.2}", ret * 100.0),
            ]);
        }
        let mut table = builder.build();
        table.with(Style::rounded());
        println!("{}", "Efficient Frontier".bold().underline());
        println!("{}", table);
    }

    /// Pretty JSON for any serializable result.
    pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}
