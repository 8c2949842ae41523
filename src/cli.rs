//! Command-line interface for the portfolio simulator.

use portsim::config::PortsimFileConfig;
use portsim::data::{load_returns_csv, load_returns_from_prices, load_prices_csv, TableConfig};
use portsim::error::{Result, SimError};
use portsim::monte_carlo::PathSimulator;
use portsim::optimizer::MeanVarianceOptimizer;
use portsim::planning::SavingsGoal;
use portsim::rebalance::RebalancePolicy;
use portsim::replay::{compare_policies, ReplayResult};
use portsim::report::ReportFormatter;
use portsim::risk::{percentile_bands, PerformanceSummary, RiskReport};
use portsim::stress::{run_stress_test, StressScenario};
use portsim::types::Frequency;

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const BAND_PERCENTILES: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

/// Portsim - Monte Carlo portfolio simulation and mean-variance optimization.
#[derive(Parser)]
#[command(name = "portsim")]
#[command(version)]
#[command(about = "Monte Carlo portfolio simulation, risk metrics and mean-variance optimization")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an example configuration file
    Init {
        /// Output path for the configuration file
        #[arg(short, long, default_value = "portsim.toml")]
        output: PathBuf,
    },

    /// Run a Monte Carlo simulation
    Simulate {
        /// Configuration file (built-in defaults if omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the number of paths
        #[arg(short = 'n', long)]
        paths: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compare a baseline simulation against a stress scenario
    Stress {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// market_crash, prolonged_recession or high_inflation:<rate>
        #[arg(short, long)]
        scenario: Option<String>,
    },

    /// Replay rebalancing policies over historical prices
    Replay {
        /// Wide CSV of prices (date column plus one column per asset)
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compute min-variance, tangency and efficient frontier portfolios
    Optimize {
        /// Wide CSV of per-period returns, or prices with --prices
        #[arg(short, long)]
        data: PathBuf,

        /// Treat the data file as prices
        #[arg(long)]
        prices: bool,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Sampling frequency of the data
        #[arg(short, long, value_enum)]
        frequency: Option<FrequencyArg>,

        /// Annual risk-free rate
        #[arg(long)]
        risk_free: Option<f64>,

        /// Number of frontier points
        #[arg(long)]
        points: Option<usize>,
    },

    /// Compute the savings needed today for an inflation-adjusted goal
    Plan {
        /// Target value in today's money
        #[arg(short, long)]
        target: f64,

        #[arg(short, long)]
        years: u32,

        /// Expected annual return
        #[arg(short, long, default_value = "0.07")]
        expected_return: f64,

        /// Annual inflation rate
        #[arg(short, long, default_value = "0.02")]
        inflation: f64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum FrequencyArg {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl From<FrequencyArg> for Frequency {
    fn from(arg: FrequencyArg) -> Self {
        match arg {
            FrequencyArg::Daily => Frequency::Daily,
            FrequencyArg::Weekly => Frequency::Weekly,
            FrequencyArg::Monthly => Frequency::Monthly,
            FrequencyArg::Quarterly => Frequency::Quarterly,
            FrequencyArg::Annual => Frequency::Annual,
        }
    }
}

impl Cli {
    /// Log filter for this run.
    ///
    /// `-v` flags take precedence; without them `RUST_LOG` is honored,
    /// falling back to warnings only.
    pub fn log_filter(&self) -> EnvFilter {
        let level = match self.verbose {
            0 => {
                return EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(Level::WARN.as_str()))
            }
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        EnvFilter::new(level.as_str())
    }

    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(self.log_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();

        if tracing::subscriber::set_global_default(subscriber).is_err() {
            eprintln!("Logging was already initialized");
        }
    }
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Init { output } => init_config(output),

        Commands::Simulate {
            config,
            paths,
            seed,
        } => run_simulation(config.as_deref(), *paths, *seed, cli.output),

        Commands::Stress { config, scenario } => {
            run_stress(config.as_deref(), scenario.as_deref(), cli.output)
        }

        Commands::Replay { data, config } => run_replay(data, config.as_deref(), cli.output),

        Commands::Optimize {
            data,
            prices,
            config,
            frequency,
            risk_free,
            points,
        } => run_optimization(
            data,
            *prices,
            config.as_deref(),
            *frequency,
            *risk_free,
            *points,
            cli.output,
        ),

        Commands::Plan {
            target,
            years,
            expected_return,
            inflation,
        } => run_plan(*target, *years, *expected_return, *inflation, cli.output),
    }
}

fn load_config(path: Option<&Path>) -> Result<PortsimFileConfig> {
    match path {
        Some(p) => {
            info!("Loading configuration from: {}", p.display());
            PortsimFileConfig::load(p)
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(PortsimFileConfig::default())
        }
    }
}

fn init_config(output: &PathBuf) -> Result<()> {
    fs::write(output, PortsimFileConfig::example())?;
    println!("Created example configuration file: {}", output.display());
    println!("\nEdit this file to describe your portfolio, then run:");
    println!("  portsim simulate -c {}", output.display());
    Ok(())
}

fn run_simulation(
    config_path: Option<&Path>,
    paths: Option<usize>,
    seed: Option<u64>,
    output: OutputFormat,
) -> Result<()> {
    let file_config = load_config(config_path)?;
    let mut sim_config = file_config.to_simulation_config()?;
    if let Some(n) = paths {
        sim_config = sim_config.with_paths(n);
    }
    if let Some(s) = seed {
        sim_config = sim_config.with_seed(s);
    }

    let allocation = file_config.to_allocation()?;
    let process = file_config.to_return_process()?;
    let policy = file_config.to_rebalance_policy()?;

    let result = PathSimulator::new(sim_config)?.run(&allocation, &process, policy)?;
    let report = RiskReport::from_simulation(&result, file_config.confidence_level()?)?;

    match output {
        OutputFormat::Text => ReportFormatter::print_simulation(&result, &report),
        OutputFormat::Json => {
            let bands = percentile_bands(&result.paths, &BAND_PERCENTILES)?;
            let body = json!({
                "allocation": allocation,
                "process": process,
                "policy": policy,
                "report": report,
                "percentile_bands": bands,
            });
            println!("{}", ReportFormatter::to_json(&body)?);
        }
    }
    Ok(())
}

fn run_stress(config_path: Option<&Path>, scenario: Option<&str>, output: OutputFormat) -> Result<()> {
    let file_config = load_config(config_path)?;
    let scenario = match scenario {
        Some(s) => s.parse::<StressScenario>()?,
        None => file_config.stress.ok_or_else(|| {
            SimError::InvalidConfiguration(
                "No stress scenario given on the command line or in the configuration".to_string(),
            )
        })?,
    };

    let sim_config = file_config.to_simulation_config()?;
    let mut rng = match sim_config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let comparison = run_stress_test(
        &sim_config,
        &file_config.to_allocation()?,
        &file_config.to_return_process()?,
        file_config.to_rebalance_policy()?,
        scenario,
        &mut rng,
    )?;

    let level = file_config.confidence_level()?;
    let baseline = RiskReport::from_simulation(&comparison.baseline, level)?;
    let stressed = RiskReport::from_simulation(&comparison.stressed, level)?;

    match output {
        OutputFormat::Text => ReportFormatter::print_stress(&comparison, &baseline, &stressed),
        OutputFormat::Json => {
            let body = json!({
                "scenario": scenario,
                "baseline": baseline,
                "stressed": stressed,
                "mean_terminal_shortfall": comparison.mean_terminal_shortfall(),
            });
            println!("{}", ReportFormatter::to_json(&body)?);
        }
    }
    Ok(())
}

fn run_replay(data_path: &Path, config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
    let file_config = load_config(config_path)?;
    let history = load_prices_csv(data_path, &TableConfig::default())?;
    let allocation = file_config.to_allocation()?;

    let mut policies = vec![RebalancePolicy::None];
    let configured = file_config.to_rebalance_policy()?;
    if configured != RebalancePolicy::None {
        policies.push(configured);
    }

    let results = compare_policies(
        file_config.simulation.initial_investment,
        &allocation,
        &history,
        &policies,
    )?;

    let ppy = file_config.simulation.frequency.periods_per_year();
    let rf = file_config.risk.risk_free_rate;
    let rows = results
        .into_iter()
        .map(|r| -> Result<(ReplayResult, PerformanceSummary)> {
            let perf = r.performance(rf, ppy)?;
            Ok((r, perf))
        })
        .collect::<Result<Vec<_>>>()?;

    match output {
        OutputFormat::Text => ReportFormatter::print_replay_table(&rows),
        OutputFormat::Json => {
            let body: Vec<_> = rows
                .iter()
                .map(|(r, perf)| {
                    json!({
                        "policy": r.policy,
                        "rebalance_periods": r.rebalance_periods,
                        "values": r.values,
                        "performance": perf,
                    })
                })
                .collect();
            println!("{}", ReportFormatter::to_json(&body)?);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_optimization(
    data_path: &Path,
    prices: bool,
    config_path: Option<&Path>,
    frequency: Option<FrequencyArg>,
    risk_free: Option<f64>,
    points: Option<usize>,
    output: OutputFormat,
) -> Result<()> {
    let file_config = load_config(config_path)?;
    let table_config = TableConfig::default();
    let series = if prices {
        load_returns_from_prices(data_path, &table_config)?
    } else {
        load_returns_csv(data_path, &table_config)?
    };

    let frequency = frequency
        .map(Frequency::from)
        .unwrap_or(file_config.simulation.frequency);
    let rf = risk_free.unwrap_or(file_config.risk.risk_free_rate);
    let settings = &file_config.optimizer;
    let points = points.unwrap_or(settings.frontier_points);

    let optimizer = MeanVarianceOptimizer::from_series(&series, frequency.periods_per_year())?
        .with_max_iter(settings.max_iter)
        .with_restarts(settings.restarts)
        .with_seed(settings.seed);

    let min_variance = optimizer.min_variance_portfolio()?;
    let tangency = optimizer.tangency_portfolio(rf)?;
    let frontier = optimizer.efficient_frontier(&optimizer.frontier_targets(points)?)?;
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let samples = optimizer.sample_portfolios(settings.sample_portfolios, &mut rng);

    match output {
        OutputFormat::Text => {
            println!();
            ReportFormatter::print_allocation("Minimum Variance", &min_variance, rf);
            ReportFormatter::print_allocation("Tangency (Max Sharpe)", &tangency, rf);
            ReportFormatter::print_frontier(&frontier);
            if !samples.is_empty() {
                let beaten = samples
                    .iter()
                    .filter(|s| s.annual_volatility > 0.0)
                    .filter(|s| {
                        let sharpe = (s.annual_return - rf) / s.annual_volatility;
                        tangency.sharpe_ratio(rf).is_some_and(|t| sharpe <= t + 1e-9)
                    })
                    .count();
                println!(
                    "Tangency Sharpe matched or beat {}/{} random portfolios",
                    beaten,
                    samples.len()
                );
            }
        }
        OutputFormat::Json => {
            let body = json!({
                "frequency": frequency,
                "risk_free_rate": rf,
                "min_variance": min_variance,
                "tangency": tangency,
                "frontier": frontier,
                "samples": samples,
            });
            println!("{}", ReportFormatter::to_json(&body)?);
        }
    }
    Ok(())
}

fn run_plan(target: f64, years: u32, expected_return: f64, inflation: f64, output: OutputFormat) -> Result<()> {
    let goal = SavingsGoal::new(target, years, expected_return, inflation);
    let plan = goal.plan()?;

    match output {
        OutputFormat::Text => {
            println!("Goal in {} years:        ${:>12.2}", years, plan.future_value);
            println!("Required savings today: ${:>12.2}", plan.required_savings);
            println!("Real return:            {:>12.2}%", plan.real_return * 100.0);
        }
        OutputFormat::Json => {
            println!("{}", ReportFormatter::to_json(&json!({ "goal": goal, "plan": plan }))?);
        }
    }
    Ok(())
}
