mod app;
mod config;
mod data;
mod error;
mod estimator;
mod report;
mod simulation;
mod tui;
mod ui;

use app::App;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use config::SimulationConfig;
use report::FrontierReport;
use simulation::WeightSampling;
use std::io;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SamplingChoice {
    Uniform,
    Dirichlet,
}

impl From<SamplingChoice> for WeightSampling {
    fn from(value: SamplingChoice) -> Self {
        match value {
            SamplingChoice::Uniform => WeightSampling::Uniform,
            SamplingChoice::Dirichlet => WeightSampling::Dirichlet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Frontier-TUI: Monte Carlo efficient frontier and max-Sharpe portfolio search",
    after_help = "EXAMPLES:
    # Default basket (AAPL,MSFT,AGG,GLD vs SPY, 2020-2023, 10k portfolios)
    cargo run --release

    # Reproducible run with a custom basket, shown in the terminal UI
    cargo run --release -- --assets NVDA,MSFT,TLT,GLD --seed 42 --tui

    # Export every simulated portfolio for plotting elsewhere
    cargo run --release -- --portfolios 50000 --json frontier.json"
)]
struct Args {
    /// Comma-separated asset symbols; order defines weight positions
    #[arg(long, default_value = "AAPL,MSFT,AGG,GLD")]
    assets: String,

    /// Benchmark symbol representing the market
    #[arg(long, default_value = config::DEFAULT_BENCHMARK)]
    benchmark: String,

    /// First day of price history (YYYY-MM-DD)
    #[arg(long, default_value = config::DEFAULT_START_DATE)]
    start: NaiveDate,

    /// Day after the last day of price history (YYYY-MM-DD, exclusive)
    #[arg(long, default_value = config::DEFAULT_END_DATE)]
    end: NaiveDate,

    /// Number of random portfolios to simulate
    #[arg(long, default_value_t = config::DEFAULT_NUM_PORTFOLIOS)]
    portfolios: usize,

    /// Annual risk-free rate used in Sharpe ratios (0.04 = 4%)
    #[arg(long, default_value_t = config::DEFAULT_RISK_FREE_RATE)]
    risk_free_rate: f64,

    /// Random seed; omit for a fresh seed (it is logged so the run can be repeated)
    #[arg(long)]
    seed: Option<u64>,

    /// How raw weights are drawn before normalization
    #[arg(long, value_enum, default_value_t = SamplingChoice::Uniform)]
    sampling: SamplingChoice,

    /// Run the simulation on a single thread
    #[arg(long)]
    sequential: bool,

    /// Write the full result set as JSON to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Show the frontier in an interactive terminal chart
    #[arg(long)]
    tui: bool,
}

impl Args {
    fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            assets: config::parse_symbol_list(&self.assets),
            benchmark: self.benchmark.trim().to_uppercase(),
            start_date: self.start,
            end_date: self.end,
            num_portfolios: self.portfolios,
            risk_free_rate: self.risk_free_rate,
            seed: self.seed,
            sampling: self.sampling.into(),
            parallel: !self.sequential,
        }
    }
}

/// Full pipeline: fetch prices → estimate → simulate → select.
async fn build_report(config: &SimulationConfig) -> anyhow::Result<FrontierReport> {
    config.validate()?;
    info!(
        "=== Frontier ===\n  Assets: {:?}\n  Benchmark: {}\n  Range: {} .. {}\n  Portfolios: {}\n  Risk-free: {:.2}%",
        config.assets,
        config.benchmark,
        config.start_date,
        config.end_date,
        config.num_portfolios,
        config.risk_free_rate * 100.0
    );

    let prices = data::fetch_price_table(&config.assets, config.start_date, config.end_date).await?;
    let returns = estimator::daily_returns(&prices)?;
    let dropped = prices.dates.len().saturating_sub(returns.n_days() + 1);
    if dropped > 0 {
        warn!("Dropped {} trading days with a missing price in at least one asset", dropped);
    }
    info!("Estimating statistics from {} daily returns", returns.n_days());

    let means = estimator::mean_returns(&returns)?;
    let cov = estimator::covariance(&returns)?;

    let benchmark_returns =
        data::fetch_benchmark_returns(&config.benchmark, config.start_date, config.end_date).await?;
    let benchmark = estimator::benchmark_metrics(&benchmark_returns, config.risk_free_rate)?;

    let run = simulation::run_configured(config, &means, &cov)?;
    Ok(FrontierReport::new(config, run, benchmark)?)
}

#[tokio::main]
async fn main() -> io::Result<()> {
    config::init_cpu_parallelism();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {}", e);
        }
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("frontier_tui=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .init();
    let args = Args::parse();
    let config = args.to_config();

    let report = match build_report(&config).await {
        Ok(report) => report,
        Err(e) => {
            error!("Frontier estimation failed: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(path) = &args.json {
        if let Err(e) = report.write_json(path) {
            error!("JSON export to {} failed: {:#}", path.display(), e);
        }
    }

    if !args.tui {
        report::print_report(&report);
        return Ok(());
    }

    let mut terminal = tui::init()?;
    let mut app = App::new(report);
    let res = app.run(&mut terminal);

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
    }
    report::print_report(&app.report);

    Ok(())
}
