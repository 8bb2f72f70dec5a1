use crate::error::{FrontierError, Result};
use crate::simulation::WeightSampling;
use chrono::NaiveDate;
use rayon::ThreadPoolBuilder;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

pub const DEFAULT_ASSETS: &[&str] = &["AAPL", "MSFT", "AGG", "GLD"];
pub const DEFAULT_BENCHMARK: &str = "SPY";
pub const DEFAULT_START_DATE: &str = "2020-01-01";
pub const DEFAULT_END_DATE: &str = "2023-01-01";
pub const DEFAULT_NUM_PORTFOLIOS: usize = 10_000;
/// Assumed 0 for simplicity.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.0;

/// Everything one simulation run depends on. Passed explicitly, never global.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub assets: Vec<String>,
    pub benchmark: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub num_portfolios: usize,
    pub risk_free_rate: f64,
    /// `None` draws a seed from OS entropy at run time (and logs it).
    pub seed: Option<u64>,
    pub sampling: WeightSampling,
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
            benchmark: DEFAULT_BENCHMARK.to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            num_portfolios: DEFAULT_NUM_PORTFOLIOS,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            seed: None,
            sampling: WeightSampling::Uniform,
            parallel: true,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_portfolios < 1 {
            return Err(FrontierError::invalid_configuration(
                "num_portfolios must be at least 1",
            ));
        }
        if self.assets.is_empty() {
            return Err(FrontierError::invalid_configuration(
                "at least one asset identifier is required",
            ));
        }
        let mut seen = HashSet::new();
        for asset in &self.assets {
            if asset.trim().is_empty() {
                return Err(FrontierError::invalid_configuration("empty asset identifier"));
            }
            if !seen.insert(asset.as_str()) {
                return Err(FrontierError::invalid_configuration(format!(
                    "duplicate asset identifier {}",
                    asset
                )));
            }
        }
        if self.benchmark.trim().is_empty() {
            return Err(FrontierError::invalid_configuration("empty benchmark identifier"));
        }
        if self.start_date >= self.end_date {
            return Err(FrontierError::invalid_configuration(format!(
                "start date {} must be before end date {}",
                self.start_date, self.end_date
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(FrontierError::invalid_configuration(
                "risk_free_rate must be a finite number",
            ));
        }
        Ok(())
    }

    /// The configured seed, or a fresh one from OS entropy.
    pub fn resolve_seed(&self) -> u64 {
        match self.seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::random();
                info!("No --seed given; using seed {} (pass it to reproduce this run)", seed);
                seed
            }
        }
    }
}

/// Splits a comma-separated ticker list, trimming and upper-casing entries.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn init_cpu_parallelism() {
    RAYON_INIT.get_or_init(|| {
        let num_threads = num_cpus::get().max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads (all logical CPU cores)",
                num_threads
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

/// Directory for cached provider responses (`FRONTIER_CACHE_DIR`, default `.cache`).
pub fn cache_dir() -> std::path::PathBuf {
    std::env::var("FRONTIER_CACHE_DIR")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from(".cache"))
}

pub fn fetch_attempts() -> usize {
    std::env::var("FRONTIER_FETCH_ATTEMPTS")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|v| v.clamp(1, 8))
        .unwrap_or(3)
}
