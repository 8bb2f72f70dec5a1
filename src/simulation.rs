use crate::config::SimulationConfig;
use crate::error::{FrontierError, Result};
use crate::estimator::{portfolio_metrics, PortfolioMetrics};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Iterations per parallel work unit. Fixed so results do not depend on the
/// number of worker threads.
pub const SIMULATION_BLOCK_SIZE: usize = 1024;

// ──────────────────────────────────────────────────────────────────────────────
// Data Structures
// ──────────────────────────────────────────────────────────────────────────────

/// How raw non-negative draws are generated before normalization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightSampling {
    /// Uniform on [0, 1) per asset, then normalized. Biased toward the
    /// simplex centre.
    #[default]
    Uniform,
    /// Standard exponential draws, giving a flat Dirichlet over the simplex.
    Dirichlet,
}

impl WeightSampling {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightSampling::Uniform => "uniform",
            WeightSampling::Dirichlet => "dirichlet",
        }
    }
}

/// One simulated portfolio. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSample {
    /// Position in generation order.
    pub index: usize,
    pub weights: Vec<f64>,
    #[serde(flatten)]
    pub metrics: PortfolioMetrics,
}

/// A finished run: the seed that produced it and every sample in index order.
#[derive(Clone, Debug)]
pub struct SimulationRun {
    pub seed: u64,
    pub samples: Vec<PortfolioSample>,
}

// ──────────────────────────────────────────────────────────────────────────────
// Sampling
// ──────────────────────────────────────────────────────────────────────────────

/// Draws a random weight vector on the unit simplex.
pub fn sample_weights(
    n_assets: usize,
    sampling: WeightSampling,
    rng: &mut impl Rng,
) -> Result<Vec<f64>> {
    use rand_distr::{Distribution, Exp1};

    if n_assets == 0 {
        return Err(FrontierError::invalid_configuration(
            "cannot sample weights for zero assets",
        ));
    }

    loop {
        let raw: Vec<f64> = match sampling {
            WeightSampling::Uniform => (0..n_assets).map(|_| rng.r#gen::<f64>()).collect(),
            WeightSampling::Dirichlet => (0..n_assets).map(|_| Exp1.sample(rng)).collect(),
        };
        let sum: f64 = raw.iter().sum();
        // All-zero draws cannot be normalized; draw again.
        if sum > 0.0 {
            return Ok(raw.iter().map(|v| v / sum).collect());
        }
    }
}

fn check_inputs(n_portfolios: usize, n_assets: usize, covariance: &[Vec<f64>]) -> Result<()> {
    if n_portfolios < 1 {
        return Err(FrontierError::invalid_configuration(
            "n_portfolios must be at least 1",
        ));
    }
    if n_assets < 1 {
        return Err(FrontierError::invalid_configuration("n_assets must be at least 1"));
    }
    if n_assets != covariance.len() {
        return Err(FrontierError::invalid_configuration(format!(
            "n_assets is {} but the covariance matrix is {}x{}",
            n_assets,
            covariance.len(),
            covariance.len()
        )));
    }
    Ok(())
}

fn evaluate_sample(
    index: usize,
    n_assets: usize,
    mean_daily_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
    sampling: WeightSampling,
    rng: &mut impl Rng,
) -> Result<PortfolioSample> {
    let weights = sample_weights(n_assets, sampling, rng)?;
    let metrics = portfolio_metrics(&weights, mean_daily_returns, covariance, risk_free_rate)
        .map_err(|e| match e {
            FrontierError::DegenerateVolatility { context } => {
                FrontierError::degenerate_volatility(format!("simulation {}: {}", index, context))
            }
            other => other,
        })?;
    Ok(PortfolioSample {
        index,
        weights,
        metrics,
    })
}

// ──────────────────────────────────────────────────────────────────────────────
// Simulation
// ──────────────────────────────────────────────────────────────────────────────

/// Runs `n_portfolios` sequential iterations on the supplied random source.
///
/// Any iteration failure aborts the whole run; nothing is skipped.
pub fn run_simulation(
    n_portfolios: usize,
    n_assets: usize,
    mean_daily_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
    sampling: WeightSampling,
    rng: &mut impl Rng,
) -> Result<Vec<PortfolioSample>> {
    check_inputs(n_portfolios, n_assets, covariance)?;

    let mut samples = Vec::with_capacity(n_portfolios);
    for index in 0..n_portfolios {
        samples.push(evaluate_sample(
            index,
            n_assets,
            mean_daily_returns,
            covariance,
            risk_free_rate,
            sampling,
            rng,
        )?);
    }
    Ok(samples)
}

/// Parallel version of [`run_simulation`] on the rayon pool.
///
/// Iterations are cut into blocks of [`SIMULATION_BLOCK_SIZE`]. Each block owns
/// a `StdRng` seeded from a master generator, so the output for a given
/// `seed` is identical whatever the thread count.
pub fn run_simulation_parallel(
    n_portfolios: usize,
    n_assets: usize,
    mean_daily_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
    sampling: WeightSampling,
    seed: u64,
) -> Result<Vec<PortfolioSample>> {
    check_inputs(n_portfolios, n_assets, covariance)?;

    let n_blocks = n_portfolios.div_ceil(SIMULATION_BLOCK_SIZE);
    let mut master = StdRng::seed_from_u64(seed);
    let block_seeds: Vec<u64> = (0..n_blocks).map(|_| master.r#gen::<u64>()).collect();

    let blocks: Vec<Vec<PortfolioSample>> = block_seeds
        .into_par_iter()
        .enumerate()
        .map(|(block_idx, block_seed)| {
            let mut rng = StdRng::seed_from_u64(block_seed);
            let start = block_idx * SIMULATION_BLOCK_SIZE;
            let end = (start + SIMULATION_BLOCK_SIZE).min(n_portfolios);
            (start..end)
                .map(|index| {
                    evaluate_sample(
                        index,
                        n_assets,
                        mean_daily_returns,
                        covariance,
                        risk_free_rate,
                        sampling,
                        &mut rng,
                    )
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(blocks.into_iter().flatten().collect())
}

/// Validates `config` and runs the simulation in the configured mode.
pub fn run_configured(
    config: &SimulationConfig,
    mean_daily_returns: &[f64],
    covariance: &[Vec<f64>],
) -> Result<SimulationRun> {
    config.validate()?;
    let n_assets = config.assets.len();
    let seed = config.resolve_seed();

    info!(
        "Simulating {} portfolios over {} assets (sampling={:?}, parallel={}, seed={})",
        config.num_portfolios, n_assets, config.sampling, config.parallel, seed
    );

    let samples = if config.parallel {
        run_simulation_parallel(
            config.num_portfolios,
            n_assets,
            mean_daily_returns,
            covariance,
            config.risk_free_rate,
            config.sampling,
            seed,
        )?
    } else {
        let mut rng = StdRng::seed_from_u64(seed);
        run_simulation(
            config.num_portfolios,
            n_assets,
            mean_daily_returns,
            covariance,
            config.risk_free_rate,
            config.sampling,
            &mut rng,
        )?
    };

    Ok(SimulationRun { seed, samples })
}

// ──────────────────────────────────────────────────────────────────────────────
// Selection
// ──────────────────────────────────────────────────────────────────────────────

/// Returns the sample with the greatest Sharpe ratio; ties go to the lowest index.
pub fn select_optimal(samples: &[PortfolioSample]) -> Result<&PortfolioSample> {
    let mut iter = samples.iter();
    let mut best = iter.next().ok_or(FrontierError::EmptyResultSet)?;
    for sample in iter {
        if sample.metrics.sharpe > best.metrics.sharpe {
            best = sample;
        }
    }
    Ok(best)
}
