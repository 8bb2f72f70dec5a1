use crate::config::SimulationConfig;
use crate::error::Result;
use crate::estimator::PortfolioMetrics;
use crate::simulation::{select_optimal, PortfolioSample, SimulationRun, WeightSampling};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Everything the presentation side needs from one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrontierReport {
    pub assets: Vec<String>,
    pub benchmark: String,
    pub seed: u64,
    pub sampling: WeightSampling,
    pub risk_free_rate: f64,
    pub benchmark_metrics: PortfolioMetrics,
    pub optimal_index: usize,
    pub samples: Vec<PortfolioSample>,
}

impl FrontierReport {
    pub fn new(
        config: &SimulationConfig,
        run: SimulationRun,
        benchmark_metrics: PortfolioMetrics,
    ) -> Result<Self> {
        let optimal_index = select_optimal(&run.samples)?.index;
        Ok(Self {
            assets: config.assets.clone(),
            benchmark: config.benchmark.clone(),
            seed: run.seed,
            sampling: config.sampling,
            risk_free_rate: config.risk_free_rate,
            benchmark_metrics,
            optimal_index,
            samples: run.samples,
        })
    }

    pub fn optimal(&self) -> &PortfolioSample {
        &self.samples[self.optimal_index]
    }

    /// `(asset, weight)` pairs of the optimum, in asset order.
    pub fn optimal_weights(&self) -> Vec<(&str, f64)> {
        self.assets
            .iter()
            .map(String::as_str)
            .zip(self.optimal().weights.iter().copied())
            .collect()
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        info!("Wrote {} simulated portfolios to {}", self.samples.len(), path.display());
        Ok(())
    }
}

/// Inner width of the report box; longer rows widen it.
const BOX_MIN_WIDTH: usize = 60;

enum BoxRow {
    Title(String),
    Text(String),
    Rule,
}

fn frame(rows: &[BoxRow]) -> Vec<String> {
    let width = rows
        .iter()
        .filter_map(|row| match row {
            BoxRow::Title(text) | BoxRow::Text(text) => Some(text.chars().count()),
            BoxRow::Rule => None,
        })
        .fold(BOX_MIN_WIDTH, usize::max);
    let bar = "═".repeat(width);

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("╔{}╗", bar));
    for row in rows {
        lines.push(match row {
            BoxRow::Title(text) => format!("║{:^width$}║", text),
            BoxRow::Text(text) => format!("║{:<width$}║", text),
            BoxRow::Rule => format!("╠{}╣", bar),
        });
    }
    lines.push(format!("╚{}╝", bar));
    lines
}

fn metric_rows(m: &PortfolioMetrics) -> [BoxRow; 3] {
    [
        BoxRow::Text(format!("    Return       : {:>+8.2}%", m.annual_return * 100.0)),
        BoxRow::Text(format!("    Volatility   : {:>8.2}%", m.annual_vol * 100.0)),
        BoxRow::Text(format!("    Sharpe Ratio : {:>8.2}", m.sharpe)),
    ]
}

/// The boxed summary of the optimum and the benchmark, one string per line.
pub fn report_lines(report: &FrontierReport) -> Vec<String> {
    let best = report.optimal();

    let mut rows = vec![
        BoxRow::Title("Monte Carlo Efficient Frontier".to_string()),
        BoxRow::Rule,
        BoxRow::Text(format!("  Portfolios simulated   : {:>9}", report.samples.len())),
        BoxRow::Text(format!("  Risk-free rate         : {:>8.2}%", report.risk_free_rate * 100.0)),
        BoxRow::Text(format!("  Weight sampling        : {}", report.sampling.as_str())),
        BoxRow::Text(format!("  Seed                   : {}", report.seed)),
        BoxRow::Rule,
        BoxRow::Text(format!("  Optimal Weights (simulation #{})", best.index)),
        BoxRow::Rule,
    ];
    for (asset, w) in report.optimal_weights() {
        rows.push(BoxRow::Text(format!("    {:<8} {:>7.2}%", asset, w * 100.0)));
    }
    rows.push(BoxRow::Rule);
    rows.push(BoxRow::Text("  Optimized Portfolio".to_string()));
    rows.extend(metric_rows(&best.metrics));
    rows.push(BoxRow::Rule);
    rows.push(BoxRow::Text(format!("  Market ({})", report.benchmark)));
    rows.extend(metric_rows(&report.benchmark_metrics));

    frame(&rows)
}

/// Pretty-prints the optimum and the benchmark to stdout.
pub fn print_report(report: &FrontierReport) {
    println!();
    for line in report_lines(report) {
        println!("{}", line);
    }
    println!();
    println!("⚠  Past performance is not indicative of future results.");
}
