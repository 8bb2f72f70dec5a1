use crate::error::{FrontierError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────────────────────────────────────
// Configuration
// ──────────────────────────────────────────────────────────────────────────────

/// Annual trading days for annualization. An approximation, intentionally fixed.
pub const TRADING_DAYS: f64 = 252.0;

// ──────────────────────────────────────────────────────────────────────────────
// Data Structures
// ──────────────────────────────────────────────────────────────────────────────

/// Adjusted closing prices, one row per trading date, one column per asset.
///
/// A cell is `None` when the provider has no usable quote for that asset on
/// that date.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTable {
    pub assets: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<Option<f64>>>,
}

/// Fractional daily price changes with no missing cells.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
    pub assets: Vec<String>,
    /// Date of the later price in each return pair.
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<Vec<f64>>,
}

impl ReturnMatrix {
    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn n_days(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[idx]).collect()
    }
}

/// Annualized return, annualized volatility and Sharpe ratio of a portfolio.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    #[serde(rename = "return")]
    pub annual_return: f64,
    #[serde(rename = "volatility")]
    pub annual_vol: f64,
    #[serde(rename = "sharpe_ratio")]
    pub sharpe: f64,
}

// ──────────────────────────────────────────────────────────────────────────────
// Return Statistics
// ──────────────────────────────────────────────────────────────────────────────

fn usable_price(cell: Option<f64>) -> Option<f64> {
    cell.filter(|p| p.is_finite() && *p > 0.0)
}

/// Converts a price table into daily fractional returns.
///
/// Rows with any missing (or non-positive) price are dropped first; each
/// remaining row then yields `p[t] / p[t-1] - 1` against the previous
/// remaining row, so the first one has no return.
pub fn daily_returns(prices: &PriceTable) -> Result<ReturnMatrix> {
    let n = prices.assets.len();
    if n == 0 {
        return Err(FrontierError::invalid_configuration(
            "price table has no asset columns",
        ));
    }

    if prices.dates.len() != prices.rows.len() {
        return Err(FrontierError::dimension_mismatch(
            "price table dates",
            prices.rows.len(),
            prices.dates.len(),
        ));
    }

    let mut complete: Vec<(NaiveDate, Vec<f64>)> = Vec::with_capacity(prices.rows.len());
    for (date, row) in prices.dates.iter().zip(prices.rows.iter()) {
        if row.len() != n {
            return Err(FrontierError::dimension_mismatch("price row", n, row.len()));
        }
        let values: Option<Vec<f64>> = row.iter().map(|cell| usable_price(*cell)).collect();
        if let Some(values) = values {
            complete.push((*date, values));
        }
    }

    if complete.len() < 2 {
        return Err(FrontierError::insufficient_data(
            "daily returns (complete price rows)",
            2,
            complete.len(),
        ));
    }

    let mut dates = Vec::with_capacity(complete.len() - 1);
    let mut rows = Vec::with_capacity(complete.len() - 1);
    for pair in complete.windows(2) {
        let (_, prev) = &pair[0];
        let (date, curr) = &pair[1];
        rows.push(
            curr.iter()
                .zip(prev.iter())
                .map(|(c, p)| c / p - 1.0)
                .collect(),
        );
        dates.push(*date);
    }

    Ok(ReturnMatrix {
        assets: prices.assets.clone(),
        dates,
        rows,
    })
}

fn check_row_widths(returns: &ReturnMatrix) -> Result<()> {
    let n = returns.n_assets();
    match returns.rows.iter().find(|row| row.len() != n) {
        Some(row) => Err(FrontierError::dimension_mismatch("return row", n, row.len())),
        None => Ok(()),
    }
}

/// Per-asset arithmetic mean of daily returns.
pub fn mean_returns(returns: &ReturnMatrix) -> Result<Vec<f64>> {
    check_row_widths(returns)?;
    let n = returns.n_assets();
    let t = returns.n_days() as f64;
    let mut means = vec![0.0; n];
    if returns.rows.is_empty() {
        return Ok(means);
    }
    for row in &returns.rows {
        for (m, r) in means.iter_mut().zip(row.iter()) {
            *m += r;
        }
    }
    means.iter_mut().for_each(|m| *m /= t);
    Ok(means)
}

/// Sample covariance matrix of the return columns (T−1 denominator).
pub fn covariance(returns: &ReturnMatrix) -> Result<Vec<Vec<f64>>> {
    let n = returns.n_assets();
    let t = returns.n_days();
    if n == 0 {
        return Err(FrontierError::invalid_configuration(
            "covariance needs at least one asset",
        ));
    }
    check_row_widths(returns)?;
    if t < 2 {
        return Err(FrontierError::insufficient_data("covariance", 2, t));
    }

    let means = mean_returns(returns)?;
    let mut cov = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let sum: f64 = returns
                .rows
                .iter()
                .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                .sum();
            let c = sum / (t as f64 - 1.0);
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }

    Ok(cov)
}

pub fn annualize_return(mean_daily_return: f64) -> f64 {
    mean_daily_return * TRADING_DAYS
}

pub fn annualize_volatility(daily_stddev: f64) -> f64 {
    daily_stddev * TRADING_DAYS.sqrt()
}

// ──────────────────────────────────────────────────────────────────────────────
// Portfolio Metrics
// ──────────────────────────────────────────────────────────────────────────────

fn portfolio_return(weights: &[f64], means: &[f64]) -> f64 {
    weights.iter().zip(means.iter()).map(|(w, r)| w * r).sum()
}

fn portfolio_variance(weights: &[f64], cov: &[Vec<f64>]) -> f64 {
    let n = weights.len();
    let mut var = 0.0;
    for i in 0..n {
        for j in 0..n {
            var += weights[i] * weights[j] * cov[i][j];
        }
    }
    var
}

/// Annualized return, volatility and Sharpe ratio for one weight vector.
///
/// Fails with [`FrontierError::DegenerateVolatility`] instead of producing an
/// infinite or NaN Sharpe ratio when the portfolio has zero variance.
pub fn portfolio_metrics(
    weights: &[f64],
    mean_daily_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
) -> Result<PortfolioMetrics> {
    let n = covariance.len();
    if weights.len() != n {
        return Err(FrontierError::dimension_mismatch("portfolio weights", n, weights.len()));
    }
    if mean_daily_returns.len() != n {
        return Err(FrontierError::dimension_mismatch(
            "mean daily returns",
            n,
            mean_daily_returns.len(),
        ));
    }
    if let Some(row) = covariance.iter().find(|row| row.len() != n) {
        return Err(FrontierError::dimension_mismatch("covariance row", n, row.len()));
    }

    let annual_return = annualize_return(portfolio_return(weights, mean_daily_returns));
    // Round-off can push a PSD quadratic form slightly below zero.
    let variance = portfolio_variance(weights, covariance).max(0.0);
    let annual_vol = annualize_volatility(variance.sqrt());

    if annual_vol == 0.0 {
        return Err(FrontierError::degenerate_volatility(format!(
            "weights {:?}",
            weights
        )));
    }

    Ok(PortfolioMetrics {
        annual_return,
        annual_vol,
        sharpe: (annual_return - risk_free_rate) / annual_vol,
    })
}

/// Metrics of a benchmark evaluated as a one-asset portfolio with weight 1.
pub fn benchmark_metrics(benchmark_returns: &[f64], risk_free_rate: f64) -> Result<PortfolioMetrics> {
    let t = benchmark_returns.len();
    if t < 2 {
        return Err(FrontierError::insufficient_data("benchmark returns", 2, t));
    }
    let mean = benchmark_returns.iter().sum::<f64>() / t as f64;
    let variance = benchmark_returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / (t as f64 - 1.0);

    portfolio_metrics(&[1.0], &[mean], &[vec![variance]], risk_free_rate)
        .map_err(|e| match e {
            FrontierError::DegenerateVolatility { .. } => {
                FrontierError::degenerate_volatility("benchmark return series is constant")
            }
            other => other,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn matrix(rows: Vec<Vec<f64>>) -> ReturnMatrix {
        let n = rows[0].len();
        ReturnMatrix {
            assets: (0..n).map(|i| format!("A{}", i)).collect(),
            dates: (0..rows.len()).map(|i| date(i as u32 + 2)).collect(),
            rows,
        }
    }

    #[test]
    fn test_daily_returns_drops_incomplete_rows() {
        let prices = PriceTable {
            assets: vec!["AAA".into(), "BBB".into()],
            dates: (1..=5).map(date).collect(),
            rows: vec![
                vec![Some(100.0), Some(50.0)],
                vec![Some(110.0), None],
                vec![Some(121.0), Some(55.0)],
                vec![None, Some(60.0)],
                vec![Some(133.1), Some(66.0)],
            ],
        };

        let returns = daily_returns(&prices).unwrap();
        assert_eq!(returns.assets, prices.assets);
        assert_eq!(returns.dates, vec![date(3), date(5)]);
        assert_eq!(returns.n_days(), 2);
        assert!((returns.rows[0][0] - 0.21).abs() < 1e-12);
        assert!((returns.rows[0][1] - 0.10).abs() < 1e-12);
        assert!((returns.rows[1][0] - 0.10).abs() < 1e-12);
        assert!((returns.rows[1][1] - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_daily_returns_insufficient_data() {
        let prices = PriceTable {
            assets: vec!["AAA".into(), "BBB".into()],
            dates: (1..=3).map(date).collect(),
            rows: vec![
                vec![Some(100.0), None],
                vec![Some(101.0), Some(50.0)],
                vec![Some(f64::NAN), Some(51.0)],
            ],
        };

        match daily_returns(&prices) {
            Err(FrontierError::InsufficientData { available, .. }) => assert_eq!(available, 1),
            other => panic!("expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_covariance_matrix_symmetry() {
        let returns = matrix(vec![
            vec![0.01, 0.02, -0.003],
            vec![0.03, 0.00, 0.004],
            vec![-0.01, 0.01, 0.002],
            vec![0.005, -0.02, 0.001],
        ]);
        let cov = covariance(&returns).unwrap();

        assert_eq!(cov.len(), 3);
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (cov[i][j] - cov[j][i]).abs() < 1e-12,
                    "Covariance matrix should be symmetric"
                );
            }
            assert!(cov[i][i] > 0.0, "Variance should be positive");
        }
    }

    #[test]
    fn test_covariance_uses_sample_denominator() {
        let returns = matrix(vec![vec![0.01, 0.02], vec![0.03, 0.00], vec![-0.01, 0.01]]);
        let cov = covariance(&returns).unwrap();

        assert!((cov[0][0] - 0.0004).abs() < 1e-15);
        assert!((cov[1][1] - 0.0001).abs() < 1e-15);
        assert!((cov[0][1] + 0.0001).abs() < 1e-15);
    }

    #[test]
    fn test_covariance_needs_two_rows() {
        let returns = matrix(vec![vec![0.01, 0.02]]);
        assert!(matches!(
            covariance(&returns),
            Err(FrontierError::InsufficientData { required: 2, available: 1, .. })
        ));
    }

    #[test]
    fn test_ragged_return_rows_rejected() {
        let returns = ReturnMatrix {
            assets: vec!["A".into(), "B".into()],
            dates: vec![date(2), date(3)],
            rows: vec![vec![0.01, 0.02], vec![0.03]],
        };
        let expected = FrontierError::dimension_mismatch("return row", 2, 1);

        assert_eq!(mean_returns(&returns).unwrap_err(), expected);
        assert_eq!(covariance(&returns).unwrap_err(), expected);
    }

    #[test]
    fn test_portfolio_metrics_reference_values() {
        let means = [0.001, 0.0005];
        let cov = vec![vec![0.0004, 0.0], vec![0.0, 0.0001]];
        let m = portfolio_metrics(&[0.5, 0.5], &means, &cov, 0.0).unwrap();

        assert!((m.annual_return - 0.1890).abs() < 1e-4);
        assert!((m.annual_vol - 0.1775).abs() < 1e-4);
        assert!((m.sharpe - 1.0646).abs() < 1e-3);
    }

    #[test]
    fn test_portfolio_metrics_is_deterministic() {
        let means = [0.0007, -0.0002, 0.0004];
        let cov = vec![
            vec![0.0004, 0.00005, 0.0],
            vec![0.00005, 0.0002, 0.00001],
            vec![0.0, 0.00001, 0.0003],
        ];
        let w = [0.2, 0.3, 0.5];
        let a = portfolio_metrics(&w, &means, &cov, 0.01).unwrap();
        let b = portfolio_metrics(&w, &means, &cov, 0.01).unwrap();
        assert_eq!(a.annual_return.to_bits(), b.annual_return.to_bits());
        assert_eq!(a.annual_vol.to_bits(), b.annual_vol.to_bits());
        assert_eq!(a.sharpe.to_bits(), b.sharpe.to_bits());
    }

    #[test]
    fn test_portfolio_metrics_dimension_mismatch() {
        let cov = vec![vec![0.0004, 0.0], vec![0.0, 0.0001]];
        let err = portfolio_metrics(&[0.2, 0.3, 0.5], &[0.001, 0.002], &cov, 0.0).unwrap_err();
        assert_eq!(err, FrontierError::dimension_mismatch("portfolio weights", 2, 3));
    }

    #[test]
    fn test_portfolio_metrics_zero_volatility() {
        let cov = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let err = portfolio_metrics(&[0.5, 0.5], &[0.001, 0.002], &cov, 0.0).unwrap_err();
        assert!(matches!(err, FrontierError::DegenerateVolatility { .. }));
    }

    #[test]
    fn test_single_asset_matches_benchmark_formula() {
        let series = [0.01, -0.004, 0.007, 0.002, -0.011, 0.006];
        let n = series.len() as f64;
        let mean = series.iter().sum::<f64>() / n;
        let std = (series.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();

        let returns = matrix(series.iter().map(|r| vec![*r]).collect());
        let means = mean_returns(&returns).unwrap();
        let cov = covariance(&returns).unwrap();
        let via_portfolio = portfolio_metrics(&[1.0], &means, &cov, 0.02).unwrap();
        let via_benchmark = benchmark_metrics(&series, 0.02).unwrap();

        assert!((via_portfolio.annual_return - mean * 252.0).abs() < 1e-12);
        assert!((via_portfolio.annual_vol - std * 252f64.sqrt()).abs() < 1e-12);
        assert!((via_benchmark.annual_return - via_portfolio.annual_return).abs() < 1e-12);
        assert!((via_benchmark.annual_vol - via_portfolio.annual_vol).abs() < 1e-12);
        assert!((via_benchmark.sharpe - via_portfolio.sharpe).abs() < 1e-9);
    }

    #[test]
    fn test_benchmark_constant_series_is_degenerate() {
        let err = benchmark_metrics(&[0.25, 0.25, 0.25], 0.0).unwrap_err();
        assert!(matches!(err, FrontierError::DegenerateVolatility { .. }));
    }
}
