use crate::config;
use crate::estimator::{self, PriceTable};
use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Cached responses older than this are refetched.
const CACHE_MAX_AGE_SECS: u64 = 86_400;

/// Daily adjusted closes of one symbol, ascending by date.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceSeries {
    pub symbol: String,
    pub closes: Vec<(NaiveDate, f64)>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooChartError>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartError {
    code: String,
    description: String,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

fn cache_path(cache_dir: &Path, symbol: &str, start: NaiveDate, end: NaiveDate) -> PathBuf {
    cache_dir.join(format!("{}_{}_{}.json", symbol, start, end))
}

/// Turns a chart payload into a dated close series.
///
/// Prefers the split/dividend adjusted series and falls back to raw closes
/// when the provider omits it. Bars without a value are skipped.
fn parse_chart_response(symbol: &str, response: &YahooChartResponse) -> Result<PriceSeries> {
    if let Some(err) = &response.chart.error {
        return Err(anyhow::anyhow!(
            "Yahoo chart error for {}: {} ({})",
            symbol,
            err.description,
            err.code
        ));
    }

    let result = response
        .chart
        .result
        .as_ref()
        .and_then(|r| r.first())
        .ok_or(anyhow::anyhow!("No data found for {}", symbol))?;

    let values: &[Option<f64>] = match result.indicators.adjclose.first() {
        Some(adj) if !adj.adjclose.is_empty() => &adj.adjclose,
        _ => {
            warn!("{}: no adjusted closes in response, using raw closes", symbol);
            result
                .indicators
                .quote
                .first()
                .map(|q| q.close.as_slice())
                .unwrap_or(&[])
        }
    };

    let mut closes = Vec::with_capacity(result.timestamp.len());
    for (i, &timestamp) in result.timestamp.iter().enumerate() {
        let Some(Some(close)) = values.get(i) else {
            continue;
        };
        let Some(date) = Utc.timestamp_opt(timestamp, 0).single() else {
            warn!("{}: skipping bar with invalid timestamp {}", symbol, timestamp);
            continue;
        };
        closes.push((date.date_naive(), *close));
    }

    Ok(PriceSeries {
        symbol: symbol.to_uppercase(),
        closes,
    })
}

impl YahooChartResponse {
    /// A payload worth caching: no provider error and at least one result.
    fn has_data(&self) -> bool {
        self.chart.error.is_none()
            && self.chart.result.as_ref().is_some_and(|r| !r.is_empty())
    }
}

/// Cached payloads that carry a provider error count as a miss.
fn read_fresh_cache(path: &Path) -> Result<Option<YahooChartResponse>> {
    if !path.exists() {
        return Ok(None);
    }
    let modified = std::fs::metadata(path)?.modified()?;
    let age = std::time::SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    if age.as_secs() >= CACHE_MAX_AGE_SECS {
        return Ok(None);
    }
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let cached: YahooChartResponse = serde_json::from_reader(reader)?;
    Ok(cached.has_data().then_some(cached))
}

/// Persists `response` unless it is an error payload. Returns whether it was written.
fn write_cache(path: &Path, response: &YahooChartResponse) -> Result<bool> {
    if !response.has_data() {
        return Ok(false);
    }
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer(writer, response)?;
    Ok(true)
}

async fn request_chart(url: &str) -> Result<YahooChartResponse> {
    let resp = reqwest::Client::new()
        .get(url)
        .header("User-Agent", "Mozilla/5.0")
        .send()
        .await?;
    let status = resp.status();
    let body: YahooChartResponse = resp
        .json()
        .await
        .with_context(|| format!("unreadable chart payload (HTTP {})", status))?;

    // 4xx with a chart error is a definitive answer (unknown symbol, bad range).
    if status.is_server_error() || (!status.is_success() && body.chart.error.is_none()) {
        anyhow::bail!("HTTP {}", status);
    }
    Ok(body)
}

async fn fetch_from_api(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    cache_path: &Path,
) -> Result<YahooChartResponse> {
    let url = format!(
        "https://query1.finance.yahoo.com/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div%2Csplit",
        symbol,
        unix_midnight(start),
        unix_midnight(end)
    );

    let mut attempts = 0;
    let max_attempts = config::fetch_attempts();

    loop {
        attempts += 1;
        match request_chart(&url).await {
            Ok(resp_json) => {
                if !write_cache(cache_path, &resp_json)? {
                    warn!("{}: provider returned no data, response not cached", symbol);
                }
                return Ok(resp_json);
            }
            Err(e) => {
                if attempts >= max_attempts {
                    return Err(e);
                }
                warn!(
                    "Failed to fetch data for {} (attempt {}/{}): {:#}",
                    symbol, attempts, max_attempts, e
                );
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}

/// Fetches daily adjusted closes for `symbol` in `[start, end)`, served from
/// `cache_dir` when a response younger than 24 hours is present.
pub async fn fetch_prices_cached(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    cache_dir: &Path,
) -> Result<PriceSeries> {
    if !cache_dir.exists() {
        std::fs::create_dir_all(cache_dir)?;
    }
    let path = cache_path(cache_dir, symbol, start, end);

    let response = match read_fresh_cache(&path) {
        Ok(Some(cached)) => {
            info!("Loading {} from cache...", symbol);
            cached
        }
        Ok(None) => {
            info!("Cache miss for {}, fetching...", symbol);
            fetch_from_api(symbol, start, end, &path).await?
        }
        Err(e) => {
            warn!("Unreadable cache for {} ({}), fetching...", symbol, e);
            fetch_from_api(symbol, start, end, &path).await?
        }
    };

    parse_chart_response(symbol, &response)
}

pub async fn fetch_prices(symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<PriceSeries> {
    fetch_prices_cached(symbol, start, end, &config::cache_dir()).await
}

/// Aligns several close series on the union of their trading dates.
///
/// Columns follow `series` order; a cell is `None` where that symbol has no
/// close on that date.
pub fn build_price_table(series: &[PriceSeries]) -> PriceTable {
    let n = series.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (col, s) in series.iter().enumerate() {
        for (date, close) in &s.closes {
            by_date.entry(*date).or_insert_with(|| vec![None; n])[col] = Some(*close);
        }
    }

    let (dates, rows) = by_date.into_iter().unzip();
    PriceTable {
        assets: series.iter().map(|s| s.symbol.clone()).collect(),
        dates,
        rows,
    }
}

/// Downloads every asset in order and aligns them into one table.
pub async fn fetch_price_table(
    assets: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceTable> {
    let mut series = Vec::with_capacity(assets.len());
    for symbol in assets {
        let s = fetch_prices(symbol, start, end)
            .await
            .with_context(|| format!("price fetch failed for {} ({}..{})", symbol, start, end))?;
        info!("{}: {} daily closes", symbol, s.closes.len());
        series.push(s);
    }
    Ok(build_price_table(&series))
}

/// Daily returns of the benchmark, on its own trading calendar.
pub async fn fetch_benchmark_returns(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<f64>> {
    let series = fetch_prices(symbol, start, end)
        .await
        .with_context(|| format!("benchmark fetch failed for {}", symbol))?;
    let table = build_price_table(std::slice::from_ref(&series));
    let returns = estimator::daily_returns(&table)?;
    Ok(returns.column(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_JSON: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1672756200, 1672842600, 1672929000, 1673015400],
                "indicators": {
                    "quote": [{"close": [125.07, 126.36, null, 129.62]}],
                    "adjclose": [{"adjclose": [123.63, 124.91, null, 128.13]}]
                }
            }],
            "error": null
        }
    }"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(symbol: &str, closes: &[(u32, f64)]) -> PriceSeries {
        PriceSeries {
            symbol: symbol.to_string(),
            closes: closes.iter().map(|(d, c)| (date(2023, 1, *d), *c)).collect(),
        }
    }

    #[test]
    fn test_parse_prefers_adjusted_closes() {
        let response: YahooChartResponse = serde_json::from_str(CHART_JSON).unwrap();
        let s = parse_chart_response("aapl", &response).unwrap();

        assert_eq!(s.symbol, "AAPL");
        assert_eq!(s.closes.len(), 3);
        assert_eq!(s.closes[0], (date(2023, 1, 3), 123.63));
        assert_eq!(s.closes[2], (date(2023, 1, 6), 128.13));
    }

    #[test]
    fn test_parse_falls_back_to_raw_closes() {
        let json = r#"{"chart": {"result": [{
            "timestamp": [1672756200, 1672842600],
            "indicators": {"quote": [{"close": [125.07, 126.36]}]}
        }], "error": null}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        let s = parse_chart_response("MSFT", &response).unwrap();
        assert_eq!(s.closes.iter().map(|(_, c)| *c).collect::<Vec<_>>(), vec![125.07, 126.36]);
    }

    #[test]
    fn test_parse_surfaces_provider_error() {
        let json = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        let err = parse_chart_response("ZZZZ", &response).unwrap_err();
        assert!(err.to_string().contains("symbol may be delisted"));
    }

    #[test]
    fn test_build_price_table_aligns_dates() {
        let a = series("AAA", &[(3, 10.0), (4, 11.0), (5, 12.0)]);
        let b = series("BBB", &[(3, 20.0), (5, 22.0), (6, 23.0)]);
        let table = build_price_table(&[a, b]);

        assert_eq!(table.assets, vec!["AAA", "BBB"]);
        assert_eq!(
            table.dates,
            vec![date(2023, 1, 3), date(2023, 1, 4), date(2023, 1, 5), date(2023, 1, 6)]
        );
        assert_eq!(table.rows[0], vec![Some(10.0), Some(20.0)]);
        assert_eq!(table.rows[1], vec![Some(11.0), None]);
        assert_eq!(table.rows[3], vec![None, Some(23.0)]);

        let returns = estimator::daily_returns(&table).unwrap();
        assert_eq!(returns.n_days(), 1);
        assert!((returns.rows[0][0] - 0.2).abs() < 1e-12);
        assert!((returns.rows[0][1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_error_payload_is_never_cached() {
        let dir = std::env::temp_dir().join(format!("frontier-error-cache-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ZZZZ.json");

        let json = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let failed: YahooChartResponse = serde_json::from_str(json).unwrap();
        assert!(!write_cache(&path, &failed).unwrap());
        assert!(!path.exists());

        let ok: YahooChartResponse = serde_json::from_str(CHART_JSON).unwrap();
        assert!(write_cache(&path, &ok).unwrap());
        assert!(read_fresh_cache(&path).unwrap().is_some());

        // An error payload left behind by an older build is treated as a miss.
        std::fs::write(&path, json).unwrap();
        assert!(read_fresh_cache(&path).unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unix_midnight() {
        assert_eq!(unix_midnight(date(2020, 1, 1)), 1_577_836_800);
    }

    #[tokio::test]
    async fn test_fresh_cache_is_served_without_network() {
        let dir = std::env::temp_dir().join(format!("frontier-cache-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let (start, end) = (date(2023, 1, 1), date(2023, 1, 10));
        std::fs::write(cache_path(&dir, "AAPL", start, end), CHART_JSON).unwrap();

        let s = fetch_prices_cached("AAPL", start, end, &dir).await.unwrap();
        assert_eq!(s.closes.len(), 3);

        std::fs::remove_dir_all(&dir).ok();
    }
}
