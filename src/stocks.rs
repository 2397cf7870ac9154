//! Quote source backed by the Yahoo Finance chart API, and the
//! `finsight compare` command.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use finsight_core::models::PriceBar;
use finsight_core::stocks::{QuoteSource, StockAnalyst};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{Config, StocksConfig};
use crate::generation::create_generator;
use crate::retry::{http_client, send_json};

pub struct DisabledQuotes;

#[async_trait]
impl QuoteSource for DisabledQuotes {
    async fn recent_bars(&self, _symbol: &str) -> Result<Vec<PriceBar>> {
        bail!("Stocks provider is disabled")
    }
}

pub struct YahooQuotes {
    url: String,
    range: String,
    recent_days: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl YahooQuotes {
    pub fn new(config: &StocksConfig) -> Result<Self> {
        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            range: config.range.clone(),
            recent_days: config.recent_days,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Convert a chart response into its last `recent_days` complete daily bars.
fn parse_chart(json: serde_json::Value, recent_days: usize) -> Result<Vec<PriceBar>> {
    let envelope: ChartEnvelope =
        serde_json::from_value(json).context("failed to parse chart response")?;

    if let Some(err) = envelope.chart.error {
        bail!("{}: {}", err.code, err.description);
    }
    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow::anyhow!("chart response has no result"))?;
    let series = result.indicators.quote.into_iter().next().unwrap_or_default();

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();
    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let bar = (|| {
            Some(PriceBar {
                date: DateTime::from_timestamp(*ts, 0)?
                    .date_naive()
                    .format("%Y-%m-%d")
                    .to_string(),
                open: at(&series.open, i)?,
                high: at(&series.high, i)?,
                low: at(&series.low, i)?,
                close: at(&series.close, i)?,
                volume: series.volume.get(i).copied().flatten()?,
            })
        })();
        if let Some(bar) = bar {
            bars.push(bar);
        }
    }

    if bars.is_empty() {
        bail!("no price data returned");
    }
    let skip = bars.len().saturating_sub(recent_days);
    Ok(bars.split_off(skip))
}

#[async_trait]
impl QuoteSource for YahooQuotes {
    async fn recent_bars(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let endpoint = format!("{}/v8/finance/chart/{}", self.url, symbol);
        let json = send_json("Yahoo Finance", self.max_retries, || {
            self.client
                .get(&endpoint)
                .header(reqwest::header::USER_AGENT, "finsight/0.1")
                .query(&[("range", self.range.as_str()), ("interval", "1d")])
        })
        .await?;
        parse_chart(json, self.recent_days)
    }
}

pub fn create_quote_source(config: &StocksConfig) -> Result<Arc<dyn QuoteSource>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledQuotes)),
        "yahoo" => Ok(Arc::new(YahooQuotes::new(config)?)),
        other => bail!("Unknown stocks provider: {}", other),
    }
}

/// Wire the configured quote source and generator into a [`StockAnalyst`].
pub fn build_analyst(config: &Config) -> Result<StockAnalyst> {
    Ok(StockAnalyst::new(
        create_quote_source(&config.stocks)?,
        create_generator(&config.generation)?,
        config.generation.max_output_tokens,
        config.stocks.max_symbols,
    ))
}

/// `finsight compare <SYMBOL>...`
pub async fn run_compare(config: &Config, symbols: Vec<String>) -> Result<()> {
    let analyst = build_analyst(config)?;
    let result = analyst.compare(&symbols).await?;
    println!("{}", result.query.join(" vs "));
    println!();
    println!("{}", result.analysis);
    Ok(())
}
