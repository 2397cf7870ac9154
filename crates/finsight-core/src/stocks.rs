//! Stock comparison: recent price history per ticker, summarised by the
//! generation model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::generation::{generate_text, Generator};
use crate::models::{PriceBar, StockComparison};

/// Recent daily price bars for a ticker symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn recent_bars(&self, symbol: &str) -> anyhow::Result<Vec<PriceBar>>;
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '^' | '=' | '-')
}

/// Trim, uppercase, and de-duplicate `symbols`, keeping first-seen order.
///
/// Symbols may only contain `A-Z`, `0-9`, `.`, `^`, `=` and `-`.
pub fn normalize_symbols(
    symbols: &[String],
    max_symbols: usize,
) -> Result<Vec<String>, PipelineError> {
    if symbols.is_empty() {
        return Err(PipelineError::EmptyQuery);
    }

    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for raw in symbols {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "stock symbols must not be blank".to_string(),
            ));
        }
        if !symbol.chars().all(is_symbol_char) {
            return Err(PipelineError::InvalidRequest(format!(
                "invalid stock symbol '{}'",
                raw.trim()
            )));
        }
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }

    if out.len() > max_symbols {
        return Err(PipelineError::InvalidRequest(format!(
            "at most {} symbols can be compared, got {}",
            max_symbols,
            out.len()
        )));
    }

    Ok(out)
}

/// JSON for one symbol's bars, or the error text if they don't serialize.
fn symbol_data<T: Serialize + ?Sized>(symbol: &str, bars: &T) -> Value {
    serde_json::to_value(bars).unwrap_or_else(|e| {
        tracing::warn!(symbol = %symbol, error = %e, "quote serialization failed");
        Value::String(format!("Error serializing data: {}", e))
    })
}

pub fn build_comparison_prompt(symbols: &[String], data: &Value) -> String {
    format!(
        "You are a finance expert. Provide a very crisp response in 2-3 points. \
         Compare the following stocks for the upcoming week: [{}].\nData: {}",
        symbols.join(", "),
        data
    )
}

pub struct StockAnalyst {
    quotes: Arc<dyn QuoteSource>,
    generator: Arc<dyn Generator>,
    max_output_tokens: u32,
    max_symbols: usize,
}

impl StockAnalyst {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        generator: Arc<dyn Generator>,
        max_output_tokens: u32,
        max_symbols: usize,
    ) -> Self {
        Self {
            quotes,
            generator,
            max_output_tokens,
            max_symbols,
        }
    }

    /// Compare `symbols` over their recent trading days.
    ///
    /// A symbol whose quotes cannot be fetched is still included, with the
    /// error text in place of its bars.
    #[tracing::instrument(skip(self))]
    pub async fn compare(&self, symbols: &[String]) -> Result<StockComparison, PipelineError> {
        let symbols = normalize_symbols(symbols, self.max_symbols)?;

        let mut data = Map::new();
        for symbol in &symbols {
            let value = match self.quotes.recent_bars(symbol).await {
                Ok(bars) => symbol_data(symbol, &bars),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %format!("{:#}", e), "quote fetch failed");
                    Value::String(format!("Error fetching data: {:#}", e))
                }
            };
            data.insert(symbol.clone(), value);
        }

        let prompt = build_comparison_prompt(&symbols, &Value::Object(data));
        let analysis = generate_text(self.generator.as_ref(), &prompt, self.max_output_tokens).await?;

        Ok(StockComparison {
            query: symbols,
            analysis,
        })
    }
}
