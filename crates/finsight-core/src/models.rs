//! Core data models that flow through the answer pipeline.

use serde::{Deserialize, Serialize};

/// A question/answer pair as returned by a [`CorpusSource`](crate::corpus::CorpusSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub input_text: String,
    pub output_text: String,
    /// The topic filter that selected this record.
    pub category: String,
}

/// A corpus record with its embedding attached.
///
/// `embedding` is `None` when the batch containing this record failed to
/// embed. Such entries stay in the corpus (index positions are the join key)
/// but are never selected as a match.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub input_text: String,
    pub output_text: String,
    pub category: String,
    pub embedding: Option<Vec<f32>>,
}

impl CorpusEntry {
    pub fn new(record: CorpusRecord, embedding: Option<Vec<f32>>) -> Self {
        Self {
            input_text: record.input_text,
            output_text: record.output_text,
            category: record.category,
            embedding,
        }
    }
}

/// Which corpus entry a query was answered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedEntry {
    /// Position in the corpus the answer was retrieved from.
    pub index: usize,
    /// Cosine similarity between the query and the entry.
    pub score: f32,
    pub input_text: String,
    pub category: String,
}

/// A successful answer to a natural-language question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub question: String,
    pub answer: String,
    #[serde(rename = "match")]
    pub matched: MatchedEntry,
}

/// One daily OHLCV bar for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Trading day, `YYYY-MM-DD`.
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Result of a stock comparison request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockComparison {
    /// The normalised symbols that were compared.
    pub query: Vec<String>,
    pub analysis: String,
}
