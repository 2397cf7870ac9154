//! Deterministic collaborator doubles shared by the core unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::corpus::CorpusSource;
use crate::embedding::Embedder;
use crate::generation::Generator;
use crate::models::{CorpusRecord, PriceBar};
use crate::stocks::QuoteSource;

/// Succeeds or fails per call according to a script; unscripted calls succeed.
pub struct ScriptedEmbedder {
    outcomes: Vec<bool>,
    calls: AtomicUsize,
    short_by_one: bool,
}

impl ScriptedEmbedder {
    pub fn new(outcomes: Vec<bool>) -> Self {
        Self {
            outcomes,
            calls: AtomicUsize::new(0),
            short_by_one: false,
        }
    }

    pub fn short_by_one(mut self) -> Self {
        self.short_by_one = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.outcomes.get(call).copied().unwrap_or(true) {
            bail!("scripted failure on call {}", call);
        }
        let n = if self.short_by_one {
            texts.len().saturating_sub(1)
        } else {
            texts.len()
        };
        Ok((0..n).map(|i| vec![1.0, i as f32]).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("simulated embedding outage")
    }
}

/// Bag-of-words embedder over a fixed vocabulary.
///
/// A text with no vocabulary word embeds to the zero vector.
pub struct VocabEmbedder {
    vocab: Vec<&'static str>,
    calls: AtomicUsize,
}

impl VocabEmbedder {
    pub fn finance() -> Self {
        Self {
            vocab: vec![
                "apr", "annual", "percentage", "rate", "mean", "index", "funds", "insurance",
                "premium", "fraud", "stock", "stocks", "market", "dividend",
            ],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.vocab
            .iter()
            .map(|v| if words.contains(v) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Records every prompt and answers with a fixed prefix plus the prompt length.
#[derive(Default)]
pub struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("generated answer ({} chars of prompt)", prompt.len()))
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        bail!("quota exceeded")
    }
}

/// Counts fetches and returns a fixed record set regardless of topics.
pub struct CountingSource {
    records: Vec<CorpusRecord>,
    fetches: AtomicUsize,
    fail: bool,
}

impl CountingSource {
    pub fn new(records: Vec<CorpusRecord>) -> Self {
        Self {
            records,
            fetches: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            records: Vec::new(),
            fetches: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CorpusSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, _topics: &[String]) -> Result<Vec<CorpusRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("warehouse unreachable");
        }
        Ok(self.records.clone())
    }
}

/// Serves two fixed bars per symbol; symbols listed in `broken` fail.
pub struct FixedQuotes {
    pub broken: Vec<&'static str>,
}

#[async_trait]
impl QuoteSource for FixedQuotes {
    async fn recent_bars(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        if self.broken.iter().any(|b| *b == symbol) {
            bail!("no data for {}", symbol);
        }
        Ok(vec![
            PriceBar {
                date: "2026-10-15".to_string(),
                open: 100.0,
                high: 104.0,
                low: 99.5,
                close: 103.0,
                volume: 1_000,
            },
            PriceBar {
                date: "2026-10-16".to_string(),
                open: 103.0,
                high: 105.0,
                low: 101.0,
                close: 101.5,
                volume: 1_200,
            },
        ])
    }
}

pub fn record(input: &str, output: &str, category: &str) -> CorpusRecord {
    CorpusRecord {
        input_text: input.to_string(),
        output_text: output.to_string(),
        category: category.to_string(),
    }
}

pub fn finance_records() -> Vec<CorpusRecord> {
    vec![
        record(
            "How do index funds work?",
            "Index funds track a market index at low cost.",
            "markets",
        ),
        record(
            "What is APR?",
            "Annual Percentage Rate is the yearly cost of borrowing, including fees.",
            "fraud",
        ),
        record(
            "Is term insurance worth the premium?",
            "Term insurance is cheap coverage for a fixed period.",
            "insurance",
        ),
    ]
}
