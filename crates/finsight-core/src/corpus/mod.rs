//! Corpus fetching and the embedded corpus.
//!
//! A [`CorpusSource`] returns question/answer records for a list of topic
//! filters. [`build_corpus`] turns those records into a [`Corpus`]:
//!
//! 1. Fetch records for the topics (failure is fatal to the build).
//! 2. Truncate to `max_entries` to bound embedding cost.
//! 3. Embed every `input_text` with [`embed_in_batches`].
//! 4. Attach each vector (or `None`) to its record by position.

pub mod memory;

use async_trait::async_trait;

use crate::embedding::{embed_in_batches, Embedder};
use crate::error::{PipelineError, Service};
use crate::models::{CorpusEntry, CorpusRecord};
use crate::search::{best_match, Match};

/// An external source of question/answer pairs.
///
/// Implementations may return fewer rows than exist and may be slow.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Short label for logs (e.g. `"file"`, `"bigquery"`).
    fn name(&self) -> &str;

    /// Fetch every record matching any of `topics`, with `category` set to
    /// the topic that selected it.
    async fn fetch(&self, topics: &[String]) -> anyhow::Result<Vec<CorpusRecord>>;
}

/// Limits applied while building a corpus.
#[derive(Debug, Clone, Copy)]
pub struct CorpusLimits {
    pub max_entries: usize,
    pub batch_size: usize,
}

/// An immutable, embedded corpus. Index positions are stable.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CorpusEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries carrying an embedding.
    pub fn embedded_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.embedding.is_some())
            .count()
    }

    /// Nearest entry to `query`, skipping entries without a usable embedding.
    pub fn best_match(&self, query: &[f32]) -> Option<Match> {
        best_match(
            query,
            self.entries.iter().map(|e| e.embedding.as_deref()),
        )
    }
}

/// Fetch, truncate, and embed a corpus for `topics`.
#[tracing::instrument(skip_all, fields(source = source.name(), topics = topics.len()))]
pub async fn build_corpus(
    source: &dyn CorpusSource,
    embedder: &dyn Embedder,
    topics: &[String],
    limits: CorpusLimits,
) -> Result<Corpus, PipelineError> {
    if limits.batch_size == 0 {
        return Err(PipelineError::Config(
            "embedding batch_size must be > 0".to_string(),
        ));
    }

    let mut records = source
        .fetch(topics)
        .await
        .map_err(|e| PipelineError::external(Service::Corpus, &e))?;

    let fetched = records.len();
    records.truncate(limits.max_entries);
    tracing::info!(fetched, kept = records.len(), "corpus fetched");

    let texts: Vec<String> = records.iter().map(|r| r.input_text.clone()).collect();
    let vectors = embed_in_batches(embedder, &texts, limits.batch_size).await?;

    let entries: Vec<CorpusEntry> = records
        .into_iter()
        .zip(vectors)
        .map(|(record, vector)| CorpusEntry::new(record, vector))
        .collect();

    let corpus = Corpus::new(entries);
    tracing::info!(
        entries = corpus.len(),
        embedded = corpus.embedded_count(),
        failed = corpus.len() - corpus.embedded_count(),
        "corpus ready"
    );

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{finance_records, CountingSource, ScriptedEmbedder, VocabEmbedder};

    fn limits(max_entries: usize, batch_size: usize) -> CorpusLimits {
        CorpusLimits {
            max_entries,
            batch_size,
        }
    }

    #[tokio::test]
    async fn test_build_attaches_embeddings_in_order() {
        let source = CountingSource::new(finance_records());
        let embedder = VocabEmbedder::finance();
        let corpus = build_corpus(&source, &embedder, &["fraud".into()], limits(200, 2))
            .await
            .unwrap();

        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.embedded_count(), 3);
        assert_eq!(corpus.get(1).unwrap().input_text, "What is APR?");
        // Batches of 2 over 3 records.
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_build_truncates_to_max_entries() {
        let source = CountingSource::new(finance_records());
        let embedder = VocabEmbedder::finance();
        let corpus = build_corpus(&source, &embedder, &["x".into()], limits(2, 5))
            .await
            .unwrap();
        assert_eq!(corpus.len(), 2);
    }

    #[tokio::test]
    async fn test_build_keeps_entries_of_failed_batch() {
        let source = CountingSource::new(finance_records());
        let embedder = ScriptedEmbedder::new(vec![false, true]);
        let corpus = build_corpus(&source, &embedder, &["x".into()], limits(200, 2))
            .await
            .unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.embedded_count(), 1);
        assert!(corpus.get(0).unwrap().embedding.is_none());
        assert!(corpus.get(2).unwrap().embedding.is_some());
    }

    #[tokio::test]
    async fn test_build_fetch_failure_is_fatal() {
        let source = CountingSource::failing();
        let embedder = VocabEmbedder::finance();
        let err = build_corpus(&source, &embedder, &["x".into()], limits(200, 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExternalService {
                service: Service::Corpus,
                ..
            }
        ));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_build_zero_batch_size_before_fetch() {
        let source = CountingSource::new(finance_records());
        let embedder = VocabEmbedder::finance();
        let err = build_corpus(&source, &embedder, &["x".into()], limits(200, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert_eq!(source.fetches(), 0);
    }
}
