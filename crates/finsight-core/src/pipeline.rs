//! The answer pipeline: retrieval then generation.
//!
//! # Lifecycle
//!
//! ```text
//! PipelineBuilder ──initialize()──▶ AnswerPipeline
//!  (uninitialized)                     (ready, immutable)
//! ```
//!
//! In [`RetrievalMode::Static`] mode `initialize` fetches and embeds the corpus
//! for the configured topics once; a fetch failure there is fatal. In
//! [`RetrievalMode::Keyword`] mode `initialize` makes no external call and
//! every query builds its own corpus from the query's keywords.
//!
//! A ready pipeline is only read, so it can be shared behind an `Arc` and
//! serve concurrent queries without locking.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::{build_corpus, Corpus, CorpusLimits, CorpusSource};
use crate::embedding::{embed_query, Embedder};
use crate::error::PipelineError;
use crate::generation::{generate_answer, Generator};
use crate::keywords::extract_keywords;
use crate::models::{MatchedEntry, QueryAnswer};

/// Where the retrieval candidates for a query come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// One corpus, built at initialization from the configured topics.
    #[default]
    Static,
    /// A fresh corpus per query, scoped to the query's keywords.
    Keyword,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub mode: RetrievalMode,
    pub topics: Vec<String>,
    pub max_entries: usize,
    pub batch_size: usize,
    pub max_output_tokens: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Static,
            topics: ["fraud", "trading", "stocks", "markets", "insurance"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            max_entries: 200,
            batch_size: 5,
            max_output_tokens: 1024,
        }
    }
}

impl PipelineSettings {
    fn limits(&self) -> CorpusLimits {
        CorpusLimits {
            max_entries: self.max_entries,
            batch_size: self.batch_size,
        }
    }
}

/// An uninitialized pipeline: collaborators and settings, no corpus yet.
pub struct PipelineBuilder {
    source: Arc<dyn CorpusSource>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
}

impl PipelineBuilder {
    pub fn new(
        source: Arc<dyn CorpusSource>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            source,
            embedder,
            generator,
            settings,
        }
    }

    /// Move to the ready state.
    ///
    /// Static mode fetches and embeds the corpus here; any corpus fetch
    /// failure is returned and no pipeline is produced.
    pub async fn initialize(self) -> Result<AnswerPipeline, PipelineError> {
        if self.settings.batch_size == 0 {
            return Err(PipelineError::Config(
                "embedding batch_size must be > 0".to_string(),
            ));
        }

        let corpus = match self.settings.mode {
            RetrievalMode::Static => Some(
                build_corpus(
                    self.source.as_ref(),
                    self.embedder.as_ref(),
                    &self.settings.topics,
                    self.settings.limits(),
                )
                .await?,
            ),
            RetrievalMode::Keyword => None,
        };

        tracing::info!(
            mode = ?self.settings.mode,
            embedder = self.embedder.model_name(),
            generator = self.generator.model_name(),
            "answer pipeline ready"
        );

        Ok(AnswerPipeline {
            source: self.source,
            embedder: self.embedder,
            generator: self.generator,
            settings: self.settings,
            corpus,
        })
    }
}

/// A ready pipeline.
pub struct AnswerPipeline {
    source: Arc<dyn CorpusSource>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
    /// Present in static mode only.
    corpus: Option<Corpus>,
}

impl AnswerPipeline {
    pub fn mode(&self) -> RetrievalMode {
        self.settings.mode
    }

    /// The static corpus, if this pipeline has one.
    pub fn corpus(&self) -> Option<&Corpus> {
        self.corpus.as_ref()
    }

    /// Answer a natural-language question.
    ///
    /// Expected outcomes ([`PipelineError::EmptyQuery`],
    /// [`PipelineError::NoKeywords`], [`PipelineError::NoMatch`]) are decided
    /// before any paid call where possible.
    #[tracing::instrument(skip(self), fields(mode = ?self.settings.mode))]
    pub async fn answer(&self, query: &str) -> Result<QueryAnswer, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let scoped;
        let corpus = match &self.corpus {
            Some(corpus) => corpus,
            None => {
                let keywords = extract_keywords(query);
                if keywords.is_empty() {
                    return Err(PipelineError::NoKeywords);
                }
                tracing::debug!(?keywords, "keywords extracted");
                scoped = build_corpus(
                    self.source.as_ref(),
                    self.embedder.as_ref(),
                    &keywords,
                    self.settings.limits(),
                )
                .await?;
                &scoped
            }
        };

        if corpus.embedded_count() == 0 {
            return Err(PipelineError::NoMatch);
        }

        let query_vector = embed_query(self.embedder.as_ref(), query).await?;
        let best = corpus
            .best_match(&query_vector)
            .ok_or(PipelineError::NoMatch)?;
        let entry = corpus.get(best.index).ok_or(PipelineError::NoMatch)?;

        tracing::info!(
            index = best.index,
            score = best.score,
            category = %entry.category,
            "matched corpus entry"
        );

        let answer = generate_answer(
            self.generator.as_ref(),
            entry,
            query,
            self.settings.max_output_tokens,
        )
        .await?;

        Ok(QueryAnswer {
            question: query.to_string(),
            answer,
            matched: MatchedEntry {
                index: best.index,
                score: best.score,
                input_text: entry.input_text.clone(),
                category: entry.category.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Service;
    use crate::test_support::{
        finance_records, CountingSource, FailingGenerator, RecordingGenerator, ScriptedEmbedder,
        VocabEmbedder,
    };

    fn settings(mode: RetrievalMode) -> PipelineSettings {
        PipelineSettings {
            mode,
            ..PipelineSettings::default()
        }
    }

    struct Fixture {
        source: Arc<CountingSource>,
        embedder: Arc<VocabEmbedder>,
        generator: Arc<RecordingGenerator>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                source: Arc::new(CountingSource::new(finance_records())),
                embedder: Arc::new(VocabEmbedder::finance()),
                generator: Arc::new(RecordingGenerator::default()),
            }
        }

        fn builder(&self, mode: RetrievalMode) -> PipelineBuilder {
            PipelineBuilder::new(
                self.source.clone(),
                self.embedder.clone(),
                self.generator.clone(),
                settings(mode),
            )
        }
    }

    #[tokio::test]
    async fn test_answers_from_apr_entry() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Static).initialize().await.unwrap();

        let answer = pipeline.answer("What does APR mean?").await.unwrap();
        assert_eq!(answer.question, "What does APR mean?");
        assert_eq!(answer.matched.index, 1);
        assert_eq!(answer.matched.input_text, "What is APR?");

        let prompts = fx.generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("What is APR?"));
        assert!(prompts[0]
            .contains("Annual Percentage Rate is the yearly cost of borrowing, including fees."));
        assert!(prompts[0].contains("\"What does APR mean?\""));
    }

    #[tokio::test]
    async fn test_question_echoed_as_given() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Static).initialize().await.unwrap();

        let answer = pipeline.answer("  What does APR mean?\n").await.unwrap();
        assert_eq!(answer.question, "  What does APR mean?\n");
        assert_eq!(answer.matched.input_text, "What is APR?");
    }

    #[tokio::test]
    async fn test_static_corpus_fetched_once() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Static).initialize().await.unwrap();
        assert_eq!(fx.source.fetches(), 1);
        assert_eq!(pipeline.mode(), RetrievalMode::Static);
        let corpus = pipeline.corpus().unwrap();
        assert_eq!(corpus.len(), 3);
        assert!(corpus.entries().iter().all(|e| e.embedding.is_some()));

        pipeline.answer("What is APR?").await.unwrap();
        pipeline.answer("term insurance premium").await.unwrap();
        assert_eq!(fx.source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_answer_is_idempotent() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Static).initialize().await.unwrap();
        let first = pipeline.answer("What does APR mean?").await.unwrap();
        let second = pipeline.answer("What does APR mean?").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_call() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Static).initialize().await.unwrap();
        let calls_after_init = fx.embedder.calls();

        for q in ["", "   \n\t"] {
            let err = pipeline.answer(q).await.unwrap_err();
            assert!(matches!(err, PipelineError::EmptyQuery));
        }
        assert_eq!(fx.embedder.calls(), calls_after_init);
        assert!(fx.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_structured() {
        // Corpus batch succeeds, query embedding fails.
        let source = Arc::new(CountingSource::new(finance_records()));
        let embedder = Arc::new(ScriptedEmbedder::new(vec![true, false]));
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = PipelineBuilder::new(
            source,
            embedder,
            generator.clone(),
            settings(RetrievalMode::Static),
        )
        .initialize()
        .await
        .unwrap();

        let err = pipeline.answer("What is APR?").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExternalService {
                service: Service::Embedding,
                ..
            }
        ));
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_structured() {
        let fx = Fixture::new();
        let pipeline = PipelineBuilder::new(
            fx.source.clone(),
            fx.embedder.clone(),
            Arc::new(FailingGenerator),
            settings(RetrievalMode::Static),
        )
        .initialize()
        .await
        .unwrap();

        let err = pipeline.answer("What is APR?").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExternalService {
                service: Service::Generation,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_initialize_fails_when_fetch_fails() {
        let result = PipelineBuilder::new(
            Arc::new(CountingSource::failing()),
            Arc::new(VocabEmbedder::finance()),
            Arc::new(RecordingGenerator::default()),
            settings(RetrievalMode::Static),
        )
        .initialize()
        .await;

        assert!(matches!(
            result,
            Err(PipelineError::ExternalService {
                service: Service::Corpus,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_all_null_embeddings_is_no_match() {
        let embedder = Arc::new(ScriptedEmbedder::new(vec![false]));
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = PipelineBuilder::new(
            Arc::new(CountingSource::new(finance_records())),
            embedder.clone(),
            generator.clone(),
            settings(RetrievalMode::Static),
        )
        .initialize()
        .await
        .unwrap();

        assert_eq!(pipeline.corpus().unwrap().embedded_count(), 0);
        let err = pipeline.answer("What is APR?").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoMatch));
        // Only the failed corpus batch was attempted.
        assert_eq!(embedder.calls(), 1);
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_zero_norm_query_is_no_match() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Static).initialize().await.unwrap();
        let err = pipeline.answer("weather tomorrow").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoMatch));
    }

    #[tokio::test]
    async fn test_empty_corpus_is_no_match() {
        let embedder = Arc::new(VocabEmbedder::finance());
        let pipeline = PipelineBuilder::new(
            Arc::new(CountingSource::new(Vec::new())),
            embedder.clone(),
            Arc::new(RecordingGenerator::default()),
            settings(RetrievalMode::Static),
        )
        .initialize()
        .await
        .unwrap();

        let err = pipeline.answer("What is APR?").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoMatch));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_keyword_mode_initialize_is_free() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Keyword).initialize().await.unwrap();
        assert_eq!(pipeline.mode(), RetrievalMode::Keyword);
        assert!(pipeline.corpus().is_none());
        assert_eq!(fx.source.fetches(), 0);
        assert_eq!(fx.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_keyword_mode_stop_words_only() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Keyword).initialize().await.unwrap();

        let err = pipeline.answer("What is it that you do?").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoKeywords));
        assert_eq!(fx.source.fetches(), 0);
        assert_eq!(fx.embedder.calls(), 0);
        assert!(fx.generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_keyword_mode_builds_corpus_per_query() {
        let fx = Fixture::new();
        let pipeline = fx.builder(RetrievalMode::Keyword).initialize().await.unwrap();

        let answer = pipeline.answer("What does APR mean?").await.unwrap();
        assert_eq!(answer.matched.input_text, "What is APR?");
        pipeline.answer("What does APR mean?").await.unwrap();
        assert_eq!(fx.source.fetches(), 2);
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrap {
            mode: RetrievalMode,
        }
        let w: Wrap = serde_json::from_str(r#"{"mode":"keyword"}"#).unwrap();
        assert_eq!(w.mode, RetrievalMode::Keyword);
        assert!(serde_json::from_str::<Wrap>(r#"{"mode":"hybrid"}"#).is_err());
    }
}
