//! Wiring for the answer pipeline and the `finsight ask` command.

use anyhow::{bail, Result};
use finsight_core::error::PipelineError;
use finsight_core::generation::NO_MATCH_REPLY;
use finsight_core::models::{MatchedEntry, QueryAnswer};
use finsight_core::pipeline::{AnswerPipeline, PipelineBuilder};
use serde::Serialize;

use crate::config::Config;
use crate::corpus::create_corpus_source;
use crate::embedding::create_embedder;
use crate::generation::create_generator;

const NO_KEYWORDS_REPLY: &str = "No relevant keywords found in your query.";

/// Build the configured collaborators and bring the pipeline to ready.
///
/// In static mode this fetches and embeds the corpus, so it can take a while.
pub async fn build_pipeline(config: &Config) -> Result<AnswerPipeline> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in the config to answer questions.");
    }
    if !config.generation.is_enabled() {
        bail!("Generation provider is disabled. Set [generation] provider in the config to answer questions.");
    }

    let source = create_corpus_source(&config.corpus)?;
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;

    let pipeline = PipelineBuilder::new(source, embedder, generator, config.pipeline_settings())
        .initialize()
        .await?;
    Ok(pipeline)
}

/// What the caller sees for a question: a real answer or an expected miss.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    /// `answered`, `empty_query`, `no_keywords`, or `no_match`.
    pub status: &'static str,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchedEntry>,
}

/// Fold expected misses (empty query, no keywords, no match) into a normal
/// response. Service faults stay errors.
pub fn to_response(
    question: &str,
    result: Result<QueryAnswer, PipelineError>,
) -> Result<AskResponse, PipelineError> {
    let miss = |status, answer: &str| AskResponse {
        question: question.to_string(),
        answer: answer.to_string(),
        status,
        matched: None,
    };

    match result {
        Ok(a) => Ok(AskResponse {
            question: a.question,
            answer: a.answer,
            status: "answered",
            matched: Some(a.matched),
        }),
        Err(e @ PipelineError::EmptyQuery) => Ok(miss("empty_query", &e.to_string())),
        Err(PipelineError::NoKeywords) => Ok(miss("no_keywords", NO_KEYWORDS_REPLY)),
        Err(PipelineError::NoMatch) => Ok(miss("no_match", NO_MATCH_REPLY)),
        Err(e) => Err(e),
    }
}

/// `finsight ask <question>`
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        println!("{}", PipelineError::EmptyQuery);
        return Ok(());
    }

    let pipeline = build_pipeline(config).await?;
    let result = pipeline.answer(question).await;

    match to_response(question, result) {
        Ok(resp) => {
            if let Some(m) = &resp.matched {
                println!(
                    "matched: {} [{}] (score {:.3})",
                    m.input_text, m.category, m.score
                );
                println!();
            }
            println!("{}", resp.answer);
            Ok(())
        }
        Err(e) if e.is_user_facing() => {
            println!("{}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
