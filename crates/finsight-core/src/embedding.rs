//! Embedding trait, batch and query embedders, and cosine similarity.
//!
//! Concrete providers (OpenAI, Ollama, Gemini, fastembed) live in the
//! `finsight` app crate and implement [`Embedder`].
//!
//! # Batch failure policy
//!
//! [`embed_in_batches`] calls the embedder once per contiguous chunk of at
//! most `batch_size` texts. A failed chunk (error, or the wrong number of
//! vectors back) yields one `None` per text in that chunk and the remaining
//! chunks carry on. The query embedder, by contrast, propagates failures:
//! the pipeline cannot answer without a query vector.

use async_trait::async_trait;

use crate::error::{PipelineError, Service};

/// An external embedding model.
///
/// `embed` must return one vector per input, in input order. A batch either
/// fails as a whole or succeeds as a whole.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Partition `texts` into contiguous chunks of at most `batch_size`, in order.
///
/// Fails fast with [`PipelineError::Config`] when `batch_size` is zero.
pub fn batches(
    texts: &[String],
    batch_size: usize,
) -> Result<std::slice::Chunks<'_, String>, PipelineError> {
    if batch_size == 0 {
        return Err(PipelineError::Config(
            "embedding batch_size must be > 0".to_string(),
        ));
    }
    Ok(texts.chunks(batch_size))
}

/// Embed every text, batch by batch, isolating per-batch failures.
///
/// The output has exactly `texts.len()` elements in input order; elements
/// from a failed batch are `None`. The only error is an invalid `batch_size`.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Option<Vec<f32>>>, PipelineError> {
    let mut out = Vec::with_capacity(texts.len());
    let mut failed_batches = 0usize;

    for (batch_index, batch) in batches(texts, batch_size)?.enumerate() {
        let result = embedder.embed(batch).await.and_then(|vectors| {
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                );
            }
            Ok(vectors)
        });

        match result {
            Ok(vectors) => out.extend(vectors.into_iter().map(Some)),
            Err(e) => {
                failed_batches += 1;
                tracing::warn!(
                    batch_index,
                    batch_len = batch.len(),
                    first_text = %preview(&batch[0]),
                    error = %format!("{:#}", e),
                    "embedding batch failed; substituting placeholders"
                );
                out.extend(std::iter::repeat_with(|| None).take(batch.len()));
            }
        }
    }

    if failed_batches > 0 {
        tracing::warn!(failed_batches, total = texts.len(), "some embedding batches failed");
    }

    Ok(out)
}

/// Embed a single query text.
///
/// Failures surface as [`PipelineError::ExternalService`].
pub async fn embed_query(
    embedder: &dyn Embedder,
    text: &str,
) -> Result<Vec<f32>, PipelineError> {
    let vectors = embedder
        .embed(&[text.to_string()])
        .await
        .map_err(|e| PipelineError::external(Service::Embedding, &e))?;

    vectors
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::ExternalService {
            service: Service::Embedding,
            message: "empty embedding response".to_string(),
        })
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `None` when the similarity is undefined: empty vectors, differing
/// lengths, a zero-norm operand, or a non-finite result. Callers treat `None`
/// as "not a candidate".
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    let sim = (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32;
    sim.is_finite().then_some(sim)
}

fn preview(text: &str) -> String {
    const MAX: usize = 60;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
