//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations selected by `[embedding].provider`:
//! - **[`DisabledEmbedder`]** : returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]** : `POST https://api.openai.com/v1/embeddings`.
//! - **[`OllamaEmbedder`]** : `POST {url}/api/embed` on a local Ollama instance.
//! - **[`GeminiEmbedder`]** : `batchEmbedContents` on the Generative Language API.
//! - **`LocalEmbedder`** : fastembed, behind the `local-embeddings` feature.
//!
//! Remote providers share the retry policy in [`crate::retry`]. Batching and
//! per-batch failure isolation happen in the core crate; a provider only
//! embeds the batch it is given, whole or not at all.

#[cfg(feature = "local-embeddings")]
mod local;

use anyhow::{bail, Result};
use async_trait::async_trait;
use finsight_core::embedding::Embedder;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::retry::{http_client, parse_vector, send_json};

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

// ============ Disabled ============

/// Fails every call. Used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI ============

/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIEmbedder {
    model: String,
    dims: Option<usize>,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims: config.dims,
            api_key,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut body = json!({
            "model": self.model,
            "input": texts,
        });
        if let Some(dims) = self.dims {
            body["dimensions"] = json!(dims);
        }

        let json = send_json("OpenAI API", self.max_retries, || {
            self.client
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        check_dims(parse_openai_response(&json)?, self.dims)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, parse_vector(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Requires Ollama running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: Option<usize>,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims: config.dims,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/api/embed", self.url);

        let json = send_json("Ollama API", self.max_retries, || {
            self.client.post(&endpoint).json(&body)
        })
        .await?;

        check_dims(parse_ollama_response(&json)?, self.dims)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| parse_vector(e, "Ollama"))
        .collect()
}

// ============ Gemini ============

/// Requires `GEMINI_API_KEY` in the environment.
pub struct GeminiEmbedder {
    model: String,
    dims: Option<usize>,
    url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Gemini provider"))?;
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string());

        Ok(Self {
            model,
            dims: config.dims,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = gemini_request(&self.model, self.dims, texts);
        let endpoint = format!("{}/v1beta/models/{}:batchEmbedContents", self.url, self.model);

        let json = send_json("Gemini API", self.max_retries, || {
            self.client
                .post(&endpoint)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
        })
        .await?;

        check_dims(parse_gemini_response(&json)?, self.dims)
    }
}

fn gemini_request(model: &str, dims: Option<usize>, texts: &[String]) -> Value {
    let requests: Vec<Value> = texts
        .iter()
        .map(|text| {
            let mut req = json!({
                "model": format!("models/{}", model),
                "content": { "parts": [{ "text": text }] },
            });
            if let Some(d) = dims {
                req["outputDimensionality"] = json!(d);
            }
            req
        })
        .collect();
    json!({ "requests": requests })
}

fn parse_gemini_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing embeddings array"))?
        .iter()
        .map(|e| {
            let values = e
                .get("values")
                .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing values"))?;
            parse_vector(values, "Gemini")
        })
        .collect()
}

/// Reject vectors whose length differs from the configured `dims`.
fn check_dims(vectors: Vec<Vec<f32>>, dims: Option<usize>) -> Result<Vec<Vec<f32>>> {
    if let Some(expected) = dims {
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            bail!(
                "embedding has {} dimensions, expected {}",
                bad.len(),
                expected
            );
        }
    }
    Ok(vectors)
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"gemini"` | [`GeminiEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires `--features local-embeddings`) |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_always_fails() {
        let embedder = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "disabled");
        let err = embedder.embed(&["hi".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "cohere".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let out = parse_openai_response(&json).unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(parse_openai_response(&json!({})).is_err());
    }

    #[test]
    fn test_parse_ollama() {
        let json = json!({ "model": "m", "embeddings": [[0.1, 0.2], [0.3, 0.4]] });
        let out = parse_ollama_response(&json).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[1][1] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_gemini_request_and_response() {
        let req = gemini_request("text-embedding-004", Some(256), &["a".into(), "b".into()]);
        let requests = req["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["model"], "models/text-embedding-004");
        assert_eq!(requests[1]["content"]["parts"][0]["text"], "b");
        assert_eq!(requests[0]["outputDimensionality"], 256);

        let json = json!({ "embeddings": [{ "values": [1.0, 2.0] }] });
        assert_eq!(parse_gemini_response(&json).unwrap(), vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn test_check_dims() {
        assert!(check_dims(vec![vec![1.0, 2.0]], Some(2)).is_ok());
        assert!(check_dims(vec![vec![1.0, 2.0]], None).is_ok());
        let err = check_dims(vec![vec![1.0, 2.0], vec![1.0]], Some(2)).unwrap_err();
        assert!(err.to_string().contains("expected 2"));
    }
}
