//! Corpus sources and the `finsight corpus` command.
//!
//! - `file`: a JSON array of `{input_text, output_text, tags}` rows, served by
//!   the core [`InMemoryCorpus`].
//! - `bigquery`: one parameterised `jobs.query` call per topic against a
//!   Stack Exchange style questions table. The OAuth access token is read
//!   from the environment variable named by `corpus.token_env` on every
//!   fetch, since such tokens are short-lived.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use finsight_core::corpus::memory::{InMemoryCorpus, TaggedRow};
use finsight_core::corpus::CorpusSource;
use finsight_core::models::CorpusRecord;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, CorpusConfig};
use crate::retry::{http_client, send_json};

// ============ File ============

pub struct FileCorpusSource {
    inner: InMemoryCorpus,
}

impl FileCorpusSource {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
        let rows: Vec<TaggedRow> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse corpus file: {}", path.display()))?;
        tracing::debug!(rows = rows.len(), path = %path.display(), "corpus file loaded");
        Ok(Self {
            inner: InMemoryCorpus::new(rows),
        })
    }
}

#[async_trait]
impl CorpusSource for FileCorpusSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self, topics: &[String]) -> Result<Vec<CorpusRecord>> {
        self.inner.fetch(topics).await
    }
}

// ============ BigQuery ============

pub struct BigQuerySource {
    project: String,
    table: String,
    min_score: i64,
    token_env: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl BigQuerySource {
    pub fn new(config: &CorpusConfig) -> Result<Self> {
        let project = config
            .project
            .clone()
            .ok_or_else(|| anyhow::anyhow!("corpus.project required for bigquery source"))?;
        let table = config
            .table
            .clone()
            .ok_or_else(|| anyhow::anyhow!("corpus.table required for bigquery source"))?;
        if !is_valid_table_name(&table) {
            bail!("corpus.table contains invalid characters: '{}'", table);
        }

        Ok(Self {
            project,
            table,
            min_score: config.min_score,
            token_env: config.token_env.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn query_body(&self, topic: &str) -> Value {
        let sql = format!(
            "SELECT title AS input_text, answer_body AS output_text FROM `{}` \
             WHERE accepted_answer_id IS NOT NULL AND answer_body IS NOT NULL \
             AND REGEXP_CONTAINS(tags, @topic) AND score >= @min_score",
            self.table
        );
        json!({
            "query": sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": [
                {
                    "name": "topic",
                    "parameterType": { "type": "STRING" },
                    "parameterValue": { "value": topic },
                },
                {
                    "name": "min_score",
                    "parameterType": { "type": "INT64" },
                    "parameterValue": { "value": self.min_score.to_string() },
                },
            ],
        })
    }
}

/// `project.dataset.table` made of letters, digits, `_`, `-`, and `.`.
fn is_valid_table_name(table: &str) -> bool {
    !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Turn a `jobs.query` response into records tagged with `topic`.
fn parse_query_response(json: &Value, topic: &str) -> Result<Vec<CorpusRecord>> {
    if !json
        .get("jobComplete")
        .and_then(|c| c.as_bool())
        .unwrap_or(false)
    {
        bail!("BigQuery job did not complete within the request timeout");
    }

    let Some(rows) = json.get("rows").and_then(|r| r.as_array()) else {
        // No matching rows: BigQuery omits the field entirely.
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = row
            .get("f")
            .and_then(|f| f.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid BigQuery response: row without fields"))?;
        let cell = |i: usize| -> Option<String> {
            cells
                .get(i)
                .and_then(|c| c.get("v"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        match (cell(0), cell(1)) {
            (Some(input_text), Some(output_text)) => out.push(CorpusRecord {
                input_text,
                output_text,
                category: topic.to_string(),
            }),
            _ => tracing::debug!(topic, "skipping BigQuery row with null fields"),
        }
    }
    Ok(out)
}

#[async_trait]
impl CorpusSource for BigQuerySource {
    fn name(&self) -> &str {
        "bigquery"
    }

    async fn fetch(&self, topics: &[String]) -> Result<Vec<CorpusRecord>> {
        let token = std::env::var(&self.token_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", self.token_env))?;
        let endpoint = format!("{}/bigquery/v2/projects/{}/queries", self.url, self.project);

        let mut out = Vec::new();
        for topic in topics {
            let body = self.query_body(topic);
            let json = send_json("BigQuery API", self.max_retries, || {
                self.client.post(&endpoint).bearer_auth(&token).json(&body)
            })
            .await
            .with_context(|| format!("query for topic '{}' failed", topic))?;

            let records = parse_query_response(&json, topic)?;
            tracing::debug!(topic = %topic, rows = records.len(), "BigQuery topic fetched");
            out.extend(records);
        }
        Ok(out)
    }
}

/// Create the [`CorpusSource`] named by `config.source`.
pub fn create_corpus_source(config: &CorpusConfig) -> Result<Arc<dyn CorpusSource>> {
    match config.source.as_str() {
        "file" => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("corpus.path must be specified for file source"))?;
            Ok(Arc::new(FileCorpusSource::load(path)?))
        }
        "bigquery" => Ok(Arc::new(BigQuerySource::new(config)?)),
        other => bail!("Unknown corpus source: {}", other),
    }
}

// ============ finsight corpus ============

/// Record counts per category, in category order.
pub fn summarize(records: &[CorpusRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.category.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Fetch the corpus for `topics` (or the configured topics) and print a
/// per-category summary. No embedding is performed.
pub async fn run_corpus(config: &Config, topics: Vec<String>) -> Result<()> {
    let topics = if topics.is_empty() {
        config.pipeline.topics.clone()
    } else {
        topics
    };
    let source = create_corpus_source(&config.corpus)?;
    let records = source.fetch(&topics).await?;

    println!("source: {}", source.name());
    for (category, count) in summarize(&records) {
        println!("  {:<16} {}", category, count);
    }
    let kept = records.len().min(config.pipeline.max_entries);
    println!(
        "total: {} (pipeline keeps {} of max_entries {})",
        records.len(),
        kept,
        config.pipeline.max_entries
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_filters_by_topic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"input_text": "What is APR?", "output_text": "A yearly rate.", "tags": ["credit", "fraud"]}},
                {{"input_text": "Term life?", "output_text": "Cheap cover.", "tags": ["insurance"]}},
                {{"input_text": "Untagged", "output_text": "x"}}
            ]"#
        )
        .unwrap();

        let source = FileCorpusSource::load(file.path()).unwrap();
        let records = source
            .fetch(&["fraud".to_string(), "insurance".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "fraud");
        assert_eq!(records[1].input_text, "Term life?");
    }

    #[test]
    fn test_file_source_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = FileCorpusSource::load(file.path()).err().unwrap();
        assert!(err.to_string().contains("Failed to parse corpus file"));
    }

    #[test]
    fn test_file_source_requires_path() {
        let err = create_corpus_source(&CorpusConfig::default()).err().unwrap();
        assert!(err.to_string().contains("corpus.path"));
    }

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("my-project.stackexchange_data.questions"));
        assert!(!is_valid_table_name("x` WHERE 1=1 --"));
        assert!(!is_valid_table_name(""));
    }

    #[test]
    fn test_query_body_uses_parameters() {
        let config = CorpusConfig {
            source: "bigquery".into(),
            project: Some("proj".into()),
            table: Some("proj.data.questions".into()),
            ..CorpusConfig::default()
        };
        let source = BigQuerySource::new(&config).unwrap();
        let body = source.query_body("fraud");
        let sql = body["query"].as_str().unwrap();
        assert!(sql.contains("FROM `proj.data.questions`"));
        assert!(sql.contains("REGEXP_CONTAINS(tags, @topic)"));
        assert!(!sql.contains("fraud"));
        assert_eq!(body["queryParameters"][0]["parameterValue"]["value"], "fraud");
        assert_eq!(body["queryParameters"][1]["parameterValue"]["value"], "100");
    }

    #[test]
    fn test_parse_query_response() {
        let json = json!({
            "jobComplete": true,
            "rows": [
                { "f": [{ "v": "What is APR?" }, { "v": "A yearly rate." }] },
                { "f": [{ "v": "Null answer" }, { "v": null }] }
            ]
        });
        let records = parse_query_response(&json, "fraud").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, "fraud");

        assert!(parse_query_response(&json!({ "jobComplete": true }), "x")
            .unwrap()
            .is_empty());
        assert!(parse_query_response(&json!({ "jobComplete": false }), "x").is_err());
    }

    #[test]
    fn test_summarize_counts_by_category() {
        let records = vec![
            CorpusRecord {
                input_text: "a".into(),
                output_text: "b".into(),
                category: "stocks".into(),
            },
            CorpusRecord {
                input_text: "c".into(),
                output_text: "d".into(),
                category: "fraud".into(),
            },
            CorpusRecord {
                input_text: "e".into(),
                output_text: "f".into(),
                category: "stocks".into(),
            },
        ];
        let counts: Vec<(&str, usize)> = summarize(&records).into_iter().collect();
        assert_eq!(counts, vec![("fraud", 1), ("stocks", 2)]);
    }
}
