//! In-memory [`CorpusSource`] backed by tagged question/answer rows.
//!
//! Used by the app's `file` corpus source and by tests. Topic filtering
//! mirrors a per-topic warehouse query: for each topic, in order, every row
//! with a tag containing the topic (case-insensitive) is emitted with
//! `category` set to that topic. A row matching several topics appears once
//! per topic.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::CorpusRecord;

use super::CorpusSource;

/// A stored question/answer row with free-form tags.
#[derive(Debug, Clone, Deserialize)]
pub struct TaggedRow {
    pub input_text: String,
    pub output_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TaggedRow {
    fn matches(&self, topic_lower: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.to_lowercase().contains(topic_lower))
    }
}

pub struct InMemoryCorpus {
    rows: Vec<TaggedRow>,
}

impl InMemoryCorpus {
    pub fn new(rows: Vec<TaggedRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl CorpusSource for InMemoryCorpus {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, topics: &[String]) -> Result<Vec<CorpusRecord>> {
        let mut out = Vec::new();
        for topic in topics {
            let needle = topic.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            out.extend(
                self.rows
                    .iter()
                    .filter(|row| row.matches(&needle))
                    .map(|row| CorpusRecord {
                        input_text: row.input_text.clone(),
                        output_text: row.output_text.clone(),
                        category: topic.clone(),
                    }),
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(input: &str, tags: &[&str]) -> TaggedRow {
        TaggedRow {
            input_text: input.to_string(),
            output_text: format!("answer to {}", input),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn corpus() -> InMemoryCorpus {
        InMemoryCorpus::new(vec![
            row("q1", &["stocks", "investing"]),
            row("q2", &["insurance"]),
            row("q3", &["Stock-Markets", "fraud"]),
        ])
    }

    #[tokio::test]
    async fn test_fetch_by_topic_sets_category() {
        let records = corpus().fetch(&["insurance".into()]).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input_text, "q2");
        assert_eq!(records[0].category, "insurance");
    }

    #[tokio::test]
    async fn test_fetch_substring_case_insensitive() {
        let records = corpus().fetch(&["stock".into()]).await.unwrap();
        let inputs: Vec<&str> = records.iter().map(|r| r.input_text.as_str()).collect();
        assert_eq!(inputs, vec!["q1", "q3"]);
    }

    #[tokio::test]
    async fn test_fetch_topic_order_and_duplicates() {
        let records = corpus()
            .fetch(&["fraud".into(), "stocks".into()])
            .await
            .unwrap();
        let pairs: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.input_text.as_str(), r.category.as_str()))
            .collect();
        assert_eq!(pairs, vec![("q3", "fraud"), ("q1", "stocks")]);
    }

    #[tokio::test]
    async fn test_fetch_no_topics() {
        assert!(corpus().fetch(&[]).await.unwrap().is_empty());
        assert!(corpus().fetch(&["".into()]).await.unwrap().is_empty());
    }
}
