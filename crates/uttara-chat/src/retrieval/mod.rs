//! Semantic retrieval boundary.
//!
//! The document index is a read-only external service; the engine only
//! consumes top-k fragments. [`KeywordRetriever`] is a small in-process
//! implementation for local runs and tests — word-overlap scoring, no
//! embeddings.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Fragment;

/// Read-only contract the engine requires of the document index.
#[async_trait]
pub trait SemanticRetriever: Send + Sync {
    /// Return up to `k` fragments most similar to `query`, best first.
    /// An empty result is a normal outcome, not an error.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Fragment>>;
}

/// Word-overlap retriever over an in-memory corpus of text chunks.
pub struct KeywordRetriever {
    chunks: Vec<String>,
}

impl KeywordRetriever {
    pub fn new(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    fn score(query_words: &[String], chunk: &str) -> f32 {
        if query_words.is_empty() {
            return 0.0;
        }
        let chunk_lower = chunk.to_lowercase();
        let hits = query_words
            .iter()
            .filter(|w| chunk_lower.contains(w.as_str()))
            .count();
        hits as f32 / query_words.len() as f32
    }
}

#[async_trait]
impl SemanticRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Fragment>> {
        let query_words: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| w.len() > 2)
            .collect();

        let mut scored: Vec<Fragment> = self
            .chunks
            .iter()
            .map(|chunk| Fragment {
                content: chunk.clone(),
                score: Self::score(&query_words, chunk),
            })
            .filter(|f| f.score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> KeywordRetriever {
        KeywordRetriever::new(vec![
            "Item 3.1 excavation in ordinary soil, unit rate 450 per cubic metre".into(),
            "Item 4.2 plain cement concrete M15, unit rate 5200 per cubic metre".into(),
            "General conditions of contract, defects liability period 12 months".into(),
        ])
    }

    #[tokio::test]
    async fn relevant_chunks_rank_first() {
        let retriever = corpus();
        let results = retriever
            .retrieve("unit rate for excavation item 3.1", 5)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results[0].content.contains("excavation"));
        assert!(results[0].score >= results.last().unwrap().score);
    }

    #[tokio::test]
    async fn unrelated_query_returns_nothing() {
        let retriever = corpus();
        let results = retriever
            .retrieve("capital of a fictional country", 5)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn k_limits_result_count() {
        let retriever = corpus();
        let results = retriever.retrieve("unit rate per cubic metre", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
