//! Web search fallback.
//!
//! Queried only after the document tier fails (vague answer or no
//! fragments with no cache hit). Provider failures are recoverable by
//! design: the engine treats them as "no snippets" and falls through to
//! general knowledge.

pub mod cache;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::types::SearchSnippet;

pub use cache::{normalize_query, MemorySearchCache, SearchCache};

/// Contract the engine requires of a search provider. May legitimately
/// return an empty list.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<SearchSnippet>>;
}

/// Google Custom Search (JSON API) provider.
pub struct GoogleSearchProvider {
    api_key: String,
    cse_id: String,
    client: Client,
}

impl GoogleSearchProvider {
    const ENDPOINT: &'static str = "https://www.googleapis.com/customsearch/v1";

    pub fn new(api_key: String, cse_id: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            api_key,
            cse_id,
            client,
        })
    }
}

#[async_trait]
impl WebSearch for GoogleSearchProvider {
    async fn search(&self, query: &str, n: usize) -> Result<Vec<SearchSnippet>> {
        // The API caps num at 10 per request.
        let num = n.clamp(1, 10).to_string();
        let response = self
            .client
            .get(Self::ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| anyhow!("Search request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(anyhow!("Search returned HTTP {}: {}", status, preview));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse search response: {}", e))?;
        Ok(snippets_from_response(&value, n))
    }
}

/// Extract up to `n` snippets from a Custom Search response body.
/// Items without a snippet field are skipped, matching the provider's
/// occasional image/file results.
fn snippets_from_response(value: &Value, n: usize) -> Vec<SearchSnippet> {
    value
        .get("items")
        .and_then(|i| i.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("snippet").and_then(|s| s.as_str()))
                .take(n)
                .map(|s| SearchSnippet {
                    snippet: s.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
