//! services/api/src/adapters/research.rs
//!
//! This module contains the adapter for the You.com search APIs.
//! It implements the `ResearchService` port from the `core` crate:
//! general web search, the separate live-news index, and full page-content
//! retrieval. Fetched content is truncated to a fixed ceiling to bound
//! downstream token cost.

use async_trait::async_trait;
use learnpath_core::domain::{NewsHit, SearchHit};
use learnpath_core::ports::{PortError, PortResult, ResearchService};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const SEARCH_URL: &str = "https://api.ydc-index.io/search";
const LIVENEWS_URL: &str = "https://api.ydc-index.io/livenews";
const CONTENTS_URL: &str = "https://api.ydc-index.io/contents";

/// Fetched page content is truncated to this many characters.
const CONTENT_CHAR_CAP: usize = 15_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

//=========================================================================================
// Wire Response Structs
//=========================================================================================

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: SearchResults,
}

#[derive(Deserialize, Default)]
struct SearchResults {
    #[serde(default)]
    web: Vec<WebHit>,
}

#[derive(Deserialize)]
struct WebHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippets: Vec<String>,
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    news: NewsResults,
}

#[derive(Deserialize, Default)]
struct NewsResults {
    #[serde(default)]
    results: Vec<NewsArticle>,
}

#[derive(Deserialize)]
struct NewsArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    page_age: String,
    #[serde(default)]
    source_name: String,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(default)]
    markdown: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ResearchService` against the You.com APIs.
#[derive(Clone)]
pub struct YouResearchAdapter {
    client: reqwest::Client,
    api_key: String,
}

impl YouResearchAdapter {
    /// Creates a new `YouResearchAdapter`. Fails only if the HTTP client
    /// cannot be constructed.
    pub fn new(api_key: String) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self { client, api_key })
    }
}

fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() > cap {
        text.chars().take(cap).collect()
    } else {
        text.to_string()
    }
}

//=========================================================================================
// `ResearchService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResearchService for YouResearchAdapter {
    async fn search(&self, query: &str) -> PortResult<Vec<SearchHit>> {
        let response = self
            .client
            .get(SEARCH_URL)
            .header("X-API-Key", &self.api_key)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Search failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Search failed: {e}")))?
            .json::<SearchResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Search failed: {e}")))?;

        Ok(response
            .results
            .web
            .into_iter()
            .map(|hit| SearchHit {
                snippet: hit
                    .description
                    .or_else(|| hit.snippets.first().cloned())
                    .unwrap_or_default(),
                title: hit.title,
                url: hit.url,
            })
            .collect())
    }

    async fn news_search(&self, query: &str) -> PortResult<Vec<NewsHit>> {
        let response = self
            .client
            .get(LIVENEWS_URL)
            .header("X-API-Key", &self.api_key)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("News search failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("News search failed: {e}")))?
            .json::<NewsResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("News search failed: {e}")))?;

        Ok(response
            .news
            .results
            .into_iter()
            .take(5)
            .map(|article| NewsHit {
                title: article.title,
                description: article.description,
                url: article.url,
                date: article.page_age,
                source: article.source_name,
            })
            .collect())
    }

    async fn fetch_content(&self, url: &str) -> PortResult<String> {
        let items = self
            .client
            .post(CONTENTS_URL)
            .header("X-API-Key", &self.api_key)
            .json(&json!({
                "urls": [url],
                // Markdown suits the downstream model; HTML is the fallback.
                "formats": ["markdown", "html"],
            }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Content fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| PortError::Unexpected(format!("Content fetch failed: {e}")))?
            .json::<Vec<ContentItem>>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Content fetch failed: {e}")))?;

        let content = items
            .into_iter()
            .next()
            .and_then(|item| item.markdown.or(item.html))
            .unwrap_or_default();

        if content.is_empty() {
            return Err(PortError::Unexpected("No content retrieved.".to_string()));
        }
        Ok(truncate_chars(&content, CONTENT_CHAR_CAP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_character_boundaries() {
        let text = "é".repeat(20_000);
        let capped = truncate_chars(&text, CONTENT_CHAR_CAP);
        assert_eq!(capped.chars().count(), CONTENT_CHAR_CAP);
    }

    #[test]
    fn short_content_is_untouched() {
        assert_eq!(truncate_chars("abc", CONTENT_CHAR_CAP), "abc");
    }
}
