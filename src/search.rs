//! Web search via the DuckDuckGo instant answer API

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Default instant answer endpoint
pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com/";

/// Related topics included in a formatted answer
const MAX_RELATED: usize = 5;

/// Text shown when the answer carries nothing usable
pub const NO_RESULTS: &str = "No information found for the query.";

/// Anything that can answer a free-text query with readable text
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `query` and return a formatted answer
    async fn search(&self, query: &str) -> Result<String>;
}

/// Instant answer response (subset)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstantAnswer {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub abstract_text: String,
    #[serde(default)]
    pub related_topics: Vec<RelatedTopic>,
}

/// Related topic entry; topic groups carry no text of their own
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RelatedTopic {
    #[serde(default)]
    pub text: Option<String>,
}

/// Render an instant answer as plain text
///
/// Only the first few related topics are considered, and groups without
/// text among them are skipped.
#[must_use]
pub fn format_instant_answer(answer: &InstantAnswer) -> String {
    let mut out = String::new();

    if !answer.heading.is_empty() {
        out.push_str(&format!("Title: {}\n\n", answer.heading));
    }

    if !answer.abstract_text.is_empty() {
        out.push_str(&format!("Summary: {}\n\n", answer.abstract_text));
    }

    if !answer.related_topics.is_empty() {
        out.push_str("Related results:\n");
        for text in answer
            .related_topics
            .iter()
            .take(MAX_RELATED)
            .filter_map(|t| t.text.as_deref())
            .filter(|t| !t.is_empty())
        {
            out.push_str(&format!("- {text}\n"));
        }
    }

    if out.is_empty() {
        NO_RESULTS.to_string()
    } else {
        out
    }
}

/// DuckDuckGo instant answer client
pub struct WebSearchTool {
    endpoint: String,
    client: reqwest::Client,
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_URL)
    }
}

impl WebSearchTool {
    /// Create a client for `endpoint`
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the raw instant answer for `query`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed
    pub async fn instant_answer(&self, query: &str) -> Result<InstantAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Search("empty query".to_string()));
        }

        tracing::debug!(query, "web search");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let response = response.error_for_status().map_err(Error::Http)?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SearchBackend for WebSearchTool {
    async fn search(&self, query: &str) -> Result<String> {
        let answer = self.instant_answer(query).await?;
        Ok(format_instant_answer(&answer))
    }
}
