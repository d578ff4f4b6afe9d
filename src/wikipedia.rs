use crate::document::Document;
use crate::error::{RagError, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::HashMap;

/// Longest article text kept per page, in characters
const MAX_DOC_CHARS: usize = 4000;

/// Where and how many articles to fetch for a topic
#[derive(Debug, Clone, PartialEq)]
pub struct WikipediaConfig {
    /// MediaWiki `api.php` endpoint
    pub base_url: String,
    pub top_k_results: usize,
}

/// Loads the best-matching encyclopedia articles for a topic
#[derive(Clone)]
pub struct WikipediaLoader {
    config: WikipediaConfig,
    client: reqwest::Client,
}

impl WikipediaLoader {
    pub fn new(config: WikipediaConfig) -> Self {
        WikipediaLoader {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// One document per article, in search rank order
    pub async fn load(&self, topic: &str) -> Result<Vec<Document>> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(RagError::Load("Search topic is empty".to_string()));
        }

        info!("Searching Wikipedia for: {}", topic);

        let limit = self.config.top_k_results.to_string();
        let search: SearchResponse = self
            .get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", topic),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .await?;

        let mut documents = Vec::new();
        for hit in search.query.search.into_iter().take(self.config.top_k_results) {
            let pageid = hit.pageid.to_string();
            let pages: ExtractResponse = self
                .get(&[
                    ("action", "query"),
                    ("prop", "extracts"),
                    ("explaintext", "1"),
                    ("pageids", pageid.as_str()),
                    ("format", "json"),
                ])
                .await?;

            match pages.query.pages.get(&pageid).and_then(|p| p.extract.as_deref()) {
                Some(extract) if !extract.trim().is_empty() => {
                    let content: String = extract.chars().take(MAX_DOC_CHARS).collect();
                    debug!("Fetched {} characters from {}", content.len(), hit.title);
                    documents.push(Document::new(hit.title, content));
                }
                _ => warn!("No text available for article {}", hit.title),
            }
        }

        info!("Loaded {} articles for {}", documents.len(), topic);
        Ok(documents)
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| RagError::Load(format!("Wikipedia request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Load(format!(
                "Wikipedia request failed: {} {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::Load(format!("Malformed Wikipedia response: {}", e)))
    }
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Deserialize, Debug)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Deserialize, Debug)]
struct SearchHit {
    title: String,
    pageid: u64,
}

#[derive(Deserialize, Debug)]
struct ExtractResponse {
    query: ExtractQuery,
}

#[derive(Deserialize, Debug)]
struct ExtractQuery {
    pages: HashMap<String, Page>,
}

#[derive(Deserialize, Debug)]
struct Page {
    extract: Option<String>,
}
