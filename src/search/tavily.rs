//! Tavily Search Client
//!
//! REST client for the Tavily search API, used by the market-research tools.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::types::{SearchClient, SearchHit};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

pub struct TavilyClient {
    api_key: String,
    http: Client,
}

impl TavilyClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
        }
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        include_domains: Option<&[&str]>,
    ) -> Result<Vec<SearchHit>> {
        if self.api_key.is_empty() {
            anyhow::bail!("no Tavily API key configured; set TAVILY_API_KEY");
        }

        let mut body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "advanced",
        });
        if let Some(domains) = include_domains {
            body["include_domains"] = json!(domains);
        }

        let resp = self
            .http
            .post(TAVILY_API_URL)
            .json(&body)
            .send()
            .await
            .context("search request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("search error: {}: {}", status.as_u16(), text);
        }

        let data: Value = resp.json().await.context("failed to parse search response")?;

        let hits = data["results"]
            .as_array()
            .map(|results| {
                results
                    .iter()
                    .map(|item| SearchHit {
                        title: item["title"].as_str().unwrap_or("").to_string(),
                        content: item["content"].as_str().unwrap_or("").to_string(),
                        url: item["url"].as_str().unwrap_or("").to_string(),
                        score: item["score"].as_f64().unwrap_or(0.0),
                        published_date: item["published_date"].as_str().map(|s| s.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(hits)
    }
}
