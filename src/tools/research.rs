//! Market Research Tools
//!
//! News, sentiment, and general web lookups over the search collaborator.
//! Crypto news is restricted to an allowlist of trade press domains.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{InputSchema, ParamKind, Tool, ToolContext};
use crate::types::SearchHit;

/// Domains considered primary sources for crypto news.
const CRYPTO_NEWS_DOMAINS: &[&str] = &[
    "coindesk.com",
    "cointelegraph.com",
    "decrypt.co",
    "theblockcrypto.com",
];

fn query_schema(query_hint: &'static str) -> InputSchema {
    InputSchema::new()
        .required("query", ParamKind::String, query_hint)
        .optional(
            "max_results",
            ParamKind::Integer,
            "Number of results to return",
            json!(5),
        )
}

fn query_args(args: &Map<String, Value>) -> (&str, u32) {
    let query = args["query"].as_str().unwrap_or_default();
    let max_results = args["max_results"].as_i64().unwrap_or(5).clamp(1, 20) as u32;
    (query, max_results)
}

fn hits_to_value(hits: Vec<SearchHit>) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(hits)?)
}

pub struct SearchCryptoNews;

#[async_trait]
impl Tool for SearchCryptoNews {
    fn name(&self) -> &'static str {
        "search_crypto_news"
    }
    fn description(&self) -> &'static str {
        "Search recent crypto market news from major trade publications."
    }
    fn schema(&self) -> InputSchema {
        query_schema("Search query, e.g. 'Bitcoin market news today'")
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let (query, max_results) = query_args(args);
        let hits = ctx
            .search
            .search(query, max_results, Some(CRYPTO_NEWS_DOMAINS))
            .await?;
        hits_to_value(hits)
    }
}

pub struct GetMarketSentiment;

#[async_trait]
impl Tool for GetMarketSentiment {
    fn name(&self) -> &'static str {
        "get_market_sentiment"
    }
    fn description(&self) -> &'static str {
        "Gauge current market sentiment for an asset from recent coverage. Returns hits plus a naive positive/negative tally."
    }
    fn schema(&self) -> InputSchema {
        query_schema("Asset or topic, e.g. 'Bitcoin'")
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let (query, max_results) = query_args(args);
        let hits = ctx
            .search
            .search(
                &format!("{query} market sentiment analysis"),
                max_results,
                None,
            )
            .await?;

        // Keyword tally is deliberately crude; the model weighs the articles
        // itself, this is just a headline summary.
        let positive_words = ["bullish", "rally", "surge", "gain", "optimism", "soar"];
        let negative_words = ["bearish", "crash", "plunge", "fear", "selloff", "drop"];

        let mut positive = 0u32;
        let mut negative = 0u32;
        for hit in &hits {
            let text = format!("{} {}", hit.title, hit.content).to_lowercase();
            positive += positive_words.iter().filter(|w| text.contains(*w)).count() as u32;
            negative += negative_words.iter().filter(|w| text.contains(*w)).count() as u32;
        }

        let overall = if positive > negative {
            "positive"
        } else if negative > positive {
            "negative"
        } else {
            "neutral"
        };

        Ok(json!({
            "query": query,
            "overall_sentiment": overall,
            "positive_signals": positive,
            "negative_signals": negative,
            "articles": serde_json::to_value(hits)?,
        }))
    }
}

pub struct SearchTechnicalAnalysis;

#[async_trait]
impl Tool for SearchTechnicalAnalysis {
    fn name(&self) -> &'static str {
        "search_technical_analysis"
    }
    fn description(&self) -> &'static str {
        "Search for published technical analysis of an asset."
    }
    fn schema(&self) -> InputSchema {
        query_schema("Asset or topic, e.g. 'Ethereum price'")
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let (query, max_results) = query_args(args);
        let hits = ctx
            .search
            .search(
                &format!("{query} technical analysis price prediction"),
                max_results,
                None,
            )
            .await?;
        hits_to_value(hits)
    }
}

pub struct SearchGeneralWeb;

#[async_trait]
impl Tool for SearchGeneralWeb {
    fn name(&self) -> &'static str {
        "search_general_web"
    }
    fn description(&self) -> &'static str {
        "General web search for anything not covered by the other research tools."
    }
    fn schema(&self) -> InputSchema {
        query_schema("Search query")
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let (query, max_results) = query_args(args);
        let hits = ctx.search.search(query, max_results, None).await?;
        hits_to_value(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{context_with_search, MockSearch};
    use crate::tools::invoke;
    use crate::types::{ToolCallRequest, ToolOutcome};

    fn request(name: &str, args: Value) -> ToolCallRequest {
        ToolCallRequest::new(name, args.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_sentiment_tally() {
        let search = MockSearch::with_hits(vec![
            SearchHit {
                title: "Bitcoin rally continues".to_string(),
                content: "Analysts turn bullish as prices surge".to_string(),
                url: "https://example.com/a".to_string(),
                score: 0.9,
                published_date: None,
            },
            SearchHit {
                title: "Minor selloff overnight".to_string(),
                content: "Some fear in derivatives markets".to_string(),
                url: "https://example.com/b".to_string(),
                score: 0.7,
                published_date: None,
            },
        ]);
        let ctx = context_with_search(search);
        let result = invoke(
            &GetMarketSentiment,
            &request("get_market_sentiment", json!({"query": "Bitcoin"})),
            &ctx,
        )
        .await;
        match result.outcome {
            ToolOutcome::Success { value } => {
                assert_eq!(value["overall_sentiment"], "positive");
                assert_eq!(value["positive_signals"], 3);
                assert_eq!(value["negative_signals"], 2);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_news_search_passes_domain_allowlist() {
        let search = MockSearch::default();
        let ctx = context_with_search(search);
        let result = invoke(
            &SearchCryptoNews,
            &request("search_crypto_news", json!({"query": "ETH news"})),
            &ctx,
        )
        .await;
        assert!(result.outcome.is_success());
    }
}
