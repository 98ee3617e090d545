//! Shared test fixtures: scripted collaborator mocks and context builders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::state::Database;
use crate::tools::ToolContext;
use crate::types::{
    AccountInfo, Bar, BrokerClient, ModelClient, ModelReply, OrderReceipt, OrderSide, Position,
    Quote, SearchClient, SearchHit, ToolCallRequest, ToolSchemaDef, Turn,
};

// ─── Broker ──────────────────────────────────────────────────────

/// In-memory broker with canned data. `bars` honors the requested limit by
/// returning the trailing slice.
pub struct MockBroker {
    pub bars: Vec<Bar>,
    pub portfolio_value: f64,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::with_closes(&[100.0, 101.0, 102.0, 101.5, 103.0])
    }
}

impl MockBroker {
    pub fn with_closes(closes: &[f64]) -> Self {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Bar {
                timestamp: format!("2026-01-01T{:02}:{:02}:00Z", (i / 60) % 24, i % 60),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close: *close,
                volume: 1000.0 + i as f64,
            })
            .collect();
        Self {
            bars,
            portfolio_value: 10_000.0,
        }
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn account(&self) -> anyhow::Result<AccountInfo> {
        Ok(AccountInfo {
            account_id: "mock-account".to_string(),
            buying_power: 5_000.0,
            cash: 2_500.0,
            portfolio_value: self.portfolio_value,
            equity: self.portfolio_value,
            long_market_value: 7_500.0,
            status: "ACTIVE".to_string(),
            trading_blocked: false,
            crypto_status: "ACTIVE".to_string(),
        })
    }

    async fn positions(&self) -> anyhow::Result<Vec<Position>> {
        Ok(vec![Position {
            symbol: "BTC/USD".to_string(),
            quantity: 0.25,
            side: "long".to_string(),
            market_value: 7_500.0,
            cost_basis: 7_000.0,
            unrealized_pl: 500.0,
            unrealized_pl_percent: 7.14,
            current_price: 30_000.0,
            asset_class: "crypto".to_string(),
        }])
    }

    async fn latest_quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        Ok(Quote {
            symbol: symbol.to_string(),
            bid_price: 29_990.0,
            ask_price: 30_010.0,
            mid_price: 30_000.0,
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        })
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> anyhow::Result<OrderReceipt> {
        Ok(OrderReceipt {
            order_id: "order-1".to_string(),
            symbol: symbol.to_string(),
            side: side.to_string(),
            quantity,
            filled_qty: quantity,
            order_type: "market".to_string(),
            status: "filled".to_string(),
            submitted_at: "2026-01-01T00:00:00Z".to_string(),
            filled_at: Some("2026-01-01T00:00:01Z".to_string()),
            filled_avg_price: Some(30_000.0),
        })
    }

    async fn list_orders(&self, _limit: u32) -> anyhow::Result<Vec<OrderReceipt>> {
        Ok(Vec::new())
    }

    async fn cancel_order(&self, _order_id: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn bars(&self, _symbol: &str, _timeframe: &str, limit: u32) -> anyhow::Result<Vec<Bar>> {
        let start = self.bars.len().saturating_sub(limit as usize);
        Ok(self.bars[start..].to_vec())
    }
}

// ─── Search ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSearch {
    pub hits: Vec<SearchHit>,
}

impl MockSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl SearchClient for MockSearch {
    async fn search(
        &self,
        _query: &str,
        max_results: u32,
        _include_domains: Option<&[&str]>,
    ) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self
            .hits
            .iter()
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}

// ─── Model ───────────────────────────────────────────────────────

/// Scripted inference client: each `infer` call pops the next scripted step.
/// Once the script is exhausted, every further call returns a plain final
/// message with no tool calls.
pub struct MockModel {
    script: Mutex<VecDeque<anyhow::Result<ModelReply>>>,
    pub calls: AtomicUsize,
}

impl MockModel {
    pub fn scripted(steps: Vec<anyhow::Result<ModelReply>>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A reply requesting one tool call.
    pub fn tool_step(text: &str, name: &str, args: serde_json::Value) -> anyhow::Result<ModelReply> {
        Ok(ModelReply {
            content: text.to_string(),
            tool_calls: vec![ToolCallRequest::new(
                name,
                args.as_object().cloned().unwrap_or_default(),
            )],
        })
    }

    /// A final reply with no tool calls.
    pub fn text_step(text: &str) -> anyhow::Result<ModelReply> {
        Ok(ModelReply {
            content: text.to_string(),
            tool_calls: Vec::new(),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn infer(
        &self,
        _conversation: &[Turn],
        _tools: &[ToolSchemaDef],
    ) -> anyhow::Result<ModelReply> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(step) => step,
            None => Self::text_step("Nothing further this cycle."),
        }
    }

    fn model_name(&self) -> String {
        "mock-model".to_string()
    }
}

// ─── Context Builders ────────────────────────────────────────────

pub fn in_memory_db() -> Arc<Mutex<Database>> {
    Arc::new(Mutex::new(
        Database::open_in_memory().expect("in-memory db opens"),
    ))
}

pub fn noop_context() -> ToolContext {
    ToolContext {
        broker: Arc::new(MockBroker::default()),
        search: Arc::new(MockSearch::default()),
        db: in_memory_db(),
    }
}

pub fn context_with_broker(broker: MockBroker) -> ToolContext {
    ToolContext {
        broker: Arc::new(broker),
        search: Arc::new(MockSearch::default()),
        db: in_memory_db(),
    }
}

pub fn context_with_search(search: MockSearch) -> ToolContext {
    ToolContext {
        broker: Arc::new(MockBroker::default()),
        search: Arc::new(search),
        db: in_memory_db(),
    }
}
