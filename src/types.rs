//! Trading Arena - Type Definitions
//!
//! Shared types for the autonomous trading agent runtime: the conversation
//! model, the tool-call data model, decision records, configuration, and the
//! collaborator traits (broker, search, model inference).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Conversation ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

/// One entry in the conversation log. Insertion order is causal order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Tool invocations requested by the model (assistant turns only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Back-reference to the request this result answers (tool_result turns only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::ToolResult,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

// ─── Tool Calls ──────────────────────────────────────────────────

/// A tool invocation requested by the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self {
            id: format!("tc_{}", uuid::Uuid::new_v4()),
            name: name.into(),
            arguments,
        }
    }
}

/// Classification of a tool-call failure. Every failure boundary maps into
/// exactly one of these, so the model and the operator both see a typed cause.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    UnknownTool,
    Collaborator,
    Serialization,
    Inference,
}

/// Outcome of one tool call. Exactly one of Success/Failure holds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success {
        value: Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        trace: Option<String>,
    },
}

impl ToolOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            trace: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Render the outcome as the content of a tool_result turn. Failures are
    /// reported back to the model as structured JSON so it can adapt.
    pub fn render_for_model(&self) -> String {
        match self {
            Self::Success { value } => {
                serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
            }
            Self::Failure { kind, message, .. } => serde_json::json!({
                "error": message,
                "kind": kind,
            })
            .to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub request: ToolCallRequest,
    pub outcome: ToolOutcome,
    pub duration_ms: u64,
}

// ─── Decision Records ────────────────────────────────────────────

/// A durable, immutable record of one completed decision cycle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub decision_id: u64,
    pub timestamp: String,
    pub reasoning: String,
    /// The tool name of the executed trade, or "hold", or "error".
    pub action: String,
    pub parameters: serde_json::Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutcome>,
    pub portfolio_snapshot: Value,
}

// ─── Cycle Outcome ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Completed,
    IterationLimitReached,
    Cancelled,
    FatalError,
}

/// What one decision cycle produced, returned to the run loop.
#[derive(Clone, Debug)]
pub struct CycleOutcome {
    pub iterations_used: usize,
    pub tool_results: Vec<ToolCallResult>,
    pub trade_executed: bool,
    pub terminated_reason: TerminationReason,
}

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaConfig {
    /// Ollama model identifier, e.g. "qwen2.5:latest".
    pub model: String,
    pub ollama_url: String,
    /// Seconds between decision cycles.
    pub interval_seconds: u64,
    /// Maximum decision cycles per run. 0 = unbounded.
    pub max_cycles: u64,
    /// Bound on model⇄tool round-trips within one cycle.
    pub max_tool_iterations: usize,
    /// Conversation cap in turns (system turn excluded from eviction).
    pub max_context_turns: usize,
    pub db_path: String,
    pub log_level: LogLevel,
    pub alpaca_api_key: String,
    pub alpaca_secret_key: String,
    /// False = paper trading endpoint. Live trading must be opted into.
    pub alpaca_live_trading: bool,
    pub tavily_api_key: String,
}

/// Stock defaults: five-minute cycles, ten tool round-trips per cycle,
/// fifty-turn context, paper trading.
pub fn default_config() -> ArenaConfig {
    ArenaConfig {
        model: "qwen2.5:latest".to_string(),
        ollama_url: "http://127.0.0.1:11434".to_string(),
        interval_seconds: 300,
        max_cycles: 0,
        max_tool_iterations: 10,
        max_context_turns: 50,
        db_path: "~/.arena/decisions.db".to_string(),
        log_level: LogLevel::Info,
        alpaca_api_key: String::new(),
        alpaca_secret_key: String::new(),
        alpaca_live_trading: false,
        tavily_api_key: String::new(),
    }
}

// ─── Broker Client ───────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountInfo {
    pub account_id: String,
    pub buying_power: f64,
    pub cash: f64,
    pub portfolio_value: f64,
    pub equity: f64,
    pub long_market_value: f64,
    pub status: String,
    pub trading_blocked: bool,
    pub crypto_status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub side: String,
    pub market_value: f64,
    pub cost_basis: f64,
    pub unrealized_pl: f64,
    pub unrealized_pl_percent: f64,
    pub current_price: f64,
    pub asset_class: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Quote {
    pub symbol: String,
    pub bid_price: f64,
    pub ask_price: f64,
    pub mid_price: f64,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrderReceipt {
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub filled_qty: f64,
    pub order_type: String,
    pub status: String,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_avg_price: Option<f64>,
}

/// One OHLCV bar.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Bar {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Brokerage collaborator. The core never assumes anything about what the
/// implementation does beyond this surface.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn account(&self) -> anyhow::Result<AccountInfo>;
    async fn positions(&self) -> anyhow::Result<Vec<Position>>;
    async fn latest_quote(&self, symbol: &str) -> anyhow::Result<Quote>;
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
    ) -> anyhow::Result<OrderReceipt>;
    async fn list_orders(&self, limit: u32) -> anyhow::Result<Vec<OrderReceipt>>;
    async fn cancel_order(&self, order_id: &str) -> anyhow::Result<()>;
    async fn bars(&self, symbol: &str, timeframe: &str, limit: u32) -> anyhow::Result<Vec<Bar>>;
}

// ─── Search Client ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    pub url: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        include_domains: Option<&[&str]>,
    ) -> anyhow::Result<Vec<SearchHit>>;
}

// ─── Model Inference Client ──────────────────────────────────────

/// Function-style tool definition handed to the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchemaDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What one inference call produced: assistant text plus zero or more
/// requested tool invocations, in request order.
#[derive(Clone, Debug)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn infer(
        &self,
        conversation: &[Turn],
        tools: &[ToolSchemaDef],
    ) -> anyhow::Result<ModelReply>;

    fn model_name(&self) -> String;
}
