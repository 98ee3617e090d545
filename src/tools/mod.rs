//! Arena Tool System
//!
//! Every external action the model can take is a `Tool`: a named capability
//! with a typed input schema. Tools are constructed once at startup, placed
//! in an immutable registry, and invoked through a single failure boundary.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::state::Database;
use crate::types::{BrokerClient, SearchClient, ToolSchemaDef};

pub mod analysis;
pub mod history;
pub mod invoker;
pub mod registry;
pub mod research;
pub mod schema;
pub mod trading;

pub use invoker::invoke;
pub use registry::{RegistryError, ToolRegistry};
pub use schema::{InputSchema, ParamKind};

/// Runtime context handed to every tool invocation.
pub struct ToolContext {
    pub broker: Arc<dyn BrokerClient>,
    pub search: Arc<dyn SearchClient>,
    pub db: Arc<Mutex<Database>>,
}

/// A capability the model can invoke. Implementations return a JSON value;
/// everything the model sees goes through this surface.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> InputSchema;

    /// Execute with validated arguments. Errors are caught and classified by
    /// the invoker; implementations just propagate with `?`.
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value>;

    /// Function-calling definition handed to the inference client.
    fn schema_def(&self) -> ToolSchemaDef {
        ToolSchemaDef {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json(),
        }
    }
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

/// All built-in tools, in the order they are presented to the model:
/// trading, technical analysis, market research, then context/history.
pub fn create_builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        // Account & Trading
        Arc::new(trading::GetAccountInfo),
        Arc::new(trading::GetPositions),
        Arc::new(trading::GetCryptoPrice),
        Arc::new(trading::PlaceCryptoOrder),
        Arc::new(trading::GetOrderHistory),
        Arc::new(trading::CancelOrder),
        Arc::new(trading::GetCryptoBars),
        // Technical Analysis
        Arc::new(analysis::CalculateRsi),
        Arc::new(analysis::CalculateMacd),
        Arc::new(analysis::CalculateMovingAverages),
        Arc::new(analysis::CalculateBollingerBands),
        Arc::new(analysis::GetPriceMomentum),
        Arc::new(analysis::GetSupportResistance),
        // Market Research
        Arc::new(research::SearchCryptoNews),
        Arc::new(research::GetMarketSentiment),
        Arc::new(research::SearchTechnicalAnalysis),
        Arc::new(research::SearchGeneralWeb),
        // Context & History
        Arc::new(history::GetCurrentDatetime),
        Arc::new(history::GetDecisionHistory),
        Arc::new(history::GetPerformanceSummary),
    ]
}

/// Tool names that execute capital when they succeed. The cycle controller
/// classifies `trade_executed` against this set, not the full registry.
pub const CAPITAL_EXECUTING_TOOLS: &[&str] = &["place_crypto_order"];

/// Tool whose successful result doubles as the cycle's portfolio snapshot.
pub const PORTFOLIO_SNAPSHOT_TOOL: &str = "get_account_info";
