//! Context & History Tools
//!
//! Temporal awareness plus read access to the agent's own decision log, so
//! the model can review past decisions and learn from outcomes.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::{InputSchema, ParamKind, Tool, ToolContext};
use crate::state::performance_summary;

pub struct GetCurrentDatetime;

#[async_trait]
impl Tool for GetCurrentDatetime {
    fn name(&self) -> &'static str {
        "get_current_datetime"
    }
    fn description(&self) -> &'static str {
        "Get the current date and time for temporal awareness."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
    }
    async fn call(&self, _args: &Map<String, Value>, _ctx: &ToolContext) -> anyhow::Result<Value> {
        let now = Utc::now();
        Ok(json!({
            "timestamp": now.to_rfc3339(),
            "date": now.format("%Y-%m-%d").to_string(),
            "time": now.format("%H:%M:%S").to_string(),
            "day_of_week": now.format("%A").to_string(),
            "unix_timestamp": now.timestamp(),
        }))
    }
}

pub struct GetDecisionHistory;

#[async_trait]
impl Tool for GetDecisionHistory {
    fn name(&self) -> &'static str {
        "get_decision_history"
    }
    fn description(&self) -> &'static str {
        "Review your recent decisions with their reasoning, actions, and outcomes."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new().optional(
            "limit",
            ParamKind::Integer,
            "Number of recent decisions to return",
            json!(20),
        )
    }
    async fn call(&self, args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let limit = args["limit"].as_i64().unwrap_or(20).clamp(1, 200);
        let records = ctx
            .db
            .lock()
            .expect("decision db lock poisoned")
            .get_recent_decisions(limit)?;
        Ok(serde_json::to_value(records)?)
    }
}

pub struct GetPerformanceSummary;

#[async_trait]
impl Tool for GetPerformanceSummary {
    fn name(&self) -> &'static str {
        "get_performance_summary"
    }
    fn description(&self) -> &'static str {
        "Summarize your performance over time: decision counts, trades, and portfolio progression."
    }
    fn schema(&self) -> InputSchema {
        InputSchema::new()
    }
    async fn call(&self, _args: &Map<String, Value>, ctx: &ToolContext) -> anyhow::Result<Value> {
        let records = ctx
            .db
            .lock()
            .expect("decision db lock poisoned")
            .get_all_decisions()?;
        Ok(performance_summary(&records))
    }
}
