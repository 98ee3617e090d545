//! Decision Recorder
//!
//! Append-only, durable record of every completed decision cycle. The full
//! history is loaded at startup to seed prompt context and to continue the
//! monotonic decision_id sequence.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde_json::{json, Value};

use crate::types::DecisionRecord;

use super::Database;

/// Owns the in-memory view of the decision log and persists each new record
/// immediately. The underlying database handle is shared with the history
/// tools, which only read.
pub struct DecisionRecorder {
    db: Arc<Mutex<Database>>,
    records: Vec<DecisionRecord>,
}

impl DecisionRecorder {
    /// Load the full history from the database into memory.
    pub fn load(db: Arc<Mutex<Database>>) -> Result<Self> {
        let records = db
            .lock()
            .expect("decision db lock poisoned")
            .get_all_decisions()?;
        Ok(Self { db, records })
    }

    /// The next decision_id in the monotonic sequence, continuing across
    /// process restarts.
    pub fn next_decision_id(&self) -> u64 {
        self.records.last().map(|r| r.decision_id).unwrap_or(0) + 1
    }

    /// Durably persist one record, then add it to the in-memory view. Called
    /// once per cycle; never batched.
    pub fn append(&mut self, record: DecisionRecord) -> Result<()> {
        self.db
            .lock()
            .expect("decision db lock poisoned")
            .insert_decision(&record)?;
        self.records.push(record);
        Ok(())
    }

    /// Full ordered history.
    pub fn all(&self) -> &[DecisionRecord] {
        &self.records
    }

    /// The most recent `limit` records for prompt inclusion. Bounding this is
    /// what keeps the context cap meaningful.
    pub fn summarize(&self, limit: usize) -> &[DecisionRecord] {
        let start = self.records.len().saturating_sub(limit);
        &self.records[start..]
    }
}

/// Aggregate performance view over a decision history: action breakdown,
/// trade count, and portfolio-value progression where snapshots carry one.
pub fn performance_summary(records: &[DecisionRecord]) -> Value {
    if records.is_empty() {
        return json!({
            "total_decisions": 0,
            "message": "No decision history yet",
        });
    }

    let mut actions: serde_json::Map<String, Value> = serde_json::Map::new();
    let mut trades = 0u64;
    for record in records {
        let count = actions
            .get(&record.action)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        actions.insert(record.action.clone(), json!(count + 1));
        if record.action != "hold" && record.action != "error" {
            trades += 1;
        }
    }

    let portfolio_values: Vec<f64> = records
        .iter()
        .filter_map(|r| r.portfolio_snapshot.get("portfolio_value"))
        .filter_map(Value::as_f64)
        .collect();

    let mut summary = json!({
        "total_decisions": records.len(),
        "total_trades": trades,
        "actions_breakdown": actions,
        "first_decision": records.first().map(|r| r.timestamp.clone()),
        "last_decision": records.last().map(|r| r.timestamp.clone()),
    });

    if let (Some(first), Some(last)) = (portfolio_values.first(), portfolio_values.last()) {
        summary["initial_portfolio_value"] = json!(first);
        summary["current_portfolio_value"] = json!(last);
        if *first != 0.0 {
            summary["portfolio_change_pct"] = json!(((last - first) / first) * 100.0);
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolOutcome;

    fn recorder() -> DecisionRecorder {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        DecisionRecorder::load(db).unwrap()
    }

    fn record(id: u64, action: &str) -> DecisionRecord {
        DecisionRecord {
            decision_id: id,
            timestamp: format!("2026-01-01T00:00:{:02}Z", id % 60),
            reasoning: String::new(),
            action: action.to_string(),
            parameters: serde_json::Map::new(),
            result: Some(ToolOutcome::Success {
                value: Value::Null,
            }),
            portfolio_snapshot: json!({"portfolio_value": 100.0 + id as f64}),
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_continue() {
        let mut rec = recorder();
        assert_eq!(rec.next_decision_id(), 1);
        for _ in 0..3 {
            let id = rec.next_decision_id();
            rec.append(record(id, "hold")).unwrap();
        }
        assert_eq!(rec.next_decision_id(), 4);

        // Reload from the same database: the sequence continues.
        let db = Arc::clone(&rec.db);
        let reloaded = DecisionRecorder::load(db).unwrap();
        assert_eq!(reloaded.all().len(), 3);
        assert_eq!(reloaded.next_decision_id(), 4);
    }

    #[test]
    fn test_append_order_preserved() {
        let mut rec = recorder();
        for id in 1..=10 {
            rec.append(record(id, "hold")).unwrap();
        }
        let ids: Vec<u64> = rec.all().iter().map(|r| r.decision_id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_summarize_returns_tail() {
        let mut rec = recorder();
        for id in 1..=8 {
            rec.append(record(id, "hold")).unwrap();
        }
        let tail = rec.summarize(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].decision_id, 6);

        // Limit larger than history returns everything.
        assert_eq!(rec.summarize(100).len(), 8);
    }

    #[test]
    fn test_performance_summary_counts_actions() {
        let mut rec = recorder();
        rec.append(record(1, "hold")).unwrap();
        rec.append(record(2, "place_crypto_order")).unwrap();
        rec.append(record(3, "hold")).unwrap();

        let summary = performance_summary(rec.all());
        assert_eq!(summary["total_decisions"], 3);
        assert_eq!(summary["total_trades"], 1);
        assert_eq!(summary["actions_breakdown"]["hold"], 2);
        assert_eq!(summary["initial_portfolio_value"], 101.0);
        assert_eq!(summary["current_portfolio_value"], 103.0);
    }

    #[test]
    fn test_performance_summary_empty() {
        let summary = performance_summary(&[]);
        assert_eq!(summary["total_decisions"], 0);
    }
}
