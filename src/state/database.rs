//! Decision Database
//!
//! SQLite-backed persistent decision log. Uses rusqlite for synchronous,
//! single-process access; each insert commits immediately, so a crash loses
//! at most the in-flight cycle.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};

use crate::types::DecisionRecord;

use super::schema::{CREATE_TABLES, SCHEMA_VERSION};

/// Handle to the agent's SQLite decision store. One writer per run; concurrent
/// runs must point at distinct files.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `db_path` and initialize the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create db directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database: {db_path}"))?;

        // WAL keeps readers (e.g. --history) from blocking the writer
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(CREATE_TABLES)
            .context("failed to create tables")?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            params![SCHEMA_VERSION],
        )
        .context("failed to update schema version")?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)
            .context("failed to create tables")?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            params![SCHEMA_VERSION],
        )?;
        Ok(Self { conn })
    }

    /// Append one decision record. Fails if the decision_id already exists;
    /// records are immutable once written.
    pub fn insert_decision(&self, record: &DecisionRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO decisions (decision_id, timestamp, reasoning, action, parameters, result, portfolio_snapshot)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.decision_id as i64,
                    record.timestamp,
                    record.reasoning,
                    record.action,
                    serde_json::to_string(&record.parameters)?,
                    record
                        .result
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    serde_json::to_string(&record.portfolio_snapshot)?,
                ],
            )
            .with_context(|| format!("failed to insert decision {}", record.decision_id))?;
        Ok(())
    }

    /// Full history in append order.
    pub fn get_all_decisions(&self) -> Result<Vec<DecisionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT decision_id, timestamp, reasoning, action, parameters, result, portfolio_snapshot
             FROM decisions ORDER BY decision_id ASC",
        )?;
        let records = stmt
            .query_map([], |row| Ok(Self::deserialize_decision(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// The most recent `limit` records, oldest first.
    pub fn get_recent_decisions(&self, limit: i64) -> Result<Vec<DecisionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT decision_id, timestamp, reasoning, action, parameters, result, portfolio_snapshot
             FROM decisions ORDER BY decision_id DESC LIMIT ?1",
        )?;
        let mut records: Vec<DecisionRecord> = stmt
            .query_map(params![limit], |row| Ok(Self::deserialize_decision(row)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }

    pub fn decision_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn max_decision_id(&self) -> Result<u64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(decision_id), 0) FROM decisions",
            [],
            |row| row.get(0),
        )?;
        Ok(max as u64)
    }

    fn deserialize_decision(row: &Row) -> DecisionRecord {
        let parameters: String = row.get(4).unwrap_or_else(|_| "{}".to_string());
        let result: Option<String> = row.get(5).unwrap_or(None);
        let snapshot: String = row.get(6).unwrap_or_else(|_| "null".to_string());

        DecisionRecord {
            decision_id: row.get::<_, i64>(0).unwrap_or(0) as u64,
            timestamp: row.get(1).unwrap_or_default(),
            reasoning: row.get(2).unwrap_or_default(),
            action: row.get(3).unwrap_or_default(),
            parameters: serde_json::from_str(&parameters).unwrap_or_default(),
            result: result.and_then(|r| serde_json::from_str(&r).ok()),
            portfolio_snapshot: serde_json::from_str(&snapshot)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureKind, ToolOutcome};

    fn record(id: u64, action: &str) -> DecisionRecord {
        DecisionRecord {
            decision_id: id,
            timestamp: format!("2026-01-01T00:00:{:02}Z", id),
            reasoning: "signals aligned".to_string(),
            action: action.to_string(),
            parameters: serde_json::Map::new(),
            result: Some(ToolOutcome::Success {
                value: serde_json::json!({"order_id": "abc"}),
            }),
            portfolio_snapshot: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_insert_and_load_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.insert_decision(&record(1, "place_crypto_order")).unwrap();
        db.insert_decision(&record(2, "hold")).unwrap();

        let all = db.get_all_decisions().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].decision_id, 1);
        assert_eq!(all[1].action, "hold");
        assert!(all[0].result.as_ref().unwrap().is_success());
    }

    #[test]
    fn test_duplicate_decision_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_decision(&record(1, "hold")).unwrap();
        assert!(db.insert_decision(&record(1, "hold")).is_err());
    }

    #[test]
    fn test_recent_decisions_ordered_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        for id in 1..=5 {
            db.insert_decision(&record(id, "hold")).unwrap();
        }
        let recent = db.get_recent_decisions(3).unwrap();
        assert_eq!(
            recent.iter().map(|r| r.decision_id).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn test_failure_outcome_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let mut r = record(7, "error");
        r.result = Some(ToolOutcome::failure(
            FailureKind::Inference,
            "connection refused",
        ));
        db.insert_decision(&r).unwrap();

        let all = db.get_all_decisions().unwrap();
        match all[0].result.as_ref().unwrap() {
            ToolOutcome::Failure { kind, message, .. } => {
                assert_eq!(*kind, FailureKind::Inference);
                assert_eq!(message, "connection refused");
            }
            _ => panic!("expected failure outcome"),
        }
    }

    #[test]
    fn test_max_decision_id() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.max_decision_id().unwrap(), 0);
        db.insert_decision(&record(41, "hold")).unwrap();
        assert_eq!(db.max_decision_id().unwrap(), 41);
    }
}
